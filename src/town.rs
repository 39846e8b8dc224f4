//! Registers the town's interactables and the world reactions that are not
//! part of the quest chain.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use glam::Vec3;
use log::{debug, info};
use parking_lot::Mutex;

use crate::content::{ContentPack, Landmark, ShopItem};
use crate::cooldown::Cooldowns;
use crate::events::{DomainEvent, EventKind, GameEvent, SubscriptionId, Tone};
use crate::game_state::{GameState, ItemSpec};
use crate::hud::Hud;
use crate::interaction::{Focus, InteractableConfig, InteractionManager};
use crate::quest::storyline::INTEL_DECRYPTED;
use crate::scene::TownScene;
use crate::world::Handle;

pub const SECRET_CHEST: &str = "secret-chest";

/// Platform heights above the base floor, one per spy level.
const SPY_LEVEL_HEIGHTS: [f32; 3] = [0.0, 8.0, 16.0];

/// Everything an interactable action may touch.
#[derive(Clone)]
struct World {
    state: GameState,
    hud: Arc<dyn Hud>,
    scene: Arc<TownScene>,
    interaction: InteractionManager,
}

impl World {
    fn notify(&self, text: &str, tone: Tone, millis: u64) {
        self.hud
            .push_notification(text, tone, Duration::from_millis(millis));
    }

    fn prop(&self, name: &str) -> Result<Handle> {
        self.scene
            .handle(name)
            .ok_or_else(|| anyhow!("content pack has no prop named {name}"))
    }
}

#[derive(Debug, Default)]
struct TownFlags {
    doors: BTreeMap<String, bool>,
    bridge_deployed: bool,
    inside_base: bool,
    spy_level: usize,
    landmarks_read: BTreeSet<String>,
}

/// The populated town.
pub struct Town {
    world: World,
    flags: Arc<Mutex<TownFlags>>,
    subscriptions: Vec<SubscriptionId>,
}

impl Town {
    pub fn install(
        pack: &ContentPack,
        state: GameState,
        hud: Arc<dyn Hud>,
        scene: Arc<TownScene>,
        interaction: InteractionManager,
    ) -> Result<Self> {
        let world = World {
            state,
            hud,
            scene,
            interaction,
        };
        let mut town = Town {
            world,
            flags: Arc::new(Mutex::new(TownFlags::default())),
            subscriptions: Vec::new(),
        };
        town.register_doors()?;
        town.register_plaza()?;
        town.register_shop(&pack.shop)?;
        town.register_farm(pack.config.harvest_cooldown_ms);
        town.register_harbor()?;
        town.register_spy_base()?;
        town.register_stadium()?;
        town.register_landmarks(&pack.landmarks)?;
        town.subscribe_world_events();
        info!(
            "town ready with {} interactables",
            town.world.interaction.len()
        );
        Ok(town)
    }

    pub fn is_door_open(&self, name: &str) -> bool {
        self.flags.lock().doors.get(name).copied().unwrap_or(false)
    }

    pub fn bridge_deployed(&self) -> bool {
        self.flags.lock().bridge_deployed
    }

    pub fn inside_base(&self) -> bool {
        self.flags.lock().inside_base
    }

    /// Zero-based level the spy platform is aligned to.
    pub fn spy_level(&self) -> usize {
        self.flags.lock().spy_level
    }

    pub fn landmarks_read(&self) -> BTreeSet<String> {
        self.flags.lock().landmarks_read.clone()
    }

    /// Drops the town's GameState subscriptions.
    pub fn detach(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.world.state.unsubscribe(id);
        }
    }

    fn register(&self, name: &str, config: InteractableConfig) -> Result<Handle> {
        let handle = self.world.prop(name)?;
        Ok(self.world.interaction.register(handle, config))
    }

    fn door_toggle(
        &self,
        door: String,
    ) -> impl Fn(Handle, &InteractableConfig, &Focus) + Send + Sync + 'static {
        let flags = Arc::clone(&self.flags);
        move |_, _, _| {
            let mut flags = flags.lock();
            let open = flags.doors.entry(door.clone()).or_insert(false);
            *open = !*open;
            debug!("{door} {}", if *open { "opened" } else { "closed" });
        }
    }

    fn register_doors(&self) -> Result<()> {
        let houses: Vec<String> = self
            .world
            .scene
            .props()
            .into_iter()
            .map(|prop| prop.name)
            .filter(|name| name.starts_with("house-") && name.ends_with("-door"))
            .collect();
        for (index, name) in houses.iter().enumerate() {
            self.register(
                name,
                InteractableConfig::new()
                    .prompt("Press E to enter")
                    .tooltip(format!(
                        "Townhouse {}: Swing the door open to step inside.",
                        index + 1
                    ))
                    .action(self.door_toggle(name.clone())),
            )?;
        }

        let shop_door = self.world.prop("shop-door")?;
        let panels: Vec<String> = self
            .world
            .scene
            .props()
            .into_iter()
            .filter(|prop| prop.parent == Some(shop_door))
            .map(|prop| prop.name)
            .collect();
        for panel in &panels {
            self.register(
                panel,
                InteractableConfig::new()
                    .prompt("Press E to enter")
                    .tooltip("Lifebot Supply: Slide the glass doors to browse new gadgets.")
                    .owner(shop_door)
                    .action(self.door_toggle("shop-door".to_string())),
            )?;
        }
        Ok(())
    }

    fn register_plaza(&self) -> Result<()> {
        let state = self.world.state.clone();
        self.register(
            "fountain",
            InteractableConfig::new()
                .hide_prompt()
                .tooltip("Plaza Fountain: The beating heart of Lifebot Town.")
                .on_focus(move |_| state.emit(DomainEvent::OrientationFountain)),
        )?;

        let world = self.world.clone();
        self.register(
            "house-0-sink",
            InteractableConfig::new()
                .prompt("Press E to collect fresh water")
                .tooltip("Clean Water: Use this sample to help FlameBot calibrate the fire system.")
                .action(move |_, _, _| {
                    if world.state.has_item("water-sample", 1) {
                        world.notify(
                            "You already filled a purifier bottle. Deliver it before collecting more.",
                            Tone::Warning,
                            2600,
                        );
                        return;
                    }
                    world.state.add_item(
                        "water-sample",
                        ItemSpec::new("Water Sample")
                            .item_type("quest")
                            .description("Collected from the residential purifier."),
                    );
                    world.notify("Water gushes into your bottle.", Tone::Info, 2400);
                }),
        )?;

        let world = self.world.clone();
        self.register(
            "flamebot",
            InteractableConfig::new()
                .prompt("Press E to talk to FlameBot")
                .tooltip("FlameBot: Guardian of the harbor, loves a good quest update.")
                .action(move |_, _, _| talk_to_flamebot(&world)),
        )?;

        let state = self.world.state.clone();
        self.register(
            "job-board",
            InteractableConfig::new()
                .prompt("Press E to view available jobs")
                .tooltip("Town Jobs: Daily contracts to earn coins and reputation.")
                .action(move |_, _, _| state.emit(DomainEvent::JobBoard)),
        )?;
        Ok(())
    }

    fn register_shop(&self, stock: &[ShopItem]) -> Result<()> {
        for item in stock {
            let world = self.world.clone();
            let product = item.clone();
            self.register(
                &item.prop,
                InteractableConfig::new()
                    .prompt(format!("Press E to buy {} ({} coins)", item.name, item.price))
                    .tooltip(format!("{}: {}", item.name, item.description))
                    .action(move |_, _, _| buy(&world, &product)),
            )?;
        }
        Ok(())
    }

    fn register_farm(&self, cooldown_ms: f64) {
        let cooldowns = Arc::new(Cooldowns::new(self.world.state.clock(), cooldown_ms));
        let rows: Vec<(String, Handle)> = self
            .world
            .scene
            .props()
            .into_iter()
            .filter(|prop| prop.name.starts_with("crop-row-"))
            .map(|prop| (prop.name, prop.handle))
            .collect();
        for (name, handle) in rows {
            let world = self.world.clone();
            let cooldowns = Arc::clone(&cooldowns);
            self.world.interaction.register(
                handle,
                InteractableConfig::new()
                    .prompt("Press E to harvest glow berries")
                    .tooltip("Glow Berries: Deliver to merchants for a quick payout.")
                    .action(move |_, _, _| {
                        if !cooldowns.try_use(&name) {
                            world.notify(
                                "These glow berries need more time to regrow.",
                                Tone::Warning,
                                2200,
                            );
                            return;
                        }
                        world.state.add_item(
                            "glow-berry",
                            ItemSpec::new("Glow Berry")
                                .quantity(2)
                                .item_type("ingredient")
                                .description("Shimmers softly, valued by stadium vendors."),
                        );
                        world.state.add_coins(4, "Harvest contract");
                        world.notify("Harvested fresh glow berries!", Tone::Success, 2600);
                    }),
            );
        }
    }

    fn register_harbor(&self) -> Result<()> {
        let end_position = self
            .world
            .scene
            .handle("bridge-end")
            .and_then(|handle| self.world.scene.prop(handle))
            .map(|prop| prop.position)
            .unwrap_or(Vec3::ZERO);
        let world = self.world.clone();
        let flags = Arc::clone(&self.flags);
        self.register(
            "bridge-console",
            InteractableConfig::new()
                .prompt("Press E to deploy the harbor bridge")
                .tooltip("Harbor Bridge Controls: Requires FlameBot authorization.")
                .action(move |_, _, _| {
                    if flags.lock().bridge_deployed {
                        world.notify("Bridge already extended.", Tone::Info, 1800);
                        return;
                    }
                    if !world.state.has_flag("bridge-authorized") {
                        world.notify(
                            "FlameBot requires confirmation before deploying the bridge.",
                            Tone::Warning,
                            3200,
                        );
                        return;
                    }
                    flags.lock().bridge_deployed = true;
                    world.notify("Harbor bridge unfurls across the bay.", Tone::Success, 3200);
                    world.state.emit(DomainEvent::BridgeDeployed { end_position });
                    world.state.set_flag("harbor-bridge-online", true);
                }),
        )?;
        Ok(())
    }

    fn register_spy_base(&self) -> Result<()> {
        let world = self.world.clone();
        let flags = Arc::clone(&self.flags);
        self.register(
            "spy-portal",
            InteractableConfig::new()
                .prompt("Press E to sync with the spy portal")
                .tooltip("Spy Portal: Requires clearance and FlameBot authorization.")
                .action(move |_, _, _| {
                    if !world.state.has_flag("spy-clearance") {
                        world.notify(
                            "A hidden scanner rejects you. Acquire a clearance badge from the shop.",
                            Tone::Danger,
                            3600,
                        );
                        return;
                    }
                    if !world.state.has_flag("spy-briefing") {
                        world.notify(
                            "FlameBot has not authorized entry yet. Complete the harbor briefing.",
                            Tone::Warning,
                            3200,
                        );
                        return;
                    }
                    flags.lock().inside_base = true;
                    world.notify("You descend into the spy facility.", Tone::Info, 3200);
                    world.state.emit(DomainEvent::EnteredSpyBase);
                }),
        )?;

        let world = self.world.clone();
        let flags = Arc::clone(&self.flags);
        self.register(
            "spy-exit",
            InteractableConfig::new()
                .prompt("Press E to exit to the island")
                .tooltip("Surface Exit: Return to the portal.")
                .action(move |_, _, _| {
                    flags.lock().inside_base = false;
                    world.notify("You step back into the island breeze.", Tone::Info, 2400);
                }),
        )?;

        let state = self.world.state.clone();
        self.register(
            "spy-console",
            InteractableConfig::new()
                .prompt("Press E to decrypt harbor intel")
                .tooltip("Harbor Console: Upload FlameBot logs to earn coins.")
                .action(move |_, _, _| {
                    state.add_coins(8, "Spy console data upload");
                    state.push_notification(
                        &format!("{INTEL_DECRYPTED}. Funds wired to your account."),
                        Tone::Success,
                        Duration::from_millis(3200),
                    );
                    state.set_flag("spy-intel", true);
                }),
        )?;

        let world = self.world.clone();
        self.register(
            "weapons-rack",
            InteractableConfig::new()
                .prompt("Press E to collect prototype gadget")
                .tooltip("Prototype Gadget: Limited-use distraction drone.")
                .action(move |_, _, _| {
                    if world.state.has_item("drone-decoy", 1) {
                        world.notify("You already carry the prototype drone.", Tone::Warning, 2200);
                        return;
                    }
                    world.state.add_item(
                        "drone-decoy",
                        ItemSpec::new("Decoy Drone")
                            .item_type("gadget")
                            .description("Deploy to distract enemies and unlock shortcuts."),
                    );
                    world.state.push_notification(
                        "Prototype drone secured.",
                        Tone::Success,
                        Duration::from_millis(2600),
                    );
                }),
        )?;

        let floor = self.world.prop("spy-platform").and_then(|handle| {
            self.world
                .scene
                .prop(handle)
                .map(|prop| prop.position)
                .ok_or_else(|| anyhow!("spy-platform vanished"))
        })?;
        let world = self.world.clone();
        let flags = Arc::clone(&self.flags);
        self.register(
            "spy-platform",
            InteractableConfig::new()
                .prompt("Press E to cycle spy levels")
                .tooltip("Spy Platform: Align with deeper levels.")
                .action(move |owner, _, _| {
                    let level = {
                        let mut flags = flags.lock();
                        flags.spy_level = (flags.spy_level + 1) % SPY_LEVEL_HEIGHTS.len();
                        flags.spy_level
                    };
                    let position = floor + Vec3::new(0.0, SPY_LEVEL_HEIGHTS[level], 0.0);
                    world.scene.move_prop(owner, position);
                    world.notify(
                        &format!("Spy platform aligned to Level {}.", level + 1),
                        Tone::Info,
                        2400,
                    );
                }),
        )?;
        Ok(())
    }

    fn register_stadium(&self) -> Result<()> {
        let state = self.world.state.clone();
        self.register(
            "stadium-seat",
            InteractableConfig::new()
                .prompt("Press E to take a seat")
                .tooltip("Stadium Seat: Cheer on the Lifebots.")
                .action(move |_, _, _| {
                    state.add_coins(1, "Fan participation");
                    state.emit(DomainEvent::StadiumCheer);
                }),
        )?;
        Ok(())
    }

    fn register_landmarks(&self, landmarks: &[Landmark]) -> Result<()> {
        for landmark in landmarks {
            let world = self.world.clone();
            let id = landmark.id.clone();
            let read = format!("{}: {}", landmark.title, landmark.message);
            self.register(
                &landmark.prop,
                InteractableConfig::new()
                    .prompt("Press E to read the park placard")
                    .tooltip(format!("{}: {}", landmark.title, landmark.description))
                    .action(move |_, _, _| {
                        world.notify(&read, Tone::Info, 3200);
                        world.state.emit(DomainEvent::Landmark { id: id.clone() });
                    }),
            )?;
        }
        Ok(())
    }

    fn subscribe_world_events(&mut self) {
        let world = self.world.clone();
        let secret = self
            .world
            .state
            .on(EventKind::SecretSequence, move |_, _| spawn_secret_chest(&world));
        self.subscriptions.push(secret);

        let hud = Arc::clone(&self.world.hud);
        let bridge = self.world.state.on(EventKind::BridgeDeployed, move |_, _| {
            hud.push_notification(
                "Follow the bridge toward the distant island to reach the spy portal.",
                Tone::Info,
                Duration::from_millis(3600),
            );
        });
        self.subscriptions.push(bridge);

        let flags = Arc::clone(&self.flags);
        let landmark = self.world.state.on(EventKind::Landmark, move |_, event| {
            if let GameEvent::Domain(DomainEvent::Landmark { id }) = event {
                if flags.lock().landmarks_read.insert(id.clone()) {
                    debug!("first visit to {id}");
                }
            }
        });
        self.subscriptions.push(landmark);
    }
}

fn talk_to_flamebot(world: &World) {
    world.notify(
        "My sensors read irregularities across town. Can you help calibrate our defense grid?",
        Tone::Info,
        3200,
    );
    world.notify(
        "Bring me a water sample from the houses and check on the harbor bridge after.",
        Tone::Info,
        3200,
    );
    if world.state.remove_item("water-sample", 1) {
        world.notify(
            "FlameBot calibrates the system with your sample.",
            Tone::Success,
            3600,
        );
        world.state.emit(DomainEvent::WaterDelivered);
    }
    if world.state.has_flag("bridge-authorized") {
        world.notify(
            "Bridge controls unlocked near the harbor pier.",
            Tone::Success,
            2600,
        );
    }
    world.state.emit(DomainEvent::FlamebotContact);
}

fn buy(world: &World, item: &ShopItem) {
    if !world.state.spend_coins(item.price, "purchase") {
        return;
    }
    let mut spec = ItemSpec::new(item.name.as_str()).description(item.description.as_str());
    if let Some(item_type) = &item.item_type {
        spec = spec.item_type(item_type.as_str());
    }
    world.state.add_item(&item.id, spec);
    if item.id == "spy-pass" {
        world.state.set_flag("spy-clearance", true);
        world.state.push_notification(
            "Spy clearance badge acquired. The hidden elevator might respond now.",
            Tone::Success,
            Duration::from_millis(3800),
        );
    }
}

fn spawn_secret_chest(world: &World) {
    if world.scene.handle(SECRET_CHEST).is_some() {
        return;
    }
    let position = world.scene.camera().position + Vec3::new(4.0, -1.0, 4.0);
    let chest = world.scene.spawn(SECRET_CHEST, position, 0.9, None);
    world.scene.spawn(
        "secret-chest-lid",
        position + Vec3::new(0.0, 0.6, 0.0),
        0.4,
        Some(chest),
    );
    info!("secret chest spawned at {position}");

    let action_world = world.clone();
    world.interaction.register(
        chest,
        InteractableConfig::new()
            .prompt("Press E to open the hidden cache")
            .tooltip("Hidden Cache: Secret reward for curious players.")
            .action(move |owner, _, _| {
                action_world.state.add_coins(30, "Secret cache");
                action_world.state.push_notification(
                    "You discovered FlameBot's emergency fund.",
                    Tone::Success,
                    Duration::from_millis(3600),
                );
                action_world.interaction.unregister(owner);
                action_world.scene.set_pickable(owner, false);
            }),
    );
    world.notify("A hidden chest materializes nearby!", Tone::Success, 3600);
}
