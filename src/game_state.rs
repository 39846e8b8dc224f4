//! The session's single source of truth and its notification bus.
//!
//! Every mutator takes the write lock, applies its change, releases the lock
//! and only then dispatches the resulting event. Listeners therefore run with
//! no lock held and may call back into any mutator.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::events::{
    DomainEvent, EventBus, EventKind, GameEvent, InventoryChange, InventoryMode, Listener,
    SubscriptionId, Tone,
};
use crate::input::KeyCode;
use crate::quest::{Objective, QuestInstance, QuestValue};

pub const DEFAULT_STARTING_COINS: u32 = 25;
pub const DEFAULT_KEY_HISTORY: usize = 10;
pub const DEFAULT_STATUS_LINE: &str = "Explore Lifebot Town";

/// Inventory entry. Entries with a quantity of zero are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub item_type: String,
    pub description: String,
}

/// Arguments of [`GameState::add_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub name: String,
    pub quantity: u32,
    pub item_type: Option<String>,
    pub description: String,
}

impl ItemSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: 1,
            item_type: None,
            description: String::new(),
        }
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One entry of the rolling key-press history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyStroke {
    pub code: KeyCode,
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    #[default]
    FirstPerson,
    ThirdPersonBack,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::FirstPerson => "First Person",
            ViewMode::ThirdPersonBack => "Third Person Back",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameplaySettings {
    pub view_mode: ViewMode,
    pub dinosaurs_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarSettings {
    pub base_body: String,
    pub hairstyle: String,
    pub top: String,
    pub bottom: String,
    pub accessory: String,
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            base_body: "bot-boy".into(),
            hairstyle: "spiky".into(),
            top: "retro-tee".into(),
            bottom: "adventure".into(),
            accessory: "none".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub gameplay: GameplaySettings,
    pub avatar: AvatarSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameplayChanges {
    pub view_mode: Option<ViewMode>,
    pub dinosaurs_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AvatarChanges {
    pub base_body: Option<String>,
    pub hairstyle: Option<String>,
    pub top: Option<String>,
    pub bottom: Option<String>,
    pub accessory: Option<String>,
}

impl AvatarChanges {
    /// Yields `(field, value)` for every field that is set.
    pub fn entries(&self) -> Vec<(AvatarField, &str)> {
        [
            (AvatarField::BaseBody, &self.base_body),
            (AvatarField::Hairstyle, &self.hairstyle),
            (AvatarField::Top, &self.top),
            (AvatarField::Bottom, &self.bottom),
            (AvatarField::Accessory, &self.accessory),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|value| (field, value)))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AvatarField {
    BaseBody,
    Hairstyle,
    Top,
    Bottom,
    Accessory,
}

impl AvatarField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "baseBody" | "base-body" => Some(Self::BaseBody),
            "hairstyle" => Some(Self::Hairstyle),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            "accessory" => Some(Self::Accessory),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AvatarField::BaseBody => "Body",
            AvatarField::Hairstyle => "Hairstyle",
            AvatarField::Top => "Top",
            AvatarField::Bottom => "Bottoms",
            AvatarField::Accessory => "Accessory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    Gameplay(GameplayChanges),
    Avatar(AvatarChanges),
}

impl SettingsChange {
    pub fn category(&self) -> &'static str {
        match self {
            SettingsChange::Gameplay(_) => "gameplay",
            SettingsChange::Avatar(_) => "avatar",
        }
    }
}

#[derive(Debug)]
struct Store {
    coins: u32,
    inventory: BTreeMap<String, Item>,
    flags: BTreeSet<String>,
    quests: BTreeMap<String, QuestInstance>,
    active_quest_id: Option<String>,
    objectives: Vec<Objective>,
    status_line: String,
    key_history: VecDeque<KeyStroke>,
    settings: Settings,
}

impl Store {
    fn new(coins: u32) -> Self {
        Self {
            coins,
            inventory: BTreeMap::new(),
            flags: BTreeSet::new(),
            quests: BTreeMap::new(),
            active_quest_id: None,
            objectives: Vec::new(),
            status_line: DEFAULT_STATUS_LINE.to_string(),
            key_history: VecDeque::new(),
            settings: Settings::default(),
        }
    }

    fn inventory_list(&self) -> Vec<Item> {
        self.inventory.values().cloned().collect()
    }
}

/// Shared handle to the session state. Clones observe the same store.
#[derive(Clone)]
pub struct GameState {
    store: Arc<RwLock<Store>>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    history_limit: usize,
}

impl fmt::Debug for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameState")
            .field("store", &*self.store.read())
            .field("bus", &self.bus)
            .finish()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::build(DEFAULT_STARTING_COINS, DEFAULT_KEY_HISTORY, clock)
    }

    pub fn from_config(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self::build(config.starting_coins, config.key_history_limit, clock)
    }

    fn build(coins: u32, history_limit: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::new(coins))),
            bus: Arc::new(EventBus::new()),
            clock,
            history_limit: history_limit.max(1),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn dispatch(&self, event: GameEvent) {
        self.bus.dispatch(self, &event);
    }

    // ---- subscriptions -------------------------------------------------

    /// Receives every event.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&GameState, &GameEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(None, Arc::new(listener))
    }

    /// Receives events of one kind only.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&GameState, &GameEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.bus.subscribe(Some(kind), listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.bus.len()
    }

    /// Broadcasts an ad-hoc domain event.
    pub fn emit(&self, event: DomainEvent) {
        debug!("domain event {}", event.kind());
        self.dispatch(GameEvent::Domain(event));
    }

    // ---- coins ---------------------------------------------------------

    pub fn coins(&self) -> u32 {
        self.store.read().coins
    }

    pub fn add_coins(&self, amount: u32, context: &str) {
        if amount == 0 {
            return;
        }
        let coins = {
            let mut store = self.store.write();
            store.coins = store.coins.saturating_add(amount);
            store.coins
        };
        self.dispatch(GameEvent::Coins {
            coins,
            delta: i64::from(amount),
            context: context.to_string(),
        });
    }

    /// Returns `false` and leaves the balance untouched when it cannot cover
    /// `amount`; an `insufficient-coins` event reports the shortfall.
    pub fn spend_coins(&self, amount: u32, context: &str) -> bool {
        let outcome = {
            let mut store = self.store.write();
            if store.coins < amount {
                Err(store.coins)
            } else {
                store.coins -= amount;
                Ok(store.coins)
            }
        };
        match outcome {
            Err(coins) => {
                debug!("cannot spend {amount} coins ({context}): balance {coins}");
                self.dispatch(GameEvent::InsufficientCoins {
                    required: amount,
                    coins,
                    context: context.to_string(),
                });
                false
            }
            Ok(coins) => {
                if amount > 0 {
                    self.dispatch(GameEvent::Coins {
                        coins,
                        delta: -i64::from(amount),
                        context: context.to_string(),
                    });
                }
                true
            }
        }
    }

    // ---- inventory -----------------------------------------------------

    /// Adds to (or creates) an entry and returns the resulting quantity.
    pub fn add_item(&self, id: &str, spec: ItemSpec) -> u32 {
        if spec.quantity == 0 {
            return self.item_quantity(id);
        }
        let (quantity, inventory) = {
            let mut store = self.store.write();
            let entry = store.inventory.entry(id.to_string()).or_insert_with(|| Item {
                id: id.to_string(),
                name: spec.name.clone(),
                quantity: 0,
                item_type: "generic".to_string(),
                description: String::new(),
            });
            entry.quantity = entry.quantity.saturating_add(spec.quantity);
            if let Some(item_type) = &spec.item_type {
                entry.item_type = item_type.clone();
            }
            if !spec.description.is_empty() {
                entry.description = spec.description.clone();
            }
            let quantity = entry.quantity;
            (quantity, store.inventory_list())
        };
        self.dispatch(GameEvent::Inventory {
            inventory,
            change: InventoryChange {
                id: id.to_string(),
                name: Some(spec.name),
                quantity: spec.quantity,
                item_type: spec.item_type,
                description: Some(spec.description),
                mode: InventoryMode::Add,
            },
        });
        quantity
    }

    /// Decrements an entry, dropping it once nothing is left. Returns `false`
    /// when the item is not held. Removing zero of a held item still notifies.
    pub fn remove_item(&self, id: &str, quantity: u32) -> bool {
        let inventory = {
            let mut store = self.store.write();
            let Some(existing) = store.inventory.get_mut(id) else {
                return false;
            };
            existing.quantity = existing.quantity.saturating_sub(quantity);
            if existing.quantity == 0 {
                store.inventory.remove(id);
            }
            store.inventory_list()
        };
        self.dispatch(GameEvent::Inventory {
            inventory,
            change: InventoryChange {
                id: id.to_string(),
                name: None,
                quantity,
                item_type: None,
                description: None,
                mode: InventoryMode::Remove,
            },
        });
        true
    }

    pub fn has_item(&self, id: &str, quantity: u32) -> bool {
        self.store
            .read()
            .inventory
            .get(id)
            .map(|item| item.quantity >= quantity)
            .unwrap_or(false)
    }

    pub fn item_quantity(&self, id: &str) -> u32 {
        self.store
            .read()
            .inventory
            .get(id)
            .map(|item| item.quantity)
            .unwrap_or(0)
    }

    pub fn inventory(&self) -> Vec<Item> {
        self.store.read().inventory_list()
    }

    // ---- flags ---------------------------------------------------------

    /// Always notifies, even when the flag already had the requested value.
    pub fn set_flag(&self, flag: &str, value: bool) {
        let flags = {
            let mut store = self.store.write();
            if value {
                store.flags.insert(flag.to_string());
            } else {
                store.flags.remove(flag);
            }
            store.flags.clone()
        };
        self.dispatch(GameEvent::Flags { flags });
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.store.read().flags.contains(flag)
    }

    pub fn flags(&self) -> BTreeSet<String> {
        self.store.read().flags.clone()
    }

    // ---- status and notifications -------------------------------------

    pub fn set_status_line(&self, text: &str) {
        self.store.write().status_line = text.to_string();
        self.dispatch(GameEvent::Status {
            text: text.to_string(),
        });
    }

    pub fn status_line(&self) -> String {
        self.store.read().status_line.clone()
    }

    pub fn push_notification(&self, text: &str, tone: Tone, duration: Duration) {
        self.dispatch(GameEvent::Notification {
            text: text.to_string(),
            tone,
            duration,
        });
    }

    // ---- quests --------------------------------------------------------

    /// Records `quest` as the active quest and projects its objectives.
    /// `None` ends the active quest and clears the projection.
    pub fn set_active_quest(&self, quest: Option<QuestInstance>) {
        let Some(quest) = quest else {
            self.store.write().active_quest_id = None;
            self.dispatch(GameEvent::QuestEnded);
            self.set_objectives(Vec::new());
            return;
        };
        let objectives = quest.objectives.clone();
        {
            let mut store = self.store.write();
            store.active_quest_id = Some(quest.id.clone());
            store.quests.insert(quest.id.clone(), quest.clone());
        }
        debug!("quest started: {}", quest.id);
        self.dispatch(GameEvent::QuestStarted { quest });
        self.set_objectives(objectives);
    }

    pub fn active_quest_id(&self) -> Option<String> {
        self.store.read().active_quest_id.clone()
    }

    pub fn quest(&self, quest_id: &str) -> Option<QuestInstance> {
        self.store.read().quests.get(quest_id).cloned()
    }

    pub fn has_quest(&self, quest_id: &str) -> bool {
        self.store.read().quests.contains_key(quest_id)
    }

    pub fn quests(&self) -> Vec<QuestInstance> {
        self.store.read().quests.values().cloned().collect()
    }

    /// Merges `update` into the quest's progress bag. Unknown ids are ignored.
    pub fn update_quest_progress<I, K, V>(&self, quest_id: &str, update: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QuestValue>,
    {
        let quest = {
            let mut store = self.store.write();
            let Some(quest) = store.quests.get_mut(quest_id) else {
                return;
            };
            for (key, value) in update {
                quest.state.insert(key.into(), value.into());
            }
            quest.clone()
        };
        self.dispatch(GameEvent::QuestProgress { quest });
    }

    /// Marks the quest completed once. Completion listeners run first; the
    /// active quest and objective projection are cleared afterwards only if
    /// this quest is still the active one, so a listener may chain the next.
    pub fn complete_quest(&self, quest_id: &str) {
        let quest = {
            let mut store = self.store.write();
            let Some(quest) = store.quests.get_mut(quest_id) else {
                return;
            };
            if quest.completed {
                return;
            }
            quest.completed = true;
            quest.clone()
        };
        debug!("quest completed: {quest_id}");
        self.dispatch(GameEvent::QuestCompleted { quest });
        let still_active = {
            let mut store = self.store.write();
            let active = store.active_quest_id.as_deref() == Some(quest_id);
            if active {
                store.active_quest_id = None;
            }
            active
        };
        if still_active {
            self.set_objectives(Vec::new());
        }
    }

    /// Silent in-place mutation used by the quest manager. Callers re-project
    /// objectives themselves.
    pub(crate) fn with_quest_mut<F, R>(&self, quest_id: &str, mutate: F) -> Option<R>
    where
        F: FnOnce(&mut QuestInstance) -> R,
    {
        let mut store = self.store.write();
        store.quests.get_mut(quest_id).map(mutate)
    }

    pub fn set_objectives(&self, objectives: Vec<Objective>) {
        self.store.write().objectives = objectives.clone();
        self.dispatch(GameEvent::Objectives { objectives });
    }

    pub fn objectives(&self) -> Vec<Objective> {
        self.store.read().objectives.clone()
    }

    // ---- input history -------------------------------------------------

    pub fn register_key_press(&self, code: KeyCode) {
        let time = self.clock.now_ms();
        let history: Vec<KeyStroke> = {
            let mut store = self.store.write();
            store.key_history.push_back(KeyStroke { code, time });
            while store.key_history.len() > self.history_limit {
                store.key_history.pop_front();
            }
            store.key_history.iter().copied().collect()
        };
        self.dispatch(GameEvent::KeyPress {
            code,
            time,
            history,
        });
    }

    pub fn key_history(&self) -> Vec<KeyStroke> {
        self.store.read().key_history.iter().copied().collect()
    }

    // ---- settings ------------------------------------------------------

    pub fn settings(&self) -> Settings {
        self.store.read().settings.clone()
    }

    pub fn update_gameplay_settings(&self, changes: GameplayChanges) {
        let settings = {
            let mut store = self.store.write();
            let gameplay = &mut store.settings.gameplay;
            if let Some(view_mode) = changes.view_mode {
                gameplay.view_mode = view_mode;
            }
            if let Some(enabled) = changes.dinosaurs_enabled {
                gameplay.dinosaurs_enabled = enabled;
            }
            store.settings.clone()
        };
        self.dispatch(GameEvent::SettingsChange {
            change: SettingsChange::Gameplay(changes),
            settings,
        });
    }

    pub fn update_avatar_settings(&self, changes: AvatarChanges) {
        let settings = {
            let mut store = self.store.write();
            let avatar = &mut store.settings.avatar;
            for (field, value) in changes.entries() {
                let slot = match field {
                    AvatarField::BaseBody => &mut avatar.base_body,
                    AvatarField::Hairstyle => &mut avatar.hairstyle,
                    AvatarField::Top => &mut avatar.top,
                    AvatarField::Bottom => &mut avatar.bottom,
                    AvatarField::Accessory => &mut avatar.accessory,
                };
                *slot = value.to_string();
            }
            store.settings.clone()
        };
        self.dispatch(GameEvent::SettingsChange {
            change: SettingsChange::Avatar(changes),
            settings,
        });
    }

    /// Sets one avatar field by name; unknown names are ignored.
    pub fn set_avatar_option(&self, field: &str, value: &str) {
        let Some(field) = AvatarField::from_name(field) else {
            return;
        };
        let mut changes = AvatarChanges::default();
        let slot = match field {
            AvatarField::BaseBody => &mut changes.base_body,
            AvatarField::Hairstyle => &mut changes.hairstyle,
            AvatarField::Top => &mut changes.top,
            AvatarField::Bottom => &mut changes.bottom,
            AvatarField::Accessory => &mut changes.accessory,
        };
        *slot = Some(value.to_string());
        self.update_avatar_settings(changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::quest::{ObjectiveTemplate, QuestTemplate};
    use parking_lot::Mutex;

    fn recorder(state: &GameState) -> Arc<Mutex<Vec<GameEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        state.subscribe(move |_, event| sink.lock().push(event.clone()));
        events
    }

    fn quest(id: &str, objectives: &[&str]) -> QuestInstance {
        QuestInstance::from_template(&QuestTemplate {
            id: id.into(),
            title: id.to_uppercase(),
            objectives: objectives
                .iter()
                .map(|o| ObjectiveTemplate::new(*o, *o))
                .collect(),
            ..QuestTemplate::default()
        })
    }

    #[test]
    fn coins_scenario_reward_then_failed_purchase() {
        let state = GameState::new();
        let events = recorder(&state);
        assert_eq!(state.coins(), 25);

        state.add_coins(10, "reward");
        assert_eq!(state.coins(), 35);
        assert!(!state.spend_coins(50, "purchase"));
        assert_eq!(state.coins(), 35);

        let events = events.lock();
        assert_eq!(
            events[0],
            GameEvent::Coins {
                coins: 35,
                delta: 10,
                context: "reward".into()
            }
        );
        assert_eq!(
            events[1],
            GameEvent::InsufficientCoins {
                required: 50,
                coins: 35,
                context: "purchase".into()
            }
        );
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn balance_never_goes_negative() {
        let state = GameState::new();
        let script: [(bool, u32); 8] = [
            (false, 20),
            (false, 10),
            (true, 3),
            (false, 1),
            (false, 1),
            (true, 40),
            (false, 60),
            (false, 5),
        ];
        for (add, amount) in script {
            let before = state.coins();
            if add {
                state.add_coins(amount, "test");
            } else {
                let spent = state.spend_coins(amount, "test");
                assert_eq!(spent, amount <= before);
                if !spent {
                    assert_eq!(state.coins(), before);
                }
            }
        }
        assert_eq!(state.coins(), 41);
    }

    #[test]
    fn zero_coin_operations_emit_nothing() {
        let state = GameState::new();
        let events = recorder(&state);
        state.add_coins(0, "noop");
        assert!(state.spend_coins(0, "noop"));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn inventory_add_then_remove_converges() {
        let state = GameState::new();
        state.add_item("glow-berry", ItemSpec::new("Glow Berry").quantity(2));
        assert!(state.has_item("glow-berry", 2));
        assert!(state.remove_item("glow-berry", 2));
        assert!(!state.has_item("glow-berry", 1));
        assert!(state.inventory().iter().all(|item| item.id != "glow-berry"));
    }

    #[test]
    fn add_item_merges_and_keeps_description() {
        let state = GameState::new();
        state.add_item(
            "water-sample",
            ItemSpec::new("Water Sample")
                .item_type("quest")
                .description("From the purifier."),
        );
        let total = state.add_item("water-sample", ItemSpec::new("Water Sample"));
        assert_eq!(total, 2);
        let item = state.inventory().into_iter().next().unwrap();
        assert_eq!(item.item_type, "quest");
        assert_eq!(item.description, "From the purifier.");
    }

    #[test]
    fn removing_missing_item_is_a_silent_false() {
        let state = GameState::new();
        let events = recorder(&state);
        assert!(!state.remove_item("nothing", 1));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn removing_zero_of_a_held_item_succeeds() {
        let state = GameState::new();
        state.add_item("drink", ItemSpec::new("Drink").quantity(2));
        let events = recorder(&state);
        assert!(state.remove_item("drink", 0));
        assert_eq!(state.item_quantity("drink"), 2);
        assert!(!state.remove_item("nothing", 0));
        match &events.lock()[..] {
            [GameEvent::Inventory { change, inventory }] => {
                assert_eq!(change.mode, InventoryMode::Remove);
                assert_eq!(inventory[0].quantity, 2);
            }
            other => panic!("unexpected events {other:?}"),
        };
    }

    #[test]
    fn over_removal_drops_the_entry() {
        let state = GameState::new();
        state.add_item("drink", ItemSpec::new("Drink"));
        assert!(state.remove_item("drink", 5));
        assert_eq!(state.item_quantity("drink"), 0);
        assert!(state.inventory().is_empty());
    }

    #[test]
    fn event_payloads_are_copies() {
        let state = GameState::new();
        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        state.on(EventKind::Inventory, move |_, event| {
            if let GameEvent::Inventory { inventory, .. } = event {
                let mut copy = inventory.clone();
                copy[0].quantity = 99;
                *sink.lock() = Some(copy);
            }
        });
        state.add_item("hat", ItemSpec::new("Hat"));
        assert_eq!(captured.lock().as_ref().unwrap()[0].quantity, 99);
        assert_eq!(state.item_quantity("hat"), 1);
    }

    #[test]
    fn set_flag_notifies_even_without_change() {
        let state = GameState::new();
        let events = recorder(&state);
        state.set_flag("bridge-authorized", true);
        state.set_flag("bridge-authorized", true);
        assert!(state.has_flag("bridge-authorized"));
        state.set_flag("bridge-authorized", false);
        assert!(!state.has_flag("bridge-authorized"));
        let flag_events = events
            .lock()
            .iter()
            .filter(|e| e.kind() == EventKind::Flags)
            .count();
        assert_eq!(flag_events, 3);
    }

    #[test]
    fn active_quest_projection_and_completion() {
        let state = GameState::new();
        let events = recorder(&state);
        state.set_active_quest(Some(quest("q1", &["a", "b"])));
        assert_eq!(state.active_quest_id().as_deref(), Some("q1"));
        assert_eq!(state.objectives().len(), 2);

        state.complete_quest("q1");
        state.complete_quest("q1");
        assert!(state.active_quest_id().is_none());
        assert!(state.objectives().is_empty());
        assert!(state.quest("q1").unwrap().completed);

        let completions = events
            .lock()
            .iter()
            .filter(|e| e.kind() == EventKind::QuestCompleted)
            .count();
        assert_eq!(completions, 1);
    }

    #[test]
    fn completing_inactive_quest_keeps_projection() {
        let state = GameState::new();
        state.set_active_quest(Some(quest("side", &["x"])));
        state.set_active_quest(Some(quest("main", &["a", "b"])));
        state.complete_quest("side");
        assert_eq!(state.active_quest_id().as_deref(), Some("main"));
        assert_eq!(state.objectives().len(), 2);
    }

    #[test]
    fn completion_listener_may_chain_the_next_quest() {
        let state = GameState::new();
        state.on(EventKind::QuestCompleted, |state, event| {
            if let GameEvent::QuestCompleted { quest: done } = event {
                if done.id == "q1" {
                    state.set_active_quest(Some(quest("q2", &["x", "y"])));
                }
            }
        });
        state.set_active_quest(Some(quest("q1", &["a"])));
        state.complete_quest("q1");
        assert_eq!(state.active_quest_id().as_deref(), Some("q2"));
        let ids: Vec<String> = state.objectives().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn clearing_active_quest_emits_quest_ended() {
        let state = GameState::new();
        let events = recorder(&state);
        state.set_active_quest(None);
        let kinds: Vec<EventKind> = events.lock().iter().map(GameEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::QuestEnded, EventKind::Objectives]);
    }

    #[test]
    fn quest_progress_merges_and_ignores_unknown() {
        let state = GameState::new();
        let events = recorder(&state);
        state.update_quest_progress("ghost", [("visits", 1i64)]);
        assert!(events.lock().is_empty());

        state.set_active_quest(Some(quest("q1", &["a"])));
        state.update_quest_progress("q1", [("visits", QuestValue::Int(1))]);
        state.update_quest_progress("q1", [("seen-bridge", QuestValue::Bool(true))]);
        let quest = state.quest("q1").unwrap();
        assert_eq!(quest.state.get("visits"), Some(&QuestValue::Int(1)));
        assert_eq!(quest.state.get("seen-bridge"), Some(&QuestValue::Bool(true)));
    }

    #[test]
    fn key_history_is_bounded_and_timestamped() {
        let clock = Arc::new(ManualClock::new());
        let state = GameState::with_clock(clock.clone());
        for _ in 0..12 {
            clock.advance(100.0);
            state.register_key_press(KeyCode::Character('A'));
        }
        let history = state.key_history();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].time, 300.0);
        assert_eq!(history[9].time, 1200.0);
    }

    #[test]
    fn settings_are_isolated_copies() {
        let state = GameState::new();
        let mut copy = state.settings();
        copy.avatar.accessory = "crown".into();
        assert_eq!(state.settings().avatar.accessory, "none");

        let events = recorder(&state);
        state.update_gameplay_settings(GameplayChanges {
            dinosaurs_enabled: Some(true),
            ..GameplayChanges::default()
        });
        state.set_avatar_option("accessory", "adventure-hat");
        state.set_avatar_option("wings", "yes");

        let settings = state.settings();
        assert!(settings.gameplay.dinosaurs_enabled);
        assert_eq!(settings.gameplay.view_mode, ViewMode::FirstPerson);
        assert_eq!(settings.avatar.accessory, "adventure-hat");
        let events = events.lock();
        assert_eq!(events.len(), 2);
        match &events[1] {
            GameEvent::SettingsChange { change, settings } => {
                assert_eq!(change.category(), "avatar");
                assert_eq!(settings.avatar.accessory, "adventure-hat");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn listeners_may_reenter_mutators() {
        let state = GameState::new();
        state.on(EventKind::Coins, |state, event| {
            if let GameEvent::Coins { coins, .. } = event {
                if *coins >= 30 && !state.has_flag("rich") {
                    state.set_flag("rich", true);
                }
            }
        });
        state.add_coins(10, "reward");
        assert!(state.has_flag("rich"));
    }
}
