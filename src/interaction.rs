//! Per-tick focus resolution over registered interactables.
//!
//! Every tick the manager casts one forward probe through [`WorldQuery`],
//! walks the raw hit up to the nearest registered ancestor and focuses it if
//! the hit lies within that registration's own range. Focus changes drive the
//! highlight, the prompt and the tooltip; the action key fires the focused
//! registration's action with its owner handle.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use glam::Vec3;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::config::{EngineConfig, DEFAULT_HIGHLIGHT_COLOR, DEFAULT_INTERACTION_RANGE, DEFAULT_PROMPT};
use crate::hud::Hud;
use crate::input::{KeyCode, KeyEvent};
use crate::world::{Handle, Highlighter, WorldQuery};

/// Parent chains deeper than this are treated as unresolvable.
const MAX_OWNER_DEPTH: usize = 64;

pub type FocusCallback = Arc<dyn Fn(&Focus) + Send + Sync>;
pub type ActionCallback = Arc<dyn Fn(Handle, &InteractableConfig, &Focus) + Send + Sync>;

/// How a registered handle responds to focus and activation.
///
/// Every field is optional so that registering the same handle again only
/// overrides the fields it sets.
#[derive(Clone, Default)]
pub struct InteractableConfig {
    /// `None` uses the default prompt, `Some(None)` hides it.
    pub prompt: Option<Option<String>>,
    pub tooltip: Option<String>,
    pub range: Option<f32>,
    pub highlight_color: Option<Vec3>,
    /// Object to outline instead of the raw hit.
    pub highlight_handle: Option<Handle>,
    /// Handle passed to the action. Defaults to the registered handle.
    pub owner: Option<Handle>,
    pub on_focus: Option<FocusCallback>,
    pub on_blur: Option<FocusCallback>,
    pub action: Option<ActionCallback>,
}

impl InteractableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.prompt = Some(Some(text.into()));
        self
    }

    pub fn hide_prompt(mut self) -> Self {
        self.prompt = Some(None);
        self
    }

    pub fn tooltip(mut self, text: impl Into<String>) -> Self {
        self.tooltip = Some(text.into());
        self
    }

    pub fn range(mut self, range: f32) -> Self {
        self.range = Some(range);
        self
    }

    pub fn highlight_color(mut self, color: Vec3) -> Self {
        self.highlight_color = Some(color);
        self
    }

    pub fn highlight_handle(mut self, handle: Handle) -> Self {
        self.highlight_handle = Some(handle);
        self
    }

    pub fn owner(mut self, owner: Handle) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn on_focus<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Focus) + Send + Sync + 'static,
    {
        self.on_focus = Some(Arc::new(callback));
        self
    }

    pub fn on_blur<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Focus) + Send + Sync + 'static,
    {
        self.on_blur = Some(Arc::new(callback));
        self
    }

    pub fn action<F>(mut self, callback: F) -> Self
    where
        F: Fn(Handle, &InteractableConfig, &Focus) + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(callback));
        self
    }

    /// Overlays the fields set in `newer` onto `self`.
    pub fn merge(self, newer: InteractableConfig) -> Self {
        Self {
            prompt: newer.prompt.or(self.prompt),
            tooltip: newer.tooltip.or(self.tooltip),
            range: newer.range.or(self.range),
            highlight_color: newer.highlight_color.or(self.highlight_color),
            highlight_handle: newer.highlight_handle.or(self.highlight_handle),
            owner: newer.owner.or(self.owner),
            on_focus: newer.on_focus.or(self.on_focus),
            on_blur: newer.on_blur.or(self.on_blur),
            action: newer.action.or(self.action),
        }
    }

    /// Configured reach; unset or non-positive ranges fall back to `default`.
    pub fn effective_range(&self, default: f32) -> f32 {
        self.range.filter(|range| *range > 0.0).unwrap_or(default)
    }

    pub fn effective_prompt(&self, default: &str) -> Option<String> {
        match &self.prompt {
            None => Some(default.to_string()),
            Some(Some(text)) if !text.is_empty() => Some(text.clone()),
            Some(_) => None,
        }
    }

    pub fn effective_tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref().filter(|text| !text.is_empty())
    }
}

impl fmt::Debug for InteractableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractableConfig")
            .field("prompt", &self.prompt)
            .field("tooltip", &self.tooltip)
            .field("range", &self.range)
            .field("highlight_color", &self.highlight_color)
            .field("highlight_handle", &self.highlight_handle)
            .field("owner", &self.owner)
            .field("on_focus", &self.on_focus.is_some())
            .field("on_blur", &self.on_blur.is_some())
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// The currently focused target.
#[derive(Debug, Clone)]
pub struct Focus {
    /// Raw object under the crosshair.
    pub hit: Handle,
    /// Registered ancestor the hit resolved to.
    pub registered: Handle,
    /// Action target.
    pub owner: Handle,
    pub config: InteractableConfig,
}

impl Focus {
    fn same_target(&self, other: &Focus) -> bool {
        self.hit == other.hit && self.owner == other.owner
    }

    fn involves(&self, handle: Handle) -> bool {
        self.hit == handle || self.owner == handle || self.registered == handle
    }
}

#[derive(Debug, Clone)]
struct Tuning {
    range: f32,
    probe_length: f32,
    default_prompt: String,
    highlight_color: Vec3,
    action_key: KeyCode,
}

impl Tuning {
    fn from_config(config: &EngineConfig) -> Self {
        Self {
            range: if config.interaction_range > 0.0 {
                config.interaction_range
            } else {
                DEFAULT_INTERACTION_RANGE
            },
            probe_length: config.probe_length.max(0.0),
            default_prompt: config.default_prompt.clone(),
            highlight_color: config.highlight_color,
            action_key: config.action_key,
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            range: DEFAULT_INTERACTION_RANGE,
            probe_length: DEFAULT_INTERACTION_RANGE,
            default_prompt: DEFAULT_PROMPT.to_string(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR,
            action_key: KeyCode::Character('E'),
        }
    }
}

#[derive(Default)]
struct Registry {
    entries: HashMap<Handle, InteractableConfig>,
    focused: Option<Focus>,
    /// Handle outlined for the current focus.
    highlighted: Option<Handle>,
}

/// Shared handle to the interactable registry and its focus state.
#[derive(Clone)]
pub struct InteractionManager {
    registry: Arc<Mutex<Registry>>,
    hud: Arc<dyn Hud>,
    highlighter: Arc<dyn Highlighter>,
    tuning: Arc<Tuning>,
}

impl InteractionManager {
    pub fn new(hud: Arc<dyn Hud>, highlighter: Arc<dyn Highlighter>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            hud,
            highlighter,
            tuning: Arc::new(Tuning::default()),
        }
    }

    pub fn from_config(
        config: &EngineConfig,
        hud: Arc<dyn Hud>,
        highlighter: Arc<dyn Highlighter>,
    ) -> Self {
        Self {
            tuning: Arc::new(Tuning::from_config(config)),
            ..Self::new(hud, highlighter)
        }
    }

    /// Registers `handle`, merging onto any configuration it already has.
    pub fn register(&self, handle: Handle, config: InteractableConfig) -> Handle {
        let mut registry = self.registry.lock();
        let merged = match registry.entries.remove(&handle) {
            Some(existing) => existing.merge(config),
            None => config,
        };
        debug!("registered interactable {handle}");
        registry.entries.insert(handle, merged);
        handle
    }

    /// Removes `handle`; clears focus first if it is involved in it.
    pub fn unregister(&self, handle: Handle) {
        let focused_here = {
            let mut registry = self.registry.lock();
            registry.entries.remove(&handle);
            registry
                .focused
                .as_ref()
                .is_some_and(|focus| focus.involves(handle))
        };
        debug!("unregistered interactable {handle}");
        if focused_here {
            self.clear_focus();
        }
    }

    pub fn is_registered(&self, handle: Handle) -> bool {
        self.registry.lock().entries.contains_key(&handle)
    }

    pub fn config(&self, handle: Handle) -> Option<InteractableConfig> {
        self.registry.lock().entries.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().entries.is_empty()
    }

    pub fn focused(&self) -> Option<Focus> {
        self.registry.lock().focused.clone()
    }

    /// Resolves this tick's focus against `world`.
    pub fn tick(&self, world: &dyn WorldQuery) {
        let registered: HashSet<Handle> = self.registry.lock().entries.keys().copied().collect();
        if registered.is_empty() {
            self.clear_focus();
            return;
        }
        let filter = |handle: Handle| resolve_registered(world, &registered, handle).is_some();
        let pick = world.pick_forward(self.tuning.probe_length, &filter);

        let target = pick.and_then(|pick| {
            let registered_handle = resolve_registered(world, &registered, pick.handle)?;
            let config = self.config(registered_handle)?;
            let range = config.effective_range(self.tuning.range);
            if pick.distance > range {
                trace!("{} out of range ({:.2} > {range:.2})", pick.handle, pick.distance);
                return None;
            }
            Some(Focus {
                hit: pick.handle,
                registered: registered_handle,
                owner: config.owner.unwrap_or(registered_handle),
                config,
            })
        });

        match target {
            Some(target) => {
                let prompt = target.config.effective_prompt(&self.tuning.default_prompt);
                let tooltip = target.config.effective_tooltip().map(str::to_string);
                self.focus(target);
                match prompt {
                    Some(text) => self.hud.show_prompt(&text),
                    None => self.hud.hide_prompt(),
                }
                match tooltip {
                    Some(text) => self.hud.show_tooltip(&text),
                    None => self.hud.hide_tooltip(),
                }
            }
            None => self.clear_focus(),
        }
    }

    /// Fires the focused action for a fresh press of the action key.
    pub fn handle_key(&self, event: &KeyEvent) -> bool {
        if !event.is_press() || event.repeat || event.code != self.tuning.action_key {
            return false;
        }
        let Some(focus) = self.focused() else {
            return false;
        };
        let Some(action) = focus.config.action.clone() else {
            return false;
        };
        debug!("activating {} via {}", focus.owner, focus.hit);
        action(focus.owner, &focus.config, &focus);
        true
    }

    /// Blurs the current target, if any, and hides prompt and tooltip.
    pub fn clear_focus(&self) {
        let previous = {
            let mut registry = self.registry.lock();
            let highlighted = registry.highlighted.take();
            registry.focused.take().map(|focus| (focus, highlighted))
        };
        if let Some((focus, highlighted)) = previous {
            self.blur(&focus, highlighted);
        }
        self.hud.hide_prompt();
        self.hud.hide_tooltip();
    }

    fn focus(&self, target: Focus) {
        let highlight = target.config.highlight_handle.unwrap_or(target.hit);
        let previous = {
            let mut registry = self.registry.lock();
            if let Some(current) = registry.focused.as_mut() {
                if current.same_target(&target) {
                    current.config = target.config;
                    return;
                }
            }
            let highlighted = registry.highlighted.replace(highlight);
            registry
                .focused
                .replace(target.clone())
                .map(|focus| (focus, highlighted))
        };
        if let Some((focus, highlighted)) = previous {
            self.blur(&focus, highlighted);
        }
        debug!("focus -> {} (owner {})", target.hit, target.owner);
        self.highlighter.add(
            highlight,
            target
                .config
                .highlight_color
                .unwrap_or(self.tuning.highlight_color),
        );
        if let Some(on_focus) = &target.config.on_focus {
            on_focus(&target);
        }
    }

    fn blur(&self, focus: &Focus, highlighted: Option<Handle>) {
        if let Some(handle) = highlighted {
            self.highlighter.remove(handle);
        }
        if let Some(on_blur) = &focus.config.on_blur {
            on_blur(focus);
        }
    }
}

fn resolve_registered(
    world: &dyn WorldQuery,
    registered: &HashSet<Handle>,
    hit: Handle,
) -> Option<Handle> {
    let mut current = hit;
    for _ in 0..MAX_OWNER_DEPTH {
        if registered.contains(&current) {
            return Some(current);
        }
        current = world.parent_of(current)?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hud::HudModel;
    use crate::world::{NoHighlight, PickHit};

    #[derive(Default)]
    struct FakeWorld {
        hit: Mutex<Option<PickHit>>,
        parents: HashMap<Handle, Handle>,
    }

    impl FakeWorld {
        fn aim(&self, handle: Handle, distance: f32) {
            *self.hit.lock() = Some(PickHit { handle, distance });
        }

        fn aim_at_nothing(&self) {
            *self.hit.lock() = None;
        }
    }

    impl WorldQuery for FakeWorld {
        fn pick_forward(&self, max_distance: f32, filter: &dyn Fn(Handle) -> bool) -> Option<PickHit> {
            let hit = (*self.hit.lock())?;
            (hit.distance <= max_distance && filter(hit.handle)).then_some(hit)
        }

        fn parent_of(&self, handle: Handle) -> Option<Handle> {
            self.parents.get(&handle).copied()
        }
    }

    #[derive(Default)]
    struct RecordingHighlighter {
        active: Mutex<Vec<Handle>>,
    }

    impl Highlighter for RecordingHighlighter {
        fn add(&self, handle: Handle, _color: Vec3) {
            self.active.lock().push(handle);
        }

        fn remove(&self, handle: Handle) {
            self.active.lock().retain(|h| *h != handle);
        }
    }

    fn manager() -> (InteractionManager, Arc<HudModel>) {
        let hud = Arc::new(HudModel::new(Arc::new(ManualClock::new())));
        (InteractionManager::new(hud.clone(), Arc::new(NoHighlight)), hud)
    }

    fn journal() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn tracked(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> InteractableConfig {
        let focus_log = log.clone();
        let blur_log = log.clone();
        InteractableConfig::new()
            .on_focus(move |_| focus_log.lock().push(format!("focus {name}")))
            .on_blur(move |_| blur_log.lock().push(format!("blur {name}")))
    }

    #[test]
    fn range_gates_focus_and_refocus_is_silent() {
        let (manager, hud) = manager();
        let world = FakeWorld::default();
        let log = journal();
        let h = Handle::new(1);
        manager.register(h, tracked(&log, "h").range(4.0));

        world.aim(h, 6.0);
        manager.tick(&world);
        assert!(manager.focused().is_none());

        world.aim(h, 3.0);
        manager.tick(&world);
        assert_eq!(manager.focused().map(|f| f.owner), Some(h));
        assert_eq!(hud.prompt().as_deref(), Some("Press E to interact"));

        world.aim(h, 3.5);
        manager.tick(&world);
        assert_eq!(*log.lock(), vec!["focus h".to_string()]);
    }

    #[test]
    fn out_of_range_hit_clears_existing_focus() {
        let (manager, hud) = manager();
        let world = FakeWorld::default();
        let log = journal();
        let h = Handle::new(1);
        manager.register(h, tracked(&log, "h").range(2.0));

        world.aim(h, 1.0);
        manager.tick(&world);
        world.aim(h, 2.5);
        manager.tick(&world);

        assert!(manager.focused().is_none());
        assert!(hud.prompt().is_none());
        assert_eq!(*log.lock(), vec!["focus h".to_string(), "blur h".to_string()]);
    }

    #[test]
    fn switching_targets_blurs_before_focusing() {
        let (manager, _hud) = manager();
        let world = FakeWorld::default();
        let log = journal();
        let a = manager.register(Handle::new(1), tracked(&log, "a"));
        let b = manager.register(Handle::new(2), tracked(&log, "b"));

        world.aim(a, 1.0);
        manager.tick(&world);
        world.aim(b, 1.0);
        manager.tick(&world);

        assert_eq!(
            *log.lock(),
            vec!["focus a".to_string(), "blur a".to_string(), "focus b".to_string()]
        );
        assert_eq!(manager.focused().map(|f| f.hit), Some(b));
    }

    #[test]
    fn child_hits_resolve_to_registered_owner() {
        let hud = Arc::new(HudModel::new(Arc::new(ManualClock::new())));
        let highlighter = Arc::new(RecordingHighlighter::default());
        let manager = InteractionManager::new(hud, highlighter.clone());
        let door = Handle::new(10);
        let panel = Handle::new(11);
        let shop = Handle::new(12);
        let world = FakeWorld {
            parents: HashMap::from([(panel, door)]),
            ..FakeWorld::default()
        };
        let received = Arc::new(Mutex::new(None));
        let sink = received.clone();
        manager.register(
            door,
            InteractableConfig::new()
                .owner(shop)
                .action(move |owner, _, focus| *sink.lock() = Some((owner, focus.hit))),
        );

        world.aim(panel, 2.0);
        manager.tick(&world);
        assert_eq!(*highlighter.active.lock(), vec![panel]);
        assert!(manager.handle_key(&KeyEvent::pressed(KeyCode::Character('E'))));
        assert_eq!(*received.lock(), Some((shop, panel)));
    }

    #[test]
    fn unregister_while_focused_blurs_immediately() {
        let (manager, hud) = manager();
        let world = FakeWorld::default();
        let log = journal();
        let h = manager.register(Handle::new(1), tracked(&log, "h").tooltip("Shiny"));

        world.aim(h, 1.0);
        manager.tick(&world);
        assert_eq!(hud.tooltip().as_deref(), Some("Shiny"));

        manager.unregister(h);
        assert!(manager.focused().is_none());
        assert!(hud.prompt().is_none());
        assert!(hud.tooltip().is_none());
        assert_eq!(*log.lock(), vec!["focus h".to_string(), "blur h".to_string()]);
        assert!(!manager.handle_key(&KeyEvent::pressed(KeyCode::Character('E'))));
    }

    #[test]
    fn action_may_unregister_its_own_handle() {
        let (manager, _hud) = manager();
        let world = FakeWorld::default();
        let h = Handle::new(5);
        let inner = manager.clone();
        manager.register(
            h,
            InteractableConfig::new().action(move |owner, _, _| inner.unregister(owner)),
        );

        world.aim(h, 1.0);
        manager.tick(&world);
        assert!(manager.handle_key(&KeyEvent::pressed(KeyCode::Character('E'))));
        assert!(!manager.is_registered(h));
        assert!(manager.focused().is_none());

        manager.tick(&world);
        assert!(manager.focused().is_none());
    }

    #[test]
    fn repeats_and_other_keys_do_not_fire() {
        let (manager, _hud) = manager();
        let world = FakeWorld::default();
        let fired = Arc::new(Mutex::new(0));
        let counter = fired.clone();
        let h = manager.register(
            Handle::new(1),
            InteractableConfig::new().action(move |_, _, _| *counter.lock() += 1),
        );
        world.aim(h, 1.0);
        manager.tick(&world);

        assert!(!manager.handle_key(&KeyEvent::repeated(KeyCode::Character('E'))));
        assert!(!manager.handle_key(&KeyEvent::pressed(KeyCode::Character('F'))));
        assert!(!manager.handle_key(&KeyEvent::released(KeyCode::Character('E'))));
        assert!(manager.handle_key(&KeyEvent::pressed(KeyCode::Character('E'))));
        assert_eq!(*fired.lock(), 1);
    }

    #[test]
    fn prompt_defaults_and_explicit_hide() {
        let (manager, hud) = manager();
        let world = FakeWorld::default();
        let h = manager.register(Handle::new(1), InteractableConfig::new().hide_prompt());
        world.aim(h, 1.0);
        manager.tick(&world);
        assert!(manager.focused().is_some());
        assert!(hud.prompt().is_none());

        manager.register(h, InteractableConfig::new().prompt("Open door"));
        manager.tick(&world);
        assert_eq!(hud.prompt().as_deref(), Some("Open door"));

        world.aim_at_nothing();
        manager.tick(&world);
        assert!(hud.prompt().is_none());
    }

    #[test]
    fn re_registration_merges_fields() {
        let (manager, _hud) = manager();
        let h = Handle::new(3);
        manager.register(h, InteractableConfig::new().prompt("Read").range(3.0));
        manager.register(h, InteractableConfig::new().tooltip("Old sign"));
        let config = manager.config(h).expect("registered");
        assert_eq!(config.prompt, Some(Some("Read".to_string())));
        assert_eq!(config.range, Some(3.0));
        assert_eq!(config.tooltip.as_deref(), Some("Old sign"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn non_positive_range_uses_default() {
        let config = InteractableConfig::new().range(0.0);
        assert_eq!(config.effective_range(5.5), 5.5);
        assert_eq!(InteractableConfig::new().range(2.0).effective_range(5.5), 2.0);
    }
}
