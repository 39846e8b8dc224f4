use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::events::Tone;
use crate::game_state::GameState;
use crate::hud::Hud;
use crate::interaction::InteractionManager;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=25).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }

    /// Parses browser-style physical key codes (`KeyE`, `Digit3`,
    /// `ShiftLeft`), falling back to [`KeyCode::from_name`].
    pub fn from_code(code: &str) -> Option<Self> {
        if let Some(letter) = code.strip_prefix("Key") {
            return Self::from_name(letter).filter(|key| matches!(key, Self::Character(_)));
        }
        if let Some(digit) = code.strip_prefix("Digit") {
            return Self::from_name(digit).filter(|key| matches!(key, Self::Digit(_)));
        }
        let alias = match code {
            "ShiftLeft" => "LeftShift",
            "ShiftRight" => "RightShift",
            "ControlLeft" => "LeftCtrl",
            "ControlRight" => "RightCtrl",
            "AltLeft" => "LeftAlt",
            "AltRight" => "RightAlt",
            "ArrowLeft" => "Left",
            "ArrowRight" => "Right",
            "ArrowUp" => "Up",
            "ArrowDown" => "Down",
            other => other,
        };
        Self::from_name(alias)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyCode::Named(named) => write!(f, "{named:?}"),
            KeyCode::Character(ch) => write!(f, "Key{ch}"),
            KeyCode::Digit(digit) => write!(f, "Digit{digit}"),
            KeyCode::Function(index) => write!(f, "F{index}"),
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "Backspace" => Backspace,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        "LeftAlt" | "LAlt" => LeftAlt,
        "RightAlt" | "RAlt" => RightAlt,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-printable keys the game reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
}

/// One discrete keyboard event delivered by an [`InputSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub state: KeyState,
    /// Auto-repeat generated by a held key.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn pressed(code: KeyCode) -> Self {
        Self {
            code,
            state: KeyState::Pressed,
            repeat: false,
        }
    }

    pub fn repeated(code: KeyCode) -> Self {
        Self {
            code,
            state: KeyState::Pressed,
            repeat: true,
        }
    }

    pub fn released(code: KeyCode) -> Self {
        Self {
            code,
            state: KeyState::Released,
            repeat: false,
        }
    }

    pub fn is_press(&self) -> bool {
        self.state == KeyState::Pressed
    }
}

/// Injected source of keyboard events, polled once per tick.
pub trait InputSource {
    fn drain(&mut self) -> Vec<KeyEvent>;
}

/// Queue-backed source for tests and scripted sessions.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    queue: VecDeque<KeyEvent>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: KeyEvent) {
        self.queue.push_back(event);
    }

    /// Queues a full press/release pair.
    pub fn tap(&mut self, code: KeyCode) {
        self.push(KeyEvent::pressed(code));
        self.push(KeyEvent::released(code));
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl InputSource for ScriptedInput {
    fn drain(&mut self) -> Vec<KeyEvent> {
        self.queue.drain(..).collect()
    }
}

/// Tracks which keys are currently held.
#[derive(Debug, Default)]
pub struct InputState {
    keys: RwLock<HashSet<KeyCode>>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&self, key: KeyCode) {
        self.keys.write().insert(key);
    }

    pub fn set_key_up(&self, key: KeyCode) {
        self.keys.write().remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.read().contains(&key)
    }

    pub fn is_key_down_by_name(&self, name: &str) -> bool {
        KeyCode::from_name(name)
            .map(|key| self.is_key_down(key))
            .unwrap_or(false)
    }

    pub fn apply(&self, event: &KeyEvent) {
        match event.state {
            KeyState::Pressed => self.set_key_down(event.code),
            KeyState::Released => self.set_key_up(event.code),
        }
    }
}

/// Routes key events to the state history, the interaction manager and the
/// small set of HUD shortcuts.
pub struct InputRouter {
    state: GameState,
    interaction: InteractionManager,
    hud: Arc<dyn Hud>,
    held: InputState,
    map_visible: bool,
}

impl InputRouter {
    pub fn new(
        state: GameState,
        interaction: InteractionManager,
        hud: Arc<dyn Hud>,
    ) -> Self {
        Self {
            state,
            interaction,
            hud,
            held: InputState::new(),
            map_visible: false,
        }
    }

    pub fn held(&self) -> &InputState {
        &self.held
    }

    pub fn map_visible(&self) -> bool {
        self.map_visible
    }

    pub fn pump(&mut self, source: &mut dyn InputSource) {
        for event in source.drain() {
            self.handle(&event);
        }
    }

    pub fn handle(&mut self, event: &KeyEvent) {
        self.held.apply(event);
        if !event.is_press() {
            return;
        }
        self.state.register_key_press(event.code);
        match event.code {
            KeyCode::Named(NamedKey::Tab) => self.show_inventory_summary(),
            KeyCode::Character('M') if !event.repeat => self.toggle_map(),
            _ => {
                if self.interaction.handle_key(event) {
                    debug!("action dispatched for {}", event.code);
                }
            }
        }
    }

    fn show_inventory_summary(&self) {
        let inventory = self.state.inventory();
        let summary = if inventory.is_empty() {
            "Inventory empty. Visit shops or quests to collect gear.".to_string()
        } else {
            inventory
                .iter()
                .map(|item| format!("{} ×{}", item.name, item.quantity))
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.hud
            .push_notification(&summary, Tone::Info, Duration::from_millis(4200));
    }

    fn toggle_map(&mut self) {
        self.map_visible = !self.map_visible;
        if self.map_visible {
            self.hud.push_notification(
                "A holographic minimap fades in, showing key landmarks.",
                Tone::Info,
                Duration::from_millis(2600),
            );
        } else {
            self.hud
                .push_notification("Minimap hidden.", Tone::Info, Duration::from_millis(1600));
        }
    }
}
