//! Secret key-sequence detector fed by the key-press history.

use log::info;

use crate::config::EngineConfig;
use crate::events::{DomainEvent, EventKind, GameEvent, SubscriptionId};
use crate::game_state::{GameState, KeyStroke};
use crate::input::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecretGesture {
    pub key: KeyCode,
    pub presses: usize,
    pub window_ms: f64,
}

impl Default for SecretGesture {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SecretGesture {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            key: config.secret_key,
            presses: config.secret_presses.max(1),
            window_ms: config.secret_window_ms,
        }
    }

    /// True when the newest `presses` strokes are all the secret key and the
    /// first and last of them are less than `window_ms` apart.
    pub fn matches(&self, history: &[KeyStroke]) -> bool {
        if history.len() < self.presses {
            return false;
        }
        let recent = &history[history.len() - self.presses..];
        if !recent.iter().all(|stroke| stroke.code == self.key) {
            return false;
        }
        match (recent.first(), recent.last()) {
            (Some(first), Some(last)) => last.time - first.time < self.window_ms,
            _ => false,
        }
    }

    /// Emits `secret-sequence` whenever a key press completes the gesture.
    pub fn install(self, state: &GameState) -> SubscriptionId {
        state.on(EventKind::KeyPress, move |state, event| {
            if let GameEvent::KeyPress { history, .. } = event {
                if self.matches(history) {
                    info!("secret gesture recognised");
                    state.emit(DomainEvent::SecretSequence);
                }
            }
        })
    }
}
