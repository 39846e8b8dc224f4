use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::input::KeyCode;

pub const DEFAULT_INTERACTION_RANGE: f32 = 5.5;
pub const DEFAULT_PROMPT: &str = "Press E to interact";

/// `#6ad6ff`
pub const DEFAULT_HIGHLIGHT_COLOR: Vec3 = Vec3::new(106.0 / 255.0, 214.0 / 255.0, 1.0);

/// Session tunables. Every field has a default, so a content pack only needs
/// to name the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub starting_coins: u32,
    pub key_history_limit: usize,
    /// Reach used when an interactable does not configure its own range.
    pub interaction_range: f32,
    /// Length of the forward probe cast every tick.
    pub probe_length: f32,
    pub default_prompt: String,
    pub highlight_color: Vec3,
    pub action_key: KeyCode,
    pub secret_key: KeyCode,
    pub secret_presses: usize,
    pub secret_window_ms: f64,
    pub harvest_cooldown_ms: f64,
    pub quest_toast_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_coins: 25,
            key_history_limit: 10,
            interaction_range: DEFAULT_INTERACTION_RANGE,
            probe_length: DEFAULT_INTERACTION_RANGE,
            default_prompt: DEFAULT_PROMPT.to_string(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR,
            action_key: KeyCode::Character('E'),
            secret_key: KeyCode::Character('A'),
            secret_presses: 5,
            secret_window_ms: 1800.0,
            harvest_cooldown_ms: 12_000.0,
            quest_toast_ms: 4200,
        }
    }
}
