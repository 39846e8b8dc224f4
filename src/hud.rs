//! Presentation surface used by the core, plus a headless model of it.
//!
//! `HudModel` mirrors what the on-screen HUD would show: it subscribes to
//! GameState read-only and never mutates it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::events::{GameEvent, InventoryMode, SubscriptionId, Tone};
use crate::game_state::{GameState, Item, SettingsChange};
use crate::quest::Objective;

pub const QUEST_TOAST_MS: u64 = 4200;

pub trait Hud: Send + Sync {
    fn show_prompt(&self, text: &str);
    fn hide_prompt(&self);
    fn show_tooltip(&self, text: &str);
    fn hide_tooltip(&self);
    fn push_notification(&self, text: &str, tone: Tone, duration: Duration);
    fn show_quest_toast(&self, title: &str, body: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub text: String,
    pub tone: Tone,
    pub expires_at: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestToast {
    pub title: String,
    pub body: String,
    pub expires_at: f64,
}

#[derive(Debug, Default)]
struct HudInner {
    prompt: Option<String>,
    tooltip: Option<String>,
    toasts: Vec<Toast>,
    quest_toast: Option<QuestToast>,
    history: Vec<String>,
    coins: u32,
    inventory_summary: String,
    objectives: Vec<Objective>,
    status_line: String,
}

pub struct HudModel {
    clock: Arc<dyn Clock>,
    quest_toast_ms: u64,
    inner: Mutex<HudInner>,
}

impl HudModel {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_quest_toast(clock, QUEST_TOAST_MS)
    }

    pub fn with_quest_toast(clock: Arc<dyn Clock>, quest_toast_ms: u64) -> Self {
        Self {
            clock,
            quest_toast_ms,
            inner: Mutex::new(HudInner {
                inventory_summary: "Empty".into(),
                ..HudInner::default()
            }),
        }
    }

    /// Seeds the model from the current state and follows its events.
    pub fn attach(self: &Arc<Self>, state: &GameState) -> SubscriptionId {
        {
            let mut inner = self.inner.lock();
            inner.coins = state.coins();
            inner.inventory_summary = summarize(&state.inventory());
            inner.status_line = state.status_line();
            inner.objectives = state.objectives();
        }
        let hud: Weak<Self> = Arc::downgrade(self);
        state.subscribe(move |_, event| {
            if let Some(hud) = hud.upgrade() {
                hud.observe(event);
            }
        })
    }

    fn observe(&self, event: &GameEvent) {
        match event {
            GameEvent::Coins {
                coins,
                delta,
                context,
            } => {
                self.inner.lock().coins = *coins;
                let (tone, text) = if *delta >= 0 {
                    (Tone::Success, format!("+{delta} coins ({context})"))
                } else {
                    (Tone::Warning, format!("{delta} coins ({context})"))
                };
                self.push_notification(&text, tone, Duration::from_millis(2200));
            }
            GameEvent::InsufficientCoins {
                required, context, ..
            } => {
                self.push_notification(
                    &format!("You need {required} coins for this ({context})."),
                    Tone::Danger,
                    Duration::from_millis(3200),
                );
            }
            GameEvent::Inventory { inventory, change } => {
                self.inner.lock().inventory_summary = summarize(inventory);
                match change.mode {
                    InventoryMode::Add => {
                        let name = change.name.as_deref().unwrap_or(&change.id);
                        self.push_notification(
                            &format!("Received {name} ×{}", change.quantity),
                            Tone::Success,
                            Duration::from_millis(2600),
                        );
                    }
                    InventoryMode::Remove => {
                        self.push_notification(
                            &format!("Used {}", change.id),
                            Tone::Warning,
                            Duration::from_millis(2200),
                        );
                    }
                }
            }
            GameEvent::Notification {
                text,
                tone,
                duration,
            } => self.push_notification(text, *tone, *duration),
            GameEvent::Objectives { objectives } => {
                self.inner.lock().objectives = objectives.clone();
            }
            GameEvent::Status { text } => {
                self.inner.lock().status_line = text.clone();
            }
            GameEvent::QuestStarted { quest } => {
                self.show_quest_toast(&format!("Quest started: {}", quest.title), &quest.description);
                self.inner.lock().objectives = quest.objectives.clone();
            }
            GameEvent::QuestCompleted { quest } => {
                let body = if quest.completion_text.is_empty() {
                    "Great job!"
                } else {
                    quest.completion_text.as_str()
                };
                self.show_quest_toast(&format!("Quest complete: {}", quest.title), body);
                let reward = if quest.reward_text.is_empty() {
                    "Quest complete"
                } else {
                    quest.reward_text.as_str()
                };
                self.push_notification(
                    &format!("{reward}!"),
                    Tone::Success,
                    Duration::from_millis(3200),
                );
            }
            GameEvent::QuestProgress { quest } => {
                self.inner.lock().objectives = quest.objectives.clone();
            }
            GameEvent::SettingsChange { change, settings } => match change {
                SettingsChange::Gameplay(changes) => {
                    if changes.view_mode.is_some() {
                        self.push_notification(
                            &format!("{} view engaged.", settings.gameplay.view_mode.label()),
                            Tone::Info,
                            Duration::from_millis(2400),
                        );
                    }
                    if changes.dinosaurs_enabled.is_some() {
                        if settings.gameplay.dinosaurs_enabled {
                            self.push_notification(
                                "Friendly dinosaurs stomp into the plaza!",
                                Tone::Success,
                                Duration::from_millis(3600),
                            );
                        } else {
                            self.push_notification(
                                "The dinosaurs wander back to their sanctuary.",
                                Tone::Warning,
                                Duration::from_millis(3200),
                            );
                        }
                    }
                }
                SettingsChange::Avatar(changes) => {
                    for (field, value) in changes.entries() {
                        self.push_notification(
                            &format!("{} set to {value}.", field.label()),
                            Tone::Info,
                            Duration::from_millis(2200),
                        );
                    }
                }
            },
            _ => {}
        }
    }

    /// Drops every toast whose timer has run out.
    pub fn expire(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.toasts.retain(|toast| toast.expires_at > now);
        if inner
            .quest_toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= now)
        {
            inner.quest_toast = None;
        }
    }

    pub fn prompt(&self) -> Option<String> {
        self.inner.lock().prompt.clone()
    }

    pub fn tooltip(&self) -> Option<String> {
        self.inner.lock().tooltip.clone()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.inner.lock().toasts.clone()
    }

    pub fn quest_toast(&self) -> Option<QuestToast> {
        self.inner.lock().quest_toast.clone()
    }

    /// Every notification text shown this session, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().history.clone()
    }

    pub fn coins(&self) -> u32 {
        self.inner.lock().coins
    }

    pub fn inventory_summary(&self) -> String {
        self.inner.lock().inventory_summary.clone()
    }

    pub fn objectives(&self) -> Vec<Objective> {
        self.inner.lock().objectives.clone()
    }

    pub fn status_line(&self) -> String {
        self.inner.lock().status_line.clone()
    }
}

impl Hud for HudModel {
    fn show_prompt(&self, text: &str) {
        self.inner.lock().prompt = Some(text.to_string());
    }

    fn hide_prompt(&self) {
        self.inner.lock().prompt = None;
    }

    fn show_tooltip(&self, text: &str) {
        self.inner.lock().tooltip = Some(text.to_string());
    }

    fn hide_tooltip(&self) {
        self.inner.lock().tooltip = None;
    }

    fn push_notification(&self, text: &str, tone: Tone, duration: Duration) {
        let expires_at = self.clock.now_ms() + duration.as_secs_f64() * 1000.0;
        let mut inner = self.inner.lock();
        inner.toasts.push(Toast {
            text: text.to_string(),
            tone,
            expires_at,
        });
        inner.history.push(text.to_string());
    }

    fn show_quest_toast(&self, title: &str, body: &str) {
        let expires_at = self.clock.now_ms() + self.quest_toast_ms as f64;
        self.inner.lock().quest_toast = Some(QuestToast {
            title: title.to_string(),
            body: body.to_string(),
            expires_at,
        });
    }
}

fn summarize(inventory: &[Item]) -> String {
    if inventory.is_empty() {
        return "Empty".to_string();
    }
    inventory
        .iter()
        .map(|item| format!("{} ×{}", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::game_state::ItemSpec;

    fn model() -> (Arc<ManualClock>, Arc<HudModel>) {
        let clock = Arc::new(ManualClock::new());
        let hud = Arc::new(HudModel::new(clock.clone()));
        (clock, hud)
    }

    #[test]
    fn quest_toast_restarts_instead_of_stacking() {
        let (clock, hud) = model();
        hud.show_quest_toast("First", "one");
        clock.advance(3000.0);
        hud.show_quest_toast("Second", "two");
        clock.advance(3000.0);
        hud.expire();
        let toast = hud.quest_toast().expect("restarted toast still visible");
        assert_eq!(toast.title, "Second");
        clock.advance(1300.0);
        hud.expire();
        assert!(hud.quest_toast().is_none());
    }

    #[test]
    fn notifications_expire_individually() {
        let (clock, hud) = model();
        hud.push_notification("short", Tone::Info, Duration::from_millis(1000));
        hud.push_notification("long", Tone::Info, Duration::from_millis(5000));
        clock.advance(1500.0);
        hud.expire();
        let texts: Vec<String> = hud.toasts().into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["long".to_string()]);
        assert_eq!(hud.history().len(), 2);
    }

    #[test]
    fn mirrors_state_events() {
        let (_clock, hud) = model();
        let state = GameState::new();
        hud.attach(&state);
        assert_eq!(hud.coins(), 25);

        state.add_coins(5, "tip");
        state.add_item("hat", ItemSpec::new("Explorer Hat"));
        state.set_status_line("Find FlameBot");
        assert!(!state.spend_coins(500, "yacht"));

        assert_eq!(hud.coins(), 30);
        assert_eq!(hud.inventory_summary(), "Explorer Hat ×1");
        assert_eq!(hud.status_line(), "Find FlameBot");
        let history = hud.history();
        assert!(history.contains(&"+5 coins (tip)".to_string()));
        assert!(history.contains(&"Received Explorer Hat ×1".to_string()));
        assert!(history.contains(&"You need 500 coins for this (yacht).".to_string()));
    }

    #[test]
    fn prompt_and_tooltip_toggle() {
        let (_clock, hud) = model();
        hud.show_prompt("Press E");
        hud.show_tooltip("Tip");
        assert_eq!(hud.prompt().as_deref(), Some("Press E"));
        hud.hide_prompt();
        hud.hide_tooltip();
        assert!(hud.prompt().is_none());
        assert!(hud.tooltip().is_none());
    }
}
