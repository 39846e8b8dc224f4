//! Typed event taxonomy and the synchronous observer registry behind
//! [`GameState`](crate::game_state::GameState).
//!
//! Delivery is synchronous and in subscription order. The listener list is
//! snapshotted before dispatch, so a listener may subscribe or unsubscribe
//! while an event is in flight; a listener removed mid-dispatch is not called
//! for the remainder of that dispatch.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::game_state::{GameState, Item, KeyStroke, Settings, SettingsChange};
use crate::input::KeyCode;
use crate::quest::{Job, Objective, QuestInstance};

/// Visual tone of a notification toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tone {
    #[default]
    Info,
    Success,
    Warning,
    Danger,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Info => "info",
            Tone::Success => "success",
            Tone::Warning => "warning",
            Tone::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InventoryMode {
    Add,
    Remove,
}

/// Describes the inventory mutation that produced an `inventory` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryChange {
    pub id: String,
    pub name: Option<String>,
    pub quantity: u32,
    pub item_type: Option<String>,
    pub description: Option<String>,
    pub mode: InventoryMode,
}

/// World and story events that are not tied to a GameState field. They are
/// the contract between world objects, quest logic and presentation.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    OrientationFountain,
    FlamebotContact,
    WaterDelivered,
    BridgeDeployed { end_position: Vec3 },
    EnteredSpyBase,
    JobBoard,
    JobAssigned { job: Job },
    StadiumCheer,
    SecretSequence,
    Landmark { id: String },
    Custom(String),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::OrientationFountain => EventKind::OrientationFountain,
            DomainEvent::FlamebotContact => EventKind::FlamebotContact,
            DomainEvent::WaterDelivered => EventKind::WaterDelivered,
            DomainEvent::BridgeDeployed { .. } => EventKind::BridgeDeployed,
            DomainEvent::EnteredSpyBase => EventKind::EnteredSpyBase,
            DomainEvent::JobBoard => EventKind::JobBoard,
            DomainEvent::JobAssigned { .. } => EventKind::JobAssigned,
            DomainEvent::StadiumCheer => EventKind::StadiumCheer,
            DomainEvent::SecretSequence => EventKind::SecretSequence,
            DomainEvent::Landmark { .. } => EventKind::Landmark,
            DomainEvent::Custom(_) => EventKind::Custom,
        }
    }

    /// Parses the payload-free domain events by their wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        let event = match name {
            "orientation-fountain" => DomainEvent::OrientationFountain,
            "flamebot-contact" => DomainEvent::FlamebotContact,
            "water-delivered" => DomainEvent::WaterDelivered,
            "bridge-deployed" => DomainEvent::BridgeDeployed {
                end_position: Vec3::ZERO,
            },
            "entered-spy-base" => DomainEvent::EnteredSpyBase,
            "job-board" => DomainEvent::JobBoard,
            "stadium-cheer" => DomainEvent::StadiumCheer,
            "secret-sequence" => DomainEvent::SecretSequence,
            _ => return None,
        };
        Some(event)
    }
}

/// Every notification GameState can deliver. Collections are owned copies.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Coins {
        coins: u32,
        delta: i64,
        context: String,
    },
    InsufficientCoins {
        required: u32,
        coins: u32,
        context: String,
    },
    Inventory {
        inventory: Vec<Item>,
        change: InventoryChange,
    },
    Flags {
        flags: BTreeSet<String>,
    },
    Status {
        text: String,
    },
    Notification {
        text: String,
        tone: Tone,
        duration: Duration,
    },
    Objectives {
        objectives: Vec<Objective>,
    },
    QuestStarted {
        quest: QuestInstance,
    },
    QuestProgress {
        quest: QuestInstance,
    },
    QuestCompleted {
        quest: QuestInstance,
    },
    QuestEnded,
    SettingsChange {
        change: SettingsChange,
        settings: Settings,
    },
    KeyPress {
        code: KeyCode,
        time: f64,
        history: Vec<KeyStroke>,
    },
    Domain(DomainEvent),
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::Coins { .. } => EventKind::Coins,
            GameEvent::InsufficientCoins { .. } => EventKind::InsufficientCoins,
            GameEvent::Inventory { .. } => EventKind::Inventory,
            GameEvent::Flags { .. } => EventKind::Flags,
            GameEvent::Status { .. } => EventKind::Status,
            GameEvent::Notification { .. } => EventKind::Notification,
            GameEvent::Objectives { .. } => EventKind::Objectives,
            GameEvent::QuestStarted { .. } => EventKind::QuestStarted,
            GameEvent::QuestProgress { .. } => EventKind::QuestProgress,
            GameEvent::QuestCompleted { .. } => EventKind::QuestCompleted,
            GameEvent::QuestEnded => EventKind::QuestEnded,
            GameEvent::SettingsChange { .. } => EventKind::SettingsChange,
            GameEvent::KeyPress { .. } => EventKind::KeyPress,
            GameEvent::Domain(domain) => domain.kind(),
        }
    }
}

/// Discriminant used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Coins,
    InsufficientCoins,
    Inventory,
    Flags,
    Status,
    Notification,
    Objectives,
    QuestStarted,
    QuestProgress,
    QuestCompleted,
    QuestEnded,
    SettingsChange,
    KeyPress,
    OrientationFountain,
    FlamebotContact,
    WaterDelivered,
    BridgeDeployed,
    EnteredSpyBase,
    JobBoard,
    JobAssigned,
    StadiumCheer,
    SecretSequence,
    Landmark,
    Custom,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Coins => "coins",
            EventKind::InsufficientCoins => "insufficient-coins",
            EventKind::Inventory => "inventory",
            EventKind::Flags => "flags",
            EventKind::Status => "status",
            EventKind::Notification => "notification",
            EventKind::Objectives => "objectives",
            EventKind::QuestStarted => "quest-started",
            EventKind::QuestProgress => "quest-progress",
            EventKind::QuestCompleted => "quest-completed",
            EventKind::QuestEnded => "quest-ended",
            EventKind::SettingsChange => "settings-change",
            EventKind::KeyPress => "key-press",
            EventKind::OrientationFountain => "orientation-fountain",
            EventKind::FlamebotContact => "flamebot-contact",
            EventKind::WaterDelivered => "water-delivered",
            EventKind::BridgeDeployed => "bridge-deployed",
            EventKind::EnteredSpyBase => "entered-spy-base",
            EventKind::JobBoard => "job-board",
            EventKind::JobAssigned => "job-assigned",
            EventKind::StadiumCheer => "stadium-cheer",
            EventKind::SecretSequence => "secret-sequence",
            EventKind::Landmark => "landmark",
            EventKind::Custom => "custom",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&GameState, &GameEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    listener: Listener,
}

/// Ordered observer registry.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. `kind = None` receives every event.
    pub fn subscribe(&self, kind: Option<EventKind>, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription { id, kind, listener });
        id
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self.subscriptions.write();
        let before = guard.len();
        guard.retain(|sub| sub.id != id);
        guard.len() != before
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.read().iter().any(|sub| sub.id == id)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispatch(&self, state: &GameState, event: &GameEvent) {
        let kind = event.kind();
        let targets: Vec<(SubscriptionId, Listener)> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| sub.kind.map_or(true, |wanted| wanted == kind))
            .map(|sub| (sub.id, Arc::clone(&sub.listener)))
            .collect();

        for (id, listener) in targets {
            if !self.is_subscribed(id) {
                continue;
            }
            listener(state, event);
        }
    }
}
