//! Core modules for Lifebot Town.
//!
//! The crate exposes the reactive game state, quest progression and
//! interaction targeting that drive the town.  Rendering and platform
//! integration are kept outside of the crate and are reached only through
//! the [`WorldQuery`], [`Highlighter`] and [`Hud`] traits, so the whole game
//! can be played headless against [`TownScene`].

pub mod clock;
pub mod config;
pub mod content;
pub mod cooldown;
pub mod events;
pub mod game_state;
pub mod gesture;
pub mod hud;
pub mod input;
pub mod interaction;
pub mod quest;
pub mod scene;
pub mod session;
pub mod town;
pub mod world;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use content::{ContentError, ContentPack, Landmark, ShopItem};
pub use events::{DomainEvent, EventKind, GameEvent, SubscriptionId, Tone};
pub use game_state::{GameState, Item, ItemSpec, KeyStroke};
pub use hud::{Hud, HudModel};
pub use input::{InputRouter, InputState, KeyCode, KeyEvent, NamedKey, ScriptedInput};
pub use interaction::{Focus, InteractableConfig, InteractionManager};
pub use quest::{Job, Objective, QuestInstance, QuestManager, QuestTemplate};
pub use scene::{PropSpec, TownScene};
pub use session::Session;
pub use world::{Handle, Highlighter, PickHit, WorldQuery};
