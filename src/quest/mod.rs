//! Quest and job progression.

mod jobs;
mod manager;
mod model;
pub mod storyline;

pub use jobs::{Assignment, Job, JobBoard};
pub use manager::{QuestManager, WeakQuestManager};
pub use model::{
    Objective, ObjectiveChanges, ObjectiveTemplate, QuestInstance, QuestTemplate, QuestValue,
};
