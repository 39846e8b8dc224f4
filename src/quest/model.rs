use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Authored step of a quest blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveTemplate {
    pub id: String,
    pub label: String,
}

impl ObjectiveTemplate {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Immutable quest blueprint loaded from content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QuestTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completion_text: String,
    #[serde(default)]
    pub reward_text: String,
    #[serde(default)]
    pub reward_coins: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_flag: Option<String>,
    pub objectives: Vec<ObjectiveTemplate>,
}

/// Live objective state inside a quest instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub label: String,
    pub active: bool,
    pub completed: bool,
}

/// Partial update applied by `set_objective_state`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectiveChanges {
    pub active: Option<bool>,
    pub completed: Option<bool>,
}

impl ObjectiveChanges {
    pub fn activate() -> Self {
        Self {
            active: Some(true),
            completed: None,
        }
    }

    pub fn complete() -> Self {
        Self {
            active: Some(false),
            completed: Some(true),
        }
    }

    pub(crate) fn apply(self, objective: &mut Objective) {
        if let Some(active) = self.active {
            objective.active = active;
        }
        if let Some(completed) = self.completed {
            objective.completed = completed;
        }
    }
}

/// Value stored in a quest's free-form progress bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for QuestValue {
    fn from(value: bool) -> Self {
        QuestValue::Bool(value)
    }
}

impl From<i64> for QuestValue {
    fn from(value: i64) -> Self {
        QuestValue::Int(value)
    }
}

impl From<&str> for QuestValue {
    fn from(value: &str) -> Self {
        QuestValue::Text(value.to_string())
    }
}

impl From<String> for QuestValue {
    fn from(value: String) -> Self {
        QuestValue::Text(value)
    }
}

/// Per-session mutable copy of a [`QuestTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestInstance {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completion_text: String,
    pub reward_text: String,
    pub reward_coins: u32,
    pub reward_flag: Option<String>,
    pub objectives: Vec<Objective>,
    pub completed: bool,
    pub state: BTreeMap<String, QuestValue>,
}

impl QuestInstance {
    /// Builds an independent instance. Only the first objective starts active.
    pub fn from_template(template: &QuestTemplate) -> Self {
        let objectives = template
            .objectives
            .iter()
            .enumerate()
            .map(|(index, objective)| Objective {
                id: objective.id.clone(),
                label: objective.label.clone(),
                active: index == 0,
                completed: false,
            })
            .collect();
        Self {
            id: template.id.clone(),
            title: template.title.clone(),
            description: template.description.clone(),
            completion_text: template.completion_text.clone(),
            reward_text: template.reward_text.clone(),
            reward_coins: template.reward_coins,
            reward_flag: template.reward_flag.clone(),
            objectives,
            completed: false,
            state: BTreeMap::new(),
        }
    }

    pub fn objective(&self, objective_id: &str) -> Option<&Objective> {
        self.objectives.iter().find(|obj| obj.id == objective_id)
    }

    pub fn objective_mut(&mut self, objective_id: &str) -> Option<&mut Objective> {
        self.objectives.iter_mut().find(|obj| obj.id == objective_id)
    }

    pub fn objective_completed(&self, objective_id: &str) -> bool {
        self.objective(objective_id)
            .map(|obj| obj.completed)
            .unwrap_or(false)
    }

    pub fn active_objective(&self) -> Option<&Objective> {
        self.objectives.iter().find(|obj| obj.active)
    }
}
