use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::events::{DomainEvent, SubscriptionId, Tone};
use crate::game_state::GameState;
use crate::hud::Hud;

use super::jobs::{Assignment, Job, JobBoard};
use super::model::{ObjectiveChanges, QuestInstance, QuestTemplate};

struct ManagerInner {
    state: GameState,
    hud: Arc<dyn Hud>,
    templates: RwLock<BTreeMap<String, QuestTemplate>>,
    board: Mutex<JobBoard>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

/// Starts and advances quests and runs the job board.
///
/// Quest instances live in [`GameState`]; the manager owns the templates and
/// mutates instances in place through the state, re-projecting objectives
/// after every change.
#[derive(Clone)]
pub struct QuestManager {
    inner: Arc<ManagerInner>,
}

/// Non-owning reference held by event handlers.
#[derive(Clone)]
pub struct WeakQuestManager(Weak<ManagerInner>);

impl WeakQuestManager {
    pub fn upgrade(&self) -> Option<QuestManager> {
        self.0.upgrade().map(|inner| QuestManager { inner })
    }
}

impl QuestManager {
    pub fn new(
        state: GameState,
        hud: Arc<dyn Hud>,
        templates: impl IntoIterator<Item = QuestTemplate>,
        jobs: impl IntoIterator<Item = Job>,
    ) -> Self {
        let templates = templates
            .into_iter()
            .map(|template| (template.id.clone(), template))
            .collect();
        Self {
            inner: Arc::new(ManagerInner {
                state,
                hud,
                templates: RwLock::new(templates),
                board: Mutex::new(JobBoard::new(jobs)),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakQuestManager {
        WeakQuestManager(Arc::downgrade(&self.inner))
    }

    pub fn state(&self) -> &GameState {
        &self.inner.state
    }

    pub fn template(&self, quest_id: &str) -> Option<QuestTemplate> {
        self.inner.templates.read().get(quest_id).cloned()
    }

    /// Pushes a notification to the presentation sink.
    pub fn notify(&self, text: &str, tone: Tone, millis: u64) {
        self.inner
            .hud
            .push_notification(text, tone, Duration::from_millis(millis));
    }

    /// Stores an independent instance of `template` and makes it active.
    /// An existing instance with the same id is replaced.
    pub fn start_quest(&self, template: &QuestTemplate) {
        info!("starting quest {}", template.id);
        self.inner
            .state
            .set_active_quest(Some(QuestInstance::from_template(template)));
    }

    /// Starts the named template unless an instance already exists.
    pub fn start_if_new(&self, quest_id: &str) -> bool {
        if self.inner.state.has_quest(quest_id) {
            return false;
        }
        match self.template(quest_id) {
            Some(template) => {
                self.start_quest(&template);
                true
            }
            None => {
                warn!("no quest template named {quest_id}");
                false
            }
        }
    }

    /// Completes the quest and pays its reward exactly once.
    pub fn complete_quest(&self, quest_id: &str) {
        let Some(quest) = self.inner.state.quest(quest_id) else {
            return;
        };
        if quest.completed {
            return;
        }
        info!("quest {quest_id} complete");
        self.inner.state.complete_quest(quest_id);
        if quest.reward_coins > 0 {
            self.inner.state.add_coins(quest.reward_coins, &quest.title);
        }
        if let Some(flag) = &quest.reward_flag {
            self.inner.state.set_flag(flag, true);
        }
    }

    pub fn set_objective_state(&self, quest_id: &str, objective_id: &str, changes: ObjectiveChanges) {
        let changed = self.inner.state.with_quest_mut(quest_id, |quest| {
            quest
                .objective_mut(objective_id)
                .map(|objective| changes.apply(objective))
                .is_some()
        });
        if changed == Some(true) {
            self.project(quest_id);
        }
    }

    /// Completes one objective and activates the one after it.
    pub fn mark_objective_complete(&self, quest_id: &str, objective_id: &str) {
        let changed = self.inner.state.with_quest_mut(quest_id, |quest| {
            let Some(index) = quest.objectives.iter().position(|o| o.id == objective_id) else {
                return false;
            };
            ObjectiveChanges::complete().apply(&mut quest.objectives[index]);
            if let Some(next) = quest.objectives.get_mut(index + 1) {
                next.active = true;
            }
            true
        });
        if changed == Some(true) {
            debug!("objective {quest_id}/{objective_id} complete");
            self.project(quest_id);
        }
    }

    /// Re-publishes the quest's objectives as the HUD projection.
    pub fn project(&self, quest_id: &str) {
        if let Some(quest) = self.inner.state.quest(quest_id) {
            self.inner.state.set_objectives(quest.objectives);
        }
    }

    pub fn active_job(&self) -> Option<Job> {
        self.inner.board.lock().active().cloned()
    }

    pub fn pending_jobs(&self) -> Vec<Job> {
        self.inner.board.lock().pending().cloned().collect()
    }

    pub fn is_job_active(&self, job_id: &str) -> bool {
        self.inner.board.lock().is_active(job_id)
    }

    /// Hands out the next contract unless one is running or none remain.
    pub fn assign_job(&self) -> Option<Job> {
        let assignment = self.inner.board.lock().assign();
        match assignment {
            Assignment::Busy(job) => {
                self.notify(&format!("Current contract active: {}", job.label), Tone::Info, 2600);
                None
            }
            Assignment::Exhausted => {
                self.notify("All town contracts are complete for today.", Tone::Info, 2600);
                None
            }
            Assignment::Assigned(job) => {
                info!("job assigned: {}", job.id);
                self.notify(
                    &format!("New contract: {} (+{} coins)", job.label, job.reward),
                    Tone::Success,
                    3400,
                );
                self.inner.state.push_notification(
                    &format!("Job added: {}", job.label),
                    Tone::Info,
                    Duration::from_millis(3000),
                );
                self.inner
                    .state
                    .emit(DomainEvent::JobAssigned { job: job.clone() });
                Some(job)
            }
        }
    }

    /// Pays `job` and clears the active contract.
    pub fn complete_job(&self, job: &Job, message: Option<&str>) {
        info!("job complete: {}", job.id);
        let text = match message {
            Some(message) => message.to_string(),
            None => format!("Job complete: {}", job.label),
        };
        self.notify(&text, Tone::Success, 3200);
        self.inner.state.add_coins(job.reward, &job.label);
        self.inner.board.lock().finish();
    }

    /// Pays the active job if it has the given id.
    pub fn complete_active_job(&self, job_id: &str, message: &str) -> bool {
        let Some(job) = self.active_job().filter(|job| job.id == job_id) else {
            return false;
        };
        self.complete_job(&job, Some(message));
        true
    }

    /// Remembers a GameState subscription so [`QuestManager::detach`] can
    /// remove it.
    pub fn track(&self, id: SubscriptionId) {
        self.inner.subscriptions.lock().push(id);
    }

    /// Removes every tracked subscription.
    pub fn detach(&self) {
        let ids: Vec<SubscriptionId> = self.inner.subscriptions.lock().drain(..).collect();
        for id in ids {
            self.inner.state.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::{EventKind, GameEvent};
    use crate::hud::HudModel;
    use crate::quest::ObjectiveTemplate;

    fn template(id: &str, objectives: &[&str]) -> QuestTemplate {
        QuestTemplate {
            id: id.to_string(),
            title: format!("Quest {id}"),
            reward_coins: 7,
            reward_flag: Some(format!("{id}-done")),
            objectives: objectives
                .iter()
                .map(|o| ObjectiveTemplate::new(*o, o.to_uppercase()))
                .collect(),
            ..QuestTemplate::default()
        }
    }

    fn manager(jobs: Vec<Job>) -> (QuestManager, Arc<HudModel>) {
        let clock = Arc::new(ManualClock::new());
        let state = GameState::with_clock(clock.clone());
        let hud = Arc::new(HudModel::new(clock));
        let manager = QuestManager::new(state, hud.clone(), [template("q1", &["a", "b"])], jobs);
        (manager, hud)
    }

    fn flags(objectives: &[crate::quest::Objective]) -> Vec<(String, bool, bool)> {
        objectives
            .iter()
            .map(|o| (o.id.clone(), o.active, o.completed))
            .collect()
    }

    #[test]
    fn objective_projection_follows_completion() {
        let (manager, _hud) = manager(Vec::new());
        manager.start_quest(&template("q1", &["a", "b"]));
        assert_eq!(
            flags(&manager.state().objectives()),
            vec![("a".into(), true, false), ("b".into(), false, false)]
        );

        manager.mark_objective_complete("q1", "a");
        assert_eq!(
            flags(&manager.state().objectives()),
            vec![("a".into(), false, true), ("b".into(), true, false)]
        );
    }

    #[test]
    fn completing_last_objective_leaves_none_active() {
        let (manager, _hud) = manager(Vec::new());
        manager.start_quest(&template("q3", &["a", "b", "c"]));
        for id in ["a", "b", "c"] {
            manager.mark_objective_complete("q3", id);
        }
        let quest = manager.state().quest("q3").expect("started");
        assert!(quest.objectives.iter().all(|o| o.completed && !o.active));
        assert!(quest.active_objective().is_none());
    }

    #[test]
    fn unknown_references_are_ignored() {
        let (manager, _hud) = manager(Vec::new());
        manager.start_quest(&template("q1", &["a", "b"]));
        let before = manager.state().objectives();
        manager.mark_objective_complete("q1", "zzz");
        manager.mark_objective_complete("nope", "a");
        manager.set_objective_state("q1", "zzz", ObjectiveChanges::activate());
        manager.complete_quest("nope");
        assert_eq!(manager.state().objectives(), before);
    }

    #[test]
    fn completion_rewards_exactly_once() {
        let (manager, _hud) = manager(Vec::new());
        let deltas = Arc::new(Mutex::new(Vec::new()));
        let sink = deltas.clone();
        manager.state().on(EventKind::Coins, move |_, event| {
            if let GameEvent::Coins { delta, .. } = event {
                sink.lock().push(*delta);
            }
        });
        manager.start_quest(&template("q1", &["a", "b"]));
        manager.complete_quest("q1");
        manager.complete_quest("q1");

        assert_eq!(*deltas.lock(), vec![7]);
        assert_eq!(manager.state().coins(), 32);
        assert!(manager.state().has_flag("q1-done"));
        assert!(manager.state().active_quest_id().is_none());
    }

    #[test]
    fn instances_do_not_share_objective_state() {
        let (manager, _hud) = manager(Vec::new());
        let blueprint = manager.template("q1").expect("template");
        manager.start_quest(&blueprint);
        manager.mark_objective_complete("q1", "a");
        assert!(!manager.template("q1").expect("template").objectives.is_empty());

        manager.start_quest(&blueprint);
        let restarted = manager.state().quest("q1").expect("restarted");
        assert!(restarted.objectives[0].active);
        assert!(!restarted.objectives[0].completed);
    }

    #[test]
    fn duplicate_starts_are_guarded_by_start_if_new_only() {
        let (manager, _hud) = manager(Vec::new());
        assert!(manager.start_if_new("q1"));
        manager.mark_objective_complete("q1", "a");
        assert!(!manager.start_if_new("q1"));
        assert!(manager.state().quest("q1").expect("q1").objectives[0].completed);
        assert!(!manager.start_if_new("missing"));
    }

    #[test]
    fn job_board_assigns_one_at_a_time() {
        let jobs = vec![Job::new("deliver", "Deliver a crate", 6), Job::new("cheer", "Cheer", 5)];
        let (manager, hud) = manager(jobs);
        let assigned = Arc::new(Mutex::new(Vec::new()));
        let sink = assigned.clone();
        manager.state().on(EventKind::JobAssigned, move |_, event| {
            if let GameEvent::Domain(DomainEvent::JobAssigned { job }) = event {
                sink.lock().push(job.id.clone());
            }
        });

        assert_eq!(manager.assign_job().map(|j| j.id), Some("deliver".to_string()));
        assert!(manager.assign_job().is_none());
        assert!(hud
            .history()
            .contains(&"Current contract active: Deliver a crate".to_string()));

        let job = manager.active_job().expect("active");
        manager.complete_job(&job, None);
        assert_eq!(manager.state().coins(), 31);
        assert!(hud.history().contains(&"Job complete: Deliver a crate".to_string()));

        assert!(manager.assign_job().is_some());
        assert!(manager.complete_active_job("cheer", "Done"));
        assert!(manager.assign_job().is_none());
        assert!(hud
            .history()
            .contains(&"All town contracts are complete for today.".to_string()));
        assert_eq!(*assigned.lock(), vec!["deliver".to_string(), "cheer".to_string()]);
    }
}
