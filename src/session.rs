//! One play session: the state, the presentation model, the headless world
//! and every manager wired together.

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::clock::Clock;
use crate::content::ContentPack;
use crate::events::SubscriptionId;
use crate::game_state::GameState;
use crate::gesture::SecretGesture;
use crate::hud::{Hud, HudModel};
use crate::input::{InputRouter, InputSource, KeyCode, KeyEvent};
use crate::interaction::InteractionManager;
use crate::quest::{storyline, QuestManager};
use crate::scene::TownScene;
use crate::town::Town;
use crate::world::Highlighter;

/// Distance kept between the camera and a prop's surface by
/// [`Session::look_at`].
pub const LOOK_STANDOFF: f32 = 1.5;

pub struct Session {
    state: GameState,
    hud: Arc<HudModel>,
    scene: Arc<TownScene>,
    interaction: InteractionManager,
    quests: QuestManager,
    town: Town,
    input: InputRouter,
    subscriptions: Vec<SubscriptionId>,
}

impl Session {
    pub fn new(pack: &ContentPack, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = &pack.config;
        let state = GameState::from_config(config, Arc::clone(&clock));

        let hud = Arc::new(HudModel::with_quest_toast(clock, config.quest_toast_ms));
        let mut subscriptions = vec![hud.attach(&state)];
        let hud_handle: Arc<dyn Hud> = hud.clone();

        let scene = Arc::new(TownScene::from_specs(&pack.props)?);
        let highlighter: Arc<dyn Highlighter> = scene.clone();
        let interaction =
            InteractionManager::from_config(config, Arc::clone(&hud_handle), highlighter);

        let quests = QuestManager::new(
            state.clone(),
            Arc::clone(&hud_handle),
            pack.quests.iter().cloned(),
            pack.jobs.iter().cloned(),
        );
        storyline::install(&quests);

        let town = Town::install(
            pack,
            state.clone(),
            Arc::clone(&hud_handle),
            Arc::clone(&scene),
            interaction.clone(),
        )?;
        subscriptions.push(SecretGesture::from_config(config).install(&state));

        let input = InputRouter::new(state.clone(), interaction.clone(), hud_handle);
        info!(
            "session started with {} coins and {} props",
            state.coins(),
            pack.props.len()
        );
        Ok(Self {
            state,
            hud,
            scene,
            interaction,
            quests,
            town,
            input,
            subscriptions,
        })
    }

    /// Resolves focus for the current camera and drops expired toasts.
    pub fn tick(&self) {
        self.interaction.tick(self.scene.as_ref());
        self.hud.expire();
    }

    pub fn handle(&mut self, event: &KeyEvent) {
        self.input.handle(event);
    }

    pub fn pump(&mut self, source: &mut dyn InputSource) {
        self.input.pump(source);
    }

    /// A full key tap: press then release.
    pub fn press(&mut self, code: KeyCode) {
        self.input.handle(&KeyEvent::pressed(code));
        self.input.handle(&KeyEvent::released(code));
    }

    pub fn look_at(&self, prop: &str) -> Result<()> {
        self.scene.look_at(prop, LOOK_STANDOFF)?;
        self.tick();
        Ok(())
    }

    pub fn look_away(&self) {
        self.scene.look_away();
        self.tick();
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn hud(&self) -> &HudModel {
        &self.hud
    }

    pub fn scene(&self) -> &TownScene {
        &self.scene
    }

    pub fn interaction(&self) -> &InteractionManager {
        &self.interaction
    }

    pub fn quests(&self) -> &QuestManager {
        &self.quests
    }

    pub fn town(&self) -> &Town {
        &self.town
    }

    pub fn input(&self) -> &InputRouter {
        &self.input
    }

    /// Human-readable snapshot printed by the CLI at the end of a run.
    pub fn summary(&self) -> String {
        let flags: Vec<String> = self.state.flags().into_iter().collect();
        let mut lines = vec![
            "Final town state:".to_string(),
            format!(" coins: {}", self.state.coins()),
            format!(" inventory: {}", self.hud.inventory_summary()),
            format!(" flags: {}", flags.join(", ")),
            format!(
                " active quest: {}",
                self.state.active_quest_id().unwrap_or_else(|| "none".into())
            ),
            " quests:".to_string(),
        ];
        lines.extend(self.state.quests().into_iter().map(|quest| {
            let done = quest.objectives.iter().filter(|o| o.completed).count();
            format!(
                "  - {} ({}) {}/{} objectives{}",
                quest.id,
                quest.title,
                done,
                quest.objectives.len(),
                if quest.completed { " [complete]" } else { "" }
            )
        }));
        let job = self
            .quests
            .active_job()
            .map(|job| job.label)
            .unwrap_or_else(|| "none".into());
        lines.push(format!(
            " job: {job} ({} pending)",
            self.quests.pending_jobs().len()
        ));
        lines.push(format!(
            " landmarks read: {}",
            self.town.landmarks_read().len()
        ));
        lines.push(format!(" status: {}", self.state.status_line()));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Removes every subscription this session installed.
    pub fn detach(&mut self) {
        self.town.detach();
        self.quests.detach();
        for id in self.subscriptions.drain(..) {
            self.state.unsubscribe(id);
        }
        self.interaction.clear_focus();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn session() -> (Session, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let pack = ContentPack::bundled().expect("bundled content");
        let session = Session::new(&pack, clock.clone()).expect("session");
        (session, clock)
    }

    #[test]
    fn starts_onboarding_with_starting_coins() {
        let (session, _) = session();
        assert_eq!(session.state().coins(), 25);
        assert_eq!(
            session.state().active_quest_id().as_deref(),
            Some(storyline::FIRST_STEPS)
        );
        assert_eq!(
            session.state().status_line(),
            "Find FlameBot by the fountain to begin."
        );
        assert!(session.interaction().len() > 20);
    }

    #[test]
    fn looking_at_a_prop_shows_its_prompt() {
        let (session, _) = session();
        session.look_at("job-board").unwrap();
        assert_eq!(
            session.hud().prompt().as_deref(),
            Some("Press E to view available jobs")
        );
        session.look_away();
        assert_eq!(session.hud().prompt(), None);
        assert!(session.scene().highlighted().is_empty());
    }

    #[test]
    fn summary_lists_state_line_by_line() {
        let (session, _) = session();
        let summary = session.summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "Final town state:");
        assert_eq!(lines[1], " coins: 25");
        assert!(lines.contains(&" active quest: first-steps"));
        assert!(lines.contains(&" landmarks read: 0"));
        assert!(summary.ends_with('\n'));
    }

    #[test]
    fn detach_removes_every_listener() {
        let (mut session, _) = session();
        assert!(session.state().listener_count() > 0);
        session.detach();
        assert_eq!(session.state().listener_count(), 0);
    }
}
