//! Event wiring for the Lifebot Town quest chain.
//!
//! Quests never call each other. Each handler below reacts to a GameState or
//! domain event, advances objectives and, where the story continues, starts
//! the next quest.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::events::{DomainEvent, EventKind, GameEvent, InventoryMode, SubscriptionId, Tone};
use crate::game_state::GameState;

use super::jobs::Job;
use super::manager::{QuestManager, WeakQuestManager};
use super::model::ObjectiveChanges;

pub const FIRST_STEPS: &str = "first-steps";
pub const HARBOR_BRIEFING: &str = "harbor-briefing";
pub const SUIT_UP: &str = "suit-up";
pub const SPY_INITIATIVE: &str = "spy-initiative";

pub const DELIVER_ENERGY_JOB: &str = "deliver-energy";
pub const STADIUM_CHEER_JOB: &str = "stadium-cheer";
pub const BRIDGE_PATROL_JOB: &str = "bridge-patrol";

/// Text fragment the spy console notification carries.
pub const INTEL_DECRYPTED: &str = "Harbor intel decrypted";

/// Subscribes the story handlers and starts the onboarding quest.
pub fn install(manager: &QuestManager) {
    let state = manager.state().clone();

    on(manager, &state, EventKind::OrientationFountain, |quests, _| {
        reached_fountain(quests)
    });
    on(manager, &state, EventKind::FlamebotContact, |quests, _| {
        flamebot_contact(quests)
    });
    on(manager, &state, EventKind::Inventory, |quests, event| {
        if let GameEvent::Inventory { change, .. } = event {
            if change.mode == InventoryMode::Add {
                item_received(quests, &change.id);
            }
        }
    });
    on(manager, &state, EventKind::WaterDelivered, |quests, _| {
        water_delivered(quests)
    });
    on(manager, &state, EventKind::BridgeDeployed, |quests, _| {
        bridge_deployed(quests)
    });
    on(manager, &state, EventKind::EnteredSpyBase, |quests, _| {
        if quests.state().has_quest(SPY_INITIATIVE) {
            quests.mark_objective_complete(SPY_INITIATIVE, "enter-base");
            quests.set_objective_state(SPY_INITIATIVE, "decrypt-intel", ObjectiveChanges::activate());
        }
    });
    on(manager, &state, EventKind::Notification, |quests, event| {
        if let GameEvent::Notification { text, .. } = event {
            if text.contains(INTEL_DECRYPTED) && quests.state().has_quest(SPY_INITIATIVE) {
                quests.mark_objective_complete(SPY_INITIATIVE, "decrypt-intel");
                quests.complete_quest(SPY_INITIATIVE);
            }
        }
    });
    on(manager, &state, EventKind::JobBoard, |quests, _| {
        quests.assign_job();
    });
    on(manager, &state, EventKind::JobAssigned, |quests, event| {
        if let GameEvent::Domain(DomainEvent::JobAssigned { job }) = event {
            job_assigned(quests, job);
        }
    });

    if manager.start_if_new(FIRST_STEPS) {
        state.set_status_line("Find FlameBot by the fountain to begin.");
    }
}

fn on<F>(manager: &QuestManager, state: &GameState, kind: EventKind, handler: F)
where
    F: Fn(&QuestManager, &GameEvent) + Send + Sync + 'static,
{
    let weak = manager.downgrade();
    let id = state.on(kind, move |_, event| {
        if let Some(quests) = weak.upgrade() {
            handler(&quests, event);
        }
    });
    manager.track(id);
}

fn reached_fountain(quests: &QuestManager) {
    let Some(quest) = quests.state().quest(FIRST_STEPS) else {
        return;
    };
    if quest.completed || quest.objective_completed("reach-fountain") {
        return;
    }
    quests.mark_objective_complete(FIRST_STEPS, "reach-fountain");
    quests.set_objective_state(FIRST_STEPS, "speak-flamebot", ObjectiveChanges::activate());
    quests.notify("FlameBot is just ahead by the fountain. Say hello!", Tone::Info, 3000);
}

fn flamebot_contact(quests: &QuestManager) {
    let state = quests.state();
    if let Some(onboarding) = state.quest(FIRST_STEPS).filter(|quest| !quest.completed) {
        if !onboarding.objective_completed("speak-flamebot") {
            quests.mark_objective_complete(FIRST_STEPS, "speak-flamebot");
        }
        quests.set_objective_state(FIRST_STEPS, "claim-coins", ObjectiveChanges::activate());
        let claimed = state
            .quest(FIRST_STEPS)
            .is_some_and(|quest| quest.objective_completed("claim-coins"));
        if !claimed {
            quests.mark_objective_complete(FIRST_STEPS, "claim-coins");
        }
        quests.notify(
            &format!(
                "FlameBot transfers a welcome bonus of {} coins.",
                onboarding.reward_coins
            ),
            Tone::Success,
            3600,
        );
        quests.complete_quest(FIRST_STEPS);
        state.set_flag("orientation-complete", true);
        start_harbor(quests);
        start_suit_up(quests);
        return;
    }

    match state.quest(HARBOR_BRIEFING) {
        None => start_harbor(quests),
        Some(harbor) if !harbor.completed => {
            quests.notify("FlameBot awaits your progress report.", Tone::Info, 2600)
        }
        Some(_) => {}
    }
}

fn start_harbor(quests: &QuestManager) {
    if quests.start_if_new(HARBOR_BRIEFING) {
        quests.state().set_flag("flamebot-spoke", true);
        quests.notify(
            "FlameBot authorized you to assist with the harbor systems.",
            Tone::Info,
            3600,
        );
    }
}

fn start_suit_up(quests: &QuestManager) {
    if quests.start_if_new(SUIT_UP) {
        quests
            .state()
            .set_status_line("Buy the Explorer Hat from Lifebot Supply.");
    }
}

fn item_received(quests: &QuestManager, item_id: &str) {
    let state = quests.state();
    match item_id {
        "energy-drink" => {
            quests.complete_active_job(DELIVER_ENERGY_JOB, "Energy drink delivered to commentary booth.");
        }
        "water-sample" if state.has_quest(HARBOR_BRIEFING) => {
            quests.mark_objective_complete(HARBOR_BRIEFING, "collect-water");
            quests.set_objective_state(HARBOR_BRIEFING, "deliver-water", ObjectiveChanges::activate());
            quests.notify("Bring the sample back to FlameBot.", Tone::Info, 2800);
        }
        "explorer-hat" => hat_purchased(quests),
        "spy-pass" if state.has_quest(SPY_INITIATIVE) => {
            quests.mark_objective_complete(SPY_INITIATIVE, "buy-clearance");
            quests.set_objective_state(SPY_INITIATIVE, "enter-base", ObjectiveChanges::activate());
        }
        _ => {}
    }
}

fn hat_purchased(quests: &QuestManager) {
    let state = quests.state();
    start_suit_up(quests);
    let suit_up_open = state.quest(SUIT_UP).is_some_and(|quest| !quest.completed);
    if suit_up_open {
        quests.mark_objective_complete(SUIT_UP, "buy-hat");
        quests.complete_quest(SUIT_UP);
        if let Some(harbor) = state.quest(HARBOR_BRIEFING).filter(|quest| !quest.completed) {
            debug!("resuming {HARBOR_BRIEFING}");
            state.set_active_quest(Some(harbor));
            quests.project(HARBOR_BRIEFING);
            state.set_status_line("Assist FlameBot with the harbor systems.");
        }
    }
    state.set_flag("explorer-hat-owned", true);
    quests.notify(
        "Explorer Hat unlocked! Equip it in the Avatar menu.",
        Tone::Success,
        3600,
    );
    if state.settings().avatar.accessory == "none" {
        state.set_avatar_option("accessory", "adventure-hat");
    }
}

fn water_delivered(quests: &QuestManager) {
    if !quests.state().has_quest(HARBOR_BRIEFING) {
        return;
    }
    quests.mark_objective_complete(HARBOR_BRIEFING, "deliver-water");
    quests.set_objective_state(HARBOR_BRIEFING, "deploy-bridge", ObjectiveChanges::activate());
    quests.state().set_flag("bridge-authorized", true);
    quests.notify(
        "FlameBot authorized you to deploy the harbor bridge.",
        Tone::Success,
        3200,
    );
}

fn bridge_deployed(quests: &QuestManager) {
    quests.complete_active_job(BRIDGE_PATROL_JOB, "Bridge patrol signed off.");
    let state = quests.state();
    if !state.has_quest(HARBOR_BRIEFING) {
        return;
    }
    quests.mark_objective_complete(HARBOR_BRIEFING, "deploy-bridge");
    quests.complete_quest(HARBOR_BRIEFING);
    state.set_flag("spy-briefing", true);
    quests.notify(
        "Bridge deployment complete. Spy portal now listening for clearance.",
        Tone::Success,
        3800,
    );
    quests.start_if_new(SPY_INITIATIVE);
}

fn job_assigned(quests: &QuestManager, job: &Job) {
    match job.id.as_str() {
        DELIVER_ENERGY_JOB => {
            if quests.state().has_item("energy-drink", 1) {
                quests.complete_job(
                    job,
                    Some("Energy drink already on hand. Commentator thanks you instantly."),
                );
                return;
            }
            quests.notify(
                "Find the commentator near the stadium scoreboard.",
                Tone::Info,
                2800,
            );
        }
        STADIUM_CHEER_JOB => {
            quests.notify("The crowd expects a cheer from the stands.", Tone::Info, 2400);
            await_cheer(quests);
        }
        _ => {}
    }
}

/// Installs a listener that pays the cheer contract and then removes itself.
fn await_cheer(quests: &QuestManager) {
    let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
    let own_id = slot.clone();
    let weak: WeakQuestManager = quests.downgrade();
    let id = quests.state().on(EventKind::StadiumCheer, move |state, _| {
        let Some(quests) = weak.upgrade() else {
            return;
        };
        if quests.complete_active_job(STADIUM_CHEER_JOB, "Cheer contract fulfilled.") {
            if let Some(id) = own_id.lock().take() {
                state.unsubscribe(id);
            }
        }
    });
    *slot.lock() = Some(id);
    quests.track(id);
}
