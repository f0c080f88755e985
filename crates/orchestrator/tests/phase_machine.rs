//! Deadline, nudge, auto-resolve and pause/resume behavior of the phase
//! state machine, driven on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use concord_domain::capability::RulesEngine;
use concord_domain::config::{OrchestratorConfig, OrchestratorConfigPatch};
use concord_domain::error::Error;
use concord_domain::event::{GameEvent, GameEventKind};
use concord_domain::game::Power;
use concord_engine::BasicEngine;
use concord_orchestrator::{AgentHandle, EventBus, PhaseOrchestrator, SharedGameState};

fn quick_config() -> OrchestratorConfig {
    OrchestratorConfig {
        diplomacy_phase_duration_ms: 5_000,
        min_phase_duration_ms: 100,
        nudge_before_deadline_ms: 1_000,
        ..Default::default()
    }
}

fn setup(config: OrchestratorConfig) -> (PhaseOrchestrator, Arc<Mutex<Vec<GameEvent>>>) {
    let engine = Arc::new(BasicEngine::new());
    let state: SharedGameState = Arc::new(Mutex::new(engine.initial_state().unwrap()));
    let orchestrator =
        PhaseOrchestrator::new("test-game", engine, state, config, EventBus::new());

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _ = orchestrator.on_event(move |e| sink.lock().push(e.clone()));

    // Auto-resolve drives the orchestrator itself; the owning session would
    // normally sit in between.
    let weak = orchestrator.downgrade();
    orchestrator.set_auto_resolve_callback(move || {
        if let Some(orch) = weak.upgrade() {
            let _ = orch.resolve_phase();
        }
    });

    (orchestrator, events)
}

fn kinds(events: &Arc<Mutex<Vec<GameEvent>>>) -> Vec<&'static str> {
    events.lock().iter().map(|e| e.kind.kind_name()).collect()
}

fn count(events: &Arc<Mutex<Vec<GameEvent>>>, kind: &str) -> usize {
    kinds(events).iter().filter(|k| **k == kind).count()
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Phase start
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn start_phase_emits_and_rejects_double_start() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();

    let status = orch.get_phase_status().unwrap();
    assert_eq!(status.year, 1901);
    assert_eq!(status.submissions.len(), 7);
    assert!(!status.nudge_sent);
    assert_eq!(count(&events, "PHASE_STARTED"), 1);

    let err = orch.start_phase().unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(count(&events, "PHASE_STARTED"), 1);
}

#[tokio::test(start_paused = true)]
async fn active_powers_cover_all_seven_at_opening() {
    let (orch, _) = setup(quick_config());
    assert_eq!(orch.get_active_powers().len(), 7);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Nudges
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn nudge_warns_every_pending_power() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();
    orch.record_submission(Power::England, 3).unwrap();

    // Nudge is due at deadline - 1000 = 4000ms.
    advance(4_100).await;

    assert_eq!(count(&events, "PHASE_ENDING_SOON"), 1);
    assert_eq!(count(&events, "AGENT_NUDGED"), 6);
    assert!(orch.get_phase_status().unwrap().nudge_sent);

    let guard = events.lock();
    let pending = guard
        .iter()
        .find_map(|e| match &e.kind {
            GameEventKind::PhaseEndingSoon { pending_powers, .. } => Some(pending_powers.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(pending.len(), 6);
    assert!(!pending.contains(&Power::England));
}

#[tokio::test(start_paused = true)]
async fn no_nudge_when_window_covers_whole_phase() {
    let config = OrchestratorConfig {
        nudge_before_deadline_ms: 30_000,
        ..quick_config()
    };
    let (orch, events) = setup(config);
    orch.start_phase().unwrap();

    advance(6_000).await;
    assert_eq!(count(&events, "PHASE_ENDING_SOON"), 0);
    assert_eq!(count(&events, "AGENT_NUDGED"), 0);
    assert_eq!(count(&events, "PHASE_ENDED"), 1);
}

#[tokio::test(start_paused = true)]
async fn nudge_skipped_when_everyone_submitted() {
    let config = OrchestratorConfig {
        auto_resolve_on_complete: false,
        ..quick_config()
    };
    let (orch, events) = setup(config);
    orch.start_phase().unwrap();
    for power in Power::ALL {
        orch.record_submission(power, 1).unwrap();
    }

    advance(4_500).await;
    assert_eq!(count(&events, "PHASE_ENDING_SOON"), 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Deadline & auto-hold
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn deadline_times_out_pending_powers_and_auto_resolves() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();
    orch.record_submission(Power::England, 3).unwrap();
    orch.record_submission(Power::France, 3).unwrap();

    advance(6_000).await;

    assert_eq!(count(&events, "AGENT_TIMEOUT"), 5);
    assert_eq!(count(&events, "PHASE_ENDED"), 1);
    assert_eq!(count(&events, "ORDERS_RESOLVED"), 1);

    let guard = events.lock();
    let timeout_powers = guard
        .iter()
        .find_map(|e| match &e.kind {
            GameEventKind::PhaseEnded { timeout_powers, .. } => Some(timeout_powers.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(timeout_powers.len(), 5);
    assert!(!timeout_powers.contains(&Power::England));
    assert!(!timeout_powers.contains(&Power::France));

    // Auto-held powers do not produce ORDERS_SUBMITTED; timeouts plus
    // submissions cover exactly the active set.
    drop(guard);
    assert_eq!(count(&events, "ORDERS_SUBMITTED"), 2);
}

#[tokio::test(start_paused = true)]
async fn timeout_without_auto_hold_leaves_phase_open() {
    let config = OrchestratorConfig {
        auto_hold_on_timeout: false,
        ..quick_config()
    };
    let (orch, events) = setup(config);
    orch.start_phase().unwrap();

    advance(6_000).await;

    assert_eq!(count(&events, "AGENT_TIMEOUT"), 7);
    assert_eq!(count(&events, "PHASE_ENDED"), 1);
    assert_eq!(count(&events, "ORDERS_RESOLVED"), 0);
    // Phase bookkeeping survives for a manual resolve.
    let status = orch.get_phase_status().unwrap();
    assert_eq!(status.pending_powers().len(), 7);
}

#[tokio::test(start_paused = true)]
async fn deadline_marks_agents_unresponsive_and_inactive() {
    let (orch, events) = setup(quick_config());
    let mut handle = AgentHandle::new(Power::Germany, "llm-germany");
    handle.missed_deadlines = 2;
    orch.register_agent(handle);
    orch.start_phase().unwrap();

    advance(6_000).await;

    let agent = orch.get_agent(Power::Germany).unwrap();
    assert!(!agent.is_responsive);
    assert_eq!(agent.missed_deadlines, 3);

    let guard = events.lock();
    let inactive = guard
        .iter()
        .find_map(|e| match &e.kind {
            GameEventKind::AgentInactive {
                power,
                missed_deadlines,
            } => Some((*power, *missed_deadlines)),
            _ => None,
        })
        .unwrap();
    assert_eq!(inactive, (Power::Germany, 3));
}

#[tokio::test(start_paused = true)]
async fn submission_resets_missed_deadline_counter() {
    let (orch, _) = setup(quick_config());
    let mut handle = AgentHandle::new(Power::Italy, "llm-italy");
    handle.missed_deadlines = 2;
    handle.is_responsive = false;
    orch.register_agent(handle);
    orch.start_phase().unwrap();

    orch.record_submission(Power::Italy, 3).unwrap();

    let agent = orch.get_agent(Power::Italy).unwrap();
    assert!(agent.is_responsive);
    assert_eq!(agent.missed_deadlines, 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auto-resolve floor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn all_orders_received_defers_resolution_to_floor() {
    let config = OrchestratorConfig {
        min_phase_duration_ms: 1_000,
        ..quick_config()
    };
    let (orch, events) = setup(config);
    orch.start_phase().unwrap();
    for power in Power::ALL {
        orch.record_submission(power, 1).unwrap();
    }

    assert_eq!(count(&events, "ALL_ORDERS_RECEIVED"), 1);
    assert!(!orch.should_auto_resolve());

    advance(500).await;
    assert_eq!(count(&events, "ORDERS_RESOLVED"), 0, "floor not reached yet");

    advance(600).await;
    assert_eq!(count(&events, "ORDERS_RESOLVED"), 1);
    assert!(orch.get_phase_status().is_none());
}

#[tokio::test(start_paused = true)]
async fn resolution_is_immediate_once_past_floor() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();

    advance(200).await; // past the 100ms floor
    for power in Power::ALL {
        orch.record_submission(power, 1).unwrap();
    }
    assert!(orch.should_auto_resolve());

    tokio::task::yield_now().await;
    assert_eq!(count(&events, "ORDERS_RESOLVED"), 1);
}

#[tokio::test(start_paused = true)]
async fn all_orders_received_emitted_at_most_once() {
    let config = OrchestratorConfig {
        auto_resolve_on_complete: false,
        ..quick_config()
    };
    let (orch, events) = setup(config);
    orch.start_phase().unwrap();
    for power in Power::ALL {
        orch.record_submission(power, 1).unwrap();
    }
    // A revised submission after completion must not re-fire the event.
    orch.record_submission(Power::England, 4).unwrap();

    assert_eq!(count(&events, "ALL_ORDERS_RECEIVED"), 1);
    assert_eq!(count(&events, "ORDERS_SUBMITTED"), 8);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manual resolve & state errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn manual_resolve_clears_phase_and_rejects_second_call() {
    let config = OrchestratorConfig {
        auto_resolve_on_complete: false,
        ..quick_config()
    };
    let (orch, events) = setup(config);
    orch.start_phase().unwrap();

    let summary = orch.resolve_phase().unwrap();
    assert_eq!(summary.successful_moves, 0);
    assert_eq!(count(&events, "ORDERS_RESOLVED"), 1);
    assert!(orch.get_phase_status().is_none());

    assert!(matches!(
        orch.resolve_phase(),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        orch.record_submission(Power::England, 1),
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn submission_for_inactive_power_is_rejected() {
    use concord_domain::capability::RulesEngine;
    use concord_domain::game::{DislodgedUnit, PhaseKind, Unit, UnitKind};

    // Retreat phase with a single dislodged Austrian: only Austria acts.
    let engine = Arc::new(BasicEngine::new());
    let mut state = engine.initial_state().unwrap();
    state.phase = PhaseKind::Retreat;
    state.units.retain(|u| u.province != "VIE");
    state.dislodged.push(DislodgedUnit {
        unit: Unit {
            kind: UnitKind::Army,
            power: Power::Austria,
            province: "VIE".into(),
        },
        attacker_province: "BUD".into(),
    });
    let state: SharedGameState = Arc::new(Mutex::new(state));
    let orch = PhaseOrchestrator::new(
        "retreat-game",
        engine,
        state,
        quick_config(),
        EventBus::new(),
    );

    orch.start_phase().unwrap();
    assert_eq!(
        orch.get_phase_status().unwrap().submissions.len(),
        1,
        "only Austria is active"
    );
    assert!(matches!(
        orch.record_submission(Power::England, 1),
        Err(Error::InvalidState(_))
    ));
    orch.record_submission(Power::Austria, 1).unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pause / resume
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn pause_silences_timers_but_keeps_status() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();

    advance(1_000).await;
    orch.pause();
    let status = orch.get_phase_status().unwrap();

    advance(20_000).await;
    assert_eq!(count(&events, "PHASE_ENDED"), 0);
    assert_eq!(orch.get_phase_status().unwrap(), status);
}

#[tokio::test(start_paused = true)]
async fn resume_after_missed_deadline_fires_immediately() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();

    advance(1_000).await;
    orch.pause();
    advance(20_000).await; // deadline long gone

    orch.resume();
    tokio::task::yield_now().await;
    assert_eq!(count(&events, "AGENT_TIMEOUT"), 7);
    assert_eq!(count(&events, "PHASE_ENDED"), 1);
}

#[tokio::test(start_paused = true)]
async fn resume_before_deadline_rearms_remaining_time() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();

    advance(1_000).await;
    orch.pause();
    advance(2_000).await;
    orch.resume();

    // Deadline was fixed at t=5000; 2000ms remain after the pause window.
    advance(1_500).await;
    assert_eq!(count(&events, "PHASE_ENDED"), 0);
    advance(600).await;
    assert_eq!(count(&events, "PHASE_ENDED"), 1);
    // The nudge (due at t=4000) also survived the pause.
    assert_eq!(count(&events, "PHASE_ENDING_SOON"), 1);
}

#[tokio::test(start_paused = true)]
async fn force_deadline_short_circuits_the_timer() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();

    orch.force_deadline();
    tokio::task::yield_now().await;

    assert_eq!(count(&events, "AGENT_TIMEOUT"), 7);
    assert_eq!(count(&events, "ORDERS_RESOLVED"), 1);

    // The original deadline must not fire again.
    advance(10_000).await;
    assert_eq!(count(&events, "PHASE_ENDED"), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn get_config_returns_a_detached_copy() {
    let (orch, _) = setup(quick_config());
    let mut copy = orch.get_config();
    copy.max_missed_deadlines = 99;
    assert_eq!(orch.get_config().max_missed_deadlines, 3);

    orch.update_config(&OrchestratorConfigPatch {
        max_missed_deadlines: Some(5),
        ..Default::default()
    });
    assert_eq!(orch.get_config().max_missed_deadlines, 5);
    // Patch leaves the rest untouched.
    assert_eq!(orch.get_config().diplomacy_phase_duration_ms, 5_000);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event uniqueness per phase instance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn lifecycle_events_are_unique_per_phase_instance() {
    let (orch, events) = setup(quick_config());
    orch.start_phase().unwrap();
    advance(6_000).await;

    for kind in ["PHASE_STARTED", "PHASE_ENDING_SOON", "PHASE_ENDED", "ORDERS_RESOLVED"] {
        assert_eq!(count(&events, kind), 1, "{kind} must appear exactly once");
    }
    assert_eq!(count(&events, "ALL_ORDERS_RECEIVED"), 0);
}
