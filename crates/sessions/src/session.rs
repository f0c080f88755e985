//! The per-game session.
//!
//! All mutation of a game — engine state, orchestrator bookkeeping, event
//! history — funnels through one session, which serializes it. The session
//! owns the listener list; everything user-visible flows over its bus.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use concord_domain::capability::RulesEngine;
use concord_domain::config::OrchestratorConfig;
use concord_domain::error::{Error, Result};
use concord_domain::event::{GameEvent, GameEventKind};
use concord_domain::game::{GameState, GameStatus, PhaseKind, Power, ResolutionSummary};
use concord_domain::order::{BuildOrder, MovementOrder, RetreatOrder};
use concord_orchestrator::{
    EventBus, PhaseOrchestrator, SharedGameState, Subscription,
};

use crate::snapshot::GameSessionSnapshot;

/// Message previews carried on MESSAGE_SENT events are capped at this many
/// characters.
const PREVIEW_MAX_CHARS: usize = 120;

#[derive(Clone)]
pub struct GameSession {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    game_id: String,
    name: String,
    engine: Arc<dyn RulesEngine>,
    state: SharedGameState,
    orchestrator: PhaseOrchestrator,
    bus: EventBus,
    status: Mutex<GameStatus>,
    created_at: DateTime<Utc>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    completed_at: Mutex<Option<DateTime<Utc>>>,
    history: Mutex<Vec<GameEvent>>,
    /// Keeps the history-recording listener alive for the session's life.
    _history_sub: Subscription,
}

impl GameSession {
    /// Create a fresh game at the standard opening position.
    pub fn create(
        name: impl Into<String>,
        engine: Arc<dyn RulesEngine>,
        config: OrchestratorConfig,
    ) -> Result<GameSession> {
        let state = engine.initial_state()?;
        let session = Self::build(
            Uuid::new_v4().to_string(),
            name.into(),
            engine,
            state,
            config,
            GameStatus::Pending,
            Vec::new(),
            Utc::now(),
            None,
            None,
        )?;
        session.inner.emit(GameEventKind::GameCreated);
        tracing::info!(game_id = %session.game_id(), "game created");
        Ok(session)
    }

    /// Rebuild a session from a snapshot. The restored session has no live
    /// timers; if it was mid-phase, call [`GameSession::rearm_timers`] to
    /// pick the deadline back up.
    pub fn from_snapshot(
        snapshot: GameSessionSnapshot,
        engine: Arc<dyn RulesEngine>,
    ) -> Result<GameSession> {
        let session = Self::build(
            snapshot.game_id,
            snapshot.name,
            engine,
            snapshot.game_state,
            snapshot.config,
            snapshot.status,
            snapshot.event_history,
            snapshot.created_at,
            snapshot.started_at,
            snapshot.completed_at,
        )?;
        for agent in snapshot.agents {
            session.inner.orchestrator.register_agent(agent);
        }
        if let Some(phase_status) = snapshot.phase_status {
            session.inner.orchestrator.restore_phase(phase_status)?;
        }
        tracing::info!(game_id = %session.game_id(), "session restored from snapshot");
        Ok(session)
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        game_id: String,
        name: String,
        engine: Arc<dyn RulesEngine>,
        state: GameState,
        config: OrchestratorConfig,
        status: GameStatus,
        history: Vec<GameEvent>,
        created_at: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<GameSession> {
        let shared: SharedGameState = Arc::new(Mutex::new(state));
        let bus = EventBus::new();
        let orchestrator = PhaseOrchestrator::new(
            game_id.clone(),
            engine.clone(),
            shared.clone(),
            config,
            bus.clone(),
        );

        let inner = Arc::new_cyclic(|weak: &Weak<SessionInner>| {
            let recorder = weak.clone();
            let history_sub = bus.subscribe(move |event| {
                if let Some(inner) = recorder.upgrade() {
                    inner.ingest(event);
                }
            });
            SessionInner {
                game_id,
                name,
                engine,
                state: shared,
                orchestrator,
                bus,
                status: Mutex::new(status),
                created_at,
                started_at: Mutex::new(started_at),
                completed_at: Mutex::new(completed_at),
                history: Mutex::new(history),
                _history_sub: history_sub,
            }
        });

        let resolver = Arc::downgrade(&inner);
        inner.orchestrator.set_auto_resolve_callback(move || {
            if let Some(inner) = resolver.upgrade() {
                if let Err(err) = inner.resolve_and_continue() {
                    tracing::warn!(
                        game_id = %inner.game_id,
                        error = %err,
                        "auto-resolve did not complete"
                    );
                }
            }
        });

        Ok(GameSession { inner })
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    pub fn start(&self) -> Result<()> {
        self.inner.transition(GameStatus::Active)?;
        *self.inner.started_at.lock() = Some(Utc::now());

        let (year, season, phase) = {
            let state = self.inner.state.lock();
            (state.year, state.season, state.phase)
        };
        self.inner.emit(GameEventKind::GameStarted { year, season, phase });
        self.inner.orchestrator.start_phase()
    }

    pub fn pause(&self, reason: Option<String>) -> Result<()> {
        self.inner.transition(GameStatus::Paused)?;
        self.inner.orchestrator.pause();
        self.inner.emit(GameEventKind::GamePaused { reason });
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.inner.transition(GameStatus::Active)?;
        self.inner.emit(GameEventKind::GameResumed);
        self.inner.orchestrator.resume();
        Ok(())
    }

    /// Re-arm deadline/nudge timers on a restored, still-active session.
    pub fn rearm_timers(&self) -> Result<()> {
        self.inner.require_active()?;
        self.inner.orchestrator.resume();
        Ok(())
    }

    pub fn abandon(&self, reason: impl Into<String>) -> Result<()> {
        self.inner.transition(GameStatus::Abandoned)?;
        self.inner.orchestrator.clear_timers();
        *self.inner.completed_at.lock() = Some(Utc::now());
        self.inner.emit(GameEventKind::GameAbandoned {
            reason: reason.into(),
        });
        Ok(())
    }

    // ── Orders ─────────────────────────────────────────────────────

    pub fn submit_movement_orders(&self, power: Power, orders: &[MovementOrder]) -> Result<()> {
        self.inner.submit(power, orders.len(), |state, engine| {
            if !state.phase.accepts_movement_orders() {
                return Err(Error::InvalidState(format!(
                    "movement orders are not accepted during {} phase",
                    state.phase
                )));
            }
            engine.submit_movement_orders(state, power, orders)
        })
    }

    pub fn submit_retreat_orders(&self, power: Power, orders: &[RetreatOrder]) -> Result<()> {
        self.inner.submit(power, orders.len(), |state, engine| {
            if state.phase != PhaseKind::Retreat {
                return Err(Error::InvalidState(format!(
                    "retreat orders are not accepted during {} phase",
                    state.phase
                )));
            }
            engine.submit_retreat_orders(state, power, orders)
        })
    }

    pub fn submit_build_orders(&self, power: Power, orders: &[BuildOrder]) -> Result<()> {
        self.inner.submit(power, orders.len(), |state, engine| {
            if state.phase != PhaseKind::Build {
                return Err(Error::InvalidState(format!(
                    "build orders are not accepted during {} phase",
                    state.phase
                )));
            }
            engine.submit_build_orders(state, power, orders)
        })
    }

    /// Resolve the current phase and start the next one (or complete the
    /// game if a power has won).
    pub fn resolve_phase(&self) -> Result<ResolutionSummary> {
        self.inner.resolve_and_continue()
    }

    /// Run deadline handling immediately.
    pub fn force_deadline(&self) -> Result<()> {
        self.inner.require_active()?;
        self.inner.orchestrator.force_deadline();
        Ok(())
    }

    // ── Press ──────────────────────────────────────────────────────

    /// Route a press message: records and fans out MESSAGE_SENT with a
    /// preview. No negotiation semantics live here.
    pub fn send_message(
        &self,
        sender: Power,
        channel_id: impl Into<String>,
        body: &str,
    ) -> Result<()> {
        self.inner.require_active()?;
        self.inner.emit(GameEventKind::MessageSent {
            sender,
            channel_id: channel_id.into(),
            preview: preview(body),
        });
        Ok(())
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn game_id(&self) -> &str {
        &self.inner.game_id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn status(&self) -> GameStatus {
        *self.inner.status.lock()
    }

    /// A copy of the current board state.
    pub fn game_state(&self) -> GameState {
        self.inner.engine.clone_state(&self.inner.state.lock())
    }

    pub fn phase_status(&self) -> Option<concord_orchestrator::PhaseStatus> {
        self.inner.orchestrator.get_phase_status()
    }

    pub fn orchestrator(&self) -> &PhaseOrchestrator {
        &self.inner.orchestrator
    }

    pub fn on_event(
        &self,
        callback: impl Fn(&GameEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe(callback)
    }

    pub fn event_history(&self) -> Vec<GameEvent> {
        self.inner.history.lock().clone()
    }

    pub fn event_history_len(&self) -> usize {
        self.inner.history.lock().len()
    }

    // ── Snapshots ──────────────────────────────────────────────────

    /// A self-contained, secret-free value describing the whole session.
    pub fn snapshot(&self) -> GameSessionSnapshot {
        GameSessionSnapshot {
            game_id: self.inner.game_id.clone(),
            name: self.inner.name.clone(),
            status: self.status(),
            game_state: self.game_state(),
            phase_status: self.inner.orchestrator.get_phase_status(),
            agents: self.inner.orchestrator.agents(),
            event_history: self.event_history(),
            config: self.inner.orchestrator.get_config(),
            created_at: self.inner.created_at,
            started_at: *self.inner.started_at.lock(),
            completed_at: *self.inner.completed_at.lock(),
        }
    }
}

impl SessionInner {
    fn emit(&self, kind: GameEventKind) {
        let event = GameEvent::now(self.game_id.clone(), kind);
        self.bus.publish(&event);
    }

    /// History recorder, subscribed first on the bus. Also the watchdog
    /// that pauses the game when the orchestrator reports an engine
    /// failure.
    fn ingest(&self, event: &GameEvent) {
        self.history.lock().push(event.clone());

        if let GameEventKind::Error { kind, .. } = &event.kind {
            if kind == "engine_failure" {
                self.pause_on_engine_failure();
            }
        }
    }

    fn pause_on_engine_failure(&self) {
        let paused = {
            let mut status = self.status.lock();
            if *status == GameStatus::Active {
                *status = GameStatus::Paused;
                true
            } else {
                false
            }
        };
        if paused {
            tracing::error!(game_id = %self.game_id, "engine failure: pausing game");
            self.orchestrator.pause();
            self.emit(GameEventKind::GamePaused {
                reason: Some("engine failure".into()),
            });
        }
    }

    fn require_active(&self) -> Result<()> {
        let status = *self.status.lock();
        if status != GameStatus::Active {
            return Err(Error::InvalidState(format!(
                "operation requires an active game (status: {status})"
            )));
        }
        Ok(())
    }

    fn transition(&self, to: GameStatus) -> Result<()> {
        let mut status = self.status.lock();
        if !status.can_transition_to(to) {
            return Err(Error::InvalidState(format!(
                "cannot transition from {status} to {to}"
            )));
        }
        *status = to;
        Ok(())
    }

    /// Shared submission path: status guard, engine validation under the
    /// state lock, then orchestrator bookkeeping. An engine rejection emits
    /// an ERROR event and leaves the submission status untouched.
    fn submit(
        &self,
        power: Power,
        order_count: usize,
        record: impl FnOnce(&mut GameState, &dyn RulesEngine) -> Result<()>,
    ) -> Result<()> {
        self.require_active()?;

        let outcome = {
            let mut state = self.state.lock();
            record(&mut state, self.engine.as_ref())
        };
        if let Err(err) = outcome {
            if matches!(err, Error::InvalidInput(_) | Error::Engine(_)) {
                self.emit(GameEventKind::Error {
                    kind: "order_rejected".into(),
                    message: err.to_string(),
                });
            }
            return Err(err);
        }

        self.orchestrator.record_submission(power, order_count)
    }

    /// Resolve, then either complete the game or start the next phase.
    pub(crate) fn resolve_and_continue(&self) -> Result<ResolutionSummary> {
        self.require_active()?;
        let summary = self.orchestrator.resolve_phase()?;

        let (victor, final_year) = {
            let state = self.state.lock();
            (state.victor(), state.year)
        };

        match victor {
            Some(winner) => {
                // can_transition_to(Completed) holds: we just checked Active.
                self.transition(GameStatus::Completed)?;
                self.orchestrator.clear_timers();
                *self.completed_at.lock() = Some(Utc::now());
                tracing::info!(game_id = %self.game_id, winner = %winner, "game completed");
                self.emit(GameEventKind::GameCompleted {
                    winner: Some(winner),
                    is_draw: false,
                    final_year,
                });
            }
            None => self.orchestrator.start_phase()?,
        }
        Ok(summary)
    }
}

fn preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_MAX_CHARS {
        body.to_string()
    } else {
        let mut preview: String = body.chars().take(PREVIEW_MAX_CHARS - 3).collect();
        preview.push_str("...");
        preview
    }
}
