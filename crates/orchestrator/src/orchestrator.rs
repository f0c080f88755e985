//! The phase/deadline state machine for one game.
//!
//! Phase-level lifecycle: idle → running (`start_phase`) → nudged (nudge
//! timer, when anyone is pending) → resolving (`resolve_phase`, reached via
//! the auto-resolve callback, the deadline handler, or a manual call) →
//! idle. The orchestrator owns its three timer slots exclusively; starting
//! a phase clears whatever the previous phase left armed.
//!
//! The game state cell is shared with the owning session; it is locked only
//! inside synchronous sections, never across an await.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use concord_domain::capability::RulesEngine;
use concord_domain::config::{OrchestratorConfig, OrchestratorConfigPatch};
use concord_domain::error::{Error, Result};
use concord_domain::event::{GameEvent, GameEventKind, TimeoutAction};
use concord_domain::game::{
    diff_supply_centers, GameState, PhaseKind, Power, ResolutionSummary,
};

use crate::bus::{EventBus, Subscription};
use crate::defaults;
use crate::phase::{AgentHandle, PhaseStatus, SubmissionStatus};
use crate::timer::TimerSlot;

/// The single-writer cell holding a session's board state.
pub type SharedGameState = Arc<Mutex<GameState>>;

type ResolveCallback = Arc<dyn Fn() + Send + Sync>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct PhaseOrchestrator {
    inner: Arc<Inner>,
}

/// Weak handle for callbacks that must not keep the orchestrator alive.
#[derive(Clone)]
pub struct WeakPhaseOrchestrator {
    inner: Weak<Inner>,
}

impl WeakPhaseOrchestrator {
    pub fn upgrade(&self) -> Option<PhaseOrchestrator> {
        self.inner.upgrade().map(|inner| PhaseOrchestrator { inner })
    }
}

struct Inner {
    game_id: String,
    engine: Arc<dyn RulesEngine>,
    state: SharedGameState,
    bus: EventBus,
    config: RwLock<OrchestratorConfig>,
    phase: Mutex<Option<PhaseBook>>,
    agents: Mutex<std::collections::BTreeMap<Power, AgentHandle>>,
    resolve_cb: Mutex<Option<ResolveCallback>>,
    deadline_timer: TimerSlot,
    nudge_timer: TimerSlot,
    resolve_timer: TimerSlot,
}

/// Live phase bookkeeping plus the monotonic anchors the timers use.
struct PhaseBook {
    status: PhaseStatus,
    started_at: Instant,
    deadline_at: Instant,
    all_received_emitted: bool,
    ended_emitted: bool,
    resolving: bool,
}

impl PhaseOrchestrator {
    pub fn new(
        game_id: impl Into<String>,
        engine: Arc<dyn RulesEngine>,
        state: SharedGameState,
        config: OrchestratorConfig,
        bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                game_id: game_id.into(),
                engine,
                state,
                bus,
                config: RwLock::new(config),
                phase: Mutex::new(None),
                agents: Mutex::new(Default::default()),
                resolve_cb: Mutex::new(None),
                deadline_timer: TimerSlot::new("deadline"),
                nudge_timer: TimerSlot::new("nudge"),
                resolve_timer: TimerSlot::new("auto-resolve"),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakPhaseOrchestrator {
        WeakPhaseOrchestrator {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn game_id(&self) -> &str {
        &self.inner.game_id
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn on_event(
        &self,
        callback: impl Fn(&GameEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe(callback)
    }

    pub fn set_auto_resolve_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.inner.resolve_cb.lock() = Some(Arc::new(callback));
    }

    // ── Phase lifecycle ────────────────────────────────────────────

    /// Begin the phase the game state currently points at. Fails with
    /// `InvalidState` if a phase is already running.
    pub fn start_phase(&self) -> Result<()> {
        let inner = &self.inner;
        let cfg = inner.config.read().clone();

        let (event, duration, no_active_powers) = {
            let mut guard = inner.phase.lock();
            if guard.is_some() {
                return Err(Error::InvalidState(
                    "a phase is already in progress".into(),
                ));
            }

            let state = inner.state.lock();
            let (year, season, kind) = (state.year, state.season, state.phase);
            let active = Self::active_powers_for(&state, kind);
            drop(state);

            let duration = Duration::from_millis(cfg.phase_duration_ms(kind));
            let now_wall = Utc::now();
            let deadline_ts =
                now_wall + chrono::Duration::milliseconds(duration.as_millis() as i64);

            let status = PhaseStatus {
                year,
                season,
                phase: kind,
                deadline_ts,
                started_at_ts: now_wall,
                submissions: active
                    .iter()
                    .map(|p| (*p, SubmissionStatus::pending(*p)))
                    .collect(),
                nudge_sent: false,
            };
            let now = Instant::now();
            *guard = Some(PhaseBook {
                status,
                started_at: now,
                deadline_at: now + duration,
                all_received_emitted: false,
                ended_emitted: false,
                resolving: false,
            });

            (
                GameEventKind::PhaseStarted {
                    year,
                    season,
                    phase: kind,
                    deadline: deadline_ts,
                    active_powers: active.clone(),
                },
                duration,
                active.is_empty(),
            )
        };

        // The previous phase's timers must be dead before this phase arms
        // its own.
        inner.deadline_timer.cancel();
        inner.nudge_timer.cancel();
        inner.resolve_timer.cancel();
        Inner::arm_deadline(inner, duration);
        let nudge = Duration::from_millis(cfg.nudge_before_deadline_ms);
        if nudge < duration {
            Inner::arm_nudge(inner, duration - nudge);
        }

        tracing::info!(
            game_id = %inner.game_id,
            duration_ms = duration.as_millis() as u64,
            "phase started"
        );
        inner.emit(event);

        // A phase with no active powers is complete by definition.
        if no_active_powers {
            Inner::maybe_auto_resolve(inner);
        }
        Ok(())
    }

    /// Record a completed submission for `power` in the running phase.
    pub fn record_submission(&self, power: Power, order_count: usize) -> Result<()> {
        let inner = &self.inner;
        let (completed, year, season, kind) = {
            let mut guard = inner.phase.lock();
            let book = guard
                .as_mut()
                .ok_or_else(|| Error::InvalidState("no phase in progress".into()))?;
            let sub = book.status.submissions.get_mut(&power).ok_or_else(|| {
                Error::InvalidState(format!("{power} is not active this phase"))
            })?;
            sub.submitted = true;
            sub.submitted_at = Some(Utc::now());
            sub.order_count = order_count;

            let completed = book.status.all_submitted() && !book.all_received_emitted;
            if completed {
                book.all_received_emitted = true;
            }
            (
                completed,
                book.status.year,
                book.status.season,
                book.status.phase,
            )
        };

        {
            let mut agents = inner.agents.lock();
            if let Some(agent) = agents.get_mut(&power) {
                agent.missed_deadlines = 0;
                agent.is_responsive = true;
                agent.last_activity_ts = Utc::now();
            }
        }

        inner.emit(GameEventKind::OrdersSubmitted { power, order_count });

        if completed {
            inner.emit(GameEventKind::AllOrdersReceived {
                year,
                season,
                phase: kind,
            });
            Inner::maybe_auto_resolve(inner);
        }
        Ok(())
    }

    /// Resolve the running phase through the rules engine, emit
    /// `ORDERS_RESOLVED`, and clear the phase. The session starts the next
    /// phase; the orchestrator never chains them itself.
    pub fn resolve_phase(&self) -> Result<ResolutionSummary> {
        let inner = &self.inner;
        let (year, season, kind) = {
            let mut guard = inner.phase.lock();
            let book = guard
                .as_mut()
                .ok_or_else(|| Error::InvalidState("no phase in progress".into()))?;
            if book.resolving {
                return Err(Error::InvalidState("phase is already resolving".into()));
            }
            book.resolving = true;
            (book.status.year, book.status.season, book.status.phase)
        };

        let outcome = {
            let mut state = inner.state.lock();
            let before = state.supply_centers.clone();
            let report = match kind {
                PhaseKind::Diplomacy | PhaseKind::Movement => {
                    inner.engine.resolve_movement(&mut state)
                }
                PhaseKind::Retreat => inner.engine.resolve_retreats(&mut state),
                PhaseKind::Build => inner.engine.resolve_builds(&mut state),
            };
            report.map(|r| (r, diff_supply_centers(&before, &state.supply_centers)))
        };

        match outcome {
            Ok((report, supply_changes)) => {
                inner.deadline_timer.cancel();
                inner.nudge_timer.cancel();
                inner.resolve_timer.cancel();
                *inner.phase.lock() = None;

                let summary = ResolutionSummary::from_report(report, supply_changes);
                inner.emit(GameEventKind::OrdersResolved {
                    year,
                    season,
                    phase: kind,
                    summary: summary.clone(),
                });
                Ok(summary)
            }
            Err(err) => {
                // The engine is deterministic on valid state; do not retry.
                tracing::error!(
                    game_id = %inner.game_id,
                    error = %err,
                    "engine failed during resolution"
                );
                if let Some(book) = inner.phase.lock().as_mut() {
                    book.resolving = false;
                }
                inner.emit(GameEventKind::Error {
                    kind: "engine_failure".into(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Run deadline handling now, regardless of the timer.
    pub fn force_deadline(&self) {
        self.inner.deadline_timer.cancel();
        self.inner.nudge_timer.cancel();
        Inner::handle_deadline(&self.inner);
    }

    /// Cancel the timers but keep the phase bookkeeping.
    pub fn pause(&self) {
        self.clear_timers();
    }

    /// Re-arm timers from the preserved deadline. If the deadline already
    /// passed (while paused, or across a snapshot restore), deadline
    /// handling runs immediately.
    pub fn resume(&self) {
        let inner = &self.inner;
        let cfg = inner.config.read().clone();

        enum Action {
            Nothing,
            DeadlineNow,
            Rearm {
                remaining: Duration,
                nudge_in: Option<Duration>,
            },
        }

        let action = {
            let guard = inner.phase.lock();
            match guard.as_ref() {
                None => Action::Nothing,
                Some(book) => {
                    let remaining = book
                        .deadline_at
                        .checked_duration_since(Instant::now())
                        .unwrap_or(Duration::ZERO);
                    if remaining.is_zero() {
                        Action::DeadlineNow
                    } else {
                        let nudge = Duration::from_millis(cfg.nudge_before_deadline_ms);
                        let duration =
                            Duration::from_millis(cfg.phase_duration_ms(book.status.phase));
                        let nudge_in = (!book.status.nudge_sent && nudge < duration)
                            .then(|| remaining.saturating_sub(nudge));
                        Action::Rearm { remaining, nudge_in }
                    }
                }
            }
        };

        match action {
            Action::Nothing => {}
            Action::DeadlineNow => Inner::handle_deadline(inner),
            Action::Rearm { remaining, nudge_in } => {
                Inner::arm_deadline(inner, remaining);
                if let Some(delay) = nudge_in {
                    Inner::arm_nudge(inner, delay);
                }
                // A resolve scheduled before the pause was cancelled with
                // the other timers; re-evaluate it.
                Inner::maybe_auto_resolve(inner);
            }
        }
    }

    pub fn clear_timers(&self) {
        self.inner.deadline_timer.cancel();
        self.inner.nudge_timer.cancel();
        self.inner.resolve_timer.cancel();
    }

    /// Adopt phase bookkeeping from a snapshot. No timers are armed; the
    /// caller invokes [`PhaseOrchestrator::resume`] to re-arm them.
    pub fn restore_phase(&self, status: PhaseStatus) -> Result<()> {
        let mut guard = self.inner.phase.lock();
        if guard.is_some() {
            return Err(Error::InvalidState("a phase is already in progress".into()));
        }
        let now_wall = Utc::now();
        let remaining = (status.deadline_ts - now_wall)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let since_start = (now_wall - status.started_at_ts)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let now = Instant::now();
        let all_received_emitted = status.all_submitted();
        *guard = Some(PhaseBook {
            status,
            started_at: now.checked_sub(since_start).unwrap_or(now),
            deadline_at: now + remaining,
            all_received_emitted,
            ended_emitted: false,
            resolving: false,
        });
        Ok(())
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn get_phase_status(&self) -> Option<PhaseStatus> {
        self.inner.phase.lock().as_ref().map(|b| b.status.clone())
    }

    /// Powers that must act in the game state's current phase.
    pub fn get_active_powers(&self) -> Vec<Power> {
        let state = self.inner.state.lock();
        Self::active_powers_for(&state, state.phase)
    }

    /// True when every active power has submitted and the minimum phase
    /// floor has elapsed.
    pub fn should_auto_resolve(&self) -> bool {
        let floor =
            Duration::from_millis(self.inner.config.read().min_phase_duration_ms);
        self.inner.phase.lock().as_ref().is_some_and(|book| {
            book.status.all_submitted() && book.started_at.elapsed() >= floor
        })
    }

    /// A copy of the live config; mutation goes through
    /// [`PhaseOrchestrator::update_config`].
    pub fn get_config(&self) -> OrchestratorConfig {
        self.inner.config.read().clone()
    }

    pub fn update_config(&self, patch: &OrchestratorConfigPatch) {
        self.inner.config.write().apply(patch);
    }

    // ── Agents ─────────────────────────────────────────────────────

    pub fn register_agent(&self, handle: AgentHandle) {
        self.inner.agents.lock().insert(handle.power, handle);
    }

    pub fn get_agent(&self, power: Power) -> Option<AgentHandle> {
        self.inner.agents.lock().get(&power).cloned()
    }

    pub fn agents(&self) -> Vec<AgentHandle> {
        self.inner.agents.lock().values().cloned().collect()
    }

    pub fn mark_agent_active(&self, power: Power) {
        if let Some(agent) = self.inner.agents.lock().get_mut(&power) {
            agent.is_responsive = true;
            agent.last_activity_ts = Utc::now();
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn active_powers_for(state: &GameState, kind: PhaseKind) -> Vec<Power> {
        match kind {
            PhaseKind::Diplomacy | PhaseKind::Movement => state.powers_with_units(),
            PhaseKind::Retreat => state.powers_with_dislodged(),
            PhaseKind::Build => state.powers_with_adjustments(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timer handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Inner {
    fn emit(&self, kind: GameEventKind) {
        let event = GameEvent::now(self.game_id.clone(), kind);
        tracing::debug!(
            game_id = %self.game_id,
            event = event.kind.kind_name(),
            "emit"
        );
        self.bus.publish(&event);
    }

    fn arm_deadline(inner: &Arc<Inner>, delay: Duration) {
        let weak = Arc::downgrade(inner);
        inner.deadline_timer.arm(delay, async move {
            if let Some(inner) = weak.upgrade() {
                Inner::handle_deadline(&inner);
            }
        });
    }

    fn arm_nudge(inner: &Arc<Inner>, delay: Duration) {
        let weak = Arc::downgrade(inner);
        inner.nudge_timer.arm(delay, async move {
            if let Some(inner) = weak.upgrade() {
                Inner::handle_nudge(&inner);
            }
        });
    }

    /// Nudge timer: warn every pending power that the deadline is close.
    fn handle_nudge(inner: &Arc<Inner>) {
        let snapshot = {
            let mut guard = inner.phase.lock();
            let Some(book) = guard.as_mut() else { return };
            let pending = book.status.pending_powers();
            if pending.is_empty() {
                return;
            }
            book.status.nudge_sent = true;
            let remaining = book
                .deadline_at
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::ZERO);
            (
                book.status.year,
                book.status.season,
                book.status.phase,
                book.status.deadline_ts,
                remaining.as_millis() as u64,
                pending,
            )
        };
        let (year, season, phase, deadline, time_remaining_ms, pending) = snapshot;

        inner.emit(GameEventKind::PhaseEndingSoon {
            year,
            season,
            phase,
            deadline,
            time_remaining_ms,
            pending_powers: pending.clone(),
        });
        for power in pending {
            inner.emit(GameEventKind::AgentNudged {
                power,
                deadline,
                time_remaining_ms,
            });
        }
    }

    /// Deadline timer: time out the laggards, auto-submit defaults, close
    /// the phase, and (configuration permitting) request resolution.
    fn handle_deadline(inner: &Arc<Inner>) {
        let cfg = inner.config.read().clone();

        let (year, season, kind, pending) = {
            let mut guard = inner.phase.lock();
            let Some(book) = guard.as_mut() else { return };
            if book.ended_emitted {
                return;
            }
            book.ended_emitted = true;
            (
                book.status.year,
                book.status.season,
                book.status.phase,
                book.status.pending_powers(),
            )
        };

        let action = if cfg.auto_hold_on_timeout {
            TimeoutAction::AutoHold
        } else {
            TimeoutAction::None
        };

        for power in &pending {
            inner.emit(GameEventKind::AgentTimeout {
                power: *power,
                phase: kind,
                action,
            });

            let inactive = {
                let mut agents = inner.agents.lock();
                agents.get_mut(power).and_then(|agent| {
                    agent.missed_deadlines += 1;
                    agent.is_responsive = false;
                    (agent.missed_deadlines >= cfg.max_missed_deadlines)
                        .then_some(agent.missed_deadlines)
                })
            };
            if let Some(missed_deadlines) = inactive {
                inner.emit(GameEventKind::AgentInactive {
                    power: *power,
                    missed_deadlines,
                });
            }
        }

        if cfg.auto_hold_on_timeout {
            for power in &pending {
                let submitted = {
                    let mut state = inner.state.lock();
                    defaults::submit_default_orders(inner.engine.as_ref(), &mut state, *power)
                };
                match submitted {
                    Ok(order_count) => {
                        let mut guard = inner.phase.lock();
                        if let Some(sub) = guard
                            .as_mut()
                            .and_then(|b| b.status.submissions.get_mut(power))
                        {
                            sub.submitted = true;
                            sub.submitted_at = Some(Utc::now());
                            sub.order_count = order_count;
                        }
                    }
                    Err(err) => {
                        tracing::error!(
                            game_id = %inner.game_id,
                            power = %power,
                            error = %err,
                            "engine rejected default orders"
                        );
                        inner.emit(GameEventKind::Error {
                            kind: "engine_failure".into(),
                            message: err.to_string(),
                        });
                        return;
                    }
                }
            }
        }

        inner.emit(GameEventKind::PhaseEnded {
            year,
            season,
            phase: kind,
            timeout_powers: pending,
        });

        if cfg.auto_hold_on_timeout && cfg.auto_resolve_on_complete {
            Inner::maybe_auto_resolve(inner);
        }
    }

    /// If the phase is complete, request resolution — now when the floor
    /// has elapsed, otherwise via the auto-resolve timer. The callback is
    /// always invoked from a spawned task so a submission that completes
    /// the set cannot re-enter its caller.
    fn maybe_auto_resolve(inner: &Arc<Inner>) {
        let cfg = inner.config.read().clone();
        if !cfg.auto_resolve_on_complete {
            return;
        }

        let defer = {
            let guard = inner.phase.lock();
            let Some(book) = guard.as_ref() else { return };
            if !book.status.all_submitted() {
                return;
            }
            let floor = Duration::from_millis(cfg.min_phase_duration_ms);
            let elapsed = book.started_at.elapsed();
            (elapsed < floor).then(|| floor - elapsed)
        };

        match defer {
            None => {
                let weak = Arc::downgrade(inner);
                tokio::spawn(async move {
                    if let Some(inner) = weak.upgrade() {
                        Inner::run_resolve_callback(&inner);
                    }
                });
            }
            Some(delay) => {
                let weak = Arc::downgrade(inner);
                inner.resolve_timer.arm(delay, async move {
                    if let Some(inner) = weak.upgrade() {
                        let ready = inner
                            .phase
                            .lock()
                            .as_ref()
                            .is_some_and(|b| b.status.all_submitted() && !b.resolving);
                        if ready {
                            Inner::run_resolve_callback(&inner);
                        }
                    }
                });
            }
        }
    }

    fn run_resolve_callback(inner: &Arc<Inner>) {
        let callback = inner.resolve_cb.lock().clone();
        match callback {
            Some(callback) => callback(),
            None => tracing::debug!(
                game_id = %inner.game_id,
                "auto-resolve requested but no callback is registered"
            ),
        }
    }
}
