//! Live accrual ticker: anchored extrapolation between reconciliations.
//!
//! A ticker owns one displayed number. Expensive reconciliations run through
//! the [`YieldCalculator`] whenever inputs change; each one carries a
//! generation and only the latest issued generation may replace the anchor.
//! Between reconciliations a synchronous tick extrapolates from the anchor
//! (or re-evaluates the closed form in `TotalUsd` mode) without any I/O.

use super::calculator::{interest, total_usd, Evaluation, YieldCalculator, YieldRequest};
use super::clock::Clock;
use crate::domain::{
    history_fingerprint, Decimal, DepositEvent, OwnerId, Timestamp, VaultId, YieldMode,
    YieldSnapshot,
};
use crate::error::AccrualError;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Inputs of one ticker, replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerInputs {
    pub owner: OwnerId,
    pub vault: VaultId,
    pub asset_decimals: u32,
    /// Share balance in token units.
    pub balance: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    pub apy_percent: Option<Decimal>,
    pub last_activity_timestamp: Option<Timestamp>,
    /// Known history; None lets the calculator fetch it.
    pub deposit_history: Option<Vec<DepositEvent>>,
}

impl TickerInputs {
    pub fn new(owner: OwnerId, vault: VaultId, asset_decimals: u32) -> Self {
        Self {
            owner,
            vault,
            asset_decimals,
            balance: None,
            exchange_rate: None,
            apy_percent: None,
            last_activity_timestamp: None,
            deposit_history: None,
        }
    }

    fn has_balance(&self) -> bool {
        self.balance.unwrap_or_default().is_positive()
    }
}

/// Checkpoint the display extrapolates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualAnchor {
    pub value: Decimal,
    pub time: Timestamp,
    /// Principal implied by the reconciliation that produced this anchor.
    pub principal: Decimal,
    pub generation: u64,
}

/// Lifecycle of a ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerState {
    /// No positive balance; displays zero.
    Empty,
    /// A reconciliation is in flight. The prior anchor, if any, keeps the
    /// display moving meanwhile.
    Reconciling {
        generation: u64,
        prior: Option<AccrualAnchor>,
    },
    /// A reconciliation committed and no tick has run since.
    Anchored { anchor: AccrualAnchor },
    /// Displaying extrapolated values.
    Ticking {
        anchor: AccrualAnchor,
        displayed: Decimal,
    },
}

impl TickerState {
    /// The anchor the display currently extrapolates from.
    pub fn anchor(&self) -> Option<AccrualAnchor> {
        match self {
            TickerState::Empty => None,
            TickerState::Reconciling { prior, .. } => *prior,
            TickerState::Anchored { anchor } | TickerState::Ticking { anchor, .. } => Some(*anchor),
        }
    }
}

/// What happened to a reconciliation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The result replaced the anchor.
    Committed(AccrualAnchor),
    /// A newer reconciliation was issued (or the ticker was shut down).
    Stale { generation: u64, latest: u64 },
    /// Zero growth against a positive balance; prior anchor kept.
    Suppressed(AccrualError),
}

/// A reconciliation that has been issued but not yet committed.
#[derive(Debug, Clone)]
pub struct ReconcileTicket {
    pub generation: u64,
    pub request: YieldRequest,
}

/// Inputs that decide whether a reconciliation is due. APY and time are
/// bucketed so small drifts do not trigger a recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReconcileKey {
    balance: Option<Decimal>,
    exchange_rate: Option<Decimal>,
    apy_cents: Option<Decimal>,
    last_activity: Option<Timestamp>,
    history: Option<String>,
    day: i64,
}

impl ReconcileKey {
    fn of(inputs: &TickerInputs, now: Timestamp) -> Self {
        Self {
            balance: inputs.balance,
            exchange_rate: inputs.exchange_rate,
            apy_cents: inputs.apy_percent.map(|apy| apy.round_dp(2)),
            last_activity: inputs.last_activity_timestamp,
            history: inputs.deposit_history.as_deref().map(history_fingerprint),
            day: now.day_bucket(),
        }
    }
}

#[derive(Debug)]
struct TickerCore {
    inputs: Option<TickerInputs>,
    state: TickerState,
    issued: u64,
    last_key: Option<ReconcileKey>,
    disposed: bool,
}

#[derive(Debug)]
struct Shared {
    mode: YieldMode,
    calculator: Arc<YieldCalculator>,
    clock: Arc<dyn Clock>,
    core: Mutex<TickerCore>,
    display: watch::Sender<Decimal>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn core(&self) -> MutexGuard<'_, TickerCore> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    fn set_inputs(&self, inputs: TickerInputs) -> Option<ReconcileTicket> {
        let now = self.clock.now();
        let mut core = self.core();
        if core.disposed {
            return None;
        }

        if !inputs.has_balance() {
            if core.state != TickerState::Empty {
                debug!(vault = %inputs.vault, mode = %self.mode, "balance gone, ticker empty");
            }
            // Invalidate anything still in flight.
            core.issued += 1;
            core.state = TickerState::Empty;
            core.last_key = None;
            core.inputs = Some(inputs);
            drop(core);
            self.display.send_replace(Decimal::zero());
            return None;
        }

        let key = ReconcileKey::of(&inputs, now);
        core.inputs = Some(inputs.clone());
        if core.last_key.as_ref() == Some(&key) {
            return None;
        }
        core.last_key = Some(key);
        Some(Self::issue(&mut core, inputs, self.mode, now))
    }

    /// Re-issue when the day bucket rolled over since the last reconciliation.
    fn refresh_if_due(&self) -> Option<ReconcileTicket> {
        let now = self.clock.now();
        let mut core = self.core();
        if core.disposed {
            return None;
        }
        let inputs = core.inputs.clone().filter(|i| i.has_balance())?;
        let key = ReconcileKey::of(&inputs, now);
        if core.last_key.as_ref() == Some(&key) {
            return None;
        }
        core.last_key = Some(key);
        Some(Self::issue(&mut core, inputs, self.mode, now))
    }

    fn begin(&self) -> Option<ReconcileTicket> {
        let now = self.clock.now();
        let mut core = self.core();
        if core.disposed {
            return None;
        }
        let inputs = core.inputs.clone().filter(|i| i.has_balance())?;
        Some(Self::issue(&mut core, inputs, self.mode, now))
    }

    fn issue(
        core: &mut TickerCore,
        inputs: TickerInputs,
        mode: YieldMode,
        now: Timestamp,
    ) -> ReconcileTicket {
        core.issued += 1;
        let generation = core.issued;
        let prior = core.state.anchor();
        core.state = TickerState::Reconciling { generation, prior };
        debug!(vault = %inputs.vault, mode = %mode, generation, "reconciliation issued");

        ReconcileTicket {
            generation,
            request: YieldRequest {
                balance: inputs.balance,
                apy_percent: inputs.apy_percent,
                from_ts: inputs.last_activity_timestamp,
                to_ts: Some(now),
                mode,
                deposit_history: inputs.deposit_history,
                owner_id: inputs.owner,
                exchange_rate: inputs.exchange_rate,
                vault_token_id: inputs.vault,
                asset_decimals: inputs.asset_decimals,
            },
        }
    }

    fn commit(&self, generation: u64, evaluation: Evaluation) -> CommitOutcome {
        let now = self.clock.now();
        let mut core = self.core();
        let latest = core.issued;
        if core.disposed || generation != latest {
            debug!(generation, latest, "discarding stale reconciliation");
            return CommitOutcome::Stale { generation, latest };
        }

        let prior = core.state.anchor();
        let inputs = core.inputs.as_ref();
        let balance = inputs.and_then(|i| i.balance).unwrap_or_default();
        let last_activity = inputs
            .and_then(|i| i.last_activity_timestamp)
            .unwrap_or_default();

        if self.mode == YieldMode::CurrentPrincipalGrowth
            && evaluation.value.is_zero()
            && balance.is_positive()
            && last_activity.as_secs() > 0
        {
            let err = AccrualError::SpuriousZero {
                mode: self.mode,
                balance,
            };
            info!(generation, error = %err, "keeping prior anchor");
            if let Some(anchor) = prior {
                core.state = TickerState::Anchored { anchor };
            }
            return CommitOutcome::Suppressed(err);
        }

        let time = prior.map_or(now, |p| p.time.max(now));
        let anchor = AccrualAnchor {
            value: evaluation.value.non_negative(),
            time,
            principal: evaluation.principal,
            generation,
        };
        core.state = TickerState::Anchored { anchor };
        debug!(generation, value = %anchor.value, "reconciliation committed");
        CommitOutcome::Committed(anchor)
    }

    fn tick(&self) -> Decimal {
        let now = self.clock.now();
        let mut core = self.core();
        if core.disposed {
            return *self.display.borrow();
        }

        let value = match (&core.state, core.inputs.as_ref()) {
            (TickerState::Empty, _) | (_, None) => Decimal::zero(),
            (state, Some(inputs)) => match self.mode {
                YieldMode::TotalUsd => total_usd(
                    inputs.balance,
                    inputs.exchange_rate,
                    inputs.apy_percent,
                    inputs.last_activity_timestamp,
                    Some(now),
                ),
                YieldMode::CurrentPrincipalGrowth => match state.anchor() {
                    Some(anchor) => anchor
                        .value
                        .checked_add(interest(
                            anchor.principal,
                            inputs.apy_percent.unwrap_or_default(),
                            now.seconds_since(anchor.time),
                        ))
                        .unwrap_or(anchor.value),
                    None => Decimal::zero(),
                },
            },
        }
        .non_negative();

        core.state = match &core.state {
            TickerState::Anchored { anchor } | TickerState::Ticking { anchor, .. } => {
                TickerState::Ticking {
                    anchor: *anchor,
                    displayed: value,
                }
            }
            other => other.clone(),
        };
        drop(core);

        self.display.send_replace(value);
        value
    }

    async fn run_reconcile(&self, ticket: ReconcileTicket) -> CommitOutcome {
        let evaluation = self.calculator.evaluate(&ticket.request).await;
        self.commit(ticket.generation, evaluation)
    }

    fn spawn_reconcile(shared: &Arc<Self>, ticket: ReconcileTicket) {
        let task_shared = Arc::clone(shared);
        let handle = tokio::spawn(async move {
            task_shared.run_reconcile(ticket).await;
        });
        shared.track(handle);
    }
}

/// Per-consumer live accrual engine.
///
/// Dropping the ticker (or calling [`AccrualTicker::shutdown`]) aborts its
/// timer and any reconciliation still running.
#[derive(Debug)]
pub struct AccrualTicker {
    shared: Arc<Shared>,
}

impl AccrualTicker {
    pub fn new(mode: YieldMode, calculator: Arc<YieldCalculator>, clock: Arc<dyn Clock>) -> Self {
        let (display, _) = watch::channel(Decimal::zero());
        Self {
            shared: Arc::new(Shared {
                mode,
                calculator,
                clock,
                core: Mutex::new(TickerCore {
                    inputs: None,
                    state: TickerState::Empty,
                    issued: 0,
                    last_key: None,
                    disposed: false,
                }),
                display,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn mode(&self) -> YieldMode {
        self.shared.mode
    }

    pub fn state(&self) -> TickerState {
        self.shared.core().state.clone()
    }

    /// Latest generation issued so far.
    pub fn generation(&self) -> u64 {
        self.shared.core().issued
    }

    /// Last committed value as a snapshot.
    pub fn snapshot(&self) -> Option<YieldSnapshot> {
        self.state().anchor().map(|anchor| YieldSnapshot {
            value: anchor.value,
            computed_at: anchor.time,
            mode: self.shared.mode,
        })
    }

    /// Receiver for the display surface; updated on every tick.
    pub fn subscribe(&self) -> watch::Receiver<Decimal> {
        self.shared.display.subscribe()
    }

    /// Replace the inputs. Returns a ticket when a reconciliation is due; the
    /// caller is responsible for evaluating and committing it.
    pub fn set_inputs(&self, inputs: TickerInputs) -> Option<ReconcileTicket> {
        self.shared.set_inputs(inputs)
    }

    /// Force a new reconciliation with the current inputs.
    pub fn begin_reconcile(&self) -> Option<ReconcileTicket> {
        self.shared.begin()
    }

    /// Commit the result of the reconciliation issued as `generation`.
    pub fn commit(&self, generation: u64, evaluation: Evaluation) -> CommitOutcome {
        self.shared.commit(generation, evaluation)
    }

    /// Replace the inputs and, if due, reconcile inline.
    pub async fn update(&self, inputs: TickerInputs) -> Option<CommitOutcome> {
        let ticket = self.shared.set_inputs(inputs)?;
        Some(self.shared.run_reconcile(ticket).await)
    }

    /// Evaluate a ticket and commit its result.
    pub async fn reconcile(&self, ticket: ReconcileTicket) -> CommitOutcome {
        self.shared.run_reconcile(ticket).await
    }

    /// Replace the inputs and, if due, reconcile on a background task.
    pub fn update_in_background(&self, inputs: TickerInputs) {
        if let Some(ticket) = self.shared.set_inputs(inputs) {
            Shared::spawn_reconcile(&self.shared, ticket);
        }
    }

    /// Recompute the displayed value. Never performs I/O.
    pub fn tick(&self) -> Decimal {
        self.shared.tick()
    }

    /// Start the periodic display timer on the current tokio runtime.
    ///
    /// Each tick also checks whether the day bucket rolled over and, if so,
    /// issues a background reconciliation.
    pub fn start(&self, period: Duration) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if shared.core().disposed {
                    break;
                }
                shared.tick();
                if let Some(ticket) = shared.refresh_if_due() {
                    Shared::spawn_reconcile(&shared, ticket);
                }
            }
        });
        self.shared.track(handle);
    }

    /// Stop the timer and abort in-flight reconciliations. Results that
    /// arrive afterwards are discarded.
    pub fn shutdown(&self) {
        let already = {
            let mut core = self.shared.core();
            std::mem::replace(&mut core.disposed, true)
        };
        let tasks: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self
                .shared
                .tasks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for task in &tasks {
            task.abort();
        }
        if !already && !tasks.is_empty() {
            debug!(mode = %self.shared.mode, aborted = tasks.len(), "ticker shut down");
        }
    }
}

impl Drop for AccrualTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
