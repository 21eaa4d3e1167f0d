//! Computation engines: yield calculator, cost basis, live ticker.

pub mod calculator;
pub mod clock;
pub mod cost_basis;
pub mod ticker;

pub use calculator::{interest, principal_growth, total_usd, Evaluation, YieldCalculator, YieldRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cost_basis::{resolve, resolve_raw, CachedCostBasisResolver, FifoLots, Lot};
pub use ticker::{
    AccrualAnchor, AccrualTicker, CommitOutcome, ReconcileTicket, TickerInputs, TickerState,
};
