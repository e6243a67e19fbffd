//! Background tracking of live orders.
//!
//! Progress timers move orders to `ready` as their estimated preparation time
//! elapses; the verification monitor moves them to `completed` when staff
//! tooling reports the handover.

pub mod progress;
pub mod verification;

pub use progress::{ProgressEngine, TickOutcome};
pub use verification::VerificationMonitor;
