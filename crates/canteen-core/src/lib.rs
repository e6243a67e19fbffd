//! Core order tracking engine for the canteen order tracker.
//!
//! This crate turns checkout snapshots into numbered orders, estimates how
//! long each will take, drives per-order progress timers to the `ready`
//! state and folds externally reported verifications into `completed`. All
//! state lives in a key-value store that other processes may share; time
//! comes from an injected clock.

pub mod builder;
pub mod clock;
pub mod engine;
pub mod estimation;
pub mod monitoring;
pub mod state;

pub use builder::{BuilderError, TrackerBuilder, TrackerFactories};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{event_bus::EventBus, EngineError, TrackerEngine};
pub use estimation::{DurationEstimator, PrepTimeRange};
pub use monitoring::{ProgressEngine, TickOutcome, VerificationMonitor};
pub use state::{OrderBuckets, OrderStore, OrderStoreError};
