//! Time sources for the tracker.
//!
//! Progress is computed from wall-clock epoch milliseconds because start
//! times are persisted and must stay meaningful across restarts. The clock is
//! injected so tests can drive time explicitly.

use canteen_types::current_timestamp_ms;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
	fn now_ms(&self) -> u64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_ms(&self) -> u64 {
		current_timestamp_ms()
	}
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	pub fn new(start_ms: u64) -> Self {
		Self {
			now: AtomicU64::new(start_ms),
		}
	}

	pub fn set(&self, now_ms: u64) {
		self.now.store(now_ms, Ordering::SeqCst);
	}

	pub fn advance(&self, delta_ms: u64) {
		self.now.fetch_add(delta_ms, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now_ms(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}
