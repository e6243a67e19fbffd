//! Lifecycle management for the tracker engine.
//!
//! Startup brings persisted state up to date before the main loop runs:
//! a snapshot left by a checkout that happened while the tracker was down is
//! ingested, verifications that arrived meanwhile are applied, and every
//! live order gets its progress timer back.

use super::{EngineError, TrackerEngine};

impl TrackerEngine {
	/// Performs any initialization required before running
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!(tracker_id = %self.config.tracker.id, "Initializing order tracker");

		if let Some(order) = self.absorb_pending().await? {
			tracing::info!(number = order.number, "Ingested checkout left from a previous session");
		}
		let completed = self.verification.check().await?;
		let tracked = self.progress.restart().await?;

		tracing::info!(
			completed = completed.len(),
			live = tracked,
			timers = self.progress.tracked_count(),
			"Order tracker ready"
		);
		Ok(())
	}

	/// Stops all progress timers.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down order tracker");
		self.progress.cancel_all();
		Ok(())
	}
}
