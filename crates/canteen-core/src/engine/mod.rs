//! Tracker engine that ties the order store, progress timers and
//! verification together.
//!
//! The engine reacts to storage change notifications (a checkout snapshot
//! landing, the verified set growing) and also polls on a fixed interval,
//! since backends shared across processes cannot always announce foreign
//! writes.

pub mod event_bus;
pub mod lifecycle;

use crate::clock::Clock;
use crate::estimation::DurationEstimator;
use crate::monitoring::{ProgressEngine, VerificationMonitor};
use crate::state::{OrderBuckets, OrderStore, OrderStoreError};
use canteen_config::Config;
use canteen_storage::{StorageChange, StorageService};
use canteen_types::{Order, OrderEvent, PendingOrder, TrackerEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Order store error: {0}")]
	Store(#[from] OrderStoreError),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
}

/// Main tracker engine.
#[derive(Clone)]
pub struct TrackerEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) store: Arc<OrderStore>,
	pub(crate) progress: ProgressEngine,
	pub(crate) verification: VerificationMonitor,
	pub(crate) event_bus: event_bus::EventBus,
}

impl TrackerEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		clock: Arc<dyn Clock>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let store = Arc::new(
			OrderStore::new(storage.clone(), clock, config.tracker.id.clone())
				.with_sequence_base(config.tracker.sequence_base)
				.with_estimation(
					DurationEstimator::new(&config.estimation),
					config.estimation.honor_estimated_ready_at,
				),
		);
		let progress = ProgressEngine::new(
			store.clone(),
			event_bus.clone(),
			Duration::from_millis(config.progress.tick_interval_ms),
		);
		let verification =
			VerificationMonitor::new(store.clone(), progress.clone(), event_bus.clone());

		Self {
			config,
			storage,
			store,
			progress,
			verification,
			event_bus,
		}
	}

	/// Hands a paid cart to the tracker and starts tracking the new order.
	///
	/// The snapshot is ingested directly rather than through the shared
	/// pending slot, so concurrent checkouts never see each other's carts.
	pub async fn checkout(&self, snapshot: &PendingOrder) -> Result<Option<Order>, EngineError> {
		let Some(order) = self.store.ingest(snapshot).await? else {
			return Ok(None);
		};
		self.start_tracking(&order).await;
		Ok(Some(order))
	}

	/// Ingests the snapshot another process left in the pending slot, if
	/// any, and starts tracking the resulting order.
	pub async fn absorb_pending(&self) -> Result<Option<Order>, EngineError> {
		let Some(order) = self.store.ingest_pending().await? else {
			return Ok(None);
		};
		self.start_tracking(&order).await;
		Ok(Some(order))
	}

	async fn start_tracking(&self, order: &Order) {
		self.event_bus
			.publish(TrackerEvent::Order(OrderEvent::Ingested {
				order: order.clone(),
			}))
			.ok();
		self.progress.track(order).await;
	}

	pub async fn buckets(&self) -> Result<OrderBuckets, EngineError> {
		Ok(self.store.buckets().await?)
	}

	pub async fn order(&self, order_id: &str) -> Result<Option<Order>, EngineError> {
		Ok(self.store.get(order_id).await?)
	}

	pub async fn progress(&self, order_id: &str) -> Result<Option<f64>, EngineError> {
		Ok(self.progress.progress(order_id).await?)
	}

	/// Development hook: records the order as verified and reconciles right
	/// away. Returns whether the order became completed.
	pub async fn force_verify(&self, order_id: &str) -> Result<bool, EngineError> {
		if self.store.get(order_id).await?.is_none() {
			return Err(EngineError::OrderNotFound(order_id.to_string()));
		}
		self.store.mark_verified(order_id).await?;
		let completed = self.verification.check().await?;
		Ok(completed.iter().any(|o| o.id == order_id))
	}

	/// Runs until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await
	}

	/// Runs the main loop until `shutdown` resolves.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		self.initialize().await?;

		let pending_key = self.store.pending_key();
		let verified_key = self.store.verified_key();
		let mut changes = self.storage.subscribe();
		if changes.is_none() {
			tracing::info!("Storage backend has no change notifications, relying on polling");
		}

		let mut poll = tokio::time::interval(Duration::from_millis(
			self.config.verification.poll_interval_ms,
		));
		poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				change = next_change(&mut changes) => match change {
					Ok(change) if change.key == verified_key => self.reconcile_logged().await,
					Ok(change) if change.key == pending_key => self.absorb_logged().await,
					Ok(_) => {},
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Missed storage notifications, rechecking");
						self.absorb_logged().await;
						self.reconcile_logged().await;
					},
					Err(RecvError::Closed) => {
						tracing::warn!("Storage notifications closed, relying on polling");
						changes = None;
					},
				},

				_ = poll.tick() => {
					self.absorb_logged().await;
					self.reconcile_logged().await;
				}

				_ = &mut shutdown => {
					break;
				}
			}
		}

		self.shutdown().await
	}

	async fn absorb_logged(&self) {
		if let Err(e) = self.absorb_pending().await {
			tracing::warn!(error = %e, "Failed to ingest checkout snapshot");
		}
	}

	async fn reconcile_logged(&self) {
		match self.verification.check().await {
			Ok(completed) if !completed.is_empty() => {
				tracing::debug!(count = completed.len(), "Reconciled verified orders");
			},
			Ok(_) => {},
			Err(e) => tracing::warn!(error = %e, "Failed to reconcile verified orders"),
		}
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn store(&self) -> &Arc<OrderStore> {
		&self.store
	}

	pub fn progress_engine(&self) -> &ProgressEngine {
		&self.progress
	}
}

async fn next_change(
	changes: &mut Option<broadcast::Receiver<StorageChange>>,
) -> Result<StorageChange, RecvError> {
	match changes {
		Some(rx) => rx.recv().await,
		None => std::future::pending().await,
	}
}
