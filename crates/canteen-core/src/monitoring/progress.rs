//! Progress tracking for live orders.
//!
//! Each preparing order gets its own timer task that recomputes the
//! completion fraction on every tick and publishes it on the event bus. When
//! the fraction reaches 1 the order is moved to `ready` once and the timer
//! stops. The fraction can also be read lazily at any time.

use crate::engine::event_bus::EventBus;
use crate::state::{OrderStore, OrderStoreError};
use canteen_types::{truncate_id, Order, OrderEvent, OrderStatus, ProgressEvent, TrackerEvent};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Result of observing an order once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
	/// Still preparing at the given fraction.
	Progressing(f64),
	/// Fully elapsed; nothing left to track.
	Done,
	/// Fully elapsed but the `ready` transition could not be persisted.
	Retry,
}

/// Drives per-order progress timers.
#[derive(Clone)]
pub struct ProgressEngine {
	store: Arc<OrderStore>,
	event_bus: EventBus,
	tick_interval: Duration,
	timers: Arc<DashMap<String, JoinHandle<()>>>,
}

impl ProgressEngine {
	pub fn new(store: Arc<OrderStore>, event_bus: EventBus, tick_interval: Duration) -> Self {
		Self {
			store,
			event_bus,
			tick_interval,
			timers: Arc::new(DashMap::new()),
		}
	}

	/// Recomputes the fraction for `order` and moves it to `ready` when the
	/// estimated duration has fully elapsed.
	pub async fn observe(&self, order: &Order) -> TickOutcome {
		let fraction = order.progress_at(self.store.clock().now_ms());
		self.event_bus
			.publish(TrackerEvent::Progress(ProgressEvent {
				order_id: order.id.clone(),
				fraction,
			}))
			.ok();

		if fraction < 1.0 {
			return TickOutcome::Progressing(fraction);
		}
		if order.status != OrderStatus::Preparing {
			return TickOutcome::Done;
		}

		match self.store.set_status(&order.id, OrderStatus::Ready).await {
			Ok(true) => {
				tracing::info!(
					order_id = %truncate_id(&order.id),
					number = order.number,
					"Order ready for pickup"
				);
				self.event_bus
					.publish(TrackerEvent::Order(OrderEvent::Ready {
						order_id: order.id.clone(),
					}))
					.ok();
				TickOutcome::Done
			},
			// Already moved on, e.g. verified by another process.
			Ok(false) => TickOutcome::Done,
			Err(e) => {
				tracing::warn!(
					order_id = %truncate_id(&order.id),
					error = %e,
					"Failed to mark order ready"
				);
				TickOutcome::Retry
			},
		}
	}

	/// Starts tracking an order.
	///
	/// The order is observed immediately, so one whose duration already
	/// elapsed becomes ready without waiting for a tick and gets no timer.
	/// Tracking an order again replaces its previous timer, and handles of
	/// timers that already finished are pruned.
	pub async fn track(&self, order: &Order) {
		if !order.is_live() {
			self.cancel(&order.id);
			return;
		}
		if self.observe(order).await == TickOutcome::Done {
			self.cancel(&order.id);
			return;
		}

		let engine = self.clone();
		let tracked = order.clone();
		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(engine.tick_interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			// The first tick completes immediately.
			ticker.tick().await;
			loop {
				ticker.tick().await;
				if engine.observe(&tracked).await == TickOutcome::Done {
					break;
				}
			}
			tracing::trace!(order_id = %truncate_id(&tracked.id), "Progress timer finished");
		});

		// Timers of orders that became ready are dropped here.
		self.timers.retain(|_, handle| !handle.is_finished());
		if let Some(previous) = self.timers.insert(order.id.clone(), handle) {
			previous.abort();
		}
		tracing::debug!(order_id = %truncate_id(&order.id), "Tracking order progress");
	}

	/// Tracks every live order, for example after a restart.
	pub async fn restart(&self) -> Result<usize, OrderStoreError> {
		let live = self.store.buckets().await?.live;
		for order in &live {
			self.track(order).await;
		}
		Ok(live.len())
	}

	/// Current fraction for an order, computed on read. Completed orders
	/// report 1.
	pub async fn progress(&self, order_id: &str) -> Result<Option<f64>, OrderStoreError> {
		let now = self.store.clock().now_ms();
		Ok(self.store.get(order_id).await?.map(|order| {
			if order.is_live() {
				order.progress_at(now)
			} else {
				1.0
			}
		}))
	}

	/// Stops the timer for an order. Returns whether one was running.
	pub fn cancel(&self, order_id: &str) -> bool {
		match self.timers.remove(order_id) {
			Some((_, handle)) => {
				let running = !handle.is_finished();
				handle.abort();
				running
			},
			None => false,
		}
	}

	/// Stops every timer.
	pub fn cancel_all(&self) {
		let ids: Vec<String> = self.timers.iter().map(|e| e.key().clone()).collect();
		for id in ids {
			self.cancel(&id);
		}
	}

	pub fn is_tracking(&self, order_id: &str) -> bool {
		self.timers
			.get(order_id)
			.is_some_and(|handle| !handle.is_finished())
	}

	/// Number of running timers. Finished ones are pruned.
	pub fn tracked_count(&self) -> usize {
		self.timers.retain(|_, handle| !handle.is_finished());
		self.timers.len()
	}
}
