//! Verification reconciliation.
//!
//! Staff tooling, possibly in another process, appends order ids to the
//! shared verified set. This monitor folds that set into order statuses,
//! stops the progress timers of orders it completes and announces them.

use crate::engine::event_bus::EventBus;
use crate::monitoring::progress::ProgressEngine;
use crate::state::{OrderStore, OrderStoreError};
use canteen_types::{truncate_id, Order, OrderEvent, TrackerEvent};
use std::sync::Arc;

/// Applies the persisted verified set to the order list.
#[derive(Clone)]
pub struct VerificationMonitor {
	store: Arc<OrderStore>,
	progress: ProgressEngine,
	event_bus: EventBus,
}

impl VerificationMonitor {
	pub fn new(store: Arc<OrderStore>, progress: ProgressEngine, event_bus: EventBus) -> Self {
		Self {
			store,
			progress,
			event_bus,
		}
	}

	/// Reconciles against the stored verified set and returns the orders
	/// that became completed. Safe to call repeatedly.
	pub async fn check(&self) -> Result<Vec<Order>, OrderStoreError> {
		let completed = self.store.reconcile_from_store().await?;
		for order in &completed {
			self.progress.cancel(&order.id);
			tracing::info!(
				order_id = %truncate_id(&order.id),
				number = order.number,
				"Order verified and completed"
			);
			self.event_bus
				.publish(TrackerEvent::Order(OrderEvent::Completed {
					order_id: order.id.clone(),
				}))
				.ok();
		}
		Ok(completed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use canteen_storage::implementations::memory::MemoryStorage;
	use canteen_storage::StorageService;
	use canteen_types::{OrderStatus, PendingLineItem, PendingOrder};
	use std::time::Duration;

	const T: u64 = 1_700_000_000_000;

	#[tokio::test(start_paused = true)]
	async fn test_verification_completes_and_cancels_timer() {
		let backend = MemoryStorage::new();
		let clock = Arc::new(ManualClock::new(T));
		let store = Arc::new(OrderStore::new(
			Arc::new(StorageService::new(Box::new(backend.clone()))),
			clock.clone(),
			"canteen",
		));
		let bus = EventBus::new(1024);
		let progress = ProgressEngine::new(store.clone(), bus.clone(), Duration::from_millis(16));
		let monitor = VerificationMonitor::new(store.clone(), progress.clone(), bus.clone());

		let order = store
			.ingest(&PendingOrder {
				items: vec![PendingLineItem {
					name: "Dosa".to_string(),
					qty: 1,
					price: 60.0,
					time: "20 mins".to_string(),
				}],
				created_at: Some(T),
				..Default::default()
			})
			.await
			.unwrap()
			.unwrap();
		progress.track(&order).await;
		assert!(progress.is_tracking(&order.id));

		// Nothing verified yet.
		assert!(monitor.check().await.unwrap().is_empty());

		// A staff tool sharing the backend verifies the order early.
		let staff = OrderStore::new(
			Arc::new(StorageService::new(Box::new(backend))),
			clock,
			"canteen",
		);
		staff.mark_verified(&order.id).await.unwrap();

		let mut events = bus.subscribe();
		let completed = monitor.check().await.unwrap();
		assert_eq!(completed.len(), 1);
		assert!(!progress.is_tracking(&order.id));
		assert_eq!(
			store.get(&order.id).await.unwrap().unwrap().status,
			OrderStatus::Completed
		);
		assert!(matches!(
			events.try_recv().unwrap(),
			TrackerEvent::Order(OrderEvent::Completed { .. })
		));

		assert!(monitor.check().await.unwrap().is_empty());
	}
}
