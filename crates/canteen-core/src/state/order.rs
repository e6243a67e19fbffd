//! Order store.
//!
//! Owns the persisted order list, the order number sequence and the verified
//! id set, all scoped by the tracker id. Records live in a key-value store
//! that other processes may write to as well; across processes writes are
//! last-writer-wins, within this process every read-modify-write cycle runs
//! behind one async mutex.

use crate::clock::Clock;
use crate::estimation::DurationEstimator;
use canteen_storage::{StorageError, StorageService};
use canteen_types::{
	truncate_id, Order, OrderLineItem, OrderStatus, PendingLineItem, PendingOrder, StorageKey,
};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Default sequence base; the first order is numbered one above it.
pub const DEFAULT_SEQUENCE_BASE: u64 = 1000;

/// Errors that can occur in order store operations.
#[derive(Debug, Error)]
pub enum OrderStoreError {
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Orders split for display: live (`preparing` or `ready`) and previous
/// (`completed`). Both keep the most-recent-first order of the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBuckets {
	pub live: Vec<Order>,
	pub previous: Vec<Order>,
}

/// Authoritative list of orders for one tracker scope.
pub struct OrderStore {
	storage: Arc<StorageService>,
	clock: Arc<dyn Clock>,
	estimator: DurationEstimator,
	scope: String,
	sequence_base: u64,
	honor_estimated_ready_at: bool,
	write_lock: Mutex<()>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>, clock: Arc<dyn Clock>, scope: impl Into<String>) -> Self {
		Self {
			storage,
			clock,
			estimator: DurationEstimator::default(),
			scope: scope.into(),
			sequence_base: DEFAULT_SEQUENCE_BASE,
			honor_estimated_ready_at: false,
			write_lock: Mutex::new(()),
		}
	}

	pub fn with_sequence_base(mut self, base: u64) -> Self {
		self.sequence_base = base;
		self
	}

	/// Sets the duration estimator and whether a checkout-supplied
	/// `estimatedReadyAt` overrides the estimate.
	pub fn with_estimation(mut self, estimator: DurationEstimator, honor_estimated_ready_at: bool) -> Self {
		self.estimator = estimator;
		self.honor_estimated_ready_at = honor_estimated_ready_at;
		self
	}

	pub fn scope(&self) -> &str {
		&self.scope
	}

	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Full backend key of the checkout snapshot, for matching change
	/// notifications.
	pub fn pending_key(&self) -> String {
		StorageService::key(StorageKey::PendingOrder.as_str(), &self.scope)
	}

	/// Full backend key of the verified id set.
	pub fn verified_key(&self) -> String {
		StorageService::key(StorageKey::VerifiedOrders.as_str(), &self.scope)
	}

	/// Writes a checkout snapshot for a later [`ingest_pending`](Self::ingest_pending).
	pub async fn submit_pending(&self, snapshot: &PendingOrder) -> Result<(), OrderStoreError> {
		self.storage
			.store(StorageKey::PendingOrder.as_str(), &self.scope, snapshot)
			.await?;
		Ok(())
	}

	/// Consumes the stored checkout snapshot, if any.
	///
	/// A missing or empty snapshot is a no-op. A snapshot that cannot be
	/// decoded is discarded. A consumed snapshot is cleared, so calling this
	/// again yields `None`.
	pub async fn ingest_pending(&self) -> Result<Option<Order>, OrderStoreError> {
		let _guard = self.write_lock.lock().await;

		let snapshot: PendingOrder = match self
			.storage
			.retrieve_optional(StorageKey::PendingOrder.as_str(), &self.scope)
			.await
		{
			Ok(Some(snapshot)) => snapshot,
			Ok(None) => return Ok(None),
			Err(StorageError::Serialization(e)) => {
				tracing::warn!(scope = %self.scope, error = %e, "Discarding unreadable checkout snapshot");
				self.storage
					.remove(StorageKey::PendingOrder.as_str(), &self.scope)
					.await?;
				return Ok(None);
			},
			Err(e) => return Err(e.into()),
		};

		if snapshot.is_empty() {
			return Ok(None);
		}

		let order = self.record(&snapshot).await?;
		self.storage
			.remove(StorageKey::PendingOrder.as_str(), &self.scope)
			.await?;
		Ok(Some(order))
	}

	/// Ingests a snapshot directly, bypassing the stored one.
	pub async fn ingest(&self, snapshot: &PendingOrder) -> Result<Option<Order>, OrderStoreError> {
		if snapshot.is_empty() {
			return Ok(None);
		}
		let _guard = self.write_lock.lock().await;
		self.record(snapshot).await.map(Some)
	}

	/// Builds the order and persists it. Caller holds the write lock.
	async fn record(&self, snapshot: &PendingOrder) -> Result<Order, OrderStoreError> {
		let now = self.clock.now_ms();
		let items: Vec<OrderLineItem> = snapshot.items.iter().map(sanitize_item).collect();

		let created = snapshot.created_at.unwrap_or(now);
		let start_ts = match snapshot.scheduled_for {
			Some(scheduled) if scheduled > now => scheduled,
			_ => created,
		};

		let mut duration_ms = self
			.estimator
			.estimate_ms(items.iter().map(|it| it.prep_time_hint.as_str()));
		if self.honor_estimated_ready_at {
			if let Some(ready_at) = snapshot.estimated_ready_at.filter(|r| *r > start_ts) {
				duration_ms = i64::try_from(ready_at - start_ts).unwrap_or(duration_ms);
			}
		}

		let number = self.next_number().await?;
		let order = Order {
			id: new_order_id(now),
			number,
			items,
			start_ts,
			duration_ms,
			status: OrderStatus::Preparing,
			created_at: now,
		};

		let mut orders = self.load_orders().await?;
		orders.insert(0, order.clone());
		self.save_orders(&orders).await?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			number = order.number,
			duration_ms = order.duration_ms,
			"Ingested order"
		);
		Ok(order)
	}

	/// Allocates and persists the next order number.
	async fn next_number(&self) -> Result<u64, OrderStoreError> {
		let current: u64 = self
			.read_lenient(StorageKey::OrderSeq)
			.await?
			.unwrap_or(self.sequence_base);
		let next = current.saturating_add(1);
		self.storage
			.store(StorageKey::OrderSeq.as_str(), &self.scope, &next)
			.await?;
		Ok(next)
	}

	/// All orders, most recent first.
	pub async fn list(&self) -> Result<Vec<Order>, OrderStoreError> {
		self.load_orders().await
	}

	pub async fn get(&self, order_id: &str) -> Result<Option<Order>, OrderStoreError> {
		Ok(self
			.load_orders()
			.await?
			.into_iter()
			.find(|o| o.id == order_id))
	}

	pub async fn buckets(&self) -> Result<OrderBuckets, OrderStoreError> {
		let (live, previous) = self
			.load_orders()
			.await?
			.into_iter()
			.partition(Order::is_live);
		Ok(OrderBuckets { live, previous })
	}

	/// Applies a forward-only status transition.
	///
	/// Returns `false` for unknown ids and for unchanged or backward moves.
	pub async fn set_status(&self, order_id: &str, status: OrderStatus) -> Result<bool, OrderStoreError> {
		let _guard = self.write_lock.lock().await;

		let mut orders = self.load_orders().await?;
		let Some(order) = orders.iter_mut().find(|o| o.id == order_id) else {
			tracing::debug!(order_id = %truncate_id(order_id), "Status update for unknown order");
			return Ok(false);
		};
		if !order.status.can_transition_to(status) {
			return Ok(false);
		}

		let from = order.status;
		order.status = status;
		self.save_orders(&orders).await?;

		tracing::debug!(
			order_id = %truncate_id(order_id),
			from = %from,
			to = %status,
			"Order status changed"
		);
		Ok(true)
	}

	/// Completes every known order whose id is in `verified` and returns the
	/// orders that changed. Already completed orders are left alone.
	pub async fn reconcile_verified(&self, verified: &HashSet<String>) -> Result<Vec<Order>, OrderStoreError> {
		if verified.is_empty() {
			return Ok(Vec::new());
		}
		let _guard = self.write_lock.lock().await;

		let mut orders = self.load_orders().await?;
		let mut changed = Vec::new();
		for order in orders.iter_mut() {
			if verified.contains(&order.id) && order.status.can_transition_to(OrderStatus::Completed) {
				order.status = OrderStatus::Completed;
				changed.push(order.clone());
			}
		}

		if !changed.is_empty() {
			self.save_orders(&orders).await?;
		}
		Ok(changed)
	}

	/// Ids recorded as verified by any process sharing the store.
	pub async fn verified_ids(&self) -> Result<HashSet<String>, OrderStoreError> {
		Ok(self
			.read_lenient::<Vec<String>>(StorageKey::VerifiedOrders)
			.await?
			.unwrap_or_default()
			.into_iter()
			.collect())
	}

	/// Appends an id to the verified set. Returns `false` if it was already there.
	pub async fn mark_verified(&self, order_id: &str) -> Result<bool, OrderStoreError> {
		let _guard = self.write_lock.lock().await;

		let mut ids: Vec<String> = self
			.read_lenient(StorageKey::VerifiedOrders)
			.await?
			.unwrap_or_default();
		if ids.iter().any(|id| id == order_id) {
			return Ok(false);
		}
		ids.push(order_id.to_string());
		self.storage
			.store(StorageKey::VerifiedOrders.as_str(), &self.scope, &ids)
			.await?;
		Ok(true)
	}

	/// Reads the persisted verified set and reconciles against it.
	pub async fn reconcile_from_store(&self) -> Result<Vec<Order>, OrderStoreError> {
		let verified = self.verified_ids().await?;
		self.reconcile_verified(&verified).await
	}

	async fn load_orders(&self) -> Result<Vec<Order>, OrderStoreError> {
		Ok(self
			.read_lenient(StorageKey::Orders)
			.await?
			.unwrap_or_default())
	}

	async fn save_orders(&self, orders: &[Order]) -> Result<(), OrderStoreError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &self.scope, &orders)
			.await?;
		Ok(())
	}

	/// Reads a record, treating undecodable data as absent.
	async fn read_lenient<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>, OrderStoreError> {
		match self.storage.retrieve_optional(key.as_str(), &self.scope).await {
			Ok(value) => Ok(value),
			Err(StorageError::Serialization(e)) => {
				tracing::warn!(
					key = key.as_str(),
					scope = %self.scope,
					error = %e,
					"Ignoring unreadable record"
				);
				Ok(None)
			},
			Err(e) => Err(e.into()),
		}
	}
}

fn sanitize_item(item: &PendingLineItem) -> OrderLineItem {
	let qty = u32::try_from(item.qty.max(1)).unwrap_or(u32::MAX);
	let price = if item.price.is_finite() && item.price > 0.0 {
		item.price
	} else {
		0.0
	};
	OrderLineItem {
		name: item.name.clone(),
		qty,
		price,
		prep_time_hint: item.time.clone(),
	}
}

fn new_order_id(now_ms: u64) -> String {
	let suffix = Uuid::new_v4().simple().to_string();
	format!("ord_{}_{}", now_ms, &suffix[..8])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use canteen_storage::implementations::memory::MemoryStorage;
	use canteen_storage::StorageInterface;

	const T: u64 = 1_700_000_000_000;

	fn item(name: &str, qty: i64, price: f64, time: &str) -> PendingLineItem {
		PendingLineItem {
			name: name.to_string(),
			qty,
			price,
			time: time.to_string(),
		}
	}

	fn snapshot(items: Vec<PendingLineItem>) -> PendingOrder {
		PendingOrder {
			items,
			created_at: Some(T),
			..Default::default()
		}
	}

	fn store_over(backend: &MemoryStorage, clock: Arc<ManualClock>) -> OrderStore {
		let storage = Arc::new(StorageService::new(Box::new(backend.clone())));
		OrderStore::new(storage, clock, "canteen")
	}

	fn setup() -> (OrderStore, Arc<ManualClock>, MemoryStorage) {
		let backend = MemoryStorage::new();
		let clock = Arc::new(ManualClock::new(T));
		(store_over(&backend, clock.clone()), clock, backend)
	}

	#[tokio::test]
	async fn test_numbers_increase_and_newest_first() {
		let (store, clock, _) = setup();

		let mut numbers = Vec::new();
		for name in ["Tea", "Coffee", "Dosa"] {
			clock.advance(1_000);
			let order = store
				.ingest(&snapshot(vec![item(name, 1, 10.0, "5 mins")]))
				.await
				.unwrap()
				.unwrap();
			numbers.push(order.number);
		}
		assert_eq!(numbers, vec![1001, 1002, 1003]);

		let list = store.list().await.unwrap();
		assert_eq!(list.len(), 3);
		assert_eq!(list[0].items[0].name, "Dosa");
		assert_eq!(list[2].items[0].name, "Tea");
		assert!(list.iter().all(|o| o.status == OrderStatus::Preparing));
	}

	#[tokio::test]
	async fn test_ingest_pending_consumes_snapshot() {
		let (store, _, _) = setup();
		store
			.submit_pending(&snapshot(vec![item("Tea", 2, 30.0, "5 mins")]))
			.await
			.unwrap();

		let order = store.ingest_pending().await.unwrap();
		assert!(order.is_some());
		assert!(store.ingest_pending().await.unwrap().is_none());
		assert_eq!(store.list().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_empty_snapshot_is_noop() {
		let (store, _, _) = setup();
		assert!(store.ingest_pending().await.unwrap().is_none());

		store.submit_pending(&PendingOrder::default()).await.unwrap();
		assert!(store.ingest_pending().await.unwrap().is_none());
		assert!(store.ingest(&PendingOrder::default()).await.unwrap().is_none());
		assert!(store.list().await.unwrap().is_empty());

		// The counter was not advanced.
		let order = store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(order.number, 1001);
	}

	#[tokio::test]
	async fn test_line_items_are_clamped() {
		let (store, _, _) = setup();
		let order = store
			.ingest(&snapshot(vec![
				item("Tea", -3, -10.0, "5 mins"),
				item("Vada", 0, f64::NAN, "5 mins"),
				item("Dosa", 2, 45.5, "5 mins"),
			]))
			.await
			.unwrap()
			.unwrap();

		assert_eq!(order.items[0].qty, 1);
		assert_eq!(order.items[0].price, 0.0);
		assert_eq!(order.items[1].qty, 1);
		assert_eq!(order.items[1].price, 0.0);
		assert_eq!(order.items[2].qty, 2);
		assert_eq!(order.items[2].price, 45.5);
	}

	#[tokio::test]
	async fn test_start_time_selection() {
		let (store, clock, _) = setup();
		clock.set(T + 10_000);

		let future = PendingOrder {
			scheduled_for: Some(T + 3_600_000),
			..snapshot(vec![item("Tea", 1, 30.0, "5 mins")])
		};
		let order = store.ingest(&future).await.unwrap().unwrap();
		assert_eq!(order.start_ts, T + 3_600_000);

		let past = PendingOrder {
			scheduled_for: Some(T - 1),
			..snapshot(vec![item("Tea", 1, 30.0, "5 mins")])
		};
		let order = store.ingest(&past).await.unwrap().unwrap();
		assert_eq!(order.start_ts, T);

		let undated = PendingOrder {
			items: vec![item("Tea", 1, 30.0, "5 mins")],
			..Default::default()
		};
		let order = store.ingest(&undated).await.unwrap().unwrap();
		assert_eq!(order.start_ts, T + 10_000);
		assert_eq!(order.created_at, T + 10_000);
	}

	#[tokio::test]
	async fn test_estimated_ready_at_only_when_enabled() {
		let (store, _, backend) = setup();
		let with_estimate = PendingOrder {
			estimated_ready_at: Some(T + 60_000),
			..snapshot(vec![item("Tea", 1, 30.0, "5 mins")])
		};

		let order = store.ingest(&with_estimate).await.unwrap().unwrap();
		assert_eq!(order.duration_ms, 600_000);

		let honoring = store_over(&backend, Arc::new(ManualClock::new(T)))
			.with_estimation(DurationEstimator::default(), true);
		let order = honoring.ingest(&with_estimate).await.unwrap().unwrap();
		assert_eq!(order.duration_ms, 60_000);
	}

	#[tokio::test]
	async fn test_forward_only_status() {
		let (store, _, _) = setup();
		let order = store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap()
			.unwrap();

		assert!(store.set_status(&order.id, OrderStatus::Ready).await.unwrap());
		assert!(!store.set_status(&order.id, OrderStatus::Ready).await.unwrap());
		assert!(!store.set_status(&order.id, OrderStatus::Preparing).await.unwrap());
		assert!(store.set_status(&order.id, OrderStatus::Completed).await.unwrap());
		assert!(!store.set_status(&order.id, OrderStatus::Preparing).await.unwrap());
		assert!(!store.set_status(&order.id, OrderStatus::Ready).await.unwrap());

		let stored = store.get(&order.id).await.unwrap().unwrap();
		assert_eq!(stored.status, OrderStatus::Completed);

		assert!(!store.set_status("ord_unknown", OrderStatus::Ready).await.unwrap());
	}

	#[tokio::test]
	async fn test_reconcile_is_idempotent() {
		let (store, _, _) = setup();
		let first = store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap()
			.unwrap();
		let second = store
			.ingest(&snapshot(vec![item("Dosa", 1, 60.0, "20 mins")]))
			.await
			.unwrap()
			.unwrap();

		let verified: HashSet<String> = [first.id.clone(), "ord_elsewhere".to_string()].into();
		let changed = store.reconcile_verified(&verified).await.unwrap();
		assert_eq!(changed.len(), 1);
		assert_eq!(changed[0].id, first.id);
		assert_eq!(changed[0].status, OrderStatus::Completed);

		assert!(store.reconcile_verified(&verified).await.unwrap().is_empty());

		let buckets = store.buckets().await.unwrap();
		assert_eq!(buckets.live.len(), 1);
		assert_eq!(buckets.live[0].id, second.id);
		assert_eq!(buckets.previous.len(), 1);
		assert_eq!(buckets.previous[0].id, first.id);
	}

	#[tokio::test]
	async fn test_mark_verified_and_reconcile_from_store() {
		let (store, _, backend) = setup();
		let order = store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap()
			.unwrap();

		// Another process appends to the verified set.
		let staff = store_over(&backend, Arc::new(ManualClock::new(T)));
		assert!(staff.mark_verified(&order.id).await.unwrap());
		assert!(!staff.mark_verified(&order.id).await.unwrap());
		assert_eq!(staff.verified_ids().await.unwrap().len(), 1);

		let changed = store.reconcile_from_store().await.unwrap();
		assert_eq!(changed.len(), 1);
		assert!(store.reconcile_from_store().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_sequence_survives_restart() {
		let (store, clock, backend) = setup();
		store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap();
		drop(store);

		let reopened = store_over(&backend, clock);
		let order = reopened
			.ingest(&snapshot(vec![item("Coffee", 1, 30.0, "5 mins")]))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(order.number, 1002);
		assert_eq!(reopened.list().await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_custom_sequence_base() {
		let (store, _, _) = setup();
		let store = store.with_sequence_base(41);
		let order = store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(order.number, 42);
		assert_eq!(order.display_number(), "#0042");
	}

	#[tokio::test]
	async fn test_corrupt_records_are_treated_as_absent() {
		let (store, _, backend) = setup();
		backend
			.set_bytes("orders:canteen", b"{broken".to_vec())
			.await
			.unwrap();
		backend
			.set_bytes("order_seq:canteen", b"\"many\"".to_vec())
			.await
			.unwrap();
		backend
			.set_bytes("verified_orders:canteen", b"42".to_vec())
			.await
			.unwrap();
		backend
			.set_bytes("pending_order:canteen", b"[nope".to_vec())
			.await
			.unwrap();

		assert!(store.list().await.unwrap().is_empty());
		assert!(store.verified_ids().await.unwrap().is_empty());
		assert!(store.ingest_pending().await.unwrap().is_none());
		assert!(matches!(
			backend.get_bytes("pending_order:canteen").await,
			Err(StorageError::NotFound)
		));

		let order = store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(order.number, 1001);
		assert_eq!(store.list().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_snapshot_with_malformed_fields_is_clamped_not_dropped() {
		let (store, _, backend) = setup();
		backend
			.set_bytes(
				"pending_order:canteen",
				br#"{"items":[
					{"name":"Tea","qty":2,"price":null,"time":"5 mins"},
					{"name":"Vada","qty":1.5,"price":"20","time":"5-10 mins"},
					{"name":"Juice","qty":null,"price":-4,"time":null}
				],"createdAt":1700000000000}"#
					.to_vec(),
			)
			.await
			.unwrap();

		let order = store.ingest_pending().await.unwrap().expect("snapshot was dropped");
		assert_eq!(order.number, 1001);
		assert_eq!(order.items.len(), 3);
		assert_eq!((order.items[0].qty, order.items[0].price), (2, 0.0));
		assert_eq!((order.items[1].qty, order.items[1].price), (1, 20.0));
		assert_eq!((order.items[2].qty, order.items[2].price), (1, 0.0));
		// The missing hint falls back to the default 15-20 minute range.
		assert_eq!(order.duration_ms, 1_500_000);
		assert_eq!(store.list().await.unwrap().len(), 1);
		assert!(matches!(
			backend.get_bytes("pending_order:canteen").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_scopes_are_isolated() {
		let (store, clock, backend) = setup();
		let storage = Arc::new(StorageService::new(Box::new(backend.clone())));
		let other = OrderStore::new(storage, clock, "annex");

		store
			.ingest(&snapshot(vec![item("Tea", 1, 30.0, "5 mins")]))
			.await
			.unwrap();
		assert!(other.list().await.unwrap().is_empty());
		assert_eq!(store.verified_key(), "verified_orders:canteen");
		assert_eq!(other.pending_key(), "pending_order:annex");
	}
}
