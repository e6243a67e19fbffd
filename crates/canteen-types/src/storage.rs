//! Storage-related types for the canteen order tracker.

/// Storage keys for the records shared through the key-value store.
///
/// Each key is combined with the tracker id, so several storefronts can share
/// one backend without seeing each other's orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// The order list, most recent first
	Orders,
	/// The persisted order number sequence
	OrderSeq,
	/// The checkout snapshot waiting to be ingested
	PendingOrder,
	/// Ids of orders verified as handed over
	VerifiedOrders,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrderSeq => "order_seq",
			StorageKey::PendingOrder => "pending_order",
			StorageKey::VerifiedOrders => "verified_orders",
		}
	}
}
