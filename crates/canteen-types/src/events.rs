//! Event types for communication between tracker components.
//!
//! Events flow through the tracker's event bus so that the progress engine,
//! the verification monitor and any attached view can react to changes made
//! elsewhere without calling each other directly.

use crate::Order;
use serde::{Deserialize, Serialize};

/// Main event type encompassing all tracker events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrackerEvent {
	/// Events about the order lifecycle.
	Order(OrderEvent),
	/// Per-tick progress updates for live orders.
	Progress(ProgressEvent),
}

/// Events related to order lifecycle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A checkout snapshot was turned into a tracked order.
	Ingested { order: Order },
	/// The estimated preparation time elapsed.
	Ready { order_id: String },
	/// The order was verified as handed over.
	Completed { order_id: String },
}

/// Progress update emitted on every tick of a live order's timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
	pub order_id: String,
	/// Completion fraction in `[0, 1]`.
	pub fraction: f64,
}
