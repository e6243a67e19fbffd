//! Order types for the canteen order tracker.
//!
//! This module defines tracked orders and their line items, the forward-only
//! status lifecycle, and the checkout snapshot handed over by the cart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::format_order_number;

/// Lifecycle status of a tracked order.
///
/// Progression is forward-only: `Preparing -> Ready -> Completed`, with
/// `Preparing -> Completed` allowed when verification arrives early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	/// The kitchen is working on the order.
	Preparing,
	/// The estimated preparation time has elapsed, awaiting pickup.
	Ready,
	/// Verified as handed over. Terminal.
	Completed,
}

impl OrderStatus {
	/// Returns the persisted string representation.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Preparing => "preparing",
			OrderStatus::Ready => "ready",
			OrderStatus::Completed => "completed",
		}
	}

	/// Returns the shopper-facing label.
	pub fn label(&self) -> &'static str {
		match self {
			OrderStatus::Preparing => "Preparing",
			OrderStatus::Ready => "Ready for Pickup",
			OrderStatus::Completed => "Completed",
		}
	}

	/// Live orders are shown in the active tracking view.
	pub fn is_live(&self) -> bool {
		matches!(self, OrderStatus::Preparing | OrderStatus::Ready)
	}

	/// Checks whether moving from `self` to `next` is a forward transition.
	pub fn can_transition_to(&self, next: OrderStatus) -> bool {
		matches!(
			(self, next),
			(OrderStatus::Preparing, OrderStatus::Ready)
				| (OrderStatus::Preparing, OrderStatus::Completed)
				| (OrderStatus::Ready, OrderStatus::Completed)
		)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"preparing" => Ok(OrderStatus::Preparing),
			"ready" => Ok(OrderStatus::Ready),
			"completed" => Ok(OrderStatus::Completed),
			other => Err(format!("Unknown order status: {}", other)),
		}
	}
}

/// A single line of a tracked order. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
	pub name: String,
	/// Always at least 1.
	pub qty: u32,
	/// Unit price, never negative.
	pub price: f64,
	/// Free-form preparation hint such as "20–25 mins".
	#[serde(alias = "time")]
	pub prep_time_hint: String,
}

impl OrderLineItem {
	/// Price of the line (unit price times quantity).
	pub fn subtotal(&self) -> f64 {
		self.price * f64::from(self.qty)
	}
}

/// A paid cart converted into a trackable preparation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Opaque identifier used for verification lookups.
	pub id: String,
	/// Human-facing sequence number.
	pub number: u64,
	/// Line items in checkout order. Never empty.
	pub items: Vec<OrderLineItem>,
	/// Epoch milliseconds at which preparation is considered to begin.
	pub start_ts: u64,
	/// Estimated preparation time in milliseconds, fixed at ingestion.
	/// Signed so that records written by other clients with bogus values
	/// still deserialize; non-positive values count as already elapsed.
	pub duration_ms: i64,
	pub status: OrderStatus,
	/// Epoch milliseconds of ingestion.
	#[serde(default)]
	pub created_at: u64,
}

impl Order {
	/// Completion fraction in `[0, 1]` at the given instant.
	pub fn progress_at(&self, now_ms: u64) -> f64 {
		if self.duration_ms <= 0 {
			return 1.0;
		}
		let elapsed = now_ms.saturating_sub(self.start_ts) as f64;
		(elapsed / self.duration_ms as f64).clamp(0.0, 1.0)
	}

	/// Epoch milliseconds at which the order is expected to be ready.
	pub fn ready_at(&self) -> u64 {
		self.start_ts
			.saturating_add(u64::try_from(self.duration_ms).unwrap_or(0))
	}

	pub fn is_live(&self) -> bool {
		self.status.is_live()
	}

	/// Sum of all line subtotals.
	pub fn total(&self) -> f64 {
		self.items.iter().map(OrderLineItem::subtotal).sum()
	}

	/// Zero-padded display number, e.g. `#1001`.
	pub fn display_number(&self) -> String {
		format_order_number(self.number)
	}

	/// One-line summary, e.g. `Tea × 2 • Samosa × 1`.
	pub fn summary(&self) -> String {
		self.items
			.iter()
			.map(|it| format!("{} × {}", it.name, it.qty))
			.collect::<Vec<_>>()
			.join(" • ")
	}
}

/// A cart line as written by the checkout collaborator.
///
/// Fields are lenient: anything missing, null or of the wrong type falls
/// back to a default, and the order store clamps out-of-range values during
/// ingestion. A bad field never makes the whole snapshot unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingLineItem {
	#[serde(default, deserialize_with = "deserialize_lenient_text")]
	pub name: String,
	#[serde(default = "default_qty", deserialize_with = "deserialize_lenient_qty")]
	pub qty: i64,
	#[serde(default, deserialize_with = "deserialize_lenient_price")]
	pub price: f64,
	#[serde(
		default,
		alias = "prepTimeHint",
		deserialize_with = "deserialize_lenient_text"
	)]
	pub time: String,
}

fn default_qty() -> i64 {
	1
}

/// Any JSON scalar a cart might write into a line item field.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseValue {
	Int(i64),
	Float(f64),
	Text(String),
	Other(serde::de::IgnoredAny),
}

/// Whole quantities pass through, fractions are truncated and numeric
/// strings are parsed. Anything else becomes 1.
fn deserialize_lenient_qty<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let qty = match LooseValue::deserialize(deserializer)? {
		LooseValue::Int(n) => Some(n),
		LooseValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
		LooseValue::Text(s) => {
			let s = s.trim();
			s.parse::<i64>().ok().or_else(|| {
				s.parse::<f64>()
					.ok()
					.filter(|f| f.is_finite())
					.map(|f| f.trunc() as i64)
			})
		},
		_ => None,
	};
	Ok(qty.unwrap_or_else(default_qty))
}

/// Numbers and numeric strings are taken as the price. Anything else is 0.
fn deserialize_lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let price = match LooseValue::deserialize(deserializer)? {
		LooseValue::Int(n) => n as f64,
		LooseValue::Float(f) => f,
		LooseValue::Text(s) => s.trim().parse().unwrap_or(0.0),
		LooseValue::Other(_) => 0.0,
	};
	Ok(price)
}

fn deserialize_lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let text = match LooseValue::deserialize(deserializer)? {
		LooseValue::Text(s) => s,
		LooseValue::Int(n) => n.to_string(),
		LooseValue::Float(f) => f.to_string(),
		LooseValue::Other(_) => String::new(),
	};
	Ok(text)
}

/// Checkout snapshot left behind by the cart after a successful payment.
///
/// Read once by the order store and cleared afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
	#[serde(default)]
	pub items: Vec<PendingLineItem>,
	#[serde(default)]
	pub created_at: Option<u64>,
	/// Pickup time requested by the shopper, if any.
	#[serde(default)]
	pub scheduled_for: Option<u64>,
	/// Ready time estimated by the checkout flow, if any.
	#[serde(default)]
	pub estimated_ready_at: Option<u64>,
}

impl PendingOrder {
	/// Snapshots without items never produce an order.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}
