//! Order endpoints.
//!
//! These are the operations a storefront UI needs: list orders split into
//! live and previous, look one up with its current progress, hand over a
//! paid cart, and (in development) force an order through verification.

use canteen_core::{EngineError, TrackerEngine};
use canteen_types::{
	truncate_id, APIError, Order, OrderBucketsResponse, OrderView, PendingOrder, VerifyResponse,
};
use serde_json::Value;
use tracing::{info, warn};

fn internal(e: EngineError) -> APIError {
	warn!(error = %e, "Order request failed");
	APIError::InternalServerError {
		error_type: "STORAGE_ERROR".to_string(),
		message: e.to_string(),
	}
}

fn not_found(order_id: &str) -> APIError {
	APIError::NotFound {
		error_type: "ORDER_NOT_FOUND".to_string(),
		message: format!("Order not found: {}", order_id),
	}
}

fn view(engine: &TrackerEngine, order: &Order) -> OrderView {
	OrderView::new(order, engine.store().clock().now_ms())
}

/// Lists orders, most recent first, split into live and previous.
pub async fn list_orders(engine: &TrackerEngine) -> Result<OrderBucketsResponse, APIError> {
	let buckets = engine.buckets().await.map_err(internal)?;
	Ok(OrderBucketsResponse {
		live: buckets.live.iter().map(|o| view(engine, o)).collect(),
		previous: buckets.previous.iter().map(|o| view(engine, o)).collect(),
	})
}

pub async fn get_order(order_id: &str, engine: &TrackerEngine) -> Result<OrderView, APIError> {
	match engine.order(order_id).await.map_err(internal)? {
		Some(order) => Ok(view(engine, &order)),
		None => Err(not_found(order_id)),
	}
}

/// Accepts a checkout snapshot. Returns `None` when the cart had no items.
pub async fn checkout(payload: Value, engine: &TrackerEngine) -> Result<Option<OrderView>, APIError> {
	let snapshot: PendingOrder =
		serde_json::from_value(payload).map_err(|e| APIError::BadRequest {
			error_type: "INVALID_SNAPSHOT".to_string(),
			message: e.to_string(),
		})?;

	let order = engine.checkout(&snapshot).await.map_err(internal)?;
	if let Some(order) = &order {
		info!(
			order_id = %truncate_id(&order.id),
			number = %order.display_number(),
			items = order.items.len(),
			"Checkout accepted"
		);
	}
	Ok(order.map(|o| view(engine, &o)))
}

/// Development hook that marks an order as verified.
pub async fn force_verify(order_id: &str, engine: &TrackerEngine) -> Result<VerifyResponse, APIError> {
	match engine.force_verify(order_id).await {
		Ok(changed) => Ok(VerifyResponse {
			order_id: order_id.to_string(),
			changed,
		}),
		Err(EngineError::OrderNotFound(_)) => Err(not_found(order_id)),
		Err(e) => Err(internal(e)),
	}
}
