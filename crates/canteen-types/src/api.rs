//! API types for the order tracker HTTP API.
//!
//! These are the read models handed to the view layer: orders split into the
//! live and previous buckets, each carrying its status label and the progress
//! fraction sampled at response time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Order, OrderLineItem, OrderStatus};

/// Render-ready view of a single order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
	pub id: String,
	pub number: u64,
	/// Zero-padded number, e.g. `#1001`.
	pub display_number: String,
	pub items: Vec<OrderLineItem>,
	pub summary: String,
	pub total: f64,
	pub status: OrderStatus,
	pub status_label: String,
	/// Completion fraction in `[0, 1]`.
	pub progress: f64,
	pub start_ts: u64,
	pub duration_ms: i64,
	/// Estimated ready time as RFC 3339, when representable.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ready_at: Option<String>,
}

impl OrderView {
	/// Builds a view of `order` with progress sampled at `now_ms`.
	///
	/// Completed orders always report full progress.
	pub fn new(order: &Order, now_ms: u64) -> Self {
		let progress = if order.status.is_live() {
			order.progress_at(now_ms)
		} else {
			1.0
		};
		let ready_at = i64::try_from(order.ready_at())
			.ok()
			.and_then(DateTime::<Utc>::from_timestamp_millis)
			.map(|dt| dt.to_rfc3339());

		Self {
			id: order.id.clone(),
			number: order.number,
			display_number: order.display_number(),
			items: order.items.clone(),
			summary: order.summary(),
			total: order.total(),
			status: order.status,
			status_label: order.status.label().to_string(),
			progress,
			start_ts: order.start_ts,
			duration_ms: order.duration_ms,
			ready_at,
		}
	}
}

/// Orders split into the two tracking buckets, most recent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBucketsResponse {
	/// Orders still `preparing` or `ready`.
	pub live: Vec<OrderView>,
	/// Orders verified as `completed`.
	pub previous: Vec<OrderView>,
}

/// Result of the development force-verify hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
	pub order_id: String,
	/// Whether the call moved the order to `completed`.
	pub changed: bool,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Bad request (400)
	BadRequest { error_type: String, message: String },
	/// Unknown resource (404)
	NotFound { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message),
		};
		ErrorResponse {
			error: error_type.clone(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
