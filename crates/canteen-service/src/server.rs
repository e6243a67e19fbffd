//! HTTP server for the order tracker API.
//!
//! Serves the read side (order buckets, single orders with live progress)
//! and the two write paths a storefront needs: checkout and the development
//! force-verify hook.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use canteen_config::ApiConfig;
use canteen_core::TrackerEngine;
use canteen_types::{APIError, OrderBucketsResponse, OrderView, VerifyResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the tracker engine for processing requests.
	pub engine: Arc<TrackerEngine>,
}

/// Builds the router with all routes and middleware.
pub fn router(engine: Arc<TrackerEngine>) -> Router {
	Router::new()
		.route("/health", get(handle_health))
		.nest(
			"/api",
			Router::new()
				.route("/orders", get(handle_list_orders))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/verify", post(handle_verify))
				.route("/checkout", post(handle_checkout)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(AppState { engine })
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<TrackerEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order tracker API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

async fn handle_health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

/// Handles GET /api/orders requests.
async fn handle_list_orders(
	State(state): State<AppState>,
) -> Result<Json<OrderBucketsResponse>, APIError> {
	crate::apis::orders::list_orders(&state.engine)
		.await
		.map(Json)
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderView>, APIError> {
	crate::apis::orders::get_order(&id, &state.engine)
		.await
		.map(Json)
}

/// Handles POST /api/checkout requests.
///
/// Responds 201 with the new order, or 204 when the cart was empty.
async fn handle_checkout(
	State(state): State<AppState>,
	Json(payload): Json<Value>,
) -> Result<Response, APIError> {
	match crate::apis::orders::checkout(payload, &state.engine).await? {
		Some(order) => Ok((StatusCode::CREATED, Json(order)).into_response()),
		None => Ok(StatusCode::NO_CONTENT.into_response()),
	}
}

/// Handles POST /api/orders/{id}/verify requests.
async fn handle_verify(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<VerifyResponse>, APIError> {
	crate::apis::orders::force_verify(&id, &state.engine)
		.await
		.map(Json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::{to_bytes, Body};
	use axum::http::Request;
	use canteen_config::Config;
	use canteen_core::{TrackerBuilder, TrackerFactories};
	use tower::ServiceExt;

	fn app() -> Router {
		let config: Config = r#"
[tracker]
id = "canteen"

[storage]
primary = "memory"

[storage.implementations.memory]
"#
		.parse()
		.unwrap();
		let factories = TrackerFactories {
			storage_factories: canteen_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		};
		let engine = TrackerBuilder::new(config).build(factories).unwrap();
		router(Arc::new(engine))
	}

	async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let request = Request::builder()
			.method(method)
			.uri(uri)
			.header("content-type", "application/json");
		let request = match body {
			Some(body) => request.body(Body::from(body.to_string())).unwrap(),
			None => request.body(Body::empty()).unwrap(),
		};
		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let json = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, json)
	}

	#[tokio::test]
	async fn test_health() {
		let (status, body) = send(&app(), "GET", "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
	}

	#[tokio::test]
	async fn test_checkout_list_and_verify() {
		let app = app();

		let cart = json!({
			"items": [
				{ "name": "Tea", "qty": 2, "price": 30, "time": "5 mins" },
				{ "name": "Samosa", "qty": 1, "price": 40, "time": "5-10 mins" }
			]
		});
		let (status, order) = send(&app, "POST", "/api/checkout", Some(cart)).await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(order["displayNumber"], "#1001");
		assert_eq!(order["durationMs"], 900_000);
		assert_eq!(order["total"], 100.0);
		assert_eq!(order["summary"], "Tea × 2 • Samosa × 1");
		assert_eq!(order["statusLabel"], "Preparing");
		let id = order["id"].as_str().unwrap().to_string();

		let (status, buckets) = send(&app, "GET", "/api/orders", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(buckets["live"].as_array().unwrap().len(), 1);
		assert!(buckets["previous"].as_array().unwrap().is_empty());

		let (status, verified) =
			send(&app, "POST", &format!("/api/orders/{}/verify", id), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(verified["changed"], true);

		let (_, order) = send(&app, "GET", &format!("/api/orders/{}", id), None).await;
		assert_eq!(order["status"], "completed");
		assert_eq!(order["progress"], 1.0);

		let (_, buckets) = send(&app, "GET", "/api/orders", None).await;
		assert!(buckets["live"].as_array().unwrap().is_empty());
		assert_eq!(buckets["previous"].as_array().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_empty_cart_and_errors() {
		let app = app();

		let (status, _) = send(&app, "POST", "/api/checkout", Some(json!({ "items": [] }))).await;
		assert_eq!(status, StatusCode::NO_CONTENT);

		let (status, body) =
			send(&app, "POST", "/api/checkout", Some(json!({ "items": "tea" }))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_SNAPSHOT");

		let (status, body) = send(&app, "GET", "/api/orders/ord_missing", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "ORDER_NOT_FOUND");

		let (status, _) = send(&app, "POST", "/api/orders/ord_missing/verify", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}
