//! Common types module for the canteen order tracker.
//!
//! This module defines the core data types shared by the storage, config,
//! tracking engine and service crates, so every layer agrees on the shape of
//! orders, checkout snapshots and tracker events.

/// API types for HTTP endpoints and response views.
pub mod api;
/// Event types for communication between tracker components.
pub mod events;
/// Order types: line items, statuses, checkout snapshots.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage key types for the persisted records.
pub mod storage;
/// Utility functions for formatting and timestamps.
pub mod utils;
/// Configuration validation types for backend configuration tables.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{current_timestamp_ms, format_order_number, truncate_id};
pub use validation::*;
