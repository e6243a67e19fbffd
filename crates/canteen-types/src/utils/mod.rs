//! Utility functions shared across the tracker crates.

pub mod formatting;
pub mod helpers;

pub use formatting::{format_order_number, truncate_id};
pub use helpers::current_timestamp_ms;
