//! Persistent order state.
//!
//! The order store is the single owner of the order list, the sequence
//! counter and the verified set for a tracker scope.

pub mod order;

pub use order::{OrderBuckets, OrderStore, OrderStoreError, DEFAULT_SEQUENCE_BASE};
