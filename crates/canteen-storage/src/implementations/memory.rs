//! In-memory storage backend.
//!
//! Useful for tests and for running the tracker without persistence. Every
//! handle cloned from one `MemoryStorage` shares the same map and the same
//! change channel, which is how tests model two processes sharing a store.

use crate::{StorageChange, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use canteen_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// In-memory storage implementation.
#[derive(Clone)]
pub struct MemoryStorage {
	/// The in-memory store protected by a read-write lock.
	store: Arc<RwLock<HashMap<String, Vec<u8>>>>,
	changes: broadcast::Sender<StorageChange>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
			changes,
		}
	}

	fn notify(&self, key: &str) {
		// No subscribers is fine.
		let _ = self.changes.send(StorageChange {
			key: key.to_string(),
		});
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		store.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		{
			let mut store = self.store.write().await;
			store.insert(key.to_string(), value);
		}
		self.notify(key);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let removed = {
			let mut store = self.store.write().await;
			store.remove(key).is_some()
		};
		if removed {
			self.notify(key);
		}
		Ok(())
	}

	fn subscribe(&self) -> Option<broadcast::Receiver<StorageChange>> {
		Some(self.changes.subscribe())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
