//! Builder for constructing tracker engines.
//!
//! Storage backends are pluggable: the binary registers a factory per
//! implementation name and the builder instantiates the ones named in the
//! configuration, handing the primary one to the engine.

use crate::clock::{Clock, SystemClock};
use crate::engine::{event_bus::EventBus, TrackerEngine};
use canteen_config::Config;
use canteen_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Capacity of the tracker event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during tracker construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions available to the builder, keyed by implementation name.
pub struct TrackerFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for a [`TrackerEngine`].
pub struct TrackerBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl TrackerBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the system clock, mainly for tests and simulations.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub fn build<SF>(self, factories: TrackerFactories<SF>) -> Result<TrackerEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "No factory registered");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"No valid storage implementations available".into(),
			));
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		Ok(TrackerEngine::new(
			self.config,
			storage,
			self.clock,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use canteen_storage::StorageFactory;

	fn factories() -> TrackerFactories<StorageFactory> {
		TrackerFactories {
			storage_factories: canteen_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[test]
	fn test_build_with_memory_storage() {
		let config: Config = r#"
[tracker]
id = "canteen"
sequence_base = 41

[storage]
primary = "memory"

[storage.implementations.memory]
"#
		.parse()
		.unwrap();

		let engine = TrackerBuilder::new(config).build(factories()).unwrap();
		assert_eq!(engine.store().scope(), "canteen");
		assert_eq!(engine.config().tracker.sequence_base, 41);
	}

	#[test]
	fn test_unknown_implementation_is_missing() {
		let config: Config = r#"
[tracker]
id = "canteen"

[storage]
primary = "redis"

[storage.implementations.redis]
url = "redis://localhost"
"#
		.parse()
		.unwrap();

		let result = TrackerBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[test]
	fn test_invalid_backend_config_is_rejected() {
		let config: Config = r#"
[tracker]
id = "canteen"

[storage]
primary = "file"

[storage.implementations.file]
storage_path = 42
"#
		.parse()
		.unwrap();

		let result = TrackerBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
