//! Configuration module for the canteen order tracker.
//!
//! Configuration is loaded from a TOML file. String values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`; these are resolved
//! before parsing. The parsed configuration is validated before use.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order tracker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this tracker instance.
	pub tracker: TrackerConfig,
	/// Preparation time estimation settings.
	#[serde(default)]
	pub estimation: EstimationConfig,
	/// Progress timer settings.
	#[serde(default)]
	pub progress: ProgressConfig,
	/// Verification monitoring settings.
	#[serde(default)]
	pub verification: VerificationConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the tracker instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
	/// Scope under which all records are stored. Processes that should see
	/// the same orders must use the same id.
	pub id: String,
	/// Value the order number sequence starts from; the first order gets
	/// `sequence_base + 1`.
	#[serde(default = "default_sequence_base")]
	pub sequence_base: u64,
}

fn default_sequence_base() -> u64 {
	1000
}

/// Preparation time estimation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EstimationConfig {
	/// Minutes added to the slowest item for packing and handoff.
	#[serde(default = "default_buffer_minutes")]
	pub buffer_minutes: u64,
	/// Lower bound assumed for an unparseable prep-time hint.
	#[serde(default = "default_min_minutes")]
	pub default_min_minutes: u64,
	/// Upper bound assumed for an unparseable prep-time hint.
	#[serde(default = "default_max_minutes")]
	pub default_max_minutes: u64,
	/// Minutes used when no item yields a positive upper bound.
	#[serde(default = "default_fallback_minutes")]
	pub fallback_minutes: u64,
	/// Use the checkout's `estimatedReadyAt` instead of the hint-based
	/// estimate when it lies after the preparation start.
	#[serde(default)]
	pub honor_estimated_ready_at: bool,
}

fn default_buffer_minutes() -> u64 {
	5
}

fn default_min_minutes() -> u64 {
	15
}

fn default_max_minutes() -> u64 {
	20
}

fn default_fallback_minutes() -> u64 {
	20
}

impl Default for EstimationConfig {
	fn default() -> Self {
		Self {
			buffer_minutes: default_buffer_minutes(),
			default_min_minutes: default_min_minutes(),
			default_max_minutes: default_max_minutes(),
			fallback_minutes: default_fallback_minutes(),
			honor_estimated_ready_at: false,
		}
	}
}

/// Progress timer settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
	/// Interval between progress recomputations, roughly one display frame.
	#[serde(default = "default_tick_interval_ms")]
	pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
	16
}

impl Default for ProgressConfig {
	fn default() -> Self {
		Self {
			tick_interval_ms: default_tick_interval_ms(),
		}
	}
}

/// Verification monitoring settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
	/// How often the verified-id set is re-read, in addition to change
	/// notifications. Catches writes from other processes.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
	1000
}

impl Default for VerificationConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: default_poll_interval_ms(),
		}
	}
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3001
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads and validates configuration from a file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		content.parse()
	}

	/// Validates the configuration to ensure all values are usable.
	fn validate(&self) -> Result<(), ConfigError> {
		let id = &self.tracker.id;
		if id.is_empty() {
			return Err(ConfigError::Validation("Tracker ID cannot be empty".into()));
		}
		if !id
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
		{
			return Err(ConfigError::Validation(format!(
				"Tracker ID '{}' may only contain ASCII letters, digits, '-' and '_'",
				id
			)));
		}

		let estimation = &self.estimation;
		if estimation.default_min_minutes > estimation.default_max_minutes {
			return Err(ConfigError::Validation(format!(
				"estimation.default_min_minutes ({}) cannot exceed default_max_minutes ({})",
				estimation.default_min_minutes, estimation.default_max_minutes
			)));
		}
		if estimation.fallback_minutes == 0 {
			return Err(ConfigError::Validation(
				"estimation.fallback_minutes must be greater than 0".into(),
			));
		}

		if !(1..=1000).contains(&self.progress.tick_interval_ms) {
			return Err(ConfigError::Validation(
				"progress.tick_interval_ms must be between 1 and 1000".into(),
			));
		}

		if !(10..=60_000).contains(&self.verification.poll_interval_ms) {
			return Err(ConfigError::Validation(
				"verification.poll_interval_ms must be between 10 and 60000".into(),
			));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return Err(ConfigError::Validation(
					"API port must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
