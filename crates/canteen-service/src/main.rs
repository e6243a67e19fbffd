//! Main entry point for the canteen order tracker.
//!
//! Loads the configuration, wires the configured storage backend into the
//! tracker engine and runs it, optionally next to the HTTP API.

use canteen_config::Config;
use canteen_core::{TrackerBuilder, TrackerEngine, TrackerFactories};
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use canteen_storage::implementations::file::create_storage as create_file_storage;
use canteen_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the tracker service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG wins over the flag when set
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order tracker");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.tracker.id);

	let engine = Arc::new(build_tracker(config.clone())?);

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);
			run_with_api(&engine, server::start_server(api_config, api_engine)).await?;
		},
		None => {
			tracing::info!("Starting tracker only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped order tracker");
	Ok(())
}

/// Runs the engine next to the API server until either one finishes.
///
/// When the server stops first, successfully or not, the engine's timers are
/// shut down before its result is returned.
async fn run_with_api<F>(engine: &TrackerEngine, api: F) -> Result<(), Box<dyn std::error::Error>>
where
	F: Future<Output = Result<(), Box<dyn std::error::Error>>>,
{
	tokio::select! {
		result = engine.run() => {
			tracing::info!("Tracker finished");
			result?;
		}
		result = api => {
			tracing::info!("API server finished");
			if let Err(e) = &result {
				tracing::error!(error = %e, "API server failed");
			}
			// The engine loop was dropped mid-flight, stop its timers.
			engine.shutdown().await?;
			result?;
		}
	}
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the tracker engine with the available storage backends.
fn build_tracker(config: Config) -> Result<TrackerEngine, Box<dyn std::error::Error>> {
	let builder = TrackerBuilder::new(config);

	let storage_factories = create_factory_map!(
		canteen_storage::StorageInterface,
		canteen_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	Ok(builder.build(TrackerFactories { storage_factories })?)
}
