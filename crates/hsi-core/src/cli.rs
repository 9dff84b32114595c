//! Shared CLI helpers for workspace tools.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flag.
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}

/// Read a fetch configuration (data home, HTTP, split, patch size) from
/// TOML. Keys left out keep their defaults.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Cannot read dataset config {}: {e}",
            path.display()
        ))
    })?;

    let config = toml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Invalid dataset config {} (expected keys: data_home, download_if_missing, \
             patch_size, [http], [split]): {e}",
            path.display()
        ))
    })?;
    debug!("Loaded dataset config from {}", path.display());
    Ok(config)
}
