//! Command handlers for the binary

pub mod cache;
pub mod run;

use crate::cli::CommonArgs;
use pokeapi_pipeline::{Config, Result};

/// Load the config file named on the command line, or the defaults
///
/// Command-line overrides are applied by the caller; validation happens once
/// everything is merged.
pub fn load_config(common: &CommonArgs) -> Result<Config> {
    let mut config = match &common.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            Config::from_file(path)?
        }
        None => Config::default(),
    };

    if let Some(dir) = &common.cache_dir {
        config.cache.dir = dir.clone();
    }

    Ok(config)
}
