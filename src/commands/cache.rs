//! `pokeapi-pipeline cache`

use crate::cli::{CacheArgs, CacheCommand, CommonArgs};
use crate::commands::load_config;
use pokeapi_pipeline::{ResponseCache, Result};

/// Inspect or clean the configured response cache
pub fn cache(common: &CommonArgs, args: &CacheArgs) -> Result<()> {
    let config = load_config(common)?;
    config.validate()?;
    let cache = ResponseCache::from_config(&config.cache)?;

    match args.command {
        CacheCommand::Stats => {
            let stats = cache.stats()?;
            println!("Cache: {}", config.cache.dir.display());
            println!("Entries: {}", stats.entries);
            println!("Expired: {}", stats.expired);
            println!("Size: {:.2} KB", stats.size_bytes as f64 / 1024.0);
        }
        CacheCommand::Purge => {
            let removed = cache.purge_expired()?;
            println!("Removed {removed} expired entries");
        }
        CacheCommand::Clear => {
            let removed = cache.clear()?;
            println!("Removed {removed} entries");
        }
    }

    Ok(())
}
