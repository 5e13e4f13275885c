//! Test configuration helpers for building pipelines against a mock server

use pokeapi_pipeline::{CacheBackendKind, Config, FetchMode, Pipeline, PipelineVariant};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Config pointing at `server`, with output and cache under `temp_dir`
///
/// Uses the in-memory cache and short retry delays so failure paths finish quickly.
pub fn test_config(server: &MockServer, temp_dir: &TempDir, variant: PipelineVariant) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.api.request_timeout = Duration::from_secs(5);
    config.fetch.variant = variant;
    config.fetch.mode = FetchMode::Concurrent;
    config.fetch.retry.initial_delay = Duration::from_millis(10);
    config.fetch.retry.max_delay = Duration::from_millis(50);
    config.fetch.retry.jitter = false;
    config.cache.backend = CacheBackendKind::Memory;
    config.cache.dir = temp_dir.path().join("cache");
    config.output.dir = output_dir(temp_dir);
    config
}

/// Output directory used by [`test_config`]
pub fn output_dir(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join("pokemon_data")
}

/// Build a pipeline from `config` with its output directory created
pub fn create_test_pipeline(config: Config) -> Pipeline {
    let pipeline = Pipeline::new(config).expect("pipeline config should be valid");
    pipeline
        .ensure_output_dir()
        .expect("output dir should be creatable");
    pipeline
}
