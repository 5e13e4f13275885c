//! `pokeapi-pipeline run`

use crate::cli::{CommonArgs, RunArgs};
use crate::commands::load_config;
use pokeapi_pipeline::{Config, Pipeline, ResponseCache, Result};
use std::time::Duration;

/// Run the pipeline for every key, printing one output path per success
///
/// Returns the exit status: 0 when every key succeeded, otherwise the code of
/// the first failing key.
pub async fn run(common: &CommonArgs, args: &RunArgs) -> Result<u8> {
    let mut config = load_config(common)?;
    apply_overrides(&mut config, args);
    config.validate()?;

    let pipeline = Pipeline::new(config)?;
    pipeline.ensure_output_dir()?;

    tracing::info!(
        keys = ?args.keys,
        variant = ?pipeline.variant(),
        "starting pipeline"
    );

    let outcomes = pipeline.run_all(&args.keys).await;

    let mut exit_code = 0;
    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => println!("{}", path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("error: {e}");
                if exit_code == 0 {
                    exit_code = e.exit_code();
                }
            }
        }
    }

    tracing::info!(
        succeeded = outcomes.len() - failed,
        failed,
        "pipeline finished"
    );
    log_cache_state(pipeline.cache());
    Ok(exit_code)
}

fn log_cache_state(cache: &ResponseCache) {
    if !cache.is_enabled() {
        tracing::debug!("response cache disabled");
        return;
    }

    match cache.stats() {
        Ok(stats) => tracing::debug!(
            entries = stats.entries,
            expired = stats.expired,
            size_bytes = stats.size_bytes,
            "response cache state"
        ),
        Err(e) => tracing::warn!(error = %e, "failed to read cache stats"),
    }
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(variant) = args.variant {
        config.fetch.variant = variant.into();
    }
    if let Some(mode) = args.mode {
        config.fetch.mode = mode.into();
    }
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(limit) = args.max_concurrent {
        config.fetch.max_concurrent = Some(limit);
    }
    if let Some(secs) = args.timeout {
        config.api.request_timeout = Duration::from_secs(secs);
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use pokeapi_pipeline::{FetchMode, PipelineVariant};
    use std::path::PathBuf;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let args = run_args(&[
            "pokeapi-pipeline",
            "run",
            "2",
            "--variant",
            "names",
            "--mode",
            "sequential",
            "--base-url",
            "http://localhost:9000",
            "--output-dir",
            "out",
            "--max-concurrent",
            "3",
            "--timeout",
            "5",
            "--no-cache",
        ]);

        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.fetch.variant, PipelineVariant::Names);
        assert_eq!(config.fetch.mode, FetchMode::Sequential);
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert_eq!(config.fetch.max_concurrent, Some(3));
        assert_eq!(config.api.request_timeout, Duration::from_secs(5));
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = run_args(&["pokeapi-pipeline", "run", "2"]);
        let mut config = Config::default();
        config.fetch.variant = PipelineVariant::Names;

        apply_overrides(&mut config, &args);

        assert_eq!(config.fetch.variant, PipelineVariant::Names);
        assert!(config.cache.enabled);
    }
}
