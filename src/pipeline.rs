//! Pipeline orchestration
//!
//! One run per resource key, moving through fixed stages:
//!
//! ```text
//! VALIDATE → FETCH_PRIMARY → EXTRACT → [FETCH_SECONDARY] → PERSIST → DONE
//!     └──────────────┴───────────┴──────────────┴─────────────┴──→ FAILED
//! ```
//!
//! `FETCH_SECONDARY` only runs for [`PipelineVariant::Forms`]. A failure in any
//! stage ends the run in `FAILED` before `PERSIST`, so nothing is written for
//! that key. Keys are independent: the cache and the output directory are the
//! only things concurrent runs share.

use crate::cache::{OP_TYPE_PAYLOAD, ResponseCache};
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::{extract_names, extract_urls};
use crate::persist::Persister;
use crate::subfetch::SubResourceFetcher;
use crate::types::{
    Event, KeyOutcome, MemberList, PipelineVariant, RawPayload, ResourceKey, Stage,
};
use crate::utils::ensure_dir;
use futures::{StreamExt, stream};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;

/// Capacity of the event channel; slow subscribers lag rather than block runs
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Staged fetch → extract → persist pipeline
#[derive(Debug)]
pub struct Pipeline {
    client: ApiClient,
    cache: Arc<ResponseCache>,
    sub_fetcher: SubResourceFetcher,
    persister: Persister,
    variant: PipelineVariant,
    max_concurrent_keys: usize,
    event_tx: broadcast::Sender<Event>,
}

impl Pipeline {
    /// Build a pipeline and the cache described by `config`
    ///
    /// The config is validated before the cache directory is created.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let cache = ResponseCache::from_config(&config.cache)?;
        Self::with_cache(config, cache)
    }

    /// Build a pipeline around an existing cache
    pub fn with_cache(config: Config, cache: ResponseCache) -> Result<Self> {
        config.validate()?;

        let client = ApiClient::new(&config.api)?;
        let cache = Arc::new(cache);
        let sub_fetcher =
            SubResourceFetcher::new(client.clone(), Arc::clone(&cache), &config.fetch);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            cache,
            sub_fetcher,
            persister: Persister::new(config.output.dir),
            variant: config.fetch.variant,
            max_concurrent_keys: config.fetch.max_concurrent_keys,
            event_tx,
        })
    }

    /// Subscribe to stage and completion events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The shared response cache
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The output file writer
    pub fn persister(&self) -> &Persister {
        &self.persister
    }

    /// What this pipeline persists
    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    /// Create the output directory if it is missing
    pub fn ensure_output_dir(&self) -> Result<()> {
        ensure_dir(self.persister.output_dir())
    }

    /// Fetch the type payload for `key` through the cache
    pub async fn fetch_type(&self, key: ResourceKey) -> Result<RawPayload> {
        self.cache
            .cached_call(OP_TYPE_PAYLOAD, &key.get(), || self.client.fetch_type_key(key))
            .await
    }

    /// Validate, fetch and return the member URLs for a raw key
    pub async fn extract_urls_for(&self, raw_key: i64) -> Result<MemberList> {
        let key = ResourceKey::new(raw_key)?;
        let payload = self.fetch_type(key).await?;
        extract_urls(&payload)
    }

    /// Run every stage for one key and return the written file
    ///
    /// Failures come back as [`Error::Stage`] naming the stage that failed.
    pub async fn run(&self, raw_key: i64) -> Result<PathBuf> {
        let span = tracing::info_span!("pipeline", key = raw_key, variant = ?self.variant);
        self.run_stages(raw_key).instrument(span).await
    }

    async fn run_stages(&self, raw_key: i64) -> Result<PathBuf> {
        let mut run = RunState::new(raw_key, &self.event_tx);

        run.enter(Stage::Validate);
        let key = run.check(ResourceKey::new(raw_key))?;

        run.enter(Stage::FetchPrimary);
        let payload = run.check(self.fetch_type(key).await)?;

        run.enter(Stage::Extract);
        let path = if self.variant.has_secondary_fetch() {
            let urls = run.check(extract_urls(&payload))?;

            run.enter(Stage::FetchSecondary);
            let forms = run.check(self.sub_fetcher.fetch_many(&urls).await)?;

            run.enter(Stage::Persist);
            run.check(self.persister.save(&forms, key))?
        } else {
            let names = run.check(extract_names(&payload))?;

            run.enter(Stage::Persist);
            run.check(self.persister.save(&names, key))?
        };

        run.finish(&path);
        Ok(path)
    }

    /// Run independent pipelines for several keys
    ///
    /// Up to `max_concurrent_keys` runs are in flight at once. Outcomes are
    /// returned in the order of `keys`; one key failing does not stop the others.
    pub async fn run_all(&self, keys: &[i64]) -> Vec<KeyOutcome> {
        stream::iter(keys.iter().copied())
            .map(|key| async move {
                KeyOutcome {
                    key,
                    result: self.run(key).await,
                }
            })
            .buffered(self.max_concurrent_keys.max(1))
            .collect()
            .await
    }
}

/// Current stage of one run, plus event/log bookkeeping for transitions
struct RunState<'a> {
    key: i64,
    stage: Stage,
    events: &'a broadcast::Sender<Event>,
}

impl<'a> RunState<'a> {
    fn new(key: i64, events: &'a broadcast::Sender<Event>) -> Self {
        Self {
            key,
            stage: Stage::Validate,
            events,
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug_assert!(
            !self.stage.is_terminal(),
            "stage {stage} entered after run ended in {}",
            self.stage
        );
        self.stage = stage;
        tracing::debug!(stage = %stage, "entering stage");
        // No subscribers is fine
        self.events
            .send(Event::StageEntered {
                key: self.key,
                stage,
            })
            .ok();
    }

    /// Pass a stage result through, moving to `FAILED` on error
    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|source| {
            let failed_at = self.stage;
            self.stage = Stage::Failed;

            tracing::error!(stage = %failed_at, error = %source, "pipeline failed");
            self.events
                .send(Event::Failed {
                    key: self.key,
                    stage: failed_at,
                    error: source.to_string(),
                })
                .ok();

            Error::Stage {
                key: self.key,
                stage: failed_at,
                source: Box::new(source),
            }
        })
    }

    fn finish(&mut self, path: &std::path::Path) {
        debug_assert!(!self.stage.is_terminal(), "run finished twice");
        self.stage = Stage::Done;
        tracing::info!(stage = %self.stage, path = %path.display(), "pipeline complete");
        self.events
            .send(Event::Completed {
                key: self.key,
                path: path.to_path_buf(),
            })
            .ok();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheBackendKind;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn pipeline_for(server: &MockServer, variant: PipelineVariant) -> (Pipeline, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.fetch.variant = variant;
        config.cache.backend = CacheBackendKind::Memory;
        config.output.dir = temp_dir.path().join("pokemon_data");

        let pipeline = Pipeline::new(config).unwrap();
        pipeline.ensure_output_dir().unwrap();
        (pipeline, temp_dir)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn entered(events: &[Event]) -> Vec<Stage> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::StageEntered { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_names_variant_stage_sequence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/type/4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pokemon": [{"pokemon": {"name": "zubat", "url": "u1"}}]
            })))
            .mount(&server)
            .await;

        let (pipeline, _temp_dir) = pipeline_for(&server, PipelineVariant::Names).await;
        let mut rx = pipeline.subscribe();

        let path = pipeline.run(4).await.unwrap();
        let events = drain(&mut rx);

        assert_eq!(
            entered(&events),
            vec![
                Stage::Validate,
                Stage::FetchPrimary,
                Stage::Extract,
                Stage::Persist
            ]
        );
        assert_eq!(
            events.last(),
            Some(&Event::Completed {
                key: 4,
                path: path.clone()
            })
        );
        assert_eq!(std::fs::read_to_string(path).unwrap(), r#"["zubat"]"#);
    }

    #[tokio::test]
    async fn test_invalid_key_fails_in_validate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (pipeline, _temp_dir) = pipeline_for(&server, PipelineVariant::Forms).await;
        let mut rx = pipeline.subscribe();

        let err = pipeline.run(17).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Validate));
        assert!(matches!(err.root(), Error::InvalidArgument { .. }));

        let events = drain(&mut rx);
        assert_eq!(entered(&events), vec![Stage::Validate]);
        assert!(matches!(
            events.last(),
            Some(Event::Failed {
                key: 17,
                stage: Stage::Validate,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_in_extract() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/type/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "flying"})))
            .mount(&server)
            .await;

        let (pipeline, _temp_dir) = pipeline_for(&server, PipelineVariant::Forms).await;
        let err = pipeline.run(3).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Extract));
        assert!(matches!(err.root(), Error::MalformedPayload { .. }));
        assert!(!pipeline.persister().path_for(ResourceKey::new(3).unwrap()).exists());
    }

    #[test]
    fn test_invalid_config_leaves_no_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        config.cache.backend = CacheBackendKind::Disk;
        config.cache.dir = temp_dir.path().join("cache");

        let err = Pipeline::new(config).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(!temp_dir.path().join("cache").exists());
    }

    #[test]
    fn test_disabled_disk_cache_leaves_no_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.enabled = false;
        config.cache.backend = CacheBackendKind::Disk;
        config.cache.dir = temp_dir.path().join("cache");

        let pipeline = Pipeline::new(config).unwrap();
        assert!(!pipeline.cache().is_enabled());
        assert!(!temp_dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_primary_fetch_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/type/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pokemon": [{"pokemon": {"name": "magnemite", "url": "u81"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (pipeline, _temp_dir) = pipeline_for(&server, PipelineVariant::Names).await;

        pipeline.run(9).await.unwrap();
        pipeline.run(9).await.unwrap();
        assert_eq!(pipeline.extract_urls_for(9).await.unwrap(), vec!["u81"]);
    }
}
