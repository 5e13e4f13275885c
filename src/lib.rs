//! # pokeapi-pipeline
//!
//! Staged fetch pipeline for PokeAPI type data.
//!
//! For each type key (1-16) the pipeline fetches `/type/{key}`, extracts the
//! member list, optionally fetches every member's sub-resource to collect its
//! `forms`, and writes the result to `<output_dir>/type_<key>.txt` as a single
//! JSON value. Remote results are memoized in a TTL cache shared by all runs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pokeapi_pipeline::{Config, Pipeline, PipelineVariant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.fetch.variant = PipelineVariant::Names;
//!
//!     let pipeline = Pipeline::new(config)?;
//!     pipeline.ensure_output_dir()?;
//!
//!     // Subscribe to stage events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let path = pipeline.run(2).await?;
//!     println!("wrote {}", path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// TTL response cache
pub mod cache;
/// HTTP client for the type endpoint
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Payload projections
pub mod extract;
/// Output file writer
pub mod persist;
/// Stage orchestration
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Member sub-resource fetching
pub mod subfetch;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use cache::{CacheStats, ResponseCache};
pub use client::ApiClient;
pub use config::{CacheBackendKind, Config, RetryConfig};
pub use error::{Error, Result};
pub use persist::Persister;
pub use pipeline::Pipeline;
pub use subfetch::SubResourceFetcher;
pub use types::{
    Event, FetchMode, KeyOutcome, MemberList, PipelineVariant, RawPayload, ResourceKey, Stage,
    SubResourcePayload,
};
