//! Core types for pokeapi-pipeline

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Validated identifier of a remote resource category (a Pokémon type id)
///
/// Only values in `MIN..=MAX` can be constructed, so holding a `ResourceKey`
/// proves the key was checked before any network call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourceKey(u8);

impl ResourceKey {
    /// Smallest valid key
    pub const MIN: i64 = 1;
    /// Largest valid key
    pub const MAX: i64 = 16;

    /// Validate a raw key
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `raw` is outside `1..=16`.
    pub fn new(raw: i64) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&raw) {
            return Err(Error::invalid_argument(
                raw,
                format!(
                    "resource key must be between {} and {}",
                    Self::MIN,
                    Self::MAX
                ),
            ));
        }
        // Range check above guarantees the value fits
        Ok(Self(raw as u8))
    }

    /// Get the inner value
    pub fn get(&self) -> i64 {
        i64::from(self.0)
    }
}

impl TryFrom<i64> for ResourceKey {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self> {
        Self::new(raw)
    }
}

impl From<ResourceKey> for i64 {
    fn from(key: ResourceKey) -> Self {
        key.get()
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ResourceKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|e| Error::invalid_argument(s, format!("not an integer: {e}")))?;
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Parsed response body for one resource key
///
/// Kept as an untyped JSON tree: field projection (and the schema errors it can
/// raise) belongs to the extractor, not to the fetcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPayload(pub serde_json::Value);

impl RawPayload {
    /// Borrow the underlying JSON value
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Ordered member names or URLs, one per member record
pub type MemberList = Vec<String>;

/// The retained field of one member's sub-resource (e.g. its `forms` array)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubResourcePayload(pub serde_json::Value);

/// What a pipeline run persists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    /// Member names only
    Names,
    /// Member sub-resources, keeping their `forms` field (default)
    #[default]
    Forms,
}

impl PipelineVariant {
    /// Whether this variant runs the secondary fetch stage
    pub fn has_secondary_fetch(&self) -> bool {
        matches!(self, PipelineVariant::Forms)
    }
}

/// How member sub-resources are fetched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// One at a time, fail-fast, no retry
    Sequential,
    /// All dispatched together, joined by index, one retry per URL (default)
    #[default]
    Concurrent,
}

/// Pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Checking the resource key
    Validate,
    /// Fetching the type payload
    FetchPrimary,
    /// Projecting names or URLs out of the payload
    Extract,
    /// Fetching member sub-resources (enriched variant only)
    FetchSecondary,
    /// Writing the output file
    Persist,
    /// Finished successfully
    Done,
    /// Aborted
    Failed,
}

impl Stage {
    /// Stable lowercase name used in logs and events
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::FetchPrimary => "fetch_primary",
            Stage::Extract => "extract",
            Stage::FetchSecondary => "fetch_secondary",
            Stage::Persist => "persist",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    /// Whether the pipeline stops in this stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted by the pipeline orchestrator
///
/// Consumers subscribe via [`Pipeline::subscribe`](crate::Pipeline::subscribe).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A key's pipeline entered a non-terminal stage
    StageEntered {
        /// Raw key of the run
        key: i64,
        /// Stage that started
        stage: Stage,
    },

    /// A key's pipeline finished and wrote its output file
    Completed {
        /// Raw key of the run
        key: i64,
        /// Path of the written file
        path: PathBuf,
    },

    /// A key's pipeline was aborted
    Failed {
        /// Raw key of the run
        key: i64,
        /// Stage that failed
        stage: Stage,
        /// Error message
        error: String,
    },
}

/// Result of one key's pipeline within a batch run
#[derive(Debug)]
pub struct KeyOutcome {
    /// Raw key as supplied by the caller
    pub key: i64,
    /// Output file on success
    pub result: Result<PathBuf>,
}

impl KeyOutcome {
    /// Whether this key's pipeline completed
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}
