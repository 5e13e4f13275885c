//! Error types for pokeapi-pipeline
//!
//! This module provides the error taxonomy shared by every pipeline stage:
//! - Input validation failures (raised before any I/O)
//! - Remote fetch failures (status and transport, eligible for retry)
//! - Payload schema mismatches
//! - Local I/O and serialization failures
//! - Stage context, so callers can tell where a key's pipeline stopped

use crate::types::Stage;
use thiserror::Error;

/// Result type alias for pokeapi-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pokeapi-pipeline
///
/// Each variant carries enough context to diagnose the failure without
/// re-running the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A resource key or other argument was outside its valid range
    #[error("invalid argument {value}: {message}")]
    InvalidArgument {
        /// The rejected value, rendered as text
        value: String,
        /// Why the value was rejected
        message: String,
    },

    /// Non-success HTTP status, transport failure, timeout, or undecodable body
    #[error("remote fetch failed for {url}{}: {message}", status_suffix(.status))]
    RemoteFetch {
        /// The URL that was requested
        url: String,
        /// HTTP status code, when a response was received
        status: Option<u16>,
        /// Human-readable description of the failure
        message: String,
    },

    /// An expected field was missing or had the wrong type
    #[error("malformed payload: field `{field}` {message}")]
    MalformedPayload {
        /// Path of the field that could not be read (e.g. "pokemon[3].pokemon.url")
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// I/O error (output directory, cache directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Cache storage failure that could not be recovered by treating the entry as a miss
    #[error("cache error: {0}")]
    Cache(String),

    /// A pipeline stage failed for one resource key
    #[error("pipeline for type {key} failed at {stage}: {source}")]
    Stage {
        /// The raw key the pipeline was started with
        key: i64,
        /// The stage that was running when the failure occurred
        stage: Stage,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    /// Create an [`Error::InvalidArgument`]
    pub fn invalid_argument(value: impl ToString, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            value: value.to_string(),
            message: message.into(),
        }
    }

    /// Create an [`Error::MalformedPayload`]
    pub fn malformed(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::MalformedPayload {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an [`Error::RemoteFetch`]
    pub fn remote(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Error::RemoteFetch {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// The innermost error, looking through [`Error::Stage`] wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage a pipeline failed at, if this error came from the orchestrator
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Machine-readable error code (e.g. "invalid_argument", "remote_fetch_error")
    pub fn error_code(&self) -> &'static str {
        match self.root() {
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::RemoteFetch { .. } => "remote_fetch_error",
            Error::MalformedPayload { .. } => "malformed_payload",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Config { .. } => "config_error",
            Error::Cache(_) => "cache_error",
            // root() never returns a Stage wrapper
            Error::Stage { .. } => "pipeline_error",
        }
    }

    /// Process exit code used by the command line entry point
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            Error::InvalidArgument { .. } | Error::Config { .. } => 2,
            Error::RemoteFetch { .. } => 3,
            Error::MalformedPayload { .. } => 4,
            Error::Io(_) => 5,
            Error::Serialization(_) | Error::Cache(_) | Error::Stage { .. } => 1,
        }
    }
}
