//! Error types for the moderation engine.
//!
//! Mirrors the error categories of a production gateway's error enum: one
//! variant per failure kind, `thiserror`-derived `Display`, propagated as
//! distinguishable values rather than collapsed into strings.

use thiserror::Error;

/// Errors produced by the plugin contract, the manager, and the built-in
/// stores. Every variant here is a distinguishable kind a caller can match
/// on, per the engine's error handling design.
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected at startup: malformed or out-of-range configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Manager config names a strategy other than sequential/parallel.
    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),

    /// A store's TTL failed to parse or was non-positive.
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),

    /// `register` called with a name already present in the registry.
    #[error("plugin already registered: {0}")]
    AlreadyExists(String),

    /// A specific plugin's `evaluate` returned an error.
    #[error("plugin {plugin} failed: {message}")]
    PluginError { plugin: String, message: String },

    /// The manager's deadline elapsed before aggregation completed.
    #[error("evaluation timed out")]
    Timeout,

    /// LLM response carried other than exactly one choice.
    #[error("unexpected response count: {0}")]
    UnexpectedResponseCount(usize),

    /// LLM response confidence fell outside `[0, 1]`.
    #[error("invalid confidence: {0}")]
    InvalidConfidence(f64),

    /// A store failed to construct (e.g. bad storage URL).
    #[error("init failed: {0}")]
    InitFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
