//! Error types for lookup-table construction
//!
//! Every variant is a per-model failure: the batch pipeline reports it and
//! moves on to the next model.

use thiserror::Error;

/// Errors raised while building keys, resolving decompositions or attributing traces
#[derive(Error, Debug)]
pub enum LutError {
    #[error("No operator decomposition registered for layer type '{tag}'")]
    UnknownLayerType { tag: String },

    #[error("Invalid key parameters for layer type '{layer_type}': {reason}")]
    InvalidKeyParams { layer_type: String, reason: String },

    #[error("Unsupported layer config: {0}")]
    UnsupportedLayerConfig(String),

    #[error(
        "Trace exhausted while attributing '{layer}': matched {matched}/{expected} operators after consuming {consumed} events"
    )]
    TraceExhausted {
        layer: String,
        matched: usize,
        expected: usize,
        consumed: usize,
    },

    #[error("Malformed layer key '{key}': {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("Malformed benchmark trace: {0}")]
    MalformedTrace(String),

    #[error("Unknown architecture family '{0}'")]
    UnknownFamily(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for lookup-table operations
pub type Result<T> = std::result::Result<T, LutError>;
