//! Error types shared by the zkay crates

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, ZkayError>;

/// Main error type for configuration and manifest handling
#[derive(Debug, Error)]
pub enum ZkayError {
    /// Option value out of range or inconsistent with another option
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend name that matches no supported encryption scheme
    #[error("Unknown crypto backend: {0}")]
    UnknownBackend(String),

    /// Manifest file that is malformed or lacks a required field
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Output directory compiled with options that differ from the current ones
    #[error("Incompatible manifest: {0}")]
    IncompatibleManifest(String),

    /// JSON serialization or deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other errors not covered by specific variants
    #[error("{0}")]
    Other(String),
}

impl ZkayError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::IncompatibleManifest(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
