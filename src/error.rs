//! Error types for schema registration

use std::path::PathBuf;

use thiserror::Error;

use crate::gateway::GatewayError;

/// Result type for registration operations
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Schema registration errors
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Invalid configuration for {strategy} strategy: {message}")]
    InvalidConfiguration { strategy: String, message: String },

    #[error("Cannot derive subject name for {path}: {reason}")]
    Naming { path: PathBuf, reason: String },

    #[error("Invalid schema directory {0} -- not a directory")]
    InvalidSchemaDir(PathBuf),

    #[error("Registry snapshot unavailable: {0}")]
    SnapshotUnavailable(#[source] GatewayError),

    #[error("Schema registration failed: {failed} of {total} schema files were not registered")]
    BatchFailed { failed: usize, total: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk schema directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
