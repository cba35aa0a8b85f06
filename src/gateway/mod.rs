//! Registry Gateway
//!
//! The only network-facing dependency of the reconciliation engine. A gateway
//! lists subjects, creates subjects and registers schema versions; everything
//! else (transport, auth, wire format) stays behind this trait.
//!
//! Two implementations ship with the crate:
//! - [`http::SchemaRepoClient`] talks to a schema-repo server over REST
//! - [`memory::InMemoryGateway`] keeps everything in memory for tests and dry runs
//!
//! Idempotency of subject creation is gateway-defined. The engine never
//! retries; a failed call is reported and the caller decides whether to re-run.

pub mod http;
pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from registry gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Credentials missing or refused.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The subject (or registry endpoint) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The subject already exists.
    #[error("subject already exists: {0}")]
    AlreadyExists(String),

    /// The registry refused the request, e.g. malformed or incompatible schema.
    #[error("rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Message returned by the registry
        message: String,
    },

    /// The registry failed to process the request.
    #[error("registry error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message returned by the registry
        message: String,
    },

    /// Network or connection error, including timeouts.
    #[error("network error: {0}")]
    Network(String),

    /// The registry URL or a derived request URL is unusable.
    #[error("invalid registry url: {0}")]
    InvalidUrl(String),

    /// The run was cancelled before the call was made.
    #[error("cancelled")]
    Cancelled,
}

/// Reference to a subject known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectHandle {
    name: String,
}

impl SubjectHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SubjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Identifier the registry assigned to a registered schema version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability interface to a schema registry.
///
/// Implementations must be `Send + Sync`: the engine may register versions
/// for distinct subjects from several worker threads.
pub trait RegistryGateway: Send + Sync {
    /// All subjects currently in the registry
    fn list_subjects(&self) -> Result<Vec<SubjectHandle>, GatewayError>;

    /// Create a new, empty subject
    fn create_subject(&self, name: &str) -> Result<SubjectHandle, GatewayError>;

    /// Register schema text as the next version of a subject
    fn register_version(
        &self,
        subject: &SubjectHandle,
        content: &str,
    ) -> Result<VersionId, GatewayError>;
}
