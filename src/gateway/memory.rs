//! In-memory registry gateway.
//!
//! Deterministic stand-in for a schema-repo server, used by tests and by the
//! CLI's dry-run mode. State is shared between clones, so a test can hand one
//! clone to the engine and inspect another afterwards.
//!
//! ```
//! use schema_register::gateway::memory::{FailOn, InMemoryGateway};
//! use schema_register::gateway::{GatewayError, RegistryGateway};
//!
//! let gateway = InMemoryGateway::with_subjects(["user"])
//!     .fail_on(FailOn::CreateSubject {
//!         subject: "order".to_string(),
//!         error: GatewayError::Network("connection reset".to_string()),
//!     });
//!
//! assert_eq!(gateway.list_subjects().unwrap().len(), 1);
//! assert!(gateway.create_subject("order").is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{GatewayError, RegistryGateway, SubjectHandle, VersionId};

/// In-memory gateway.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    inner: Arc<Mutex<InMemoryState>>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    /// Subject name -> registered schema texts, oldest first.
    subjects: BTreeMap<String, Vec<String>>,
    /// Injected failures, checked in order.
    failures: Vec<FailOn>,
    /// Recorded calls.
    operations: Vec<GatewayOperation>,
}

/// Failure to inject into a specific call.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail every `list_subjects` call.
    ListSubjects(GatewayError),
    /// Fail `create_subject` for this subject name.
    CreateSubject { subject: String, error: GatewayError },
    /// Fail `register_version` for this subject name.
    RegisterVersion { subject: String, error: GatewayError },
}

/// Recorded call, for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOperation {
    ListSubjects,
    CreateSubject { subject: String },
    RegisterVersion { subject: String, content: String },
}

impl GatewayOperation {
    /// Whether the call asks the registry to change state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, GatewayOperation::ListSubjects)
    }
}

impl InMemoryGateway {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with pre-existing, empty subjects.
    pub fn with_subjects<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gateway = Self::new();
        {
            let mut state = gateway.state();
            for name in names {
                state.subjects.insert(name.into(), Vec::new());
            }
        }
        gateway
    }

    /// Inject a failure. Several failures may be active at once.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().failures.push(fail_on);
        self
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// All recorded calls, in call order.
    pub fn operations(&self) -> Vec<GatewayOperation> {
        self.state().operations.clone()
    }

    /// Clear recorded calls.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// Number of recorded calls that would change registry state.
    pub fn mutation_count(&self) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| op.is_mutation())
            .count()
    }

    /// Names of all subjects, sorted.
    pub fn subject_names(&self) -> Vec<String> {
        self.state().subjects.keys().cloned().collect()
    }

    /// Registered schema texts for a subject, oldest first.
    pub fn versions(&self, subject: &str) -> Option<Vec<String>> {
        self.state().subjects.get(subject).cloned()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryState> {
        // A panicking test thread must not hide the recorded state from others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl InMemoryState {
    fn injected(&self, operation: &GatewayOperation) -> Option<GatewayError> {
        self.failures.iter().find_map(|fail| match (fail, operation) {
            (FailOn::ListSubjects(error), GatewayOperation::ListSubjects) => Some(error.clone()),
            (
                FailOn::CreateSubject { subject, error },
                GatewayOperation::CreateSubject { subject: called },
            ) if subject == called => Some(error.clone()),
            (
                FailOn::RegisterVersion { subject, error },
                GatewayOperation::RegisterVersion { subject: called, .. },
            ) if subject == called => Some(error.clone()),
            _ => None,
        })
    }

    fn record(&mut self, operation: GatewayOperation) -> Result<(), GatewayError> {
        let injected = self.injected(&operation);
        self.operations.push(operation);
        injected.map_or(Ok(()), Err)
    }
}

impl RegistryGateway for InMemoryGateway {
    fn list_subjects(&self) -> Result<Vec<SubjectHandle>, GatewayError> {
        let mut state = self.state();
        state.record(GatewayOperation::ListSubjects)?;
        Ok(state.subjects.keys().map(SubjectHandle::new).collect())
    }

    fn create_subject(&self, name: &str) -> Result<SubjectHandle, GatewayError> {
        let mut state = self.state();
        state.record(GatewayOperation::CreateSubject {
            subject: name.to_string(),
        })?;

        if name.trim().is_empty() {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "subject name must not be empty".to_string(),
            });
        }
        if state.subjects.contains_key(name) {
            return Err(GatewayError::AlreadyExists(name.to_string()));
        }
        state.subjects.insert(name.to_string(), Vec::new());
        Ok(SubjectHandle::new(name))
    }

    fn register_version(
        &self,
        subject: &SubjectHandle,
        content: &str,
    ) -> Result<VersionId, GatewayError> {
        let mut state = self.state();
        state.record(GatewayOperation::RegisterVersion {
            subject: subject.name().to_string(),
            content: content.to_string(),
        })?;

        let versions = state
            .subjects
            .get_mut(subject.name())
            .ok_or_else(|| GatewayError::NotFound(subject.name().to_string()))?;

        // Re-registering the latest schema returns its existing id
        if versions.last().map(String::as_str) == Some(content) {
            return Ok(VersionId::new((versions.len() - 1).to_string()));
        }
        versions.push(content.to_string());
        Ok(VersionId::new((versions.len() - 1).to_string()))
    }
}
