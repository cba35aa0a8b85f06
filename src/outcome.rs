//! Per-file outcomes and the aggregated batch result

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::{RegistrationError, Result};
use crate::gateway::VersionId;

/// Step at which a file failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Subject name could not be derived
    Naming,
    /// Subject did not exist and could not be created
    SubjectCreation,
    /// File content could not be read
    ContentRead,
    /// Registry refused or failed the version registration
    Registration,
    /// Run was cancelled before the file was attempted
    Cancelled,
    /// The worker that owned the file stopped before reaching it
    NotAttempted,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FailureStage::Naming => "naming",
            FailureStage::SubjectCreation => "subject creation",
            FailureStage::ContentRead => "content read",
            FailureStage::Registration => "registration",
            FailureStage::Cancelled => "cancelled",
            FailureStage::NotAttempted => "not attempted",
        };
        f.write_str(stage)
    }
}

/// Terminal state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeState {
    Registered { version: VersionId },
    Failed { stage: FailureStage, message: String },
}

/// What happened to one schema file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// File the outcome belongs to
    pub path: PathBuf,
    /// Subject attempted; `None` when naming failed
    pub subject: Option<String>,
    /// Checksum of the content, once read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    #[serde(flatten)]
    pub state: OutcomeState,
}

impl BatchOutcome {
    pub fn registered(
        path: impl Into<PathBuf>,
        subject: impl Into<String>,
        checksum: Checksum,
        version: VersionId,
    ) -> Self {
        Self {
            path: path.into(),
            subject: Some(subject.into()),
            checksum: Some(checksum),
            state: OutcomeState::Registered { version },
        }
    }

    pub fn failed(
        path: impl Into<PathBuf>,
        subject: Option<String>,
        stage: FailureStage,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            subject,
            checksum: None,
            state: OutcomeState::Failed {
                stage,
                message: message.into(),
            },
        }
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, OutcomeState::Registered { .. })
    }

    pub fn version(&self) -> Option<&VersionId> {
        match &self.state {
            OutcomeState::Registered { version } => Some(version),
            OutcomeState::Failed { .. } => None,
        }
    }

    /// Failure stage and message, if the file failed
    pub fn failure(&self) -> Option<(FailureStage, &str)> {
        match &self.state {
            OutcomeState::Failed { stage, message } => Some((*stage, message.as_str())),
            OutcomeState::Registered { .. } => None,
        }
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.subject().unwrap_or("<unnamed>");
        match &self.state {
            OutcomeState::Registered { version } => write!(
                f,
                "{} -> {} (version {})",
                self.path.display(),
                subject,
                version
            ),
            OutcomeState::Failed { stage, message } => write!(
                f,
                "{} -> {} failed at {}: {}",
                self.path.display(),
                subject,
                stage,
                message
            ),
        }
    }
}

/// Ordered outcomes of one reconciliation run.
///
/// The failure count is always derived from the outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    outcomes: Vec<BatchOutcome>,
    subjects_created: Vec<String>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl BatchResult {
    /// Assemble a result; the run is considered finished now
    pub fn new(
        outcomes: Vec<BatchOutcome>,
        subjects_created: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            outcomes,
            subjects_created,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Outcomes in file discovery order
    pub fn outcomes(&self) -> &[BatchOutcome] {
        &self.outcomes
    }

    /// Subjects created during the run, in creation order
    pub fn subjects_created(&self) -> &[String] {
        &self.subjects_created
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.len() - self.failure_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// True when every file was registered
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    /// Turn a result with failures into [`RegistrationError::BatchFailed`]
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failure_count();
        if failed > 0 {
            return Err(RegistrationError::BatchFailed {
                failed,
                total: self.outcomes.len(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BatchResult {
        BatchResult::new(
            vec![
                BatchOutcome::registered(
                    "a.avsc",
                    "a",
                    Checksum::from_content("a"),
                    VersionId::new("0"),
                ),
                BatchOutcome::failed(
                    "b.avsc",
                    Some("b".to_string()),
                    FailureStage::Registration,
                    "rejected",
                ),
                BatchOutcome::failed("/", None, FailureStage::Naming, "path has no file name"),
            ],
            vec!["a".to_string()],
            Utc::now(),
        )
    }

    #[test]
    fn test_counts_are_derived() {
        let result = sample();
        assert_eq!(result.len(), 3);
        assert_eq!(result.failure_count(), 2);
        assert_eq!(result.success_count(), 1);
        assert!(!result.is_success());
        assert_eq!(
            result.failures().map(|o| o.subject()).collect::<Vec<_>>(),
            vec![Some("b"), None]
        );
        assert!(result.finished_at() >= result.started_at());
    }

    #[test]
    fn test_into_result_reports_failures() {
        match sample().into_result() {
            Err(RegistrationError::BatchFailed { failed, total }) => {
                assert_eq!((failed, total), (2, 3));
            }
            other => panic!("Expected BatchFailed, got {:?}", other),
        }

        let empty = BatchResult::new(Vec::new(), Vec::new(), Utc::now());
        assert!(empty.into_result().is_ok());
    }

    #[test]
    fn test_outcome_accessors_and_display() {
        let result = sample();
        let ok = &result.outcomes()[0];
        assert_eq!(ok.version().map(VersionId::as_str), Some("0"));
        assert!(ok.failure().is_none());
        assert_eq!(ok.to_string(), "a.avsc -> a (version 0)");

        let failed = &result.outcomes()[1];
        assert_eq!(failed.failure(), Some((FailureStage::Registration, "rejected")));
        assert_eq!(failed.to_string(), "b.avsc -> b failed at registration: rejected");
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "registered");
        assert_eq!(json["outcomes"][0]["version"], "0");
        assert_eq!(json["outcomes"][1]["stage"], "registration");
        assert_eq!(json["subjects_created"][0], "a");
    }
}
