//! Reconciliation Engine
//!
//! Brings the registry in line with a list of local schema files:
//!
//! 1. Fetch the subject list once and cache it by name.
//! 2. For each file, in discovery order: derive the subject name, reuse the
//!    cached subject or create it (and cache it), read the file, register its
//!    content as a new version.
//! 3. Collect one [`BatchOutcome`] per file into a [`BatchResult`].
//!
//! A file that fails at any step is recorded and the run moves on. Each file
//! is attempted exactly once; nothing is retried. Only a failing snapshot
//! fetch aborts the run, and it does so before any file is touched.
//!
//! With more than one worker the run splits in two phases. Name derivation
//! and subject creation stay on the calling thread, so the cache has a single
//! writer and a subject is never created twice. Registration then runs on a
//! bounded pool of scoped threads, one subject group at a time per thread,
//! which keeps versions under a subject in discovery order.
//!
//! A panic inside a gateway or strategy call is contained to the file being
//! processed and recorded as its failure. Outcomes already produced are kept.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::checksum::Checksum;
use crate::error::{RegistrationError, Result};
use crate::gateway::{GatewayError, RegistryGateway, SubjectHandle};
use crate::naming::SubjectNameStrategy;
use crate::outcome::{BatchOutcome, BatchResult, FailureStage};
use crate::schema::SchemaFile;
use crate::snapshot::RegistrySnapshot;

/// Registers local schema files against a registry gateway
pub struct ReconciliationEngine {
    gateway: Box<dyn RegistryGateway>,
    strategy: Box<dyn SubjectNameStrategy>,
    workers: usize,
    cancel: Arc<AtomicBool>,
}

/// Files sharing one subject, in discovery order
struct SubjectGroup {
    subject: SubjectHandle,
    files: Vec<usize>,
}

impl ReconciliationEngine {
    pub fn new(gateway: Box<dyn RegistryGateway>, strategy: Box<dyn SubjectNameStrategy>) -> Self {
        Self {
            gateway,
            strategy,
            workers: 1,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of registration workers; values below 1 mean 1
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Share a cancellation flag with the caller.
    ///
    /// Once the flag is set no further gateway mutation is issued; every file
    /// not yet attempted is recorded as cancelled.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn strategy(&self) -> &dyn SubjectNameStrategy {
        self.strategy.as_ref()
    }

    /// Reconcile the given files, in order, against the registry.
    ///
    /// Returns `Err` only when the initial snapshot cannot be fetched. File
    /// failures are reported through the returned [`BatchResult`].
    pub fn reconcile(&self, paths: &[PathBuf]) -> Result<BatchResult> {
        let started_at = Utc::now();
        let mut snapshot = RegistrySnapshot::fetch(self.gateway.as_ref())
            .map_err(RegistrationError::SnapshotUnavailable)?;

        info!(
            files = paths.len(),
            subjects = snapshot.len(),
            strategy = %self.strategy,
            workers = self.workers,
            "Reconciling schema files"
        );

        let mut created = Vec::new();
        let outcomes = if self.workers > 1 && paths.len() > 1 {
            self.reconcile_parallel(paths, &mut snapshot, &mut created)
        } else {
            paths
                .iter()
                .map(|path| {
                    let outcome = match self.resolve_contained(path, &mut snapshot, &mut created) {
                        Ok(subject) => self.register_contained(path, &subject),
                        Err(outcome) => outcome,
                    };
                    log_outcome(&outcome);
                    outcome
                })
                .collect()
        };

        let result = BatchResult::new(outcomes, created, started_at);
        info!(
            total = result.len(),
            registered = result.success_count(),
            failed = result.failure_count(),
            created = result.subjects_created().len(),
            "Reconciliation finished"
        );
        Ok(result)
    }

    /// Two-phase run: serialized subject resolution, then pooled registration
    fn reconcile_parallel(
        &self,
        paths: &[PathBuf],
        snapshot: &mut RegistrySnapshot,
        created: &mut Vec<String>,
    ) -> Vec<BatchOutcome> {
        let mut outcomes: Vec<Option<BatchOutcome>> = vec![None; paths.len()];
        let mut subject_of: Vec<Option<String>> = vec![None; paths.len()];
        let mut groups: Vec<SubjectGroup> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for (index, path) in paths.iter().enumerate() {
            match self.resolve_contained(path, snapshot, created) {
                Ok(subject) => {
                    subject_of[index] = Some(subject.name().to_string());
                    let group = *group_index
                        .entry(subject.name().to_string())
                        .or_insert_with(|| {
                            groups.push(SubjectGroup {
                                subject: subject.clone(),
                                files: Vec::new(),
                            });
                            groups.len() - 1
                        });
                    groups[group].files.push(index);
                }
                Err(outcome) => {
                    log_outcome(&outcome);
                    outcomes[index] = Some(outcome);
                }
            }
        }

        let next_group = AtomicUsize::new(0);
        let pool_size = self.workers.min(groups.len());
        debug!(groups = groups.len(), pool_size, "Registering subject groups");

        // Outcomes land here as soon as they exist, so a dying worker loses none
        let finished: Mutex<Vec<(usize, BatchOutcome)>> = Mutex::new(Vec::with_capacity(paths.len()));

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(pool_size);
            for _ in 0..pool_size {
                handles.push(scope.spawn(|| loop {
                    let next = next_group.fetch_add(1, Ordering::Relaxed);
                    let Some(group) = groups.get(next) else { break };
                    for &index in &group.files {
                        let outcome = self.register_contained(&paths[index], &group.subject);
                        log_outcome(&outcome);
                        finished
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push((index, outcome));
                    }
                }));
            }

            for handle in handles {
                if handle.join().is_err() {
                    warn!("Registration worker stopped unexpectedly");
                }
            }
        });

        let finished = finished
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (index, outcome) in finished {
            outcomes[index] = Some(outcome);
        }

        outcomes
            .into_iter()
            .zip(subject_of)
            .zip(paths)
            .map(|((outcome, subject), path)| {
                outcome.unwrap_or_else(|| {
                    let outcome = BatchOutcome::failed(
                        path,
                        subject,
                        FailureStage::NotAttempted,
                        "registration worker stopped before this file",
                    );
                    log_outcome(&outcome);
                    outcome
                })
            })
            .collect()
    }

    /// [`resolve`](Self::resolve), with a panic recorded as the file's failure
    fn resolve_contained(
        &self,
        path: &Path,
        snapshot: &mut RegistrySnapshot,
        created: &mut Vec<String>,
    ) -> std::result::Result<SubjectHandle, BatchOutcome> {
        panic::catch_unwind(AssertUnwindSafe(|| self.resolve(path, snapshot, created)))
            .unwrap_or_else(|payload| {
                Err(BatchOutcome::failed(
                    path,
                    None,
                    FailureStage::SubjectCreation,
                    format!("subject resolution panicked: {}", panic_message(&*payload)),
                ))
            })
    }

    /// [`register`](Self::register), with a panic recorded as the file's failure
    fn register_contained(&self, path: &Path, subject: &SubjectHandle) -> BatchOutcome {
        panic::catch_unwind(AssertUnwindSafe(|| self.register(path, subject))).unwrap_or_else(
            |payload| {
                BatchOutcome::failed(
                    path,
                    Some(subject.name().to_string()),
                    FailureStage::Registration,
                    format!("registration panicked: {}", panic_message(&*payload)),
                )
            },
        )
    }

    /// Derive the subject name and find or create the subject
    fn resolve(
        &self,
        path: &Path,
        snapshot: &mut RegistrySnapshot,
        created: &mut Vec<String>,
    ) -> std::result::Result<SubjectHandle, BatchOutcome> {
        if self.is_cancelled() {
            return Err(cancelled(path, None));
        }

        let name = self
            .strategy
            .subject_name(path)
            .map_err(|e| BatchOutcome::failed(path, None, FailureStage::Naming, e.to_string()))?;
        debug!(path = %path.display(), subject = %name, "Attempting to register");

        if let Some(subject) = snapshot.get(&name) {
            return Ok(subject.clone());
        }
        if self.is_cancelled() {
            return Err(cancelled(path, Some(name)));
        }

        match self.gateway.create_subject(&name) {
            Ok(subject) => {
                info!(subject = %name, "Created subject");
                snapshot.insert(subject.clone());
                created.push(name);
                Ok(subject)
            }
            Err(e) => Err(BatchOutcome::failed(
                path,
                Some(name),
                FailureStage::SubjectCreation,
                e.to_string(),
            )),
        }
    }

    /// Read the file and register its content under the subject
    fn register(&self, path: &Path, subject: &SubjectHandle) -> BatchOutcome {
        let subject_name = Some(subject.name().to_string());
        let file = match SchemaFile::read(path) {
            Ok(file) => file,
            Err(e) => {
                return BatchOutcome::failed(path, subject_name, FailureStage::ContentRead, e.to_string())
            }
        };

        if self.is_cancelled() {
            return cancelled(path, subject_name).with_checksum(file.checksum().clone());
        }

        match self.gateway.register_version(subject, file.content()) {
            Ok(version) => BatchOutcome::registered(
                path,
                subject.name(),
                file.checksum().clone(),
                version,
            ),
            Err(e) => BatchOutcome::failed(path, subject_name, FailureStage::Registration, e.to_string())
                .with_checksum(file.checksum().clone()),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

fn cancelled(path: &Path, subject: Option<String>) -> BatchOutcome {
    BatchOutcome::failed(
        path,
        subject,
        FailureStage::Cancelled,
        GatewayError::Cancelled.to_string(),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_outcome(outcome: &BatchOutcome) {
    match outcome.failure() {
        None => debug!(
            path = %outcome.path().display(),
            subject = outcome.subject().unwrap_or_default(),
            version = %outcome.version().map(|v| v.as_str()).unwrap_or_default(),
            checksum = outcome.checksum.as_ref().map(Checksum::short).unwrap_or_default(),
            "Registered schema"
        ),
        Some((stage, message)) => warn!(
            path = %outcome.path().display(),
            subject = outcome.subject().unwrap_or("<unnamed>"),
            %stage,
            "Schema registration failed: {}",
            message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{FailOn, GatewayOperation, InMemoryGateway};
    use crate::naming::{DefaultNameStrategy, HierarchicalNameStrategy};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn write_schemas(files: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();
        let paths = files
            .iter()
            .map(|(name, content)| {
                let path = dir.path().join(name);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, content).unwrap();
                path
            })
            .collect();
        (dir, paths)
    }

    fn engine(gateway: &InMemoryGateway) -> ReconciliationEngine {
        ReconciliationEngine::new(Box::new(gateway.clone()), Box::new(DefaultNameStrategy))
    }

    #[test]
    fn test_creates_missing_and_reuses_existing() {
        let (_dir, paths) = write_schemas(&[("user.avsc", "u1"), ("order.avsc", "o1")]);
        let gateway = InMemoryGateway::with_subjects(["user"]);

        let result = engine(&gateway).reconcile(&paths).unwrap();

        assert!(result.is_success());
        assert_eq!(result.subjects_created(), ["order".to_string()]);
        assert_eq!(gateway.versions("user").unwrap(), vec!["u1"]);
        assert_eq!(gateway.versions("order").unwrap(), vec!["o1"]);
        assert_eq!(
            gateway.operations(),
            vec![
                GatewayOperation::ListSubjects,
                GatewayOperation::RegisterVersion {
                    subject: "user".to_string(),
                    content: "u1".to_string()
                },
                GatewayOperation::CreateSubject {
                    subject: "order".to_string()
                },
                GatewayOperation::RegisterVersion {
                    subject: "order".to_string(),
                    content: "o1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_colliding_names_share_one_created_subject() {
        let (_dir, paths) = write_schemas(&[("a/user.avsc", "first"), ("b/user.avsc", "second")]);
        let gateway = InMemoryGateway::new();

        let result = engine(&gateway).reconcile(&paths).unwrap();

        assert_eq!(result.success_count(), 2);
        assert_eq!(result.subjects_created().len(), 1);
        assert_eq!(gateway.versions("user").unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_snapshot_failure_is_fatal() {
        let (_dir, paths) = write_schemas(&[("user.avsc", "u1")]);
        let gateway = InMemoryGateway::new()
            .fail_on(FailOn::ListSubjects(GatewayError::Network("refused".to_string())));

        let err = engine(&gateway).reconcile(&paths).unwrap_err();

        assert!(matches!(err, RegistrationError::SnapshotUnavailable(_)));
        assert_eq!(gateway.mutation_count(), 0);
    }

    #[test]
    fn test_failed_creation_is_not_cached() {
        let (_dir, paths) = write_schemas(&[("a/user.avsc", "first"), ("b/user.avsc", "second")]);
        let gateway = InMemoryGateway::new().fail_on(FailOn::CreateSubject {
            subject: "user".to_string(),
            error: GatewayError::Api {
                status: 500,
                message: "boom".to_string(),
            },
        });

        let result = engine(&gateway).reconcile(&paths).unwrap();

        assert_eq!(result.failure_count(), 2);
        for outcome in result.outcomes() {
            assert_eq!(outcome.failure().map(|f| f.0), Some(FailureStage::SubjectCreation));
        }
        let creates = gateway
            .operations()
            .into_iter()
            .filter(|op| matches!(op, GatewayOperation::CreateSubject { .. }))
            .count();
        assert_eq!(creates, 2);
    }

    #[test]
    fn test_naming_failure_recorded() {
        let (_dir, mut paths) = write_schemas(&[("user.avsc", "u1")]);
        paths.insert(0, PathBuf::from("/"));
        let gateway = InMemoryGateway::new();

        let result = engine(&gateway).reconcile(&paths).unwrap();

        assert_eq!(result.failure_count(), 1);
        let failed = &result.outcomes()[0];
        assert_eq!(failed.subject(), None);
        assert_eq!(failed.failure().map(|f| f.0), Some(FailureStage::Naming));
        assert!(result.outcomes()[1].is_success());
    }

    #[test]
    fn test_cancelled_before_start() {
        let (_dir, paths) = write_schemas(&[("user.avsc", "u1"), ("order.avsc", "o1")]);
        let gateway = InMemoryGateway::new();
        let cancel = Arc::new(AtomicBool::new(true));

        let result = engine(&gateway)
            .with_cancel_flag(Arc::clone(&cancel))
            .reconcile(&paths)
            .unwrap();

        assert_eq!(result.failure_count(), 2);
        assert!(result
            .outcomes()
            .iter()
            .all(|o| o.failure().map(|f| f.0) == Some(FailureStage::Cancelled)));
        assert_eq!(gateway.mutation_count(), 0);
    }

    #[test]
    fn test_parallel_keeps_order_within_subject() {
        let (_dir, paths) = write_schemas(&[
            ("a/user.avsc", "user-1"),
            ("a/order.avsc", "order-1"),
            ("b/user.avsc", "user-2"),
            ("c/item.avsc", "item-1"),
            ("c/user.avsc", "user-3"),
        ]);
        let gateway = InMemoryGateway::new();

        let result = engine(&gateway).with_workers(3).reconcile(&paths).unwrap();

        assert!(result.is_success());
        assert_eq!(result.subjects_created(), ["user", "order", "item"].map(String::from));
        assert_eq!(gateway.versions("user").unwrap(), vec!["user-1", "user-2", "user-3"]);
        let subjects: Vec<_> = result.outcomes().iter().map(|o| o.subject().unwrap()).collect();
        assert_eq!(subjects, vec!["user", "order", "user", "item", "user"]);
    }

    #[test]
    fn test_parallel_matches_sequential_failures() {
        let files = [("x/a.avsc", "a"), ("x/b.avsc", "b"), ("y/c.avsc", "c")];
        let (_dir, mut paths) = write_schemas(&files);
        paths[1] = paths[1].with_file_name("missing.avsc");

        for workers in [1, 4] {
            let gateway = InMemoryGateway::new();
            let engine = ReconciliationEngine::new(
                Box::new(gateway.clone()),
                Box::new(HierarchicalNameStrategy::new()),
            )
            .with_workers(workers);

            let result = engine.reconcile(&paths).unwrap();

            assert_eq!(result.failure_count(), 1, "workers = {workers}");
            assert_eq!(result.outcomes()[1].subject(), Some("x_missing"));
            assert_eq!(
                result.outcomes()[1].failure().map(|f| f.0),
                Some(FailureStage::ContentRead)
            );
        }
    }

    #[test]
    fn test_workers_clamped() {
        let gateway = InMemoryGateway::new();
        assert_eq!(engine(&gateway).with_workers(0).workers(), 1);
        assert_eq!(engine(&gateway).strategy().to_string(), "default");
    }

    /// Delegates to an in-memory gateway but panics when asked to register `trigger`
    struct PanicOnContent {
        inner: InMemoryGateway,
        trigger: &'static str,
    }

    impl RegistryGateway for PanicOnContent {
        fn list_subjects(&self) -> std::result::Result<Vec<SubjectHandle>, GatewayError> {
            self.inner.list_subjects()
        }

        fn create_subject(&self, name: &str) -> std::result::Result<SubjectHandle, GatewayError> {
            self.inner.create_subject(name)
        }

        fn register_version(
            &self,
            subject: &SubjectHandle,
            content: &str,
        ) -> std::result::Result<crate::gateway::VersionId, GatewayError> {
            if content == self.trigger {
                panic!("registry client crashed on {}", subject.name());
            }
            self.inner.register_version(subject, content)
        }
    }

    #[test]
    fn test_panic_is_contained_to_one_file() {
        let (_dir, paths) = write_schemas(&[
            ("a/user.avsc", "user-1"),
            ("b/user.avsc", "crash"),
            ("c/user.avsc", "user-3"),
            ("d.avsc", "d-1"),
        ]);

        let mut per_mode = Vec::new();
        for workers in [1, 2] {
            let gateway = InMemoryGateway::new();
            let engine = ReconciliationEngine::new(
                Box::new(PanicOnContent {
                    inner: gateway.clone(),
                    trigger: "crash",
                }),
                Box::new(DefaultNameStrategy),
            )
            .with_workers(workers);

            let result = engine.reconcile(&paths).unwrap();

            assert_eq!(result.failure_count(), 1, "workers = {workers}");
            let failed = &result.outcomes()[1];
            assert_eq!(failed.subject(), Some("user"));
            let (stage, message) = failed.failure().unwrap();
            assert_eq!(stage, FailureStage::Registration);
            assert!(message.contains("registry client crashed on user"), "{message}");

            // The report agrees with what the registry holds
            assert_eq!(gateway.versions("user").unwrap(), vec!["user-1", "user-3"]);
            assert_eq!(gateway.versions("d").unwrap(), vec!["d-1"]);
            assert!(result.outcomes()[0].is_success());
            assert!(result.outcomes()[2].is_success());
            assert!(result.outcomes()[3].is_success());

            per_mode.push(result.outcomes().to_vec());
        }
        assert_eq!(per_mode[0], per_mode[1]);
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
