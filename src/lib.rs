//! Schema Register
//!
//! Registers a directory tree of schema files with a schema-repo registry,
//! deriving one subject name per file.
//!
//! ## Features
//!
//! - **Subject Naming**: `default` (file name without extension) or
//!   `hierarchical` (ancestor directories joined by a separator)
//! - **Reconciliation**: subjects are created only when missing, every file is
//!   attempted once, and failures are reported per file
//! - **Checksums**: SHA256 of every registered file lands in the report
//! - **Bounded Concurrency**: optional worker pool that keeps version order per subject
//!
//! ## Flow
//!
//! ```text
//! schemas/                      registry
//! ├── com/acme/user.avsc  ──►  acme_user   (create if missing, register)
//! └── com/acme/order.avsc ──►  acme_order  (create if missing, register)
//! ```

pub mod checksum;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod naming;
pub mod outcome;
pub mod schema;
pub mod snapshot;

pub use checksum::Checksum;
pub use config::RegisterConfig;
pub use discovery::discover_schema_files;
pub use engine::ReconciliationEngine;
pub use error::{RegistrationError, Result};
pub use gateway::http::SchemaRepoClient;
pub use gateway::memory::InMemoryGateway;
pub use gateway::{GatewayError, RegistryGateway, SubjectHandle, VersionId};
pub use naming::{
    DefaultNameStrategy, HierarchicalNameStrategy, StrategyKind, StrategyOptions,
    SubjectNameStrategy,
};
pub use outcome::{BatchOutcome, BatchResult, FailureStage, OutcomeState};
pub use schema::SchemaFile;
pub use snapshot::RegistrySnapshot;
