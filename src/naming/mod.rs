//! Subject Naming
//!
//! Maps a schema file path to the registry subject it is registered under.
//!
//! Strategies are pluggable: each one implements [`SubjectNameStrategy`] and is
//! selected by a [`StrategyKind`] configuration value. Options arrive as a flat
//! map of dotted keys ([`StrategyOptions`]); keys a strategy does not recognise
//! are ignored, and every recognised key has a default so an empty map always
//! yields a working strategy. Key lookups ignore ASCII case, since layered
//! configuration sources lowercase their keys.
//!
//! Keys written for the schema-repo Maven plugin
//! (`schema-repo.tools.registration.hierarchicalSubjectNameStrategy.*`) are
//! read as well.
//!
//! ```
//! use std::path::Path;
//! use schema_register::naming::{StrategyKind, StrategyOptions};
//!
//! let strategy = StrategyKind::Hierarchical.build(&StrategyOptions::new()).unwrap();
//! let subject = strategy.subject_name(Path::new("com/acme/user.avsc")).unwrap();
//! assert_eq!(subject, "acme_user");
//! ```

mod default;
mod hierarchical;

pub use default::DefaultNameStrategy;
pub use hierarchical::{
    HierarchicalNameStrategy, DEFAULT_NUMBER_OF_ANCESTORS, DEFAULT_SEPARATOR,
    LEGACY_SCOPE as LEGACY_HIERARCHICAL_SCOPE, SCOPE as HIERARCHICAL_SCOPE,
};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// Prefix shared by every naming option key
pub const PROPERTY_PREFIX: &str = "schema-register.";

/// Prefix used by the schema-repo Maven plugin
pub const LEGACY_PROPERTY_PREFIX: &str = "schema-repo.tools.registration.";

/// Strategy that turns a schema file path into a registry subject name.
///
/// `configure` is called at most once, before the first `subject_name` call.
/// `subject_name` must be deterministic and return a non-empty name for every
/// path that has a file name component.
pub trait SubjectNameStrategy: fmt::Display + Send + Sync {
    /// Apply options; unknown keys are ignored, invalid values are rejected
    fn configure(&mut self, options: &StrategyOptions) -> Result<()>;

    /// Derive the subject name for a schema file
    fn subject_name(&self, path: &Path) -> Result<String>;
}

/// Flat, dotted-key option map consumed by naming strategies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOptions {
    #[serde(flatten)]
    values: BTreeMap<String, String>,
}

impl StrategyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a full dotted key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a full dotted key, exactly as written
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a full dotted key ignoring ASCII case; an exact match wins
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        self.get(key).or_else(|| {
            self.values
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Look up `PROPERTY_PREFIX + scope + suffix`, ignoring ASCII case
    pub fn get_scoped(&self, scope: &str, suffix: &str) -> Option<&str> {
        self.get_ignore_case(&format!("{PROPERTY_PREFIX}{scope}{suffix}"))
    }

    /// Look up `LEGACY_PROPERTY_PREFIX + scope + suffix`, ignoring ASCII case
    pub fn get_legacy(&self, scope: &str, suffix: &str) -> Option<&str> {
        self.get_ignore_case(&format!("{LEGACY_PROPERTY_PREFIX}{scope}{suffix}"))
    }

    /// Parse a `key=value` assignment (as given on the command line)
    pub fn insert_assignment(&mut self, assignment: &str) -> std::result::Result<(), String> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{assignment}'"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("empty key in '{assignment}'"));
        }
        self.insert(key, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StrategyOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Available naming strategies, selected by configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// File name without its last extension
    #[default]
    Default,
    /// Ancestor directory names folded in front of the default name
    Hierarchical,
}

impl StrategyKind {
    /// Create an unconfigured strategy of this kind
    pub fn instantiate(self) -> Box<dyn SubjectNameStrategy> {
        match self {
            StrategyKind::Default => Box::new(DefaultNameStrategy),
            StrategyKind::Hierarchical => Box::new(HierarchicalNameStrategy::new()),
        }
    }

    /// Create and configure a strategy of this kind
    pub fn build(self, options: &StrategyOptions) -> Result<Box<dyn SubjectNameStrategy>> {
        let mut strategy = self.instantiate();
        strategy.configure(options)?;
        Ok(strategy)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Default => write!(f, "default"),
            StrategyKind::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

fn naming_error(path: &Path, reason: impl Into<String>) -> RegistrationError {
    RegistrationError::Naming {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}
