use std::fmt;
use std::path::Path;

use super::{DefaultNameStrategy, StrategyOptions, SubjectNameStrategy};
use crate::error::{RegistrationError, Result};

/// Option scope for this strategy, under [`super::PROPERTY_PREFIX`]
pub const SCOPE: &str = "hierarchical.";

/// Option scope under [`super::LEGACY_PROPERTY_PREFIX`]
pub const LEGACY_SCOPE: &str = "hierarchicalSubjectNameStrategy.";

pub const DEFAULT_SEPARATOR: &str = "_";
pub const DEFAULT_NUMBER_OF_ANCESTORS: usize = 1;

/// Folds ancestor directory names in front of the default subject name.
///
/// With `numberOfAncestors = 2` and `separator = "|"`, `a/b/c/user.avsc`
/// becomes `b|c|user`. The walk stops quietly when it runs out of parent
/// directories, so `user.avsc` on its own stays `user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchicalNameStrategy {
    separator: String,
    number_of_ancestors: usize,
}

impl HierarchicalNameStrategy {
    /// Strategy with default settings
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_NUMBER_OF_ANCESTORS, DEFAULT_SEPARATOR)
    }

    pub fn with_settings(number_of_ancestors: usize, separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            number_of_ancestors,
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn number_of_ancestors(&self) -> usize {
        self.number_of_ancestors
    }

    fn invalid(message: String) -> RegistrationError {
        RegistrationError::InvalidConfiguration {
            strategy: "hierarchical".to_string(),
            message,
        }
    }
}

impl Default for HierarchicalNameStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Current key first, then the Maven plugin key
fn option<'a>(options: &'a StrategyOptions, suffix: &str) -> Option<&'a str> {
    options
        .get_scoped(SCOPE, suffix)
        .or_else(|| options.get_legacy(LEGACY_SCOPE, suffix))
}

impl SubjectNameStrategy for HierarchicalNameStrategy {
    fn configure(&mut self, options: &StrategyOptions) -> Result<()> {
        let separator = option(options, "separator")
            .unwrap_or(DEFAULT_SEPARATOR)
            .to_string();

        let number_of_ancestors = match option(options, "numberOfAncestors") {
            None => DEFAULT_NUMBER_OF_ANCESTORS,
            Some(raw) => {
                let parsed: i64 = raw.trim().parse().map_err(|_| {
                    Self::invalid(format!("numberOfAncestors must be an integer, got '{raw}'"))
                })?;
                usize::try_from(parsed).map_err(|_| {
                    Self::invalid(format!("numberOfAncestors must not be negative, got {parsed}"))
                })?
            }
        };

        self.separator = separator;
        self.number_of_ancestors = number_of_ancestors;
        Ok(())
    }

    fn subject_name(&self, path: &Path) -> Result<String> {
        let base = DefaultNameStrategy.subject_name(path)?;

        let mut ancestors = Vec::with_capacity(self.number_of_ancestors);
        let mut current = path;
        for _ in 0..self.number_of_ancestors {
            let Some(parent) = current.parent() else { break };
            // Root, prefix and ".." have no file name; the walk ends there
            let Some(name) = parent.file_name() else { break };
            ancestors.push(name.to_string_lossy());
            current = parent;
        }

        let mut subject = String::new();
        for ancestor in ancestors.iter().rev() {
            subject.push_str(ancestor);
            subject.push_str(&self.separator);
        }
        subject.push_str(&base);
        Ok(subject)
    }
}

impl fmt::Display for HierarchicalNameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hierarchical[separator=\"{}\", numberOfAncestors={}]",
            self.separator, self.number_of_ancestors
        )
    }
}
