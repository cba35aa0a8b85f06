use std::fmt;
use std::path::Path;

use super::{naming_error, StrategyOptions, SubjectNameStrategy};
use crate::error::Result;

/// Uses the file name with its last extension stripped.
///
/// `user.avsc` becomes `user`, `user.v2.avsc` becomes `user.v2`, `schema.`
/// becomes `schema`. A name without a dot is returned as is, and so is a name
/// whose only dot is the leading one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultNameStrategy;

impl DefaultNameStrategy {
    /// Strip the last extension from a bare file name
    pub fn strip_extension(file_name: &str) -> &str {
        match file_name.rfind('.') {
            Some(dot) if dot > 0 => &file_name[..dot],
            _ => file_name,
        }
    }
}

impl SubjectNameStrategy for DefaultNameStrategy {
    fn configure(&mut self, _options: &StrategyOptions) -> Result<()> {
        Ok(())
    }

    fn subject_name(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .ok_or_else(|| naming_error(path, "path has no file name"))?;
        let file_name = file_name
            .to_str()
            .ok_or_else(|| naming_error(path, "file name is not valid UTF-8"))?;
        Ok(Self::strip_extension(file_name).to_string())
    }
}

impl fmt::Display for DefaultNameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "default")
    }
}
