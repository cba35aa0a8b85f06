//! Schema file discovery
//!
//! Recursively collects schema files under a root directory. A file is kept
//! when its name ends with the configured extension and does not start with
//! a dot. Entries are visited in file-name order, so the resulting list (and
//! with it the order of registrations) is stable between runs.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{RegistrationError, Result};

/// Resolve a possibly relative schema directory against a base directory
pub fn resolve_schema_dir(dir: &Path, base: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base.join(dir)
    }
}

/// Whether a file name passes the extension and hidden-file filters
pub fn is_schema_file_name(file_name: &str, extension: &str) -> bool {
    !file_name.starts_with('.') && file_name.ends_with(extension)
}

/// Find schema files under `root`, in deterministic order.
///
/// An empty `extension` matches every non-hidden file.
pub fn discover_schema_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(RegistrationError::InvalidSchemaDir(root.to_path_buf()));
    }

    let described = if extension.is_empty() { "all" } else { extension };
    info!("Looking for {} files in {}", described, root.display());

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "Skipping non UTF-8 file name");
            continue;
        };
        if is_schema_file_name(file_name, extension) {
            paths.push(entry.into_path());
        }
    }

    info!("Found {} schema files", paths.len());
    Ok(paths)
}
