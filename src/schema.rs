//! Schema files as read from the source tree

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::checksum::Checksum;
use crate::error::Result;

/// A schema file discovered on disk, read exactly once
#[derive(Debug, Clone)]
pub struct SchemaFile {
    /// Path the file was discovered at
    path: PathBuf,
    /// Raw schema text
    content: String,
    /// SHA256 of the content
    checksum: Checksum,
}

impl SchemaFile {
    /// Read a schema file's content
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path)?;
        Ok(Self::new(path, content))
    }

    /// Build a schema file from content already in memory
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let content = content.into();
        let checksum = Checksum::from_content(&content);
        Self {
            path: path.into(),
            content,
            checksum,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, if the path has one
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Names of the enclosing directories, root to leaf
    pub fn ancestors(&self) -> Vec<String> {
        let Some(parent) = self.path.parent() else {
            return Vec::new();
        };
        parent
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }
}
