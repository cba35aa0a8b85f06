//! Registry snapshot
//!
//! Name -> subject handle cache, filled by a single `list_subjects` call at
//! the start of a run and extended with every subject the run creates.

use std::collections::HashMap;

use crate::gateway::{GatewayError, RegistryGateway, SubjectHandle};

#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    subjects: HashMap<String, SubjectHandle>,
}

impl RegistrySnapshot {
    /// Fetch the full subject list once
    pub fn fetch(gateway: &dyn RegistryGateway) -> Result<Self, GatewayError> {
        Ok(Self::from_handles(gateway.list_subjects()?))
    }

    pub fn from_handles(handles: impl IntoIterator<Item = SubjectHandle>) -> Self {
        Self {
            subjects: handles
                .into_iter()
                .map(|handle| (handle.name().to_string(), handle))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SubjectHandle> {
        self.subjects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.subjects.contains_key(name)
    }

    /// Cache a subject, replacing any handle with the same name
    pub fn insert(&mut self, handle: SubjectHandle) {
        self.subjects.insert(handle.name().to_string(), handle);
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Known subject names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.subjects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
