//! Directory contents shared by the in-memory and file-backed services.

use crate::{Annotation, DirectoryError, DirectoryRecord, RecordId, RecordUpdate};
use semreg_profile::Concept;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct DirectoryState {
    pub records: BTreeMap<RecordId, DirectoryRecord>,
    #[serde(default)]
    pub indexed_namespaces: BTreeSet<String>,
    /// Requests whose every hit has been written to the index.
    #[serde(default)]
    pub indexed_requests: BTreeSet<Concept>,
}

impl DirectoryState {
    pub fn create(&mut self, mut record: DirectoryRecord) -> Result<DirectoryRecord, DirectoryError> {
        if self.records.contains_key(&record.id) {
            return Err(DirectoryError::AlreadyExists(record.id));
        }
        record.version = 1;
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<DirectoryRecord> {
        self.records.remove(id)
    }

    /// Apply a versioned update. Returns the new version and the previous
    /// annotation set.
    pub fn update(
        &mut self,
        id: &RecordId,
        expected_version: u64,
        update: RecordUpdate,
    ) -> Result<(u64, BTreeSet<Annotation>), DirectoryError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| DirectoryError::NotFound(id.clone()))?;
        if record.version != expected_version {
            return Err(DirectoryError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                actual: record.version,
            });
        }
        let previous = std::mem::replace(&mut record.annotations, update.annotations);
        record.index_state = update.index_state;
        record.version += 1;
        Ok((record.version, previous))
    }

    pub fn find(&self, annotation: &Annotation) -> Vec<RecordId> {
        self.records
            .values()
            .filter(|r| r.annotations.contains(annotation))
            .map(|r| r.id.clone())
            .collect()
    }
}
