//! In-process directory, used by tests and embedded registries.

use crate::state::DirectoryState;
use crate::{Annotation, DirectoryError, DirectoryRecord, DirectoryService, RecordId, RecordUpdate};
use async_trait::async_trait;
use parking_lot::RwLock;
use semreg_profile::Concept;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite a record without a version check. Test hook for simulating
    /// a concurrent writer or a corrupted record.
    pub fn put_raw(&self, record: DirectoryRecord) {
        self.state.write().records.insert(record.id.clone(), record);
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn get_record(&self, id: &RecordId) -> Result<Option<DirectoryRecord>, DirectoryError> {
        Ok(self.state.read().records.get(id).cloned())
    }

    async fn list_records(&self) -> Result<Vec<RecordId>, DirectoryError> {
        Ok(self.state.read().records.keys().cloned().collect())
    }

    async fn create_record(
        &self,
        record: DirectoryRecord,
    ) -> Result<DirectoryRecord, DirectoryError> {
        self.state.write().create(record)
    }

    async fn remove_record(&self, id: &RecordId) -> Result<bool, DirectoryError> {
        Ok(self.state.write().remove(id).is_some())
    }

    async fn update_record(
        &self,
        id: &RecordId,
        expected_version: u64,
        update: RecordUpdate,
    ) -> Result<u64, DirectoryError> {
        let (version, _) = self.state.write().update(id, expected_version, update)?;
        Ok(version)
    }

    async fn find_by_annotation(
        &self,
        annotation: &Annotation,
    ) -> Result<Vec<RecordId>, DirectoryError> {
        Ok(self.state.read().find(annotation))
    }

    async fn indexed_namespaces(&self) -> Result<BTreeSet<String>, DirectoryError> {
        Ok(self.state.read().indexed_namespaces.clone())
    }

    async fn mark_namespace_indexed(&self, namespace: &str) -> Result<bool, DirectoryError> {
        Ok(self
            .state
            .write()
            .indexed_namespaces
            .insert(namespace.to_string()))
    }

    async fn indexed_requests(&self) -> Result<BTreeSet<Concept>, DirectoryError> {
        Ok(self.state.read().indexed_requests.clone())
    }

    async fn mark_request_indexed(&self, request: &Concept) -> Result<bool, DirectoryError> {
        Ok(self.state.write().indexed_requests.insert(request.clone()))
    }

    async fn unmark_request_indexed(&self, request: &Concept) -> Result<bool, DirectoryError> {
        Ok(self.state.write().indexed_requests.remove(request))
    }
}
