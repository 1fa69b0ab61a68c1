//! Semreg directory service.
//!
//! The directory holds one record per published advertisement. A record is a
//! bag of `(key kind, value)` annotations, the fragment of a UDDI-style
//! category bag the matching engine needs:
//!
//! ```text
//! ┌──────────────────────────── DirectoryRecord ────────────────────────────┐
//! │ id        http://ex.org/svc#Groomer                                     │
//! │ version   7            (optimistic concurrency token)                   │
//! │ state     PartiallyIndexed                                              │
//! │ CATEGORY  http://ex.org/animals#Poodle                                  │
//! │ INPUT     0|http://ex.org/measures#Weight                               │
//! │ INDEX     http://ex.org/requests#FindDog     ◄── written by the engine  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Annotation writes go through [`DirectoryService::update_record`] with an
//! expected version; a stale version fails with
//! [`DirectoryError::VersionConflict`] instead of silently losing an update.

pub mod file;
pub mod memory;
pub mod record;
mod state;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use semreg_profile::Concept;
use std::collections::BTreeSet;

pub use file::{DirectoryChange, DirectoryChangeKind, DirectoryConfig, FileDirectory};
pub use memory::InMemoryDirectory;
pub use record::{
    Annotation, DirectoryRecord, IndexState, KeyKind, RecordId, RecordProfileError, RecordUpdate,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("record already exists: {0}")]
    AlreadyExists(RecordId),
    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: RecordId,
        expected: u64,
        actual: u64,
    },
    #[error("record {id} is unreadable: {reason}")]
    Unreadable { id: RecordId, reason: String },
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DirectoryError {
    /// Whether the failure concerns one record only, so a pass over many
    /// records can skip it and continue.
    pub fn is_record_local(&self) -> bool {
        matches!(
            self,
            DirectoryError::NotFound(_) | DirectoryError::Unreadable { .. }
        )
    }
}

// ============================================================================
// Service seam
// ============================================================================

/// The registry's record store, as seen by the matching engine.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn get_record(&self, id: &RecordId) -> Result<Option<DirectoryRecord>, DirectoryError>;

    /// Ids of every record, in ascending order.
    async fn list_records(&self) -> Result<Vec<RecordId>, DirectoryError>;

    /// Store a new record. Its version becomes 1.
    async fn create_record(
        &self,
        record: DirectoryRecord,
    ) -> Result<DirectoryRecord, DirectoryError>;

    /// Remove a record and everything attached to it. Returns whether it existed.
    async fn remove_record(&self, id: &RecordId) -> Result<bool, DirectoryError>;

    /// Replace a record's annotations and index state if its version still
    /// equals `expected_version`. Returns the new version.
    async fn update_record(
        &self,
        id: &RecordId,
        expected_version: u64,
        update: RecordUpdate,
    ) -> Result<u64, DirectoryError>;

    /// Ids of records carrying exactly `annotation`, in ascending order.
    async fn find_by_annotation(
        &self,
        annotation: &Annotation,
    ) -> Result<Vec<RecordId>, DirectoryError>;

    /// Namespaces whose requests are kept current in the index.
    async fn indexed_namespaces(&self) -> Result<BTreeSet<String>, DirectoryError>;

    /// Returns whether the namespace was newly added.
    async fn mark_namespace_indexed(&self, namespace: &str) -> Result<bool, DirectoryError>;

    /// Requests whose hits have all been written to the index.
    async fn indexed_requests(&self) -> Result<BTreeSet<Concept>, DirectoryError>;

    /// Returns whether the request was newly added.
    async fn mark_request_indexed(&self, request: &Concept) -> Result<bool, DirectoryError>;

    /// Returns whether the request was indexed.
    async fn unmark_request_indexed(&self, request: &Concept) -> Result<bool, DirectoryError>;
}
