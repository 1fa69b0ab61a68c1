//! Index entries on directory records.
//!
//! An index entry is the durable fact "advertisement A was computed to
//! satisfy request R", stored as an `(INDEX, R)` annotation on A's record.
//! Entries are only ever added or removed, never rewritten.
//!
//! Every write is a read-modify-write under the record's version:
//!
//! ```text
//!   loop {
//!       record  = get_record(id)
//!       update  = f(record)               // set semantics, no duplicates
//!       if update == record: done         // nothing to write
//!       update_record(id, record.version, update)
//!           Ok          -> done
//!           Conflict    -> retry (up to max_write_retries)
//!   }
//! ```

use crate::error::{EngineError, Result};
use semreg_directory::{
    Annotation, DirectoryError, DirectoryService, IndexState, RecordId, RecordUpdate,
};
use semreg_profile::Concept;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    pub advertisement: RecordId,
    pub request: Concept,
}

impl IndexEntry {
    pub fn new(advertisement: RecordId, request: Concept) -> Self {
        Self {
            advertisement,
            request,
        }
    }
}

/// Answer of an index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLookup {
    /// The request's namespace is indexed; these records carry an entry for it.
    Hits(BTreeSet<RecordId>),
    /// The index does not cover this request. Not the same as "no matches".
    NotIndexable,
}

impl IndexLookup {
    pub fn hits(&self) -> Option<&BTreeSet<RecordId>> {
        match self {
            IndexLookup::Hits(hits) => Some(hits),
            IndexLookup::NotIndexable => None,
        }
    }
}

/// What one versioned write did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub added: usize,
    pub removed: usize,
    /// Version after the write, `None` when nothing had to be written.
    pub version: Option<u64>,
    pub retries: u32,
}

// ============================================================================
// Writer
// ============================================================================

pub struct IndexWriter<'d> {
    directory: &'d dyn DirectoryService,
    max_retries: u32,
}

impl<'d> IndexWriter<'d> {
    pub fn new(directory: &'d dyn DirectoryService, max_retries: u32) -> Self {
        Self {
            directory,
            max_retries,
        }
    }

    /// Append one entry if absent.
    pub async fn add_entry(&self, entry: &IndexEntry) -> Result<WriteOutcome> {
        self.write_entries(&entry.advertisement, std::slice::from_ref(&entry.request), None)
            .await
    }

    /// Append entries for `requests` to one advertisement record, and
    /// optionally move the record to `state`.
    pub async fn write_entries(
        &self,
        advertisement: &RecordId,
        requests: &[Concept],
        state: Option<IndexState>,
    ) -> Result<WriteOutcome> {
        self.modify(advertisement, |update| {
            for request in requests {
                update.annotations.insert(Annotation::index(request));
            }
            if let Some(state) = state {
                update.index_state = state;
            }
        })
        .await
    }

    /// Remove every entry for `request`. Returns the number of records pruned.
    pub async fn remove_request(&self, request: &Concept) -> Result<usize> {
        let entry = Annotation::index(request);
        let carriers = self.directory.find_by_annotation(&entry).await?;
        let mut pruned = 0;
        for id in carriers {
            match self
                .modify(&id, |update| {
                    update.annotations.remove(&entry);
                })
                .await
            {
                Ok(outcome) if outcome.removed > 0 => pruned += 1,
                Ok(_) => {}
                Err(err) if err.is_record_local() => {
                    tracing::debug!(record = %id, error = %err, "record vanished while pruning");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(pruned)
    }

    async fn modify<F>(&self, id: &RecordId, mut apply: F) -> Result<WriteOutcome>
    where
        F: FnMut(&mut RecordUpdate) + Send,
    {
        let mut retries = 0;
        loop {
            let record = self
                .directory
                .get_record(id)
                .await?
                .ok_or_else(|| DirectoryError::NotFound(id.clone()))?;

            let current = RecordUpdate::from_record(&record);
            let mut update = current.clone();
            apply(&mut update);
            if update == current {
                return Ok(WriteOutcome {
                    retries,
                    ..WriteOutcome::default()
                });
            }

            let added = update.annotations.difference(&current.annotations).count();
            let removed = current.annotations.difference(&update.annotations).count();

            match self
                .directory
                .update_record(id, record.version, update)
                .await
            {
                Ok(version) => {
                    return Ok(WriteOutcome {
                        added,
                        removed,
                        version: Some(version),
                        retries,
                    })
                }
                Err(DirectoryError::VersionConflict {
                    expected, actual, ..
                }) => {
                    if retries >= self.max_retries {
                        return Err(EngineError::Communication(format!(
                            "index write to {id} still conflicting after {retries} retries"
                        )));
                    }
                    retries += 1;
                    tracing::debug!(
                        record = %id,
                        expected,
                        actual,
                        retry = retries,
                        "version conflict, re-reading record"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

pub struct IndexReader<'d> {
    directory: &'d dyn DirectoryService,
}

impl<'d> IndexReader<'d> {
    pub fn new(directory: &'d dyn DirectoryService) -> Self {
        Self { directory }
    }

    /// A request is answered from the index only when its namespace is
    /// indexed and the request itself was indexed by a definition or a
    /// reclassification. An unknown request in an indexed namespace has no
    /// entries yet, and an empty hit set would be wrong.
    pub async fn is_indexable(&self, request: &Concept) -> Result<bool> {
        let namespaces = self.directory.indexed_namespaces().await?;
        if !namespaces.contains(request.namespace()) {
            return Ok(false);
        }
        Ok(self.directory.indexed_requests().await?.contains(request))
    }

    pub async fn lookup(&self, request: &Concept) -> Result<IndexLookup> {
        if !self.is_indexable(request).await? {
            return Ok(IndexLookup::NotIndexable);
        }
        let hits = self
            .directory
            .find_by_annotation(&Annotation::index(request))
            .await?;
        Ok(IndexLookup::Hits(hits.into_iter().collect()))
    }
}
