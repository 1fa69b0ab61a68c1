//! JSON-file backed directory with an append-only changelog.
//!
//! The whole directory is one JSON document rewritten after every mutation
//! (write to a temp file, then rename). Each mutation is also appended to the
//! changelog so an operator can see which index entries a pass added or
//! pruned. The snapshot is authoritative: a mutation that reached it has
//! succeeded even if its changelog entry could not be written.

use crate::state::DirectoryState;
use crate::{Annotation, DirectoryError, DirectoryRecord, DirectoryService, RecordId, RecordUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use semreg_profile::Concept;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Path to the directory snapshot.
    pub path: PathBuf,
    /// Path to the changelog. `None` disables change recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_path: Option<PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./directory.json"),
            changelog_path: Some(PathBuf::from("./directory-changelog.json")),
        }
    }
}

impl DirectoryConfig {
    /// Snapshot and changelog side by side under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join("directory.json"),
            changelog_path: Some(dir.join("directory-changelog.json")),
        }
    }
}

// ============================================================================
// Changelog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryChangeKind {
    RecordCreated,
    RecordRemoved,
    AnnotationsUpdated {
        added: Vec<Annotation>,
        removed: Vec<Annotation>,
        version: u64,
    },
    NamespaceIndexed {
        namespace: String,
    },
    RequestIndexed {
        request: Concept,
    },
    RequestUnindexed {
        request: Concept,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryChange {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordId>,
    #[serde(flatten)]
    pub kind: DirectoryChangeKind,
}

impl DirectoryChange {
    fn new(record: Option<RecordId>, kind: DirectoryChangeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            record,
            kind,
        }
    }
}

// ============================================================================
// File directory
// ============================================================================

pub struct FileDirectory {
    config: DirectoryConfig,
    state: Arc<RwLock<DirectoryState>>,
    changelog: Arc<RwLock<Vec<DirectoryChange>>>,
}

impl FileDirectory {
    /// Open the directory at `config.path`, starting empty if it does not exist.
    pub fn open(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let state = if config.path.exists() {
            let contents = std::fs::read_to_string(&config.path)?;
            serde_json::from_str(&contents)?
        } else {
            DirectoryState::default()
        };

        let changelog = match &config.changelog_path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                serde_json::from_str(&contents)?
            }
            _ => Vec::new(),
        };

        tracing::debug!(
            path = %config.path.display(),
            records = state.records.len(),
            "opened file directory"
        );

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(state)),
            changelog: Arc::new(RwLock::new(changelog)),
        })
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn changelog(&self) -> Vec<DirectoryChange> {
        self.changelog.read().clone()
    }

    fn save_state(&self, state: &DirectoryState) -> Result<(), DirectoryError> {
        let json = serde_json::to_string_pretty(state)?;
        write_atomic(&self.config.path, json.as_bytes())
    }

    /// Append to the changelog once the change is already durable in the
    /// snapshot. A failed append leaves the in-memory log untouched and is
    /// reported, not returned: the mutation itself succeeded.
    fn record_change(&self, change: DirectoryChange) {
        let Some(path) = &self.config.changelog_path else {
            return;
        };
        let mut changelog = self.changelog.write();
        changelog.push(change);
        let written = serde_json::to_string_pretty(&*changelog)
            .map_err(DirectoryError::from)
            .and_then(|json| write_atomic(path, json.as_bytes()));
        if let Err(err) = written {
            let dropped = changelog.pop();
            tracing::warn!(
                path = %path.display(),
                change = ?dropped.map(|c| c.kind),
                error = %err,
                "failed to append directory change"
            );
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DirectoryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl DirectoryService for FileDirectory {
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
        let created = {
            let mut state = self.state.write();
            let created = state.create(record)?;
            if let Err(err) = self.save_state(&state) {
                state.remove(&created.id);
                return Err(err);
            }
            created
        };
        self.record_change(DirectoryChange::new(
            Some(created.id.clone()),
            DirectoryChangeKind::RecordCreated,
        ));
        Ok(created)
    }

    async fn remove_record(&self, id: &RecordId) -> Result<bool, DirectoryError> {
        let removed = {
            let mut state = self.state.write();
            match state.remove(id) {
                Some(old) => {
                    if let Err(err) = self.save_state(&state) {
                        state.records.insert(old.id.clone(), old);
                        return Err(err);
                    }
                    true
                }
                None => false,
            }
        };
        if removed {
            self.record_change(DirectoryChange::new(
                Some(id.clone()),
                DirectoryChangeKind::RecordRemoved,
            ));
        }
        Ok(removed)
    }

    async fn update_record(
        &self,
        id: &RecordId,
        expected_version: u64,
        update: RecordUpdate,
    ) -> Result<u64, DirectoryError> {
        let new_annotations = update.annotations.clone();
        let (version, previous) = {
            let mut state = self.state.write();
            let snapshot = state.records.get(id).cloned();
            let outcome = state.update(id, expected_version, update)?;
            if let Err(err) = self.save_state(&state) {
                if let Some(old) = snapshot {
                    state.records.insert(old.id.clone(), old);
                }
                return Err(err);
            }
            outcome
        };

        let added: Vec<Annotation> = new_annotations.difference(&previous).cloned().collect();
        let removed: Vec<Annotation> = previous.difference(&new_annotations).cloned().collect();
        if !added.is_empty() || !removed.is_empty() {
            self.record_change(DirectoryChange::new(
                Some(id.clone()),
                DirectoryChangeKind::AnnotationsUpdated {
                    added,
                    removed,
                    version,
                },
            ));
        }
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
        let added = {
            let mut state = self.state.write();
            let added = state.indexed_namespaces.insert(namespace.to_string());
            if added {
                if let Err(err) = self.save_state(&state) {
                    state.indexed_namespaces.remove(namespace);
                    return Err(err);
                }
            }
            added
        };
        if added {
            self.record_change(DirectoryChange::new(
                None,
                DirectoryChangeKind::NamespaceIndexed {
                    namespace: namespace.to_string(),
                },
            ));
        }
        Ok(added)
    }

    async fn indexed_requests(&self) -> Result<BTreeSet<Concept>, DirectoryError> {
        Ok(self.state.read().indexed_requests.clone())
    }

    async fn mark_request_indexed(&self, request: &Concept) -> Result<bool, DirectoryError> {
        let added = {
            let mut state = self.state.write();
            let added = state.indexed_requests.insert(request.clone());
            if added {
                if let Err(err) = self.save_state(&state) {
                    state.indexed_requests.remove(request);
                    return Err(err);
                }
            }
            added
        };
        if added {
            self.record_change(DirectoryChange::new(
                None,
                DirectoryChangeKind::RequestIndexed {
                    request: request.clone(),
                },
            ));
        }
        Ok(added)
    }

    async fn unmark_request_indexed(&self, request: &Concept) -> Result<bool, DirectoryError> {
        let removed = {
            let mut state = self.state.write();
            let removed = state.indexed_requests.remove(request);
            if removed {
                if let Err(err) = self.save_state(&state) {
                    state.indexed_requests.insert(request.clone());
                    return Err(err);
                }
            }
            removed
        };
        if removed {
            self.record_change(DirectoryChange::new(
                None,
                DirectoryChangeKind::RequestUnindexed {
                    request: request.clone(),
                },
            ));
        }
        Ok(removed)
    }
}
