//! Reclassification coordinator.
//!
//! Every entry point runs one *pass*:
//!
//! ```text
//!   open pass ─► load taxonomy ─► define requests ─► classify ─► validate roots
//!      (spawn_blocking, optional timeout)                   │
//!                                                           ▼
//!                        anchor(s) ─► Matcher ─► IndexWriter / result
//! ```
//!
//! A pass owns its snapshot; nothing is shared between passes except the
//! directory and the set of requests defined through this coordinator.
//!
//! | entry point                  | anchor        | candidates      | writes index |
//! |------------------------------|---------------|-----------------|--------------|
//! | `on_advertisement_published` | advertisement | requests        | yes          |
//! | `on_request_defined`         | request       | advertisements  | yes          |
//! | `discover` (fallback)        | request       | advertisements  | no           |
//! | `reclassify_all`             | every request | advertisements  | yes          |

use crate::checklist::QueryMode;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::index::{IndexLookup, IndexReader, IndexWriter};
use crate::matcher::{Matcher, PopulationMatch, SkippedCandidate};
use parking_lot::RwLock;
use semreg_directory::{DirectoryRecord, DirectoryService, IndexState, RecordId};
use semreg_oracle::{oracle_for, SubsumptionOracle, TaxonomySnapshot};
use semreg_profile::digest::profile_digest_v1;
use semreg_profile::{Concept, FunctionalProfile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Pass events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Publish,
    RequestDefinition,
    Discovery,
    Reclassification,
    TaxonomyCheck,
}

/// Events emitted while a pass runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassEvent {
    PassStarted {
        pass: Uuid,
        kind: PassKind,
    },
    TaxonomyClassified {
        pass: Uuid,
        fingerprint: String,
        concepts: usize,
    },
    CandidateSkipped {
        pass: Uuid,
        candidate: String,
        reason: String,
    },
    IndexEntriesWritten {
        pass: Uuid,
        advertisement: RecordId,
        added: usize,
    },
    PassFinished {
        pass: Uuid,
        kind: PassKind,
        matched: usize,
        skipped: usize,
        entries_added: usize,
    },
}

/// Callback for pass events
pub type PassEventHandler = Box<dyn Fn(PassEvent) + Send + Sync>;

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// Index entries were written for these requests.
    Indexed(BTreeSet<Concept>),
    /// Published, but no known request matches yet.
    NoImmediateMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub record: RecordId,
    pub status: PublishStatus,
    pub skipped: Vec<SkippedCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub request: Concept,
    pub matched: BTreeSet<RecordId>,
    pub entries_added: usize,
    pub skipped: Vec<SkippedCandidate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPath {
    Index,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub answered_by: DiscoveryPath,
    pub advertisements: BTreeSet<RecordId>,
    pub skipped: Vec<SkippedCandidate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclassifyReport {
    pub requests: usize,
    pub advertisements: usize,
    pub entries_added: usize,
    pub skipped: Vec<SkippedCandidate>,
}

// ============================================================================
// Coordinator
// ============================================================================

struct Pass {
    id: Uuid,
    kind: PassKind,
    snapshot: TaxonomySnapshot,
}

pub struct Coordinator {
    config: EngineConfig,
    oracle: Arc<dyn SubsumptionOracle>,
    directory: Arc<dyn DirectoryService>,
    /// Requests defined through this coordinator, added to every pass.
    requests: RwLock<BTreeMap<Concept, FunctionalProfile>>,
    event_handlers: Vec<PassEventHandler>,
}

impl Coordinator {
    /// Create a coordinator using the oracle selected by `config.reasoner`.
    pub fn new(config: EngineConfig, directory: Arc<dyn DirectoryService>) -> Self {
        let oracle = oracle_for(config.reasoner);
        Self::with_oracle(config, oracle, directory)
    }

    pub fn with_oracle(
        config: EngineConfig,
        oracle: Arc<dyn SubsumptionOracle>,
        directory: Arc<dyn DirectoryService>,
    ) -> Self {
        Self {
            config,
            oracle,
            directory,
            requests: RwLock::new(BTreeMap::new()),
            event_handlers: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn directory(&self) -> &Arc<dyn DirectoryService> {
        &self.directory
    }

    /// Add an event handler
    pub fn on_event(&mut self, handler: PassEventHandler) {
        self.event_handlers.push(handler);
    }

    /// Requests defined through [`Coordinator::on_request_defined`].
    pub fn defined_requests(&self) -> Vec<FunctionalProfile> {
        self.requests.read().values().cloned().collect()
    }

    /// Re-register requests defined in an earlier process, without running
    /// a pass.
    pub fn restore_requests(&self, requests: impl IntoIterator<Item = FunctionalProfile>) {
        let mut known = self.requests.write();
        for request in requests {
            known.insert(request.id().clone(), request);
        }
    }

    fn emit(&self, event: PassEvent) {
        match &event {
            PassEvent::PassStarted { pass, kind } => {
                tracing::info!(pass = %pass, kind = ?kind, "pass started");
            }
            PassEvent::TaxonomyClassified {
                pass,
                fingerprint,
                concepts,
            } => {
                tracing::debug!(pass = %pass, snapshot = %fingerprint, concepts, "taxonomy classified");
            }
            PassEvent::CandidateSkipped {
                pass,
                candidate,
                reason,
            } => {
                tracing::warn!(pass = %pass, candidate = %candidate, reason = %reason, "candidate skipped");
            }
            PassEvent::IndexEntriesWritten {
                pass,
                advertisement,
                added,
            } => {
                tracing::debug!(pass = %pass, advertisement = %advertisement, added, "index entries written");
            }
            PassEvent::PassFinished {
                pass,
                kind,
                matched,
                skipped,
                entries_added,
            } => {
                tracing::info!(
                    pass = %pass,
                    kind = ?kind,
                    matched,
                    skipped,
                    entries_added,
                    "pass finished"
                );
            }
        }
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    fn report_skipped(&self, pass: &Pass, skipped: &[SkippedCandidate]) {
        for s in skipped {
            self.emit(PassEvent::CandidateSkipped {
                pass: pass.id,
                candidate: s.id.clone(),
                reason: s.reason.clone(),
            });
        }
    }

    fn finish(&self, pass: &Pass, matched: usize, skipped: usize, entries_added: usize) {
        self.emit(PassEvent::PassFinished {
            pass: pass.id,
            kind: pass.kind,
            matched,
            skipped,
            entries_added,
        });
    }

    fn matcher<'s>(&self, pass: &'s Pass) -> Matcher<'s> {
        Matcher::new(&pass.snapshot, self.config.slot_policy).parallel(self.config.parallel_matching)
    }

    // ========================================================================
    // Pass setup
    // ========================================================================

    /// Load and classify the taxonomy for one pass, with every known request
    /// (plus `extra`) defined under the request root.
    async fn open_pass(&self, kind: PassKind, extra: Option<&FunctionalProfile>) -> Result<Pass> {
        let id = Uuid::new_v4();
        self.emit(PassEvent::PassStarted { pass: id, kind });

        let oracle = Arc::clone(&self.oracle);
        let source = self.config.taxonomy.clone();
        let vocabulary = self.config.vocabulary.clone();
        let root = self.config.roots.request.clone();
        let mut requests = self.defined_requests();
        requests.extend(extra.cloned());

        let handle = tokio::task::spawn_blocking(move || {
            let mut draft = oracle.load_taxonomy(&source, &vocabulary)?;
            draft.define_concept(&root);
            for request in &requests {
                draft.define_profile(request, &root);
            }
            draft.classify()
        });

        let joined = match self.config.oracle_timeout() {
            Some(limit) => tokio::time::timeout(limit, handle).await.map_err(|_| {
                EngineError::Communication(format!(
                    "taxonomy load and classification exceeded {}ms",
                    limit.as_millis()
                ))
            })?,
            None => handle.await,
        };
        let snapshot = joined
            .map_err(|e| EngineError::Communication(format!("classification task failed: {e}")))??;

        self.config.roots.validate(&snapshot)?;
        self.emit(PassEvent::TaxonomyClassified {
            pass: id,
            fingerprint: snapshot.fingerprint().to_string(),
            concepts: snapshot.concept_count(),
        });

        Ok(Pass { id, kind, snapshot })
    }

    /// Request profiles defined in the pass snapshot, in URI order.
    fn request_profiles(&self, pass: &Pass) -> Result<(Vec<FunctionalProfile>, Vec<SkippedCandidate>)> {
        let mut profiles = Vec::new();
        let mut skipped = Vec::new();
        for id in pass.snapshot.profiles_under(&self.config.roots.request)? {
            let Some(slots) = pass.snapshot.profile_slots(&id) else {
                continue;
            };
            match slots.to_profile(&id) {
                Ok(profile) => profiles.push(profile),
                Err(err) => skipped.push(SkippedCandidate {
                    id: id.to_string(),
                    reason: err.to_string(),
                }),
            }
        }
        Ok((profiles, skipped))
    }

    /// Every advertisement in the directory, rebuilt from its record.
    async fn advertisement_profiles(&self) -> Result<(Vec<FunctionalProfile>, Vec<SkippedCandidate>)> {
        let mut profiles = Vec::new();
        let mut skipped = Vec::new();
        for id in self.directory.list_records().await? {
            let record = match self.directory.get_record(&id).await {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(err) if err.is_record_local() => {
                    skipped.push(SkippedCandidate {
                        id: id.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            match record.advertisement_profile() {
                Ok(profile) => profiles.push(profile),
                Err(err) => skipped.push(SkippedCandidate {
                    id: id.to_string(),
                    reason: err.to_string(),
                }),
            }
        }
        Ok((profiles, skipped))
    }

    /// Write index entries for one advertisement, skipping records that
    /// vanished mid-pass.
    async fn write_entries(
        &self,
        pass: &Pass,
        advertisement: &RecordId,
        requests: &[Concept],
        state: Option<IndexState>,
        skipped: &mut Vec<SkippedCandidate>,
    ) -> Result<usize> {
        let writer = IndexWriter::new(self.directory.as_ref(), self.config.max_write_retries);
        match writer.write_entries(advertisement, requests, state).await {
            Ok(outcome) => {
                if outcome.added > 0 {
                    self.emit(PassEvent::IndexEntriesWritten {
                        pass: pass.id,
                        advertisement: advertisement.clone(),
                        added: outcome.added,
                    });
                }
                Ok(outcome.added)
            }
            Err(err) if err.is_record_local() => {
                let s = SkippedCandidate {
                    id: advertisement.to_string(),
                    reason: err.to_string(),
                };
                self.report_skipped(pass, std::slice::from_ref(&s));
                skipped.push(s);
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Publish an advertisement and index it against every known request.
    ///
    /// The record is only created once the advertisement has been validated
    /// against the pass snapshot, so a malformed advertisement leaves no trace.
    pub async fn on_advertisement_published(
        &self,
        advertisement: FunctionalProfile,
    ) -> Result<PublishOutcome> {
        let pass = self.open_pass(PassKind::Publish, None).await?;
        let matcher = self.matcher(&pass);
        let anchor = matcher.anchor(advertisement, QueryMode::Reverse)?;
        tracing::debug!(
            pass = %pass.id,
            advertisement = %anchor.profile().id(),
            digest = %profile_digest_v1(anchor.profile()),
            mep = %anchor.profile().mep(),
            "advertisement validated"
        );

        let (requests, mut skipped) = self.request_profiles(&pass)?;
        let PopulationMatch {
            matched,
            skipped: unmatched,
            ..
        } = matcher.match_population(&anchor, &requests)?;
        skipped.extend(unmatched);
        self.report_skipped(&pass, &skipped);

        let record = self
            .directory
            .create_record(DirectoryRecord::for_advertisement(anchor.profile()))
            .await?;

        let matched_requests: Vec<Concept> = matched.iter().cloned().collect();
        let added = self
            .write_entries(
                &pass,
                &record.id,
                &matched_requests,
                Some(IndexState::PartiallyIndexed),
                &mut skipped,
            )
            .await?;

        self.finish(&pass, matched.len(), skipped.len(), added);
        let status = if matched.is_empty() {
            PublishStatus::NoImmediateMatch
        } else {
            PublishStatus::Indexed(matched)
        };
        Ok(PublishOutcome {
            record: record.id,
            status,
            skipped,
        })
    }

    /// Remove an advertisement; its index entries go with the record.
    pub async fn on_advertisement_removed(&self, id: &RecordId) -> Result<bool> {
        let removed = self.directory.remove_record(id).await?;
        tracing::info!(record = %id, removed, "advertisement removed");
        Ok(removed)
    }

    /// Define a request, index every advertisement that satisfies it, and
    /// mark the request (and its namespace) as served by the index.
    pub async fn on_request_defined(&self, request: FunctionalProfile) -> Result<RequestOutcome> {
        let pass = self
            .open_pass(PassKind::RequestDefinition, Some(&request))
            .await?;
        let matcher = self.matcher(&pass);
        let anchor = matcher.anchor(request, QueryMode::Forward)?;
        let request_id = anchor.profile().id().clone();

        let (ads, mut skipped) = self.advertisement_profiles().await?;
        let population = matcher.match_population(&anchor, &ads)?;
        skipped.extend(population.skipped);
        self.report_skipped(&pass, &skipped);

        let mut matched = BTreeSet::new();
        let mut entries_added = 0;
        for ad in &population.matched {
            let id = RecordId::from(ad);
            let before = skipped.len();
            entries_added += self
                .write_entries(
                    &pass,
                    &id,
                    std::slice::from_ref(&request_id),
                    None,
                    &mut skipped,
                )
                .await?;
            if skipped.len() == before {
                matched.insert(id);
            }
        }

        self.requests
            .write()
            .insert(request_id.clone(), anchor.profile().clone());
        self.directory
            .mark_namespace_indexed(request_id.namespace())
            .await?;
        self.directory.mark_request_indexed(&request_id).await?;

        self.finish(&pass, matched.len(), skipped.len(), entries_added);
        Ok(RequestOutcome {
            request: request_id,
            matched,
            entries_added,
            skipped,
        })
    }

    /// Forget a request and prune every index entry carrying it.
    pub async fn on_request_removed(&self, request: &Concept) -> Result<usize> {
        self.requests.write().remove(request);
        self.directory.unmark_request_indexed(request).await?;
        let writer = IndexWriter::new(self.directory.as_ref(), self.config.max_write_retries);
        let pruned = writer.remove_request(request).await?;
        tracing::info!(request = %request, pruned, "request removed");
        Ok(pruned)
    }

    pub async fn lookup_by_index(&self, request: &Concept) -> Result<IndexLookup> {
        IndexReader::new(self.directory.as_ref()).lookup(request).await
    }

    /// Find advertisements for `request`: from the index when the request has
    /// been indexed, otherwise by a live pass whose result is not cached.
    pub async fn discover(&self, request: FunctionalProfile) -> Result<Discovery> {
        if let IndexLookup::Hits(advertisements) = self.lookup_by_index(request.id()).await? {
            tracing::debug!(request = %request.id(), hits = advertisements.len(), "answered from index");
            return Ok(Discovery {
                answered_by: DiscoveryPath::Index,
                advertisements,
                skipped: Vec::new(),
            });
        }

        let pass = self.open_pass(PassKind::Discovery, None).await?;
        let matcher = self.matcher(&pass);
        let anchor = matcher.anchor(request, QueryMode::Forward)?;
        let (ads, mut skipped) = self.advertisement_profiles().await?;
        let population = matcher.match_population(&anchor, &ads)?;
        skipped.extend(population.skipped);
        self.report_skipped(&pass, &skipped);

        let advertisements: BTreeSet<RecordId> =
            population.matched.iter().map(RecordId::from).collect();
        self.finish(&pass, advertisements.len(), skipped.len(), 0);
        Ok(Discovery {
            answered_by: DiscoveryPath::Live,
            advertisements,
            skipped,
        })
    }

    /// Re-run every request against every advertisement and bring the index
    /// up to date. Running it twice on unchanged inputs writes nothing the
    /// second time.
    pub async fn reclassify_all(&self) -> Result<ReclassifyReport> {
        let pass = self.open_pass(PassKind::Reclassification, None).await?;
        let matcher = self.matcher(&pass);

        let (requests, mut skipped) = self.request_profiles(&pass)?;
        let (ads, ad_skipped) = self.advertisement_profiles().await?;
        skipped.extend(ad_skipped);

        let mut entries: BTreeMap<RecordId, Vec<Concept>> = ads
            .iter()
            .map(|ad| (RecordId::from(ad.id()), Vec::new()))
            .collect();
        let mut indexed: Vec<Concept> = Vec::new();

        for request in requests {
            let request_id = request.id().clone();
            let anchor = match matcher.anchor(request, QueryMode::Forward) {
                Ok(anchor) => anchor,
                Err(err @ EngineError::MalformedProfile(_)) => {
                    skipped.push(SkippedCandidate {
                        id: request_id.to_string(),
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };
            indexed.push(request_id.clone());

            let population = matcher.match_population(&anchor, &ads)?;
            skipped.extend(population.skipped);
            for ad in &population.matched {
                if let Some(requests) = entries.get_mut(&RecordId::from(ad)) {
                    requests.push(request_id.clone());
                }
            }
        }
        // Candidate-level skips repeat for every request; report each once.
        let mut seen = BTreeSet::new();
        skipped.retain(|s| seen.insert(s.id.clone()));
        self.report_skipped(&pass, &skipped);
        for s in &skipped {
            entries.remove(&RecordId::new(s.id.as_str()));
        }

        let mut entries_added = 0;
        let mut matched = 0;
        for (id, requests) in &entries {
            matched += requests.len();
            entries_added += self
                .write_entries(
                    &pass,
                    id,
                    requests,
                    Some(IndexState::FullyIndexed),
                    &mut skipped,
                )
                .await?;
        }
        let namespaces: BTreeSet<&str> = indexed.iter().map(|r| r.namespace()).collect();
        for namespace in namespaces {
            self.directory.mark_namespace_indexed(namespace).await?;
        }
        for request in &indexed {
            self.directory.mark_request_indexed(request).await?;
        }

        self.finish(&pass, matched, skipped.len(), entries_added);
        Ok(ReclassifyReport {
            requests: indexed.len(),
            advertisements: entries.len(),
            entries_added,
            skipped,
        })
    }

    /// Load and classify the configured taxonomy without matching anything.
    pub async fn check_taxonomy(&self) -> Result<TaxonomySummary> {
        let pass = self.open_pass(PassKind::TaxonomyCheck, None).await?;
        let (requests, skipped) = self.request_profiles(&pass)?;
        self.report_skipped(&pass, &skipped);
        self.finish(&pass, 0, skipped.len(), 0);
        Ok(TaxonomySummary {
            fingerprint: pass.snapshot.fingerprint().to_string(),
            reasoner: pass.snapshot.reasoner(),
            concepts: pass.snapshot.concept_count(),
            requests: requests.iter().map(|r| r.id().clone()).collect(),
            malformed_requests: skipped,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomySummary {
    pub fingerprint: String,
    pub reasoner: &'static str,
    pub concepts: usize,
    pub requests: Vec<Concept>,
    pub malformed_requests: Vec<SkippedCandidate>,
}
