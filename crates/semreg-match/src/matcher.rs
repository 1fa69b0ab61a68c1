//! Pairwise and population matching.
//!
//! ```text
//!   anchor ─┐
//!           ├─► Gate (MEP) ──✗──► skip, no checklist touched
//!   cand  ──┘        │
//!                    ✓
//!                    ▼
//!          candidate concepts resolvable? ──✗──► SkippedCandidate
//!                    │
//!                    ▼
//!          category ∈ anchor.category_checklist ──✗──► reject
//!                    │
//!          inputs  ∈ anchor.input_checklists   (if MEP has inputs)
//!          outputs ∈ anchor.output_checklists  (if MEP has outputs)
//!                    │
//!                    ▼
//!                  match
//! ```
//!
//! Anchor checklists are built on the first comparable candidate and then
//! shared read-only by every comparison, so population matching can run on
//! the rayon pool.

use crate::checklist::{Checklist, ChecklistBuilder, Dimension, QueryMode};
use crate::config::SlotPolicy;
use crate::error::{EngineError, Result};
use crate::gate::Gate;
use rayon::prelude::*;
use semreg_oracle::TaxonomySnapshot;
use semreg_profile::{Concept, FunctionalProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Checklists for every dimension of one anchor.
#[derive(Debug, Clone)]
pub struct AnchorChecklists {
    pub category: Checklist,
    /// One per compared input slot (just the primary slot under
    /// [`SlotPolicy::Primary`]).
    pub inputs: Vec<Checklist>,
    pub outputs: Vec<Checklist>,
}

/// A validated anchor profile bound to one snapshot.
#[derive(Debug)]
pub struct Anchor {
    profile: FunctionalProfile,
    mode: QueryMode,
    checklists: OnceLock<AnchorChecklists>,
}

impl Anchor {
    pub fn profile(&self) -> &FunctionalProfile {
        &self.profile
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Whether checklists have been built yet.
    pub fn is_expanded(&self) -> bool {
        self.checklists.get().is_some()
    }
}

/// A candidate left out of a population result because it could not be
/// evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub id: String,
    pub reason: String,
}

/// Result of running one anchor over a population.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationMatch {
    pub matched: BTreeSet<Concept>,
    pub skipped: Vec<SkippedCandidate>,
    /// Candidates the MEP gate excluded.
    pub gated: usize,
    pub compared: usize,
}

enum Verdict {
    Match(Concept),
    Reject,
    Gated,
    Skipped(SkippedCandidate),
}

pub struct Matcher<'s> {
    snapshot: &'s TaxonomySnapshot,
    policy: SlotPolicy,
    parallel: bool,
}

impl<'s> Matcher<'s> {
    pub fn new(snapshot: &'s TaxonomySnapshot, policy: SlotPolicy) -> Self {
        Self {
            snapshot,
            policy,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn snapshot(&self) -> &'s TaxonomySnapshot {
        self.snapshot
    }

    /// Validate `profile` as an anchor: every concept it names must be
    /// defined in the snapshot.
    pub fn anchor(&self, profile: FunctionalProfile, mode: QueryMode) -> Result<Anchor> {
        if let Some(missing) = self.first_unresolved(&profile) {
            return Err(EngineError::MalformedProfile(format!(
                "{}: concept {missing} is not defined in the taxonomy",
                profile.id()
            )));
        }
        Ok(Anchor {
            profile,
            mode,
            checklists: OnceLock::new(),
        })
    }

    fn first_unresolved<'p>(&self, profile: &'p FunctionalProfile) -> Option<&'p Concept> {
        profile.concepts().find(|c| !self.snapshot.contains(c))
    }

    fn checklists<'a>(&self, anchor: &'a Anchor) -> Result<&'a AnchorChecklists> {
        if let Some(built) = anchor.checklists.get() {
            return Ok(built);
        }
        let built = self.expand(anchor)?;
        Ok(anchor.checklists.get_or_init(|| built))
    }

    fn expand(&self, anchor: &Anchor) -> Result<AnchorChecklists> {
        let builder = ChecklistBuilder::new(self.snapshot);
        let profile = &anchor.profile;
        let category = builder.build_category_checklist(profile.category(), anchor.mode)?;
        let inputs = self.slot_checklists(&builder, profile.inputs(), Dimension::Input, anchor.mode)?;
        let outputs =
            self.slot_checklists(&builder, profile.outputs(), Dimension::Output, anchor.mode)?;
        tracing::trace!(
            anchor = %profile.id(),
            mode = ?anchor.mode,
            category = category.len(),
            "anchor checklists built"
        );
        Ok(AnchorChecklists {
            category,
            inputs,
            outputs,
        })
    }

    fn slot_checklists(
        &self,
        builder: &ChecklistBuilder<'_>,
        slots: &[Concept],
        dimension: Dimension,
        mode: QueryMode,
    ) -> Result<Vec<Checklist>> {
        let compared = match self.policy {
            SlotPolicy::Primary => &slots[..slots.len().min(1)],
            SlotPolicy::PerSlot => slots,
        };
        compared
            .iter()
            .map(|c| builder.build_for(c, dimension, mode))
            .collect()
    }

    /// Decide whether `candidate` satisfies the compatibility tests of
    /// `anchor`.
    pub fn matches(&self, anchor: &Anchor, candidate: &FunctionalProfile) -> Result<bool> {
        match Gate::check(&anchor.profile, candidate) {
            Gate::Comparable(_) => {}
            Gate::Incompatible { .. } => return Ok(false),
        }
        let lists = self.checklists(anchor)?;

        if !lists.category.contains(candidate.category()) {
            return Ok(false);
        }
        let mep = candidate.mep();
        if mep.has_inputs() && !self.slots_pass(&lists.inputs, candidate.inputs()) {
            return Ok(false);
        }
        if mep.has_outputs() && !self.slots_pass(&lists.outputs, candidate.outputs()) {
            return Ok(false);
        }
        Ok(true)
    }

    fn slots_pass(&self, lists: &[Checklist], slots: &[Concept]) -> bool {
        match self.policy {
            SlotPolicy::Primary => match (lists.first(), slots.first()) {
                (Some(list), Some(slot)) => list.contains(slot),
                _ => false,
            },
            SlotPolicy::PerSlot => {
                lists.len() == slots.len()
                    && lists.iter().zip(slots).all(|(list, slot)| list.contains(slot))
            }
        }
    }

    fn evaluate(&self, anchor: &Anchor, candidate: &FunctionalProfile) -> Result<Verdict> {
        if !Gate::check(&anchor.profile, candidate).is_comparable() {
            return Ok(Verdict::Gated);
        }
        if let Some(missing) = self.first_unresolved(candidate) {
            return Ok(Verdict::Skipped(SkippedCandidate {
                id: candidate.id().to_string(),
                reason: format!("concept {missing} is not defined in the taxonomy"),
            }));
        }
        if self.matches(anchor, candidate)? {
            Ok(Verdict::Match(candidate.id().clone()))
        } else {
            Ok(Verdict::Reject)
        }
    }

    /// Run `anchor` against every candidate.
    ///
    /// The anchor itself is never reported as its own match.
    pub fn match_population(
        &self,
        anchor: &Anchor,
        candidates: &[FunctionalProfile],
    ) -> Result<PopulationMatch> {
        let verdicts: Vec<Verdict> = if self.parallel && candidates.len() > 1 {
            candidates
                .par_iter()
                .filter(|c| c.id() != anchor.profile.id())
                .map(|c| self.evaluate(anchor, c))
                .collect::<Result<Vec<_>>>()?
        } else {
            candidates
                .iter()
                .filter(|c| c.id() != anchor.profile.id())
                .map(|c| self.evaluate(anchor, c))
                .collect::<Result<Vec<_>>>()?
        };

        let mut result = PopulationMatch::default();
        for verdict in verdicts {
            match verdict {
                Verdict::Match(id) => {
                    result.compared += 1;
                    result.matched.insert(id);
                }
                Verdict::Reject => result.compared += 1,
                Verdict::Gated => result.gated += 1,
                Verdict::Skipped(skipped) => result.skipped.push(skipped),
            }
        }
        Ok(result)
    }
}
