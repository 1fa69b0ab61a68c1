//! Structural closure reasoner.
//!
//! Classification:
//!
//! 1. intern every concept to a dense `u32` id (sorted order, so ids are
//!    deterministic for a given axiom set),
//! 2. build the told subsumption graph (`sub -> sup`, equivalences as edges
//!    in both directions),
//! 3. collapse strongly connected components into equivalence classes,
//! 4. close the condensed DAG into per-class ancestor/descendant bitmaps,
//! 5. reject the taxonomy if two classes told disjoint share a subclass.

use crate::axioms::{ProfileSlots, TaxonomyAxioms};
use crate::{
    ClassifiedTaxonomy, OracleError, ProfileVocabulary, SubsumptionOracle, TaxonomyDraft,
    TaxonomySnapshot, TaxonomySource,
};
use ahash::AHashMap;
use roaring::RoaringBitmap;
use semreg_profile::{Concept, FunctionalProfile};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub const CLOSURE_REASONER_NAME: &str = "closure";

// ============================================================================
// Oracle
// ============================================================================

/// Oracle backed by the structural closure reasoner.
#[derive(Debug, Default, Clone)]
pub struct ClosureReasoner;

impl ClosureReasoner {
    pub fn new() -> Self {
        Self
    }
}

impl SubsumptionOracle for ClosureReasoner {
    fn name(&self) -> &'static str {
        CLOSURE_REASONER_NAME
    }

    fn load_taxonomy(
        &self,
        source: &TaxonomySource,
        vocabulary: &ProfileVocabulary,
    ) -> Result<Box<dyn TaxonomyDraft>, OracleError> {
        let axioms = source.read_axioms(vocabulary)?;
        tracing::debug!(
            source = %source.describe(),
            concepts = axioms.concepts.len(),
            "taxonomy loaded into closure draft"
        );
        Ok(Box::new(ClosureDraft { axioms }))
    }
}

// ============================================================================
// Draft
// ============================================================================

/// Mutable axiom set awaiting classification.
#[derive(Debug, Default, Clone)]
pub struct ClosureDraft {
    axioms: TaxonomyAxioms,
}

impl ClosureDraft {
    pub fn from_axioms(axioms: TaxonomyAxioms) -> Self {
        Self { axioms }
    }

    pub fn axioms(&self) -> &TaxonomyAxioms {
        &self.axioms
    }
}

impl TaxonomyDraft for ClosureDraft {
    fn define_concept(&mut self, concept: &Concept) {
        self.axioms.add_concept(concept);
    }

    fn define_subclass_of(&mut self, sub: &Concept, sup: &Concept) {
        self.axioms.add_subclass_of(sub, sup);
    }

    fn define_equivalent_classes(&mut self, classes: &[Concept]) {
        self.axioms.add_equivalent_classes(classes);
    }

    fn define_disjoint_classes(&mut self, classes: &[Concept]) {
        self.axioms.add_disjoint_classes(classes);
    }

    fn define_profile(&mut self, profile: &FunctionalProfile, root: &Concept) {
        self.axioms.define_profile(profile, root);
    }

    fn classify(self: Box<Self>) -> Result<TaxonomySnapshot, OracleError> {
        let fingerprint = self.axioms.fingerprint();
        let taxonomy = ClosureTaxonomy::classify(self.axioms)?;
        tracing::debug!(
            fingerprint = %fingerprint,
            concepts = taxonomy.concepts.len(),
            classes = taxonomy.members.len(),
            "closure classification finished"
        );
        Ok(TaxonomySnapshot::new(
            Box::new(taxonomy),
            fingerprint,
            CLOSURE_REASONER_NAME,
        ))
    }
}

// ============================================================================
// Classified taxonomy
// ============================================================================

/// A classified taxonomy: equivalence classes plus closed subsumption.
#[derive(Debug)]
pub struct ClosureTaxonomy {
    /// Concept id -> concept (sorted by URI).
    concepts: Vec<Concept>,
    /// Concept -> concept id.
    ids: AHashMap<Concept, u32>,
    /// Concept id -> equivalence class id.
    class_of: Vec<u32>,
    /// Class id -> member concept ids.
    members: Vec<Vec<u32>>,
    /// Class id -> strict ancestor class ids.
    ancestors: Vec<RoaringBitmap>,
    /// Class id -> strict descendant class ids.
    descendants: Vec<RoaringBitmap>,
    profiles: BTreeMap<Concept, ProfileSlots>,
}

impl ClosureTaxonomy {
    pub fn classify(axioms: TaxonomyAxioms) -> Result<Self, OracleError> {
        let concepts: Vec<Concept> = axioms.concepts.iter().cloned().collect();
        let mut ids: AHashMap<Concept, u32> = AHashMap::with_capacity(concepts.len());
        for (i, c) in concepts.iter().enumerate() {
            ids.insert(c.clone(), i as u32);
        }
        // Axiom fields are public; a told edge may name an undeclared concept.
        let id_of = |c: &Concept| -> Result<u32, OracleError> {
            ids.get(c)
                .copied()
                .ok_or_else(|| OracleError::UnknownConcept(c.clone()))
        };

        let n = concepts.len();
        let mut supers: Vec<Vec<u32>> = vec![Vec::new(); n];
        for (sub, sup) in &axioms.subclass_of {
            supers[id_of(sub)? as usize].push(id_of(sup)?);
        }
        for group in &axioms.equivalent_classes {
            for pair in group.windows(2) {
                let (a, b) = (id_of(&pair[0])?, id_of(&pair[1])?);
                if a != b {
                    supers[a as usize].push(b);
                    supers[b as usize].push(a);
                }
            }
        }

        let class_of = strongly_connected_components(&supers);
        let class_count = class_of.iter().map(|c| *c as usize + 1).max().unwrap_or(0);

        let mut members: Vec<Vec<u32>> = vec![Vec::new(); class_count];
        for (concept_id, class_id) in class_of.iter().enumerate() {
            members[*class_id as usize].push(concept_id as u32);
        }

        // Condensed DAG (class -> direct super classes), deduplicated.
        let mut class_supers: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); class_count];
        for (sub, sups) in supers.iter().enumerate() {
            let sub_class = class_of[sub];
            for sup in sups {
                let sup_class = class_of[*sup as usize];
                if sup_class != sub_class {
                    class_supers[sub_class as usize].insert(sup_class);
                }
            }
        }

        let order = topological_order(&class_supers);
        let mut ancestors: Vec<RoaringBitmap> = vec![RoaringBitmap::new(); class_count];
        // Supers come after subs in `order`, so walk it backwards.
        for &class_id in order.iter().rev() {
            let mut acc = RoaringBitmap::new();
            for &sup in &class_supers[class_id as usize] {
                acc.insert(sup);
                acc |= &ancestors[sup as usize];
            }
            ancestors[class_id as usize] = acc;
        }

        let mut descendants: Vec<RoaringBitmap> = vec![RoaringBitmap::new(); class_count];
        for (class_id, ancs) in ancestors.iter().enumerate() {
            for anc in ancs.iter() {
                descendants[anc as usize].insert(class_id as u32);
            }
        }

        let taxonomy = Self {
            concepts,
            ids,
            class_of,
            members,
            ancestors,
            descendants,
            profiles: axioms.profiles,
        };
        taxonomy.check_disjointness(&axioms.disjoint_classes)?;
        Ok(taxonomy)
    }

    fn check_disjointness(&self, groups: &[Vec<Concept>]) -> Result<(), OracleError> {
        for group in groups {
            for (i, a) in group.iter().enumerate() {
                for b in group.iter().skip(i + 1) {
                    if a == b {
                        continue;
                    }
                    let ca = self.class_id(a)?;
                    let cb = self.class_id(b)?;
                    if ca == cb {
                        return Err(OracleError::Inconsistent {
                            reason: format!("{a} and {b} are told disjoint but equivalent"),
                            witnesses: vec![a.clone(), b.clone()],
                        });
                    }
                    let mut below_a = self.descendants[ca as usize].clone();
                    below_a.insert(ca);
                    let mut below_b = self.descendants[cb as usize].clone();
                    below_b.insert(cb);
                    let shared = below_a & below_b;
                    if let Some(class_id) = shared.min() {
                        let witness = self.concepts[self.members[class_id as usize][0] as usize].clone();
                        return Err(OracleError::Inconsistent {
                            reason: format!(
                                "{witness} is subsumed by disjoint classes {a} and {b}"
                            ),
                            witnesses: vec![witness, a.clone(), b.clone()],
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn class_id(&self, concept: &Concept) -> Result<u32, OracleError> {
        self.ids
            .get(concept)
            .map(|id| self.class_of[*id as usize])
            .ok_or_else(|| OracleError::UnknownConcept(concept.clone()))
    }

    fn groups(&self, classes: &RoaringBitmap) -> Vec<BTreeSet<Concept>> {
        classes
            .iter()
            .map(|class_id| {
                self.members[class_id as usize]
                    .iter()
                    .map(|id| self.concepts[*id as usize].clone())
                    .collect()
            })
            .collect()
    }
}

impl ClassifiedTaxonomy for ClosureTaxonomy {
    fn contains(&self, concept: &Concept) -> bool {
        self.ids.contains_key(concept)
    }

    fn ancestors_of(&self, concept: &Concept) -> Result<Vec<BTreeSet<Concept>>, OracleError> {
        let class_id = self.class_id(concept)?;
        Ok(self.groups(&self.ancestors[class_id as usize]))
    }

    fn descendants_of(&self, concept: &Concept) -> Result<Vec<BTreeSet<Concept>>, OracleError> {
        let class_id = self.class_id(concept)?;
        Ok(self.groups(&self.descendants[class_id as usize]))
    }

    fn equivalents_of(&self, concept: &Concept) -> Result<BTreeSet<Concept>, OracleError> {
        let class_id = self.class_id(concept)?;
        Ok(self.members[class_id as usize]
            .iter()
            .map(|id| &self.concepts[*id as usize])
            .filter(|c| *c != concept)
            .cloned()
            .collect())
    }

    fn profile_slots(&self, profile: &Concept) -> Option<ProfileSlots> {
        self.profiles.get(profile).cloned()
    }

    fn concept_count(&self) -> usize {
        self.concepts.len()
    }
}

// ============================================================================
// Graph helpers
// ============================================================================

/// Kosaraju SCC over `edges` (node -> successors). Returns node -> component id.
fn strongly_connected_components(edges: &[Vec<u32>]) -> Vec<u32> {
    let n = edges.len();

    // Pass 1: finish order on the forward graph.
    let mut visited = vec![false; n];
    let mut finished: Vec<u32> = Vec::with_capacity(n);
    for start in 0..n {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack: Vec<(u32, usize)> = vec![(start as u32, 0)];
        loop {
            let Some(top) = stack.last_mut() else { break };
            let node = top.0 as usize;
            if top.1 < edges[node].len() {
                let next = edges[node][top.1];
                top.1 += 1;
                if !visited[next as usize] {
                    visited[next as usize] = true;
                    stack.push((next, 0));
                }
            } else {
                finished.push(node as u32);
                stack.pop();
            }
        }
    }

    // Pass 2: flood the transposed graph in reverse finish order.
    let mut reverse: Vec<Vec<u32>> = vec![Vec::new(); n];
    for (from, succs) in edges.iter().enumerate() {
        for to in succs {
            reverse[*to as usize].push(from as u32);
        }
    }

    const UNASSIGNED: u32 = u32::MAX;
    let mut component = vec![UNASSIGNED; n];
    let mut next_component = 0u32;
    for &root in finished.iter().rev() {
        if component[root as usize] != UNASSIGNED {
            continue;
        }
        component[root as usize] = next_component;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for &pred in &reverse[node as usize] {
                if component[pred as usize] == UNASSIGNED {
                    component[pred as usize] = next_component;
                    stack.push(pred);
                }
            }
        }
        next_component += 1;
    }
    component
}

/// Kahn order of a DAG given as node -> direct successors: every node comes
/// before all of its successors.
fn topological_order(successors: &[BTreeSet<u32>]) -> Vec<u32> {
    let n = successors.len();
    let mut indegree = vec![0usize; n];
    for succs in successors {
        for s in succs {
            indegree[*s as usize] += 1;
        }
    }
    let mut queue: VecDeque<u32> = (0..n as u32).filter(|i| indegree[*i as usize] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &s in &successors[node as usize] {
            indegree[s as usize] -= 1;
            if indegree[s as usize] == 0 {
                queue.push_back(s);
            }
        }
    }
    debug_assert_eq!(order.len(), n, "condensed graph must be acyclic");
    order
}

// ============================================================================
// Tests
// ============================================================================
