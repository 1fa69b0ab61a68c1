//! Told taxonomy axioms, as read from RDF or defined on a draft.

use semreg_profile::digest::Fnv1a64;
use semreg_profile::{Concept, FunctionalProfile, MalformedReason, ProfileError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Category/input/output fillers recorded for one profile concept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSlots {
    pub categories: Vec<Concept>,
    pub inputs: Vec<Concept>,
    pub outputs: Vec<Concept>,
}

impl ProfileSlots {
    pub fn from_profile(profile: &FunctionalProfile) -> Self {
        Self {
            categories: vec![profile.category().clone()],
            inputs: profile.inputs().to_vec(),
            outputs: profile.outputs().to_vec(),
        }
    }

    /// Rebuild the functional profile these slots describe.
    pub fn to_profile(&self, id: &Concept) -> Result<FunctionalProfile, ProfileError> {
        let categories: BTreeSet<&Concept> = self.categories.iter().collect();
        let category = match categories.len() {
            0 => {
                return Err(ProfileError::Malformed {
                    id: id.to_string(),
                    reason: MalformedReason::MissingCategory,
                })
            }
            1 => self.categories[0].clone(),
            _ => {
                return Err(ProfileError::Malformed {
                    id: id.to_string(),
                    reason: MalformedReason::MultipleCategories,
                })
            }
        };
        FunctionalProfile::new(
            id.clone(),
            category,
            self.inputs.clone(),
            self.outputs.clone(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// The told (unclassified) content of a taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyAxioms {
    pub concepts: BTreeSet<Concept>,
    pub subclass_of: BTreeSet<(Concept, Concept)>,
    pub equivalent_classes: Vec<Vec<Concept>>,
    pub disjoint_classes: Vec<Vec<Concept>>,
    pub profiles: BTreeMap<Concept, ProfileSlots>,
}

impl TaxonomyAxioms {
    pub fn add_concept(&mut self, concept: &Concept) {
        if !self.concepts.contains(concept) {
            self.concepts.insert(concept.clone());
        }
    }

    pub fn add_subclass_of(&mut self, sub: &Concept, sup: &Concept) {
        self.add_concept(sub);
        self.add_concept(sup);
        if sub != sup {
            self.subclass_of.insert((sub.clone(), sup.clone()));
        }
    }

    pub fn add_equivalent_classes(&mut self, classes: &[Concept]) {
        for c in classes {
            self.add_concept(c);
        }
        if classes.len() > 1 {
            self.equivalent_classes.push(classes.to_vec());
        }
    }

    pub fn add_disjoint_classes(&mut self, classes: &[Concept]) {
        for c in classes {
            self.add_concept(c);
        }
        if classes.len() > 1 {
            self.disjoint_classes.push(classes.to_vec());
        }
    }

    /// Slots of `profile`, creating the profile concept on first use.
    pub fn profile_slots_mut(&mut self, profile: &Concept) -> &mut ProfileSlots {
        self.add_concept(profile);
        self.profiles.entry(profile.clone()).or_default()
    }

    pub fn add_category(&mut self, profile: &Concept, category: &Concept) {
        self.add_concept(category);
        push_unique(&mut self.profile_slots_mut(profile).categories, category);
    }

    pub fn add_input(&mut self, profile: &Concept, input: &Concept) {
        self.add_concept(input);
        push_unique(&mut self.profile_slots_mut(profile).inputs, input);
    }

    pub fn add_output(&mut self, profile: &Concept, output: &Concept) {
        self.add_concept(output);
        push_unique(&mut self.profile_slots_mut(profile).outputs, output);
    }

    /// Define `profile` as a concept under `root`, replacing any previously
    /// recorded slots for the same id.
    pub fn define_profile(&mut self, profile: &FunctionalProfile, root: &Concept) {
        self.add_subclass_of(profile.id(), root);
        for c in profile.concepts() {
            self.add_concept(c);
        }
        self.profiles
            .insert(profile.id().clone(), ProfileSlots::from_profile(profile));
    }

    pub fn merge(&mut self, other: TaxonomyAxioms) {
        self.concepts.extend(other.concepts);
        self.subclass_of.extend(other.subclass_of);
        self.equivalent_classes.extend(other.equivalent_classes);
        self.disjoint_classes.extend(other.disjoint_classes);
        for (id, slots) in other.profiles {
            self.profiles.insert(id, slots);
        }
    }

    /// Order-independent digest of the axioms.
    pub fn fingerprint(&self) -> String {
        let mut h = Fnv1a64::new();
        for c in &self.concepts {
            h.field("c").field(c.as_str());
        }
        for (sub, sup) in &self.subclass_of {
            h.field("sub").field(sub.as_str()).field(sup.as_str());
        }
        for group in sorted_groups(&self.equivalent_classes) {
            h.field("eq");
            for c in group {
                h.field(c.as_str());
            }
        }
        for group in sorted_groups(&self.disjoint_classes) {
            h.field("dj");
            for c in group {
                h.field(c.as_str());
            }
        }
        for (id, slots) in &self.profiles {
            h.field("p").field(id.as_str());
            for c in &slots.categories {
                h.field("cat").field(c.as_str());
            }
            for c in &slots.inputs {
                h.field("in").field(c.as_str());
            }
            for c in &slots.outputs {
                h.field("out").field(c.as_str());
            }
        }
        h.finish_string()
    }
}

fn push_unique(slots: &mut Vec<Concept>, concept: &Concept) {
    if !slots.contains(concept) {
        slots.push(concept.clone());
    }
}

fn sorted_groups(groups: &[Vec<Concept>]) -> Vec<Vec<&Concept>> {
    let mut out: Vec<Vec<&Concept>> = groups
        .iter()
        .map(|g| {
            let set: BTreeSet<&Concept> = g.iter().collect();
            set.into_iter().collect()
        })
        .collect();
    out.sort();
    out.dedup();
    out
}
