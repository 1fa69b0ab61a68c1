//! Compatibility checklists.
//!
//! A checklist is the set of concepts that pass one compatibility test
//! against an anchor concept: the anchor itself, its equivalents, and either
//! everything below it or everything above it.
//!
//! Which way to look depends on the dimension and on which side of the
//! comparison the anchor is:
//!
//! ```text
//!                     Forward (anchor = request)   Reverse (anchor = advertisement)
//!   category          Descendants                  Ancestors
//!   input             Ancestors                    Descendants
//!   output            Descendants                  Ancestors
//! ```
//!
//! Reverse is always the inverse of Forward, so `match(R, A)` in forward mode
//! and `match(A, R)` in reverse mode agree.

use crate::error::{EngineError, Result};
use semreg_oracle::TaxonomySnapshot;
use semreg_profile::Concept;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ancestors,
    Descendants,
}

impl Direction {
    pub fn inverse(self) -> Self {
        match self {
            Direction::Ancestors => Direction::Descendants,
            Direction::Descendants => Direction::Ancestors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Input,
    Output,
}

/// Which side of a comparison the anchor profile sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Anchor is a request; candidates are advertisements.
    Forward,
    /// Anchor is an advertisement; candidates are requests.
    Reverse,
}

impl QueryMode {
    pub fn direction(self, dimension: Dimension) -> Direction {
        let forward = match dimension {
            Dimension::Category => Direction::Descendants,
            Dimension::Input => Direction::Ancestors,
            Dimension::Output => Direction::Descendants,
        };
        match self {
            QueryMode::Forward => forward,
            QueryMode::Reverse => forward.inverse(),
        }
    }
}

/// Concepts satisfying one compatibility test against `anchor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checklist {
    anchor: Concept,
    direction: Direction,
    members: BTreeSet<Concept>,
}

impl Checklist {
    pub fn anchor(&self) -> &Concept {
        &self.anchor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn contains(&self, concept: &Concept) -> bool {
        self.members.contains(concept)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.members.iter()
    }
}

/// Builds checklists from one classified snapshot.
#[derive(Clone, Copy)]
pub struct ChecklistBuilder<'s> {
    snapshot: &'s TaxonomySnapshot,
}

impl<'s> ChecklistBuilder<'s> {
    pub fn new(snapshot: &'s TaxonomySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn build(&self, anchor: &Concept, direction: Direction) -> Result<Checklist> {
        if !self.snapshot.contains(anchor) {
            return Err(EngineError::Configuration(format!(
                "checklist anchor {anchor} is not defined in the taxonomy"
            )));
        }

        let relatives = match direction {
            Direction::Ancestors => self.snapshot.ancestors_of(anchor)?,
            Direction::Descendants => self.snapshot.descendants_of(anchor)?,
        };

        let mut members: BTreeSet<Concept> = relatives.into_iter().flatten().collect();
        members.extend(self.snapshot.equivalents_of(anchor)?);
        members.insert(anchor.clone());

        Ok(Checklist {
            anchor: anchor.clone(),
            direction,
            members,
        })
    }

    pub fn build_for(
        &self,
        anchor: &Concept,
        dimension: Dimension,
        mode: QueryMode,
    ) -> Result<Checklist> {
        self.build(anchor, mode.direction(dimension))
    }

    pub fn build_category_checklist(&self, anchor: &Concept, mode: QueryMode) -> Result<Checklist> {
        self.build_for(anchor, Dimension::Category, mode)
    }

    pub fn build_input_checklist(&self, anchor: &Concept, mode: QueryMode) -> Result<Checklist> {
        self.build_for(anchor, Dimension::Input, mode)
    }

    pub fn build_output_checklist(&self, anchor: &Concept, mode: QueryMode) -> Result<Checklist> {
        self.build_for(anchor, Dimension::Output, mode)
    }
}
