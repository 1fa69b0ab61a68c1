//! Functional profiles and message-exchange patterns.

use crate::Concept;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("invalid concept URI `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },
    #[error("malformed profile `{id}`: {reason}")]
    Malformed { id: String, reason: MalformedReason },
}

/// Why a profile was rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedReason {
    /// Every profile needs exactly one category concept.
    MissingCategory,
    /// A profile with neither inputs nor outputs has no exchange pattern.
    NoInputsOrOutputs,
    /// More than one category concept was supplied.
    MultipleCategories,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingCategory => f.write_str("no category concept"),
            MalformedReason::NoInputsOrOutputs => f.write_str("zero inputs and zero outputs"),
            MalformedReason::MultipleCategories => f.write_str("more than one category concept"),
        }
    }
}

// ============================================================================
// Message exchange pattern
// ============================================================================

/// Message-exchange pattern of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mep {
    InOnly,
    OutOnly,
    InOut,
}

impl Mep {
    /// Derive the MEP from which profile slots are populated.
    pub fn infer(
        category_present: bool,
        inputs_present: bool,
        outputs_present: bool,
    ) -> Result<Mep, MalformedReason> {
        if !category_present {
            return Err(MalformedReason::MissingCategory);
        }
        match (inputs_present, outputs_present) {
            (true, false) => Ok(Mep::InOnly),
            (false, true) => Ok(Mep::OutOnly),
            (true, true) => Ok(Mep::InOut),
            (false, false) => Err(MalformedReason::NoInputsOrOutputs),
        }
    }

    pub fn has_inputs(self) -> bool {
        matches!(self, Mep::InOnly | Mep::InOut)
    }

    pub fn has_outputs(self) -> bool {
        matches!(self, Mep::OutOnly | Mep::InOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mep::InOnly => "IN_ONLY",
            Mep::OutOnly => "OUT_ONLY",
            Mep::InOut => "IN_OUT",
        }
    }
}

impl fmt::Display for Mep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Functional profile
// ============================================================================

/// An advertisement or a request, described by taxonomy concepts.
///
/// Inputs and outputs are ordered slots; the first slot of each is the
/// *primary* slot. Duplicate concepts within one slot list are dropped,
/// keeping the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProfileDocument", into = "ProfileDocument")]
pub struct FunctionalProfile {
    id: Concept,
    category: Concept,
    inputs: Vec<Concept>,
    outputs: Vec<Concept>,
    mep: Mep,
}

impl FunctionalProfile {
    pub fn new(
        id: Concept,
        category: Concept,
        inputs: Vec<Concept>,
        outputs: Vec<Concept>,
    ) -> Result<Self, ProfileError> {
        let inputs = dedup_slots(inputs);
        let outputs = dedup_slots(outputs);
        let mep = Mep::infer(true, !inputs.is_empty(), !outputs.is_empty()).map_err(|reason| {
            ProfileError::Malformed {
                id: id.to_string(),
                reason,
            }
        })?;
        Ok(Self {
            id,
            category,
            inputs,
            outputs,
            mep,
        })
    }

    /// Build a profile from raw URI strings.
    pub fn from_uris(
        id: &str,
        category: &str,
        inputs: &[&str],
        outputs: &[&str],
    ) -> Result<Self, ProfileError> {
        let parse_all = |uris: &[&str]| -> Result<Vec<Concept>, ProfileError> {
            uris.iter().map(|u| Concept::parse(u)).collect()
        };
        Self::new(
            Concept::parse(id)?,
            Concept::parse(category)?,
            parse_all(inputs)?,
            parse_all(outputs)?,
        )
    }

    pub fn id(&self) -> &Concept {
        &self.id
    }

    pub fn category(&self) -> &Concept {
        &self.category
    }

    pub fn inputs(&self) -> &[Concept] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Concept] {
        &self.outputs
    }

    pub fn mep(&self) -> Mep {
        self.mep
    }

    pub fn primary_input(&self) -> Option<&Concept> {
        self.inputs.first()
    }

    pub fn primary_output(&self) -> Option<&Concept> {
        self.outputs.first()
    }

    /// Every concept this profile references (category first, then inputs,
    /// then outputs).
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        std::iter::once(&self.category)
            .chain(self.inputs.iter())
            .chain(self.outputs.iter())
    }
}

impl fmt::Display for FunctionalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] category={} inputs={} outputs={}",
            self.id,
            self.mep,
            self.category.local_name(),
            self.inputs.len(),
            self.outputs.len()
        )
    }
}

fn dedup_slots(slots: Vec<Concept>) -> Vec<Concept> {
    let mut out: Vec<Concept> = Vec::with_capacity(slots.len());
    for c in slots {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Profile documents (extraction output)
// ============================================================================

/// The raw annotation URIs extracted from a service description.
///
/// This is the JSON shape profiles are exchanged in:
///
/// ```json
/// { "id": "http://ex.org/svc#Groomer",
///   "category": "http://ex.org/animals#Poodle",
///   "inputs": ["http://ex.org/measures#Weight"],
///   "outputs": [] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl ProfileDocument {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl TryFrom<ProfileDocument> for FunctionalProfile {
    type Error = ProfileError;

    fn try_from(doc: ProfileDocument) -> Result<Self, Self::Error> {
        let id = Concept::parse(&doc.id)?;
        let Some(category) = doc.category.as_deref().filter(|c| !c.trim().is_empty()) else {
            return Err(ProfileError::Malformed {
                id: id.to_string(),
                reason: MalformedReason::MissingCategory,
            });
        };
        let category = Concept::parse(category)?;
        let inputs = doc
            .inputs
            .iter()
            .map(|u| Concept::parse(u))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = doc
            .outputs
            .iter()
            .map(|u| Concept::parse(u))
            .collect::<Result<Vec<_>, _>>()?;
        FunctionalProfile::new(id, category, inputs, outputs)
    }
}

impl From<FunctionalProfile> for ProfileDocument {
    fn from(profile: FunctionalProfile) -> Self {
        Self {
            id: profile.id.into_string(),
            category: Some(profile.category.into_string()),
            inputs: profile.inputs.into_iter().map(Concept::into_string).collect(),
            outputs: profile.outputs.into_iter().map(Concept::into_string).collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
