//! Directory records and their annotations.

use semreg_profile::{Concept, FunctionalProfile, ProfileError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque directory record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Concept> for RecordId {
    fn from(value: &Concept) -> Self {
        Self(value.as_str().to_string())
    }
}

/// Which taxonomy the value of an annotation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyKind {
    Category,
    Input,
    Output,
    /// An index entry: the value is a request profile URI this record satisfies.
    Index,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyKind::Category => "CATEGORY",
            KeyKind::Input => "INPUT",
            KeyKind::Output => "OUTPUT",
            KeyKind::Index => "INDEX",
        };
        f.write_str(s)
    }
}

/// One `(key kind, value)` pair on a record.
///
/// `INPUT`/`OUTPUT` values carry their slot position (`"<slot>|<uri>"`) so a
/// profile can be rebuilt in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: KeyKind,
    pub value: String,
}

impl Annotation {
    pub fn new(kind: KeyKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn category(concept: &Concept) -> Self {
        Self::new(KeyKind::Category, concept.as_str())
    }

    pub fn input(slot: usize, concept: &Concept) -> Self {
        Self::new(KeyKind::Input, format!("{slot}|{concept}"))
    }

    pub fn output(slot: usize, concept: &Concept) -> Self {
        Self::new(KeyKind::Output, format!("{slot}|{concept}"))
    }

    pub fn index(request: &Concept) -> Self {
        Self::new(KeyKind::Index, request.as_str())
    }

    /// Split a slotted value into `(slot, uri)`.
    pub fn slot_value(&self) -> Option<(usize, &str)> {
        let (slot, uri) = self.value.split_once('|')?;
        Some((slot.parse().ok()?, uri))
    }
}

/// Where an advertisement is in its index lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexState {
    /// Stored, no matching pass has run for it.
    #[default]
    Unindexed,
    /// Matched against the requests known at publish time.
    PartiallyIndexed,
    /// Covered by a full reclassification.
    FullyIndexed,
}

/// A directory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub annotations: BTreeSet<Annotation>,
    #[serde(default)]
    pub index_state: IndexState,
    #[serde(default)]
    pub version: u64,
}

impl DirectoryRecord {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            name: None,
            annotations: BTreeSet::new(),
            index_state: IndexState::Unindexed,
            version: 0,
        }
    }

    /// The record an advertisement is published as: keyed by the profile id,
    /// carrying its category and slotted inputs/outputs.
    pub fn for_advertisement(profile: &FunctionalProfile) -> Self {
        let mut record = Self::new(RecordId::from(profile.id()));
        record.name = Some(profile.id().local_name().to_string());
        record.annotations.insert(Annotation::category(profile.category()));
        for (slot, input) in profile.inputs().iter().enumerate() {
            record.annotations.insert(Annotation::input(slot, input));
        }
        for (slot, output) in profile.outputs().iter().enumerate() {
            record.annotations.insert(Annotation::output(slot, output));
        }
        record
    }

    pub fn annotations_of(&self, kind: KeyKind) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.kind == kind)
    }

    /// Request URIs this record carries index entries for.
    pub fn index_entries(&self) -> impl Iterator<Item = &str> {
        self.annotations_of(KeyKind::Index).map(|a| a.value.as_str())
    }

    pub fn has_index_entry(&self, request: &Concept) -> bool {
        self.annotations.contains(&Annotation::index(request))
    }

    /// Rebuild the advertised profile from the record's annotations.
    pub fn advertisement_profile(&self) -> Result<FunctionalProfile, RecordProfileError> {
        let id = Concept::parse(self.id.as_str())?;

        let categories: Vec<&Annotation> = self.annotations_of(KeyKind::Category).collect();
        let category = match categories.as_slice() {
            [only] => Concept::parse(&only.value)?,
            [] => return Err(RecordProfileError::Category { found: 0 }),
            many => return Err(RecordProfileError::Category { found: many.len() }),
        };

        let inputs = self.slotted(KeyKind::Input)?;
        let outputs = self.slotted(KeyKind::Output)?;
        Ok(FunctionalProfile::new(id, category, inputs, outputs)?)
    }

    fn slotted(&self, kind: KeyKind) -> Result<Vec<Concept>, RecordProfileError> {
        let mut slots: Vec<(usize, Concept)> = Vec::new();
        for annotation in self.annotations_of(kind) {
            let (slot, uri) = annotation
                .slot_value()
                .ok_or_else(|| RecordProfileError::SlotEncoding(annotation.value.clone()))?;
            slots.push((slot, Concept::parse(uri)?));
        }
        slots.sort_by_key(|(slot, _)| *slot);
        Ok(slots.into_iter().map(|(_, c)| c).collect())
    }
}

/// Why a record could not be read back as a profile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordProfileError {
    #[error("expected exactly one CATEGORY annotation, found {found}")]
    Category { found: usize },
    #[error("slot annotation without `<slot>|<uri>` encoding: {0}")]
    SlotEncoding(String),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// The mutable part of a record, written under a version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub annotations: BTreeSet<Annotation>,
    pub index_state: IndexState,
}

impl RecordUpdate {
    pub fn from_record(record: &DirectoryRecord) -> Self {
        Self {
            annotations: record.annotations.clone(),
            index_state: record.index_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_record_round_trips_slot_order() {
        let profile = FunctionalProfile::from_uris(
            "http://example.org/svc#Groomer",
            "http://example.org/animals#Poodle",
            &[
                "http://example.org/measures#Weight",
                "http://example.org/measures#Age",
            ],
            &["http://example.org/measures#Price"],
        )
        .unwrap();
        let record = DirectoryRecord::for_advertisement(&profile);
        assert_eq!(record.name.as_deref(), Some("Groomer"));
        assert_eq!(record.annotations_of(KeyKind::Input).count(), 2);

        let rebuilt = record.advertisement_profile().unwrap();
        assert_eq!(rebuilt, profile);
    }

    #[test]
    fn record_without_category_is_unreadable() {
        let record = DirectoryRecord::new(RecordId::new("http://example.org/svc#X"));
        assert_eq!(
            record.advertisement_profile().unwrap_err(),
            RecordProfileError::Category { found: 0 }
        );
    }

    #[test]
    fn slot_values_parse() {
        let a = Annotation::new(KeyKind::Input, "3|http://example.org/m#W");
        assert_eq!(a.slot_value(), Some((3, "http://example.org/m#W")));
        assert_eq!(Annotation::new(KeyKind::Input, "garbage").slot_value(), None);
    }
}
