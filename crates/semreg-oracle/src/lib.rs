//! Subsumption oracle for semreg.
//!
//! The matching engine never reasons over a taxonomy itself. It asks an
//! oracle two questions about a classified snapshot: "what is more general
//! than C" and "what is more specific than C".
//!
//! ```text
//!   TaxonomySource ──load_taxonomy──► TaxonomyDraft ──classify──► TaxonomySnapshot
//!   (file / inline)                   define_concept               ancestors_of
//!                                     define_subclass_of           descendants_of
//!                                     define_equivalent_classes    equivalents_of
//!                                     define_profile               profiles_under
//! ```
//!
//! A draft is mutable and single-owner; a snapshot is immutable and is the
//! only thing matching code sees. One snapshot belongs to one matching pass:
//! `TaxonomySnapshot` is deliberately not `Clone`, so two concurrent passes
//! each load and classify their own.
//!
//! The bundled reasoner ([`closure::ClosureReasoner`]) is structural: it
//! closes told `subClassOf`/`equivalentClass` axioms and checks told
//! `disjointWith` axioms. It is not a description-logic reasoner.

pub mod axioms;
pub mod closure;
pub mod rdf;
pub mod vocabulary;

use semreg_profile::{Concept, FunctionalProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

pub use axioms::{ProfileSlots, TaxonomyAxioms};
pub use closure::ClosureReasoner;
pub use vocabulary::ProfileVocabulary;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("concept not defined in taxonomy: {0}")]
    UnknownConcept(Concept),
    #[error("taxonomy is inconsistent: {reason}")]
    Inconsistent {
        reason: String,
        witnesses: Vec<Concept>,
    },
    #[error("failed to parse taxonomy {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
    #[error("unsupported taxonomy format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Taxonomy sources
// ============================================================================

/// RDF serializations a taxonomy can be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RdfFormat {
    NTriples,
    Turtle,
    RdfXml,
}

impl RdfFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "nt" | "ntriples" => Some(RdfFormat::NTriples),
            "ttl" | "turtle" => Some(RdfFormat::Turtle),
            "rdf" | "owl" | "xml" => Some(RdfFormat::RdfXml),
            _ => None,
        }
    }
}

/// Where a pass loads its taxonomy from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaxonomySource {
    /// No told axioms; only concepts defined on the draft exist.
    Empty,
    File {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<RdfFormat>,
    },
    Inline {
        text: String,
        format: RdfFormat,
    },
}

impl Default for TaxonomySource {
    fn default() -> Self {
        TaxonomySource::Empty
    }
}

impl TaxonomySource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        TaxonomySource::File {
            path: path.into(),
            format: None,
        }
    }

    pub fn turtle(text: impl Into<String>) -> Self {
        TaxonomySource::Inline {
            text: text.into(),
            format: RdfFormat::Turtle,
        }
    }

    pub fn ntriples(text: impl Into<String>) -> Self {
        TaxonomySource::Inline {
            text: text.into(),
            format: RdfFormat::NTriples,
        }
    }

    /// Human-readable name for logs and parse errors.
    pub fn describe(&self) -> String {
        match self {
            TaxonomySource::Empty => "<empty>".to_string(),
            TaxonomySource::File { path, .. } => path.display().to_string(),
            TaxonomySource::Inline { format, .. } => format!("<inline {format:?}>"),
        }
    }

    /// Parse the source into told axioms.
    pub fn read_axioms(&self, vocabulary: &ProfileVocabulary) -> Result<TaxonomyAxioms, OracleError> {
        match self {
            TaxonomySource::Empty => Ok(TaxonomyAxioms::default()),
            TaxonomySource::File { path, format } => {
                let format = match format {
                    Some(f) => *f,
                    None => {
                        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
                        RdfFormat::from_extension(ext)
                            .ok_or_else(|| OracleError::UnsupportedFormat(format!(".{ext}")))?
                    }
                };
                let bytes = std::fs::read(path)?;
                rdf::axioms_from_rdf(&bytes, format, vocabulary, &self.describe())
            }
            TaxonomySource::Inline { text, format } => {
                rdf::axioms_from_rdf(text.as_bytes(), *format, vocabulary, &self.describe())
            }
        }
    }
}

// ============================================================================
// Oracle seam
// ============================================================================

/// A reasoner that can load and classify taxonomies.
///
/// Implementations are chosen once at process start (see [`ReasonerKind`])
/// and shared behind an `Arc`; every call to `load_taxonomy` yields a fresh,
/// independent draft.
pub trait SubsumptionOracle: Send + Sync {
    fn name(&self) -> &'static str;

    /// Load told axioms from `source` into a fresh draft. Blocking.
    fn load_taxonomy(
        &self,
        source: &TaxonomySource,
        vocabulary: &ProfileVocabulary,
    ) -> Result<Box<dyn TaxonomyDraft>, OracleError>;
}

/// A mutable, unclassified taxonomy.
pub trait TaxonomyDraft: Send {
    fn define_concept(&mut self, concept: &Concept);

    fn define_subclass_of(&mut self, sub: &Concept, sup: &Concept);

    fn define_equivalent_classes(&mut self, classes: &[Concept]);

    fn define_disjoint_classes(&mut self, classes: &[Concept]);

    /// Define a profile as a concept under `root`, recording its slots.
    fn define_profile(&mut self, profile: &FunctionalProfile, root: &Concept);

    /// Classify the draft. Blocking, potentially slow.
    fn classify(self: Box<Self>) -> Result<TaxonomySnapshot, OracleError>;
}

/// The query surface of a classified taxonomy.
///
/// Ancestor/descendant answers are grouped into equivalence classes; the
/// queried concept's own class is never part of the answer (use
/// `equivalents_of` for it).
pub trait ClassifiedTaxonomy: Send + Sync {
    fn contains(&self, concept: &Concept) -> bool;

    fn ancestors_of(&self, concept: &Concept) -> Result<Vec<BTreeSet<Concept>>, OracleError>;

    fn descendants_of(&self, concept: &Concept) -> Result<Vec<BTreeSet<Concept>>, OracleError>;

    /// Concepts equivalent to `concept`, excluding itself.
    fn equivalents_of(&self, concept: &Concept) -> Result<BTreeSet<Concept>, OracleError>;

    /// Slots recorded for a profile concept, if any.
    fn profile_slots(&self, profile: &Concept) -> Option<ProfileSlots>;

    fn concept_count(&self) -> usize;
}

/// An immutable, classified taxonomy owned by exactly one matching pass.
pub struct TaxonomySnapshot {
    inner: Box<dyn ClassifiedTaxonomy>,
    fingerprint: String,
    reasoner: &'static str,
}

impl std::fmt::Debug for TaxonomySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxonomySnapshot")
            .field("fingerprint", &self.fingerprint)
            .field("reasoner", &self.reasoner)
            .field("concepts", &self.inner.concept_count())
            .finish()
    }
}

impl TaxonomySnapshot {
    pub fn new(
        inner: Box<dyn ClassifiedTaxonomy>,
        fingerprint: impl Into<String>,
        reasoner: &'static str,
    ) -> Self {
        Self {
            inner,
            fingerprint: fingerprint.into(),
            reasoner,
        }
    }

    /// Stable digest of the axioms this snapshot was classified from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn reasoner(&self) -> &'static str {
        self.reasoner
    }

    pub fn contains(&self, concept: &Concept) -> bool {
        self.inner.contains(concept)
    }

    pub fn concept_count(&self) -> usize {
        self.inner.concept_count()
    }

    pub fn ancestors_of(&self, concept: &Concept) -> Result<Vec<BTreeSet<Concept>>, OracleError> {
        self.inner.ancestors_of(concept)
    }

    pub fn descendants_of(
        &self,
        concept: &Concept,
    ) -> Result<Vec<BTreeSet<Concept>>, OracleError> {
        self.inner.descendants_of(concept)
    }

    pub fn equivalents_of(&self, concept: &Concept) -> Result<BTreeSet<Concept>, OracleError> {
        self.inner.equivalents_of(concept)
    }

    pub fn profile_slots(&self, profile: &Concept) -> Option<ProfileSlots> {
        self.inner.profile_slots(profile)
    }

    /// Every concept strictly below `root`, in deterministic order.
    ///
    /// These are the profile concepts (e.g. requests) a full pass enumerates.
    pub fn profiles_under(&self, root: &Concept) -> Result<Vec<Concept>, OracleError> {
        let mut out: BTreeSet<Concept> = BTreeSet::new();
        for group in self.descendants_of(root)? {
            out.extend(group);
        }
        Ok(out.into_iter().collect())
    }
}

// ============================================================================
// Reasoner selection
// ============================================================================

/// Which oracle implementation a process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonerKind {
    /// Structural closure over told subsumption axioms.
    #[default]
    Closure,
}

/// Instantiate the configured oracle.
pub fn oracle_for(kind: ReasonerKind) -> Arc<dyn SubsumptionOracle> {
    match kind {
        ReasonerKind::Closure => Arc::new(ClosureReasoner::new()),
    }
}

/// Flatten grouped oracle answers into one set.
pub fn flatten_groups(groups: Vec<BTreeSet<Concept>>) -> BTreeSet<Concept> {
    groups.into_iter().flatten().collect()
}
