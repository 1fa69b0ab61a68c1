//! Engine configuration.
//!
//! Loaded once at process start from a JSON file:
//!
//! ```json
//! {
//!   "taxonomy": { "kind": "file", "path": "taxonomy/animals.ttl" },
//!   "reasoner": "closure",
//!   "roots": { "request": "http://example.org/requests#Request" },
//!   "slot_policy": "primary",
//!   "parallel_matching": true,
//!   "max_write_retries": 5,
//!   "oracle_timeout_ms": 30000
//! }
//! ```

use crate::error::{EngineError, Result};
use semreg_oracle::{ProfileVocabulary, ReasonerKind, TaxonomySnapshot, TaxonomySource};
use semreg_profile::Concept;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_REQUEST_ROOT: &str = "http://semreg.dev/profile#Request";

/// How many input/output slots of a profile pair are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Only the first input and first output of each profile.
    #[default]
    Primary,
    /// Slot `i` against slot `i`; arities must agree.
    PerSlot,
}

/// Taxonomy roots the engine relies on.
///
/// `request` is where request profiles live. The optional dimension roots
/// are only checked for presence: a pass fails with `Configuration` when one
/// is set but missing from the snapshot. They do not restrict the concepts
/// a profile may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyRoots {
    pub request: Concept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Concept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Concept>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Concept>,
}

impl Default for TaxonomyRoots {
    fn default() -> Self {
        Self {
            request: Concept::new_unchecked(DEFAULT_REQUEST_ROOT),
            category: None,
            input: None,
            output: None,
        }
    }
}

impl TaxonomyRoots {
    pub fn all(&self) -> impl Iterator<Item = (&'static str, &Concept)> {
        std::iter::once(("request", &self.request))
            .chain(self.category.iter().map(|c| ("category", c)))
            .chain(self.input.iter().map(|c| ("input", c)))
            .chain(self.output.iter().map(|c| ("output", c)))
    }

    /// Fail fast if any configured root is missing from the snapshot.
    pub fn validate(&self, snapshot: &TaxonomySnapshot) -> Result<()> {
        for (name, root) in self.all() {
            if !snapshot.contains(root) {
                return Err(EngineError::Configuration(format!(
                    "{name} root {root} is not defined in the taxonomy"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub taxonomy: TaxonomySource,
    pub reasoner: ReasonerKind,
    pub roots: TaxonomyRoots,
    pub vocabulary: ProfileVocabulary,
    pub slot_policy: SlotPolicy,
    /// Compare candidates on the rayon pool.
    pub parallel_matching: bool,
    /// Re-reads after a version conflict before an index write gives up.
    pub max_write_retries: u32,
    /// Upper bound on taxonomy load + classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oracle_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            taxonomy: TaxonomySource::Empty,
            reasoner: ReasonerKind::Closure,
            roots: TaxonomyRoots::default(),
            vocabulary: ProfileVocabulary::default(),
            slot_policy: SlotPolicy::Primary,
            parallel_matching: true,
            max_write_retries: 5,
            oracle_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn with_taxonomy(taxonomy: TaxonomySource) -> Self {
        Self {
            taxonomy,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            EngineError::Configuration(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            EngineError::Configuration(format!("cannot write {}: {e}", path.display()))
        })
    }

    pub fn oracle_timeout(&self) -> Option<Duration> {
        self.oracle_timeout_ms.map(Duration::from_millis)
    }
}
