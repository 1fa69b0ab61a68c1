//! Semreg matching and indexing engine.
//!
//! Given a request profile and a population of advertisement profiles, decide
//! which advertisements satisfy the request by subsumption over a shared
//! taxonomy, and keep the answers in an index on the directory so discovery
//! is usually a lookup:
//!
//! ```text
//!   ┌─────────────┐   checklists   ┌─────────┐  IndexEntry  ┌───────────────┐
//!   │ Taxonomy    │ ─────────────► │ Matcher │ ───────────► │ Directory     │
//!   │ snapshot    │                └─────────┘              │ (INDEX annot.)│
//!   └─────────────┘                     ▲                   └───────────────┘
//!          ▲                            │                          │
//!          └────────── Coordinator ─────┴─────── IndexReader ◄─────┘
//! ```
//!
//! - [`checklist`]: anchor concept + direction → set of compatible concepts
//! - [`gate`]: message-exchange-pattern compatibility
//! - [`matcher`]: pairwise and population matching
//! - [`index`]: versioned index writes and namespace-gated lookups
//! - [`coordinator`]: publish / define / discover / reclassify passes

pub mod checklist;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod index;
pub mod matcher;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use checklist::{Checklist, ChecklistBuilder, Dimension, Direction, QueryMode};
pub use config::{EngineConfig, SlotPolicy, TaxonomyRoots};
pub use coordinator::{
    Coordinator, Discovery, DiscoveryPath, PassEvent, PassEventHandler, PassKind, PublishOutcome,
    PublishStatus, ReclassifyReport, RequestOutcome, TaxonomySummary,
};
pub use error::EngineError;
pub use gate::Gate;
pub use index::{IndexEntry, IndexLookup, IndexReader, IndexWriter, WriteOutcome};
pub use matcher::{Anchor, Matcher, PopulationMatch, SkippedCandidate};
