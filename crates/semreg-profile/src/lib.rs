//! Semreg functional profile model.
//!
//! This crate defines the data every other semreg crate speaks:
//!
//! - [`Concept`]: an absolute URI naming a node in a shared taxonomy,
//! - [`Mep`]: the message-exchange pattern of a profile, derived from which
//!   slots are populated,
//! - [`FunctionalProfile`]: an advertisement or a request (category, inputs,
//!   outputs),
//! - [`ProfileDocument`]: the raw, already-extracted annotation URIs of a
//!   service description, as read from JSON.
//!
//! Profiles are validated at construction. A profile that reaches the matcher
//! always has a category and at least one input or output.

pub mod concept;
pub mod digest;
pub mod profile;

pub use concept::Concept;
pub use profile::{FunctionalProfile, MalformedReason, Mep, ProfileDocument, ProfileError};
