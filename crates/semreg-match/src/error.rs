//! Engine error taxonomy.

use semreg_directory::DirectoryError;
use semreg_oracle::OracleError;
use semreg_profile::{Concept, ProfileError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A configured root or anchor concept does not resolve in the snapshot,
    /// or the configured taxonomy cannot be read.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Classification found the taxonomy incoherent. Pass-fatal.
    #[error("taxonomy is inconsistent: {reason}")]
    InconsistentTaxonomy {
        reason: String,
        witnesses: Vec<Concept>,
    },

    /// Oracle or directory unreachable, timed out, or write retries exhausted.
    #[error("communication failure: {0}")]
    Communication(String),

    #[error("malformed profile: {0}")]
    MalformedProfile(String),

    #[error("directory error: {0}")]
    Directory(#[source] DirectoryError),
}

impl EngineError {
    /// Failures confined to one directory record; a pass skips the record.
    pub fn is_record_local(&self) -> bool {
        matches!(self, EngineError::Directory(err) if err.is_record_local())
    }
}

impl From<ProfileError> for EngineError {
    fn from(err: ProfileError) -> Self {
        EngineError::MalformedProfile(err.to_string())
    }
}

impl From<OracleError> for EngineError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Inconsistent { reason, witnesses } => {
                EngineError::InconsistentTaxonomy { reason, witnesses }
            }
            OracleError::UnknownConcept(concept) => {
                EngineError::Configuration(format!("concept not in taxonomy: {concept}"))
            }
            OracleError::Parse { .. } | OracleError::UnsupportedFormat(_) => {
                EngineError::Configuration(err.to_string())
            }
            OracleError::Io(_) | OracleError::Unavailable(_) => {
                EngineError::Communication(err.to_string())
            }
        }
    }
}

impl From<DirectoryError> for EngineError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Unavailable(message) => EngineError::Communication(message),
            other => EngineError::Directory(other),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
