//! Taxonomy concept identifiers.

use crate::ProfileError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An absolute URI naming a node in a taxonomy.
///
/// Concepts are compared syntactically: two concepts are the same node iff
/// their URI strings are equal. The string is kept exactly as given (after
/// trimming surrounding whitespace) so that index entries written from one
/// pass can be looked up by a later one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Concept(String);

impl Concept {
    /// Parse and validate a concept URI.
    pub fn parse(uri: &str) -> Result<Self, ProfileError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(ProfileError::InvalidUri {
                uri: String::new(),
                reason: "empty URI".to_string(),
            });
        }
        if uri.chars().any(char::is_whitespace) {
            return Err(ProfileError::InvalidUri {
                uri: uri.to_string(),
                reason: "URI contains whitespace".to_string(),
            });
        }
        url::Url::parse(uri).map_err(|err| ProfileError::InvalidUri {
            uri: uri.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self(uri.to_string()))
    }

    /// Wrap a string the caller already knows to be an absolute URI
    /// (e.g. an IRI handed back by an RDF parser).
    pub fn new_unchecked(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The namespace this concept is defined in: everything up to and
    /// including the last `#`, else the last `/`, else the last `:`.
    pub fn namespace(&self) -> &str {
        let s = self.0.as_str();
        let cut = s
            .rfind('#')
            .or_else(|| s.rfind('/'))
            .or_else(|| s.rfind(':'));
        match cut {
            Some(pos) => &s[..=pos],
            None => s,
        }
    }

    /// The part of the URI after [`Concept::namespace`].
    pub fn local_name(&self) -> &str {
        &self.0[self.namespace().len()..]
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Concept {
    type Error = ProfileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Concept> for String {
    fn from(value: Concept) -> Self {
        value.0
    }
}

impl std::str::FromStr for Concept {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Concept {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
