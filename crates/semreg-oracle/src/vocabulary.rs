//! RDF vocabulary the taxonomy loader understands.

use serde::{Deserialize, Serialize};

pub const RDF_TYPE_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_SUBCLASS_OF_IRI: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_CLASS_IRI: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
pub const OWL_CLASS_IRI: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_EQUIVALENT_CLASS_IRI: &str = "http://www.w3.org/2002/07/owl#equivalentClass";
pub const OWL_DISJOINT_WITH_IRI: &str = "http://www.w3.org/2002/07/owl#disjointWith";
pub const OWL_THING_IRI: &str = "http://www.w3.org/2002/07/owl#Thing";

/// Namespace of the default profile vocabulary.
pub const SEMREG_PROFILE_NS: &str = "http://semreg.dev/profile#";

/// Predicates linking a profile concept to its slot fillers.
///
/// ```text
/// <P> semreg:hasCategory <C> .
/// <P> semreg:hasInput    <I> .
/// <P> semreg:hasOutput   <O> .
/// ```
///
/// Slot order follows document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileVocabulary {
    pub has_category: String,
    pub has_input: String,
    pub has_output: String,
}

impl Default for ProfileVocabulary {
    fn default() -> Self {
        Self {
            has_category: format!("{SEMREG_PROFILE_NS}hasCategory"),
            has_input: format!("{SEMREG_PROFILE_NS}hasInput"),
            has_output: format!("{SEMREG_PROFILE_NS}hasOutput"),
        }
    }
}
