//! Shared fixtures for unit tests.

use semreg_oracle::closure::ClosureTaxonomy;
use semreg_oracle::{
    ClassifiedTaxonomy, OracleError, ProfileSlots, ProfileVocabulary, TaxonomySnapshot,
    TaxonomySource,
};
use semreg_profile::{Concept, FunctionalProfile};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const ANIMALS_TTL: &str = r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl:  <http://www.w3.org/2002/07/owl#> .
@prefix zoo:  <http://example.org/animals#> .
@prefix m:    <http://example.org/measures#> .

zoo:Animal a owl:Class .
zoo:Dog rdfs:subClassOf zoo:Animal .
zoo:Poodle rdfs:subClassOf zoo:Dog .
zoo:Cat rdfs:subClassOf zoo:Animal .
zoo:Hound owl:equivalentClass zoo:Dog .

m:Measure a owl:Class .
m:Weight rdfs:subClassOf m:Measure .
m:BodyWeight rdfs:subClassOf m:Weight .
m:Height rdfs:subClassOf m:Measure .
m:Price rdfs:subClassOf m:Measure .
"#;

pub fn concept(local: &str) -> Concept {
    Concept::parse(&format!("http://example.org/{local}")).unwrap()
}

pub fn profile(id: &str, category: &str, inputs: &[&str], outputs: &[&str]) -> FunctionalProfile {
    FunctionalProfile::new(
        concept(id),
        concept(category),
        inputs.iter().map(|c| concept(c)).collect(),
        outputs.iter().map(|c| concept(c)).collect(),
    )
    .unwrap()
}

fn animals_taxonomy() -> ClosureTaxonomy {
    let axioms = TaxonomySource::turtle(ANIMALS_TTL)
        .read_axioms(&ProfileVocabulary::default())
        .unwrap();
    ClosureTaxonomy::classify(axioms).unwrap()
}

pub fn animals() -> TaxonomySnapshot {
    TaxonomySnapshot::new(Box::new(animals_taxonomy()), "animals", "closure")
}

/// Closure taxonomy that counts relational queries.
struct Counting {
    inner: ClosureTaxonomy,
    calls: Arc<AtomicUsize>,
}

impl ClassifiedTaxonomy for Counting {
    fn contains(&self, concept: &Concept) -> bool {
        self.inner.contains(concept)
    }

    fn ancestors_of(&self, concept: &Concept) -> Result<Vec<BTreeSet<Concept>>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ancestors_of(concept)
    }

    fn descendants_of(&self, concept: &Concept) -> Result<Vec<BTreeSet<Concept>>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.descendants_of(concept)
    }

    fn equivalents_of(&self, concept: &Concept) -> Result<BTreeSet<Concept>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.equivalents_of(concept)
    }

    fn profile_slots(&self, profile: &Concept) -> Option<ProfileSlots> {
        self.inner.profile_slots(profile)
    }

    fn concept_count(&self) -> usize {
        self.inner.concept_count()
    }
}

pub fn counting() -> (TaxonomySnapshot, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let taxonomy = Counting {
        inner: animals_taxonomy(),
        calls: Arc::clone(&calls),
    };
    (
        TaxonomySnapshot::new(Box::new(taxonomy), "animals-counting", "closure"),
        calls,
    )
}
