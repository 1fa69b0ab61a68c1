//! RDF taxonomy loading (N-Triples, Turtle, RDF/XML) via Sophia.
//!
//! Only the subsumption-relevant fragment is kept:
//!
//! - `rdf:type owl:Class` / `rdf:type rdfs:Class` → concept declaration
//! - `rdfs:subClassOf` between IRIs → subclass axiom
//! - `owl:equivalentClass` between IRIs → equivalence axiom
//! - `owl:disjointWith` between IRIs → disjointness axiom
//! - profile vocabulary (`hasCategory`/`hasInput`/`hasOutput`) → profile slots
//!
//! Anything involving blank nodes (restrictions, RDF lists) or literals is
//! skipped and counted; the structural reasoner has no use for it.

use crate::axioms::TaxonomyAxioms;
use crate::vocabulary::{
    ProfileVocabulary, OWL_CLASS_IRI, OWL_DISJOINT_WITH_IRI, OWL_EQUIVALENT_CLASS_IRI,
    OWL_THING_IRI, RDFS_CLASS_IRI, RDFS_SUBCLASS_OF_IRI, RDF_TYPE_IRI,
};
use crate::{OracleError, RdfFormat};
use semreg_profile::Concept;
use sophia::api::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RdfTerm {
    Iri(String),
    BlankNode,
    Literal,
}

#[derive(Debug, Clone)]
struct RdfStatement {
    subject: RdfTerm,
    predicate: RdfTerm,
    object: RdfTerm,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct RdfSinkError {
    message: String,
}

fn parse_term_display(term: &str) -> RdfTerm {
    let s = term.trim();
    if let Some(iri) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return RdfTerm::Iri(iri.to_string());
    }
    if s.starts_with("_:") {
        return RdfTerm::BlankNode;
    }
    RdfTerm::Literal
}

fn statement_from_display(s: &str, p: &str, o: &str) -> RdfStatement {
    RdfStatement {
        subject: parse_term_display(s),
        predicate: parse_term_display(p),
        object: parse_term_display(o),
    }
}

fn parse_statements(
    bytes: &[u8],
    format: RdfFormat,
    source_name: &str,
) -> Result<Vec<RdfStatement>, OracleError> {
    let reader = std::io::BufReader::new(std::io::Cursor::new(bytes));
    let mut out: Vec<RdfStatement> = Vec::new();

    let parse_error = |e: &dyn std::fmt::Display| OracleError::Parse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    };

    match format {
        RdfFormat::NTriples => {
            let mut parser = sophia::turtle::parser::nt::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| -> Result<(), RdfSinkError> {
                    out.push(statement_from_display(
                        &t.s().to_string(),
                        &t.p().to_string(),
                        &t.o().to_string(),
                    ));
                    Ok(())
                })
                .map_err(|e| parse_error(&e))?;
        }
        RdfFormat::Turtle => {
            let mut parser = sophia::turtle::parser::turtle::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| -> Result<(), RdfSinkError> {
                    out.push(statement_from_display(
                        &t.s().to_string(),
                        &t.p().to_string(),
                        &t.o().to_string(),
                    ));
                    Ok(())
                })
                .map_err(|e| parse_error(&e))?;
        }
        RdfFormat::RdfXml => {
            let mut parser = sophia::xml::parser::parse_bufread(reader);
            parser
                .try_for_each_triple(|t| -> Result<(), RdfSinkError> {
                    out.push(statement_from_display(
                        &t.s().to_string(),
                        &t.p().to_string(),
                        &t.o().to_string(),
                    ));
                    Ok(())
                })
                .map_err(|e| parse_error(&e))?;
        }
    }

    Ok(out)
}

fn concept_of(iri: &str, source_name: &str) -> Result<Concept, OracleError> {
    Concept::parse(iri).map_err(|e| OracleError::Parse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

/// Parse an RDF document into told taxonomy axioms.
pub fn axioms_from_rdf(
    bytes: &[u8],
    format: RdfFormat,
    vocabulary: &ProfileVocabulary,
    source_name: &str,
) -> Result<TaxonomyAxioms, OracleError> {
    let statements = parse_statements(bytes, format, source_name)?;
    let mut axioms = TaxonomyAxioms::default();
    let mut skipped = 0usize;

    for stmt in &statements {
        let (RdfTerm::Iri(s), RdfTerm::Iri(p), RdfTerm::Iri(o)) =
            (&stmt.subject, &stmt.predicate, &stmt.object)
        else {
            skipped += 1;
            continue;
        };

        match p.as_str() {
            RDF_TYPE_IRI if o == OWL_CLASS_IRI || o == RDFS_CLASS_IRI => {
                axioms.add_concept(&concept_of(s, source_name)?);
            }
            RDFS_SUBCLASS_OF_IRI => {
                let sub = concept_of(s, source_name)?;
                if o == OWL_THING_IRI {
                    axioms.add_concept(&sub);
                } else {
                    axioms.add_subclass_of(&sub, &concept_of(o, source_name)?);
                }
            }
            OWL_EQUIVALENT_CLASS_IRI => {
                axioms.add_equivalent_classes(&[
                    concept_of(s, source_name)?,
                    concept_of(o, source_name)?,
                ]);
            }
            OWL_DISJOINT_WITH_IRI => {
                axioms.add_disjoint_classes(&[
                    concept_of(s, source_name)?,
                    concept_of(o, source_name)?,
                ]);
            }
            _ if *p == vocabulary.has_category => {
                axioms.add_category(&concept_of(s, source_name)?, &concept_of(o, source_name)?);
            }
            _ if *p == vocabulary.has_input => {
                axioms.add_input(&concept_of(s, source_name)?, &concept_of(o, source_name)?);
            }
            _ if *p == vocabulary.has_output => {
                axioms.add_output(&concept_of(s, source_name)?, &concept_of(o, source_name)?);
            }
            _ => skipped += 1,
        }
    }

    tracing::debug!(
        source = %source_name,
        statements = statements.len(),
        skipped,
        concepts = axioms.concepts.len(),
        subclass_axioms = axioms.subclass_of.len(),
        profiles = axioms.profiles.len(),
        "loaded taxonomy axioms"
    );

    Ok(axioms)
}
