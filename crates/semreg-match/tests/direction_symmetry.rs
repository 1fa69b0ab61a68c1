//! Forward and reverse matching agree.
//!
//! For a request R and an advertisement A over the same snapshot,
//! `match(R forward, A) == match(A reverse, R)`, for every slot policy.

use proptest::prelude::*;
use semreg_match::{Matcher, QueryMode, SlotPolicy};
use semreg_oracle::closure::ClosureDraft;
use semreg_oracle::{TaxonomyAxioms, TaxonomyDraft, TaxonomySnapshot};
use semreg_profile::{Concept, FunctionalProfile};

const CONCEPTS: usize = 10;

fn concept(i: usize) -> Concept {
    Concept::parse(&format!("http://example.org/dag#C{i}")).unwrap()
}

/// Edges `sub -> sup` with `sub > sup`, so the told graph is acyclic.
fn dag_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
    proptest::collection::vec((1..CONCEPTS, 0..CONCEPTS), 0..20)
        .prop_map(|edges| edges.into_iter().map(|(a, b)| (a, b % a)).collect())
}

#[derive(Debug, Clone)]
struct Shape {
    category: usize,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    let slots = || proptest::collection::vec(0..CONCEPTS, 0..3);
    (0..CONCEPTS, slots(), slots())
        .prop_filter("needs an input or an output", |(_, i, o)| {
            !i.is_empty() || !o.is_empty()
        })
        .prop_map(|(category, inputs, outputs)| Shape {
            category,
            inputs,
            outputs,
        })
}

fn build(id: &str, shape: &Shape) -> FunctionalProfile {
    FunctionalProfile::new(
        Concept::parse(&format!("http://example.org/p#{id}")).unwrap(),
        concept(shape.category),
        shape.inputs.iter().map(|&i| concept(i)).collect(),
        shape.outputs.iter().map(|&i| concept(i)).collect(),
    )
    .unwrap()
}

fn snapshot(edges: &[(usize, usize)]) -> TaxonomySnapshot {
    let mut axioms = TaxonomyAxioms::default();
    for i in 0..CONCEPTS {
        axioms.add_concept(&concept(i));
    }
    for (sub, sup) in edges {
        axioms.add_subclass_of(&concept(*sub), &concept(*sup));
    }
    Box::new(ClosureDraft::from_axioms(axioms)).classify().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn forward_and_reverse_agree(
        edges in dag_strategy(),
        request in shape_strategy(),
        advertisement in shape_strategy(),
    ) {
        let snap = snapshot(&edges);
        let r = build("R", &request);
        let a = build("A", &advertisement);

        for policy in [SlotPolicy::Primary, SlotPolicy::PerSlot] {
            let matcher = Matcher::new(&snap, policy);
            let forward = matcher.anchor(r.clone(), QueryMode::Forward).unwrap();
            let reverse = matcher.anchor(a.clone(), QueryMode::Reverse).unwrap();
            prop_assert_eq!(
                matcher.matches(&forward, &a).unwrap(),
                matcher.matches(&reverse, &r).unwrap(),
                "policy {:?}", policy
            );
        }
    }

    #[test]
    fn every_profile_matches_itself_forward(
        edges in dag_strategy(),
        shape in shape_strategy(),
    ) {
        let snap = snapshot(&edges);
        let anchor_profile = build("R", &shape);
        let twin = build("Twin", &shape);
        let matcher = Matcher::new(&snap, SlotPolicy::PerSlot);
        let anchor = matcher.anchor(anchor_profile, QueryMode::Forward).unwrap();
        prop_assert!(matcher.matches(&anchor, &twin).unwrap());
    }
}
