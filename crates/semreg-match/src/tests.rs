use super::*;
use crate::test_support::{concept, profile, ANIMALS_TTL};
use parking_lot::Mutex;
use semreg_directory::{
    Annotation, DirectoryError, DirectoryRecord, DirectoryService, IndexState, InMemoryDirectory,
    RecordId, RecordUpdate,
};
use semreg_oracle::{
    ClosureReasoner, OracleError, ProfileVocabulary, SubsumptionOracle, TaxonomyDraft,
    TaxonomySource,
};
use semreg_profile::Concept;
use std::sync::Arc;
use std::time::Duration;

const REQUESTS_TTL: &str = r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix sp:   <http://semreg.dev/profile#> .
@prefix zoo:  <http://example.org/animals#> .
@prefix m:    <http://example.org/measures#> .
@prefix req:  <http://example.org/req#> .

req:R1 rdfs:subClassOf sp:Request ; sp:hasCategory zoo:Dog ; sp:hasInput m:Weight .
req:R2 rdfs:subClassOf sp:Request ; sp:hasCategory zoo:Poodle ; sp:hasOutput m:Weight .
req:R3 rdfs:subClassOf sp:Request ; sp:hasCategory zoo:Animal ; sp:hasInput m:Height .
"#;

fn registry_config() -> EngineConfig {
    EngineConfig::with_taxonomy(TaxonomySource::turtle(format!("{ANIMALS_TTL}\n{REQUESTS_TTL}")))
}

fn coordinator(config: EngineConfig) -> (Coordinator, InMemoryDirectory) {
    let directory = InMemoryDirectory::new();
    let coordinator = Coordinator::new(config, Arc::new(directory.clone()));
    (coordinator, directory)
}

fn groomer() -> semreg_profile::FunctionalProfile {
    profile("svc#Groomer", "animals#Poodle", &["measures#Weight"], &[])
}

fn cat_sitter() -> semreg_profile::FunctionalProfile {
    profile("svc#CatSitter", "animals#Cat", &["measures#Weight"], &[])
}

fn ids(names: &[&str]) -> std::collections::BTreeSet<RecordId> {
    names.iter().map(|n| RecordId::from(&concept(n))).collect()
}

#[tokio::test]
async fn publishing_indexes_against_known_requests() {
    let (coordinator, directory) = coordinator(registry_config());
    let outcome = coordinator.on_advertisement_published(groomer()).await.unwrap();

    assert_eq!(
        outcome.status,
        PublishStatus::Indexed([concept("req#R1")].into_iter().collect())
    );
    let record = directory.get_record(&outcome.record).await.unwrap().unwrap();
    assert_eq!(record.index_state, IndexState::PartiallyIndexed);
    assert_eq!(
        record.index_entries().collect::<Vec<_>>(),
        vec!["http://example.org/req#R1"]
    );
}

#[tokio::test]
async fn publishing_without_a_match_still_publishes() {
    let (coordinator, directory) = coordinator(registry_config());
    let outcome = coordinator
        .on_advertisement_published(cat_sitter())
        .await
        .unwrap();
    assert_eq!(outcome.status, PublishStatus::NoImmediateMatch);
    let record = directory.get_record(&outcome.record).await.unwrap().unwrap();
    assert_eq!(record.index_state, IndexState::PartiallyIndexed);
    assert_eq!(record.index_entries().count(), 0);
}

#[tokio::test]
async fn malformed_advertisement_leaves_no_record() {
    let (coordinator, directory) = coordinator(registry_config());
    let err = coordinator
        .on_advertisement_published(profile(
            "svc#Ghost",
            "animals#Unicorn",
            &["measures#Weight"],
            &[],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MalformedProfile(_)));
    assert!(directory.is_empty());
}

#[tokio::test]
async fn defining_a_request_indexes_existing_advertisements() {
    let (coordinator, directory) = coordinator(registry_config());
    coordinator.on_advertisement_published(groomer()).await.unwrap();
    coordinator.on_advertisement_published(cat_sitter()).await.unwrap();

    let request = profile("live#AnyPet", "animals#Animal", &["measures#BodyWeight"], &[]);
    let outcome = coordinator.on_request_defined(request.clone()).await.unwrap();
    assert_eq!(outcome.matched, ids(&["svc#Groomer", "svc#CatSitter"]));
    assert_eq!(outcome.entries_added, 2);

    assert!(directory
        .indexed_namespaces()
        .await
        .unwrap()
        .contains("http://example.org/live#"));
    assert_eq!(
        coordinator.lookup_by_index(request.id()).await.unwrap(),
        IndexLookup::Hits(ids(&["svc#Groomer", "svc#CatSitter"]))
    );

    // Later publishes see the defined request too.
    let walker = profile("svc#Walker", "animals#Dog", &["measures#Weight"], &[]);
    let published = coordinator.on_advertisement_published(walker).await.unwrap();
    match published.status {
        PublishStatus::Indexed(requests) => {
            assert!(requests.contains(request.id()));
            assert!(requests.contains(&concept("req#R1")));
        }
        other => panic!("expected index entries, got {other:?}"),
    }
}

#[tokio::test]
async fn discovery_falls_back_to_live_matching_until_indexed() {
    let (coordinator, directory) = coordinator(registry_config());
    coordinator.on_advertisement_published(groomer()).await.unwrap();
    coordinator.on_advertisement_published(cat_sitter()).await.unwrap();

    let r1 = profile("req#R1", "animals#Dog", &["measures#Weight"], &[]);
    let live = coordinator.discover(r1.clone()).await.unwrap();
    assert_eq!(live.answered_by, DiscoveryPath::Live);
    assert_eq!(live.advertisements, ids(&["svc#Groomer"]));
    // Live answers are not cached.
    assert!(directory.indexed_namespaces().await.unwrap().is_empty());

    coordinator.reclassify_all().await.unwrap();
    let indexed = coordinator.discover(r1).await.unwrap();
    assert_eq!(indexed.answered_by, DiscoveryPath::Index);
    assert_eq!(indexed.advertisements, live.advertisements);
}

#[tokio::test]
async fn unindexed_request_in_an_indexed_namespace_is_matched_live() {
    let (coordinator, directory) = coordinator(registry_config());
    coordinator.on_advertisement_published(groomer()).await.unwrap();
    coordinator.reclassify_all().await.unwrap();
    assert!(directory
        .indexed_namespaces()
        .await
        .unwrap()
        .contains("http://example.org/req#"));

    let ad_hoc = profile("req#AdHoc", "animals#Dog", &["measures#Weight"], &[]);
    assert_eq!(
        coordinator.lookup_by_index(ad_hoc.id()).await.unwrap(),
        IndexLookup::NotIndexable
    );
    let discovery = coordinator.discover(ad_hoc.clone()).await.unwrap();
    assert_eq!(discovery.answered_by, DiscoveryPath::Live);
    assert_eq!(discovery.advertisements, ids(&["svc#Groomer"]));

    // The same profile in a fresh namespace gives the same answer.
    let elsewhere = profile("adhoc#AdHoc", "animals#Dog", &["measures#Weight"], &[]);
    let live = coordinator.discover(elsewhere).await.unwrap();
    assert_eq!(live.advertisements, discovery.advertisements);
}

#[tokio::test]
async fn removed_request_is_no_longer_answered_from_the_index() {
    let (coordinator, directory) = coordinator(registry_config());
    coordinator.on_advertisement_published(groomer()).await.unwrap();
    coordinator.reclassify_all().await.unwrap();
    assert!(directory
        .indexed_requests()
        .await
        .unwrap()
        .contains(&concept("req#R1")));

    coordinator.on_request_removed(&concept("req#R1")).await.unwrap();
    assert_eq!(
        coordinator.lookup_by_index(&concept("req#R1")).await.unwrap(),
        IndexLookup::NotIndexable
    );
    assert_eq!(
        coordinator.lookup_by_index(&concept("req#R3")).await.unwrap(),
        IndexLookup::Hits(Default::default())
    );
}

#[tokio::test]
async fn reclassification_is_idempotent() {
    let (coordinator, directory) = coordinator(registry_config());
    coordinator.on_advertisement_published(groomer()).await.unwrap();
    let walker = profile("svc#Walker", "animals#Dog", &["measures#Height"], &[]);
    coordinator.on_advertisement_published(walker).await.unwrap();

    let first = coordinator.reclassify_all().await.unwrap();
    assert_eq!(first.requests, 3);
    assert_eq!(first.advertisements, 2);
    // Both entries already exist from publish time.
    assert_eq!(first.entries_added, 0);

    let before: Vec<DirectoryRecord> = {
        let mut out = Vec::new();
        for id in directory.list_records().await.unwrap() {
            out.push(directory.get_record(&id).await.unwrap().unwrap());
        }
        out
    };
    assert!(before
        .iter()
        .all(|r| r.index_state == IndexState::FullyIndexed));

    let second = coordinator.reclassify_all().await.unwrap();
    assert_eq!(second.entries_added, 0);
    for record in before {
        let after = directory.get_record(&record.id).await.unwrap().unwrap();
        assert_eq!(after, record);
    }
}

#[tokio::test]
async fn reclassification_picks_up_requests_added_to_the_taxonomy() {
    let (coordinator, directory) = coordinator(EngineConfig::with_taxonomy(
        TaxonomySource::turtle(ANIMALS_TTL),
    ));
    let published = coordinator.on_advertisement_published(groomer()).await.unwrap();
    assert_eq!(published.status, PublishStatus::NoImmediateMatch);

    let extended = Coordinator::new(registry_config(), Arc::new(directory.clone()));
    let later = extended.reclassify_all().await.unwrap();
    assert_eq!(later.entries_added, 1);
    let record = directory.get_record(&published.record).await.unwrap().unwrap();
    assert!(record.has_index_entry(&concept("req#R1")));
    assert_eq!(record.index_state, IndexState::FullyIndexed);
}

#[tokio::test]
async fn removing_a_request_prunes_its_entries() {
    let (coordinator, directory) = coordinator(registry_config());
    let outcome = coordinator.on_advertisement_published(groomer()).await.unwrap();
    assert_eq!(coordinator.on_request_removed(&concept("req#R1")).await.unwrap(), 1);
    let record = directory.get_record(&outcome.record).await.unwrap().unwrap();
    assert_eq!(record.index_entries().count(), 0);
}

#[tokio::test]
async fn removing_an_advertisement_drops_it_from_lookups() {
    let (coordinator, _directory) = coordinator(registry_config());
    let outcome = coordinator.on_advertisement_published(groomer()).await.unwrap();
    coordinator.reclassify_all().await.unwrap();

    assert!(coordinator.on_advertisement_removed(&outcome.record).await.unwrap());
    assert_eq!(
        coordinator.lookup_by_index(&concept("req#R1")).await.unwrap(),
        IndexLookup::Hits(Default::default())
    );
}

#[tokio::test]
async fn unreadable_records_are_skipped_by_reclassification() {
    let (coordinator, directory) = coordinator(registry_config());
    coordinator.on_advertisement_published(groomer()).await.unwrap();
    let mut broken = DirectoryRecord::new(RecordId::new("http://example.org/svc#Broken"));
    broken.version = 1;
    directory.put_raw(broken);

    let report = coordinator.reclassify_all().await.unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].id, "http://example.org/svc#Broken");
    assert_eq!(report.advertisements, 1);

    let broken = directory
        .get_record(&RecordId::new("http://example.org/svc#Broken"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(broken.index_state, IndexState::Unindexed);
}

#[tokio::test]
async fn passes_emit_events_in_order() {
    let events: Arc<Mutex<Vec<PassEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    let (mut coordinator, _) = coordinator(registry_config());
    coordinator.on_event(Box::new(move |event| sink.lock().push(event)));

    coordinator.on_advertisement_published(groomer()).await.unwrap();

    let events = events.lock();
    assert!(matches!(
        events.first(),
        Some(PassEvent::PassStarted {
            kind: PassKind::Publish,
            ..
        })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, PassEvent::TaxonomyClassified { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, PassEvent::IndexEntriesWritten { added: 1, .. })));
    assert!(matches!(
        events.last(),
        Some(PassEvent::PassFinished {
            matched: 1,
            skipped: 0,
            entries_added: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn inconsistent_taxonomy_is_pass_fatal() {
    let ttl = format!(
        "{ANIMALS_TTL}\n{}",
        r#"
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl:  <http://www.w3.org/2002/07/owl#> .
@prefix zoo:  <http://example.org/animals#> .
zoo:Dog owl:disjointWith zoo:Cat .
zoo:Catdog rdfs:subClassOf zoo:Dog , zoo:Cat .
"#
    );
    let (coordinator, directory) =
        coordinator(EngineConfig::with_taxonomy(TaxonomySource::turtle(ttl)));
    let err = coordinator
        .on_advertisement_published(groomer())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InconsistentTaxonomy { .. }));
    assert!(directory.is_empty());
}

#[tokio::test]
async fn unresolvable_root_fails_fast() {
    let mut config = registry_config();
    config.roots.category = Some(concept("animals#Plant"));
    let (coordinator, _) = coordinator(config);
    let err = coordinator.reclassify_all().await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn dimension_roots_do_not_restrict_profiles() {
    let mut config = registry_config();
    config.roots.category = Some(concept("animals#Dog"));
    let (coordinator, directory) = coordinator(config);

    let outcome = coordinator.on_advertisement_published(cat_sitter()).await.unwrap();
    assert_eq!(outcome.status, PublishStatus::NoImmediateMatch);
    assert!(directory.get_record(&outcome.record).await.unwrap().is_some());
}

/// Oracle that takes longer than any sane timeout.
struct SlowOracle;

impl SubsumptionOracle for SlowOracle {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn load_taxonomy(
        &self,
        source: &TaxonomySource,
        vocabulary: &ProfileVocabulary,
    ) -> Result<Box<dyn TaxonomyDraft>, OracleError> {
        std::thread::sleep(Duration::from_millis(300));
        ClosureReasoner::new().load_taxonomy(source, vocabulary)
    }
}

#[tokio::test]
async fn oracle_timeout_surfaces_as_communication() {
    let mut config = registry_config();
    config.oracle_timeout_ms = Some(20);
    let coordinator = Coordinator::with_oracle(
        config,
        Arc::new(SlowOracle),
        Arc::new(InMemoryDirectory::new()),
    );
    let err = coordinator.reclassify_all().await.unwrap_err();
    assert!(matches!(err, EngineError::Communication(_)));
}

#[tokio::test]
async fn taxonomy_check_lists_requests() {
    let (coordinator, _) = coordinator(registry_config());
    let summary = coordinator.check_taxonomy().await.unwrap();
    assert_eq!(summary.reasoner, "closure");
    assert_eq!(
        summary.requests,
        vec![concept("req#R1"), concept("req#R2"), concept("req#R3")]
    );
    assert!(summary.malformed_requests.is_empty());
}

/// Directory that cannot read back one of its records.
struct CorruptedDirectory {
    inner: InMemoryDirectory,
    corrupted: RecordId,
}

#[async_trait::async_trait]
impl DirectoryService for CorruptedDirectory {
    async fn get_record(
        &self,
        id: &RecordId,
    ) -> std::result::Result<Option<DirectoryRecord>, DirectoryError> {
        if *id == self.corrupted {
            return Err(DirectoryError::Unreadable {
                id: id.clone(),
                reason: "checksum mismatch".to_string(),
            });
        }
        self.inner.get_record(id).await
    }

    async fn list_records(&self) -> std::result::Result<Vec<RecordId>, DirectoryError> {
        self.inner.list_records().await
    }

    async fn create_record(
        &self,
        record: DirectoryRecord,
    ) -> std::result::Result<DirectoryRecord, DirectoryError> {
        self.inner.create_record(record).await
    }

    async fn remove_record(&self, id: &RecordId) -> std::result::Result<bool, DirectoryError> {
        self.inner.remove_record(id).await
    }

    async fn update_record(
        &self,
        id: &RecordId,
        expected_version: u64,
        update: RecordUpdate,
    ) -> std::result::Result<u64, DirectoryError> {
        self.inner.update_record(id, expected_version, update).await
    }

    async fn find_by_annotation(
        &self,
        annotation: &Annotation,
    ) -> std::result::Result<Vec<RecordId>, DirectoryError> {
        self.inner.find_by_annotation(annotation).await
    }

    async fn indexed_namespaces(
        &self,
    ) -> std::result::Result<std::collections::BTreeSet<String>, DirectoryError> {
        self.inner.indexed_namespaces().await
    }

    async fn mark_namespace_indexed(
        &self,
        namespace: &str,
    ) -> std::result::Result<bool, DirectoryError> {
        self.inner.mark_namespace_indexed(namespace).await
    }

    async fn indexed_requests(
        &self,
    ) -> std::result::Result<std::collections::BTreeSet<Concept>, DirectoryError> {
        self.inner.indexed_requests().await
    }

    async fn mark_request_indexed(
        &self,
        request: &Concept,
    ) -> std::result::Result<bool, DirectoryError> {
        self.inner.mark_request_indexed(request).await
    }

    async fn unmark_request_indexed(
        &self,
        request: &Concept,
    ) -> std::result::Result<bool, DirectoryError> {
        self.inner.unmark_request_indexed(request).await
    }
}

#[tokio::test]
async fn records_the_directory_cannot_read_are_skipped() {
    let inner = InMemoryDirectory::new();
    let seeding = Coordinator::new(registry_config(), Arc::new(inner.clone()));
    seeding.on_advertisement_published(groomer()).await.unwrap();
    let walker = profile("svc#Walker", "animals#Dog", &["measures#Weight"], &[]);
    seeding.on_advertisement_published(walker).await.unwrap();

    let corrupted = RecordId::from(&concept("svc#Walker"));
    let coordinator = Coordinator::new(
        registry_config(),
        Arc::new(CorruptedDirectory {
            inner,
            corrupted: corrupted.clone(),
        }),
    );

    let discovery = coordinator
        .discover(profile("req#R1", "animals#Dog", &["measures#Weight"], &[]))
        .await
        .unwrap();
    assert_eq!(discovery.answered_by, DiscoveryPath::Live);
    assert_eq!(discovery.advertisements, ids(&["svc#Groomer"]));
    assert_eq!(discovery.skipped.len(), 1);
    assert_eq!(discovery.skipped[0].id, corrupted.to_string());
}
