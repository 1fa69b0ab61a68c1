use super::*;
use semreg_profile::{Concept, FunctionalProfile};

fn groomer() -> FunctionalProfile {
    FunctionalProfile::from_uris(
        "http://example.org/svc#Groomer",
        "http://example.org/animals#Poodle",
        &["http://example.org/measures#Weight"],
        &[],
    )
    .unwrap()
}

fn request() -> Concept {
    Concept::parse("http://example.org/requests#FindDog").unwrap()
}

async fn exercise_versioning(dir: &dyn DirectoryService) {
    let created = dir
        .create_record(DirectoryRecord::for_advertisement(&groomer()))
        .await
        .unwrap();
    assert_eq!(created.version, 1);

    let mut update = RecordUpdate::from_record(&created);
    update.annotations.insert(Annotation::index(&request()));
    update.index_state = IndexState::PartiallyIndexed;
    let v2 = dir
        .update_record(&created.id, 1, update.clone())
        .await
        .unwrap();
    assert_eq!(v2, 2);

    let stale = dir.update_record(&created.id, 1, update).await.unwrap_err();
    assert!(matches!(
        stale,
        DirectoryError::VersionConflict {
            expected: 1,
            actual: 2,
            ..
        }
    ));

    let hits = dir
        .find_by_annotation(&Annotation::index(&request()))
        .await
        .unwrap();
    assert_eq!(hits, vec![created.id.clone()]);

    let stored = dir.get_record(&created.id).await.unwrap().unwrap();
    assert!(stored.has_index_entry(&request()));
    assert_eq!(stored.index_state, IndexState::PartiallyIndexed);
}

#[tokio::test]
async fn memory_directory_enforces_versions() {
    let dir = InMemoryDirectory::new();
    exercise_versioning(&dir).await;
}

#[tokio::test]
async fn file_directory_enforces_versions() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = FileDirectory::open(DirectoryConfig::in_dir(tmp.path())).unwrap();
    exercise_versioning(&dir).await;
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let dir = InMemoryDirectory::new();
    let record = DirectoryRecord::for_advertisement(&groomer());
    dir.create_record(record.clone()).await.unwrap();
    let err = dir.create_record(record).await.unwrap_err();
    assert!(matches!(err, DirectoryError::AlreadyExists(_)));
}

#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let dir = InMemoryDirectory::new();
    let err = dir
        .update_record(
            &RecordId::new("http://example.org/svc#Ghost"),
            1,
            RecordUpdate {
                annotations: Default::default(),
                index_state: IndexState::Unindexed,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_record_local());
}

#[tokio::test]
async fn file_directory_survives_reopen_and_logs_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let config = DirectoryConfig::in_dir(tmp.path());

    {
        let dir = FileDirectory::open(config.clone()).unwrap();
        let created = dir
            .create_record(DirectoryRecord::for_advertisement(&groomer()))
            .await
            .unwrap();
        let mut update = RecordUpdate::from_record(&created);
        update.annotations.insert(Annotation::index(&request()));
        dir.update_record(&created.id, created.version, update)
            .await
            .unwrap();
        assert!(dir
            .mark_namespace_indexed("http://example.org/requests#")
            .await
            .unwrap());
        assert!(!dir
            .mark_namespace_indexed("http://example.org/requests#")
            .await
            .unwrap());
    }

    let reopened = FileDirectory::open(config).unwrap();
    let ids = reopened.list_records().await.unwrap();
    assert_eq!(ids.len(), 1);
    let record = reopened.get_record(&ids[0]).await.unwrap().unwrap();
    assert_eq!(record.version, 2);
    assert!(record.has_index_entry(&request()));
    assert!(reopened
        .indexed_namespaces()
        .await
        .unwrap()
        .contains("http://example.org/requests#"));

    let kinds: Vec<_> = reopened.changelog().into_iter().map(|c| c.kind).collect();
    assert_eq!(kinds.len(), 3);
    assert_eq!(kinds[0], DirectoryChangeKind::RecordCreated);
    match &kinds[1] {
        DirectoryChangeKind::AnnotationsUpdated { added, removed, .. } => {
            assert_eq!(added, &vec![Annotation::index(&request())]);
            assert!(removed.is_empty());
        }
        other => panic!("unexpected change: {other:?}"),
    }
}

#[tokio::test]
async fn removing_a_record_drops_its_index_entries() {
    let dir = InMemoryDirectory::new();
    let created = dir
        .create_record(DirectoryRecord::for_advertisement(&groomer()))
        .await
        .unwrap();
    let mut update = RecordUpdate::from_record(&created);
    update.annotations.insert(Annotation::index(&request()));
    dir.update_record(&created.id, 1, update).await.unwrap();

    assert!(dir.remove_record(&created.id).await.unwrap());
    assert!(!dir.remove_record(&created.id).await.unwrap());
    assert!(dir
        .find_by_annotation(&Annotation::index(&request()))
        .await
        .unwrap()
        .is_empty());
}

async fn exercise_indexed_requests(dir: &dyn DirectoryService) {
    assert!(dir.indexed_requests().await.unwrap().is_empty());
    assert!(dir.mark_request_indexed(&request()).await.unwrap());
    assert!(!dir.mark_request_indexed(&request()).await.unwrap());
    assert_eq!(
        dir.indexed_requests().await.unwrap().into_iter().collect::<Vec<_>>(),
        vec![request()]
    );
    assert!(dir.unmark_request_indexed(&request()).await.unwrap());
    assert!(!dir.unmark_request_indexed(&request()).await.unwrap());
    assert!(dir.indexed_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_directory_tracks_indexed_requests() {
    exercise_indexed_requests(&InMemoryDirectory::new()).await;
}

#[tokio::test]
async fn file_directory_persists_indexed_requests() {
    let tmp = tempfile::tempdir().unwrap();
    let config = DirectoryConfig::in_dir(tmp.path());
    {
        let dir = FileDirectory::open(config.clone()).unwrap();
        exercise_indexed_requests(&dir).await;
        dir.mark_request_indexed(&request()).await.unwrap();
    }

    let reopened = FileDirectory::open(config).unwrap();
    assert!(reopened.indexed_requests().await.unwrap().contains(&request()));
    let last = reopened.changelog().pop().map(|c| c.kind);
    assert_eq!(
        last,
        Some(DirectoryChangeKind::RequestIndexed { request: request() })
    );
}

#[tokio::test]
async fn changelog_failure_does_not_undo_a_durable_change() {
    let tmp = tempfile::tempdir().unwrap();
    // A regular file where the changelog's parent directory should be.
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let config = DirectoryConfig {
        path: tmp.path().join("directory.json"),
        changelog_path: Some(blocker.join("changelog.json")),
    };

    let dir = FileDirectory::open(config.clone()).unwrap();
    let created = dir
        .create_record(DirectoryRecord::for_advertisement(&groomer()))
        .await
        .unwrap();
    assert!(dir
        .mark_namespace_indexed("http://example.org/requests#")
        .await
        .unwrap());
    assert!(dir.changelog().is_empty());

    // Retrying the publish sees the record that was already committed.
    let err = dir
        .create_record(DirectoryRecord::for_advertisement(&groomer()))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::AlreadyExists(_)));

    let reopened = FileDirectory::open(config).unwrap();
    assert_eq!(reopened.list_records().await.unwrap(), vec![created.id]);
}
