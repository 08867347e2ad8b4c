//! Integration tests for the SQLite report store

use refbase::models::{DayMetrics, ReportDocument};
use refbase::store::{ReportStore, SqliteReportStore};

async fn store() -> SqliteReportStore {
    let store = SqliteReportStore::new("sqlite::memory:", 1)
        .await
        .expect("in-memory sqlite");
    store.init().await.expect("init schema");
    store
}

fn sample_document(user_id: &str) -> ReportDocument {
    let mut doc = ReportDocument::empty(user_id, 1_700_000_000);
    doc.daily.insert(
        "2024-06-01".to_string(),
        DayMetrics {
            clicks: 5,
            signups: 1,
            customers: 0,
            earnings: 12.5,
        },
    );
    doc.daily.insert(
        "2024-06-02".to_string(),
        DayMetrics {
            clicks: 2,
            ..Default::default()
        },
    );
    doc.links.insert(
        "landing".to_string(),
        serde_json::json!({"clicks": 7, "meta": {"source": "newsletter"}}),
    );
    doc.sub_ids
        .insert("campaign-a".to_string(), serde_json::json!(3));
    doc.traffic_sources
        .insert("twitter".to_string(), serde_json::json!({"visits": 11}));
    doc
}

#[tokio::test]
async fn init_is_idempotent() {
    let store = store().await;
    store.init().await.expect("second init");
}

#[tokio::test]
async fn probe_succeeds_against_live_store() {
    let store = store().await;
    store.probe().await.expect("probe");
}

#[tokio::test]
async fn fetch_absent_report_is_none_not_error() {
    let store = store().await;
    let doc = store.fetch_report("nobody").await.expect("fetch");
    assert!(doc.is_none());
}

#[tokio::test]
async fn report_document_round_trips_including_opaque_maps() {
    let store = store().await;
    let doc = sample_document("alice");

    assert!(store.put_report(&doc).await.expect("put"));
    let fetched = store
        .fetch_report("alice")
        .await
        .expect("fetch")
        .expect("present");

    let mut expected = doc;
    expected.version = 1;
    assert_eq!(fetched, expected);
}

#[tokio::test]
async fn put_report_replaces_the_whole_document() {
    let store = store().await;
    let mut doc = sample_document("alice");
    assert!(store.put_report(&doc).await.expect("first put"));

    doc.version = 1;
    doc.daily.insert(
        "2024-06-03".to_string(),
        DayMetrics {
            clicks: 9,
            ..Default::default()
        },
    );
    doc.updated_at = 1_700_000_100;
    assert!(store.put_report(&doc).await.expect("second put"));

    let fetched = store
        .fetch_report("alice")
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(fetched.daily.len(), 3);
    assert_eq!(fetched.updated_at, 1_700_000_100);
    assert_eq!(fetched.version, 2);
}

#[tokio::test]
async fn stale_version_write_is_rejected() {
    let store = store().await;
    let doc = sample_document("alice");
    assert!(store.put_report(&doc).await.expect("insert"));

    // A second insert with version 0 lost the creation race
    assert!(!store.put_report(&doc).await.expect("stale insert"));

    // An update against a version that was already bumped loses too
    let mut current = store
        .fetch_report("alice")
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(current.version, 1);
    assert!(store.put_report(&current).await.expect("first update"));

    // `current` still carries version 1; the row is now at version 2
    current.updated_at = 1_700_000_200;
    assert!(!store.put_report(&current).await.expect("stale update"));

    let fetched = store
        .fetch_report("alice")
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(fetched.version, 2);
    assert_ne!(fetched.updated_at, 1_700_000_200);
}

#[tokio::test]
async fn upsert_profile_keeps_the_first_referral_code() {
    let store = store().await;

    let first = store
        .upsert_profile("alice", Some("alice@example.com"), "CODE1234")
        .await
        .expect("first upsert");
    assert_eq!(first.referral_code, "CODE1234");

    let second = store
        .upsert_profile("alice", None, "OTHER999")
        .await
        .expect("second upsert");
    assert_eq!(second.referral_code, "CODE1234");
    assert_eq!(second.email.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn fetch_profile_absent_is_none() {
    let store = store().await;
    assert!(store.fetch_profile("nobody").await.expect("fetch").is_none());
}

#[tokio::test]
async fn list_user_ids_returns_every_profile_sorted() {
    let store = store().await;
    store
        .upsert_profile("carol", None, "CAROL123")
        .await
        .expect("upsert");
    store
        .upsert_profile("alice", None, "ALICE123")
        .await
        .expect("upsert");
    store
        .upsert_profile("bob", None, "BOB12345")
        .await
        .expect("upsert");

    let ids = store.list_user_ids().await.expect("list");
    assert_eq!(ids, vec!["alice", "bob", "carol"]);
}
