//! Session and scan persistence through the SQLite gateway.

use chrono::{Duration, Utc};
use rstest::rstest;
use scandesk_core::{ParsedPayload, ScanRecord, Session, SessionId, SourceId, UserId};
use scandesk_storage::{
    Database, PersistenceGateway, SqliteSessionStore, StorageError,
};

async fn store() -> (Database, SqliteSessionStore) {
    let db = Database::in_memory().await.unwrap();
    let store = SqliteSessionStore::new(db.pool().clone());
    (db, store)
}

fn record(session_id: SessionId, raw: &str) -> ScanRecord {
    ScanRecord {
        session_id,
        raw_payload: raw.to_string(),
        parsed: ParsedPayload::parse(raw),
        captured_at: Utc::now(),
        source_id: SourceId::new(1),
    }
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (_db, store) = store().await;
    let start = Utc::now();
    let session = Session::start(UserId::new(11), start);

    store.append_session(&session).await.unwrap();
    let open = store.open_sessions().await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(open[0].ended_at.is_none());

    let end = start + Duration::minutes(45);
    store.close_session(session.id, end).await.unwrap();

    let stored = store.find_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.ended_at, Some(end));
    assert!(store.open_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_unknown_session() {
    let (_db, store) = store().await;
    let err = store
        .close_session(SessionId::new(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_duplicate_session_insert_is_permanent_error() {
    let (_db, store) = store().await;
    let session = Session::start(UserId::new(1), Utc::now());

    store.append_session(&session).await.unwrap();
    let err = store.append_session(&session).await.unwrap_err();
    assert!(!err.is_transient());
}

#[rstest]
#[case(r#"{"order":"1001","qty":2}"#, "json", true)]
#[case("Order:1001^Customer:ACME", "key_value", true)]
#[case("PKG^1001^ACME^P-7^2^SKU9", "key_value", true)]
#[case("just some text", "plain_text", false)]
#[tokio::test]
async fn test_scan_stores_parsed_format(
    #[case] raw: &str,
    #[case] format: &str,
    #[case] has_fields: bool,
) {
    let (_db, store) = store().await;
    let session = Session::start(UserId::new(2), Utc::now());
    store.append_session(&session).await.unwrap();

    store.append_scan(&record(session.id, raw)).await.unwrap();

    let scans = store.scans_for_session(session.id).await.unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].raw_payload, raw);
    assert_eq!(scans[0].payload_format, format);
    assert_eq!(scans[0].source_id, 1);
    assert_eq!(scans[0].fields().unwrap().is_some(), has_fields);
}

#[tokio::test]
async fn test_scan_without_session_row_is_kept() {
    let (_db, store) = store().await;
    let orphan = SessionId::new();

    store.append_scan(&record(orphan, "ORDER-1")).await.unwrap();
    assert_eq!(store.scans_for_session(orphan).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_caret_fields_round_trip_through_json() {
    let (_db, store) = store().await;
    let session = Session::start(UserId::new(4), Utc::now());
    store.append_session(&session).await.unwrap();

    store
        .append_scan(&record(session.id, "PKG^1001^ACME^P-7"))
        .await
        .unwrap();

    let scans = store.scans_for_session(session.id).await.unwrap();
    let fields = scans[0].fields().unwrap().unwrap();
    assert_eq!(fields["order"], "1001");
    assert_eq!(fields["customer"], "ACME");
    assert_eq!(fields["package"], "P-7");
}
