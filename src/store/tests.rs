use super::*;
use serde_json::json;
use tempfile::TempDir;
use tokio::time::{Duration, timeout};

fn create_test_store() -> (TempDir, LocalStore) {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::open(dir.path().to_str().unwrap()).unwrap();
    (dir, store)
}

fn doc(fields: serde_json::Value) -> DocumentData {
    match fields {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[tokio::test]
async fn test_set_and_get_roundtrip() {
    let (_dir, store) = create_test_store();

    store
        .set("buses", "B1", doc(json!({ "bus_id": "B1", "speed": 12.5 })))
        .await
        .unwrap();

    let fetched = store.get("buses", "B1").await.unwrap().unwrap();
    assert_eq!(fetched.id, "B1");
    assert_eq!(fetched.data["speed"], json!(12.5));
}

#[tokio::test]
async fn test_get_missing_document_is_none() {
    let (_dir, store) = create_test_store();
    assert!(store.get("buses", "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_generates_distinct_ids() {
    let (_dir, store) = create_test_store();

    let a = store.add("attendance", doc(json!({ "n": 1 }))).await.unwrap();
    let b = store.add("attendance", doc(json!({ "n": 2 }))).await.unwrap();
    assert_ne!(a, b);
    assert!(store.get("attendance", &a).await.unwrap().is_some());
}

#[tokio::test]
async fn test_update_merges_fields() {
    let (_dir, store) = create_test_store();

    store
        .set("buses", "B1", doc(json!({ "bus_id": "B1", "speed": 10.0 })))
        .await
        .unwrap();
    store
        .update("buses", "B1", doc(json!({ "speed": 22.0, "is_moving": true })))
        .await
        .unwrap();

    let fetched = store.get("buses", "B1").await.unwrap().unwrap();
    assert_eq!(fetched.data["bus_id"], json!("B1"));
    assert_eq!(fetched.data["speed"], json!(22.0));
    assert_eq!(fetched.data["is_moving"], json!(true));
}

#[tokio::test]
async fn test_update_missing_document_fails() {
    let (_dir, store) = create_test_store();
    let err = store
        .update("buses", "ghost", doc(json!({ "speed": 1.0 })))
        .await;
    assert!(matches!(
        err,
        Err(crate::utils::SyncError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_query_filters_order_and_limit() {
    let (_dir, store) = create_test_store();

    for (id, route, active, ts) in [
        ("SV1", "R1", true, 100),
        ("SV2", "R1", false, 200),
        ("SV3", "R2", true, 300),
        ("SV4", "R1", true, 400),
    ] {
        store
            .set(
                "supervisors",
                id,
                doc(json!({
                    "supervisor_id": id,
                    "assigned_routes": [route],
                    "is_active": active,
                    "created_at": ts,
                })),
            )
            .await
            .unwrap();
    }

    let query = Query::collection("supervisors")
        .where_array_contains("assigned_routes", "R1")
        .where_eq("is_active", true)
        .order_by("created_at", Direction::Descending);
    let results = store.query(&query).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["SV4", "SV1"]);

    let limited = store
        .query(&query.clone().limit(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, "SV4");
}

#[tokio::test]
async fn test_delete_removes_document_and_notifies() {
    let (_dir, store) = create_test_store();

    store
        .set("buses", "B1", doc(json!({ "bus_id": "B1" })))
        .await
        .unwrap();
    let mut stream = store
        .watch(WatchTarget::document("buses", "B1"))
        .unwrap();
    let _ = stream.snapshots.recv().await;

    store.delete("buses", "B1").await.unwrap();
    assert!(store.get("buses", "B1").await.unwrap().is_none());
    let gone = timeout(Duration::from_secs(1), stream.snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(gone, Snapshot::Document(None)));

    // Deleting a missing document is quiet
    store.delete("buses", "B1").await.unwrap();
}

#[tokio::test]
async fn test_document_watch_emits_initial_and_changes() {
    let (_dir, store) = create_test_store();

    let mut stream = store
        .watch(WatchTarget::document("buses", "B1"))
        .unwrap();

    // Initial snapshot: the document does not exist yet
    let first = timeout(Duration::from_secs(1), stream.snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, Snapshot::Document(None)));

    store
        .set("buses", "B1", doc(json!({ "bus_id": "B1" })))
        .await
        .unwrap();
    let second = timeout(Duration::from_secs(1), stream.snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    match second {
        Snapshot::Document(Some(document)) => assert_eq!(document.id, "B1"),
        other => panic!("expected document snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_query_watch_tracks_result_set() {
    let (_dir, store) = create_test_store();

    let query = Query::collection("cross_app_messages").where_eq("read", false);
    let mut stream = store.watch(WatchTarget::query(query)).unwrap();

    let initial = timeout(Duration::from_secs(1), stream.snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    match initial {
        Snapshot::Batch(documents) => assert!(documents.is_empty()),
        other => panic!("expected batch snapshot, got {other:?}"),
    }

    store
        .set(
            "cross_app_messages",
            "m1",
            doc(json!({ "id": "m1", "read": false })),
        )
        .await
        .unwrap();
    let after_write = timeout(Duration::from_secs(1), stream.snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    match after_write {
        Snapshot::Batch(documents) => assert_eq!(documents.len(), 1),
        other => panic!("expected batch snapshot, got {other:?}"),
    }

    // Marking it read drops it out of the watched result set
    store
        .update("cross_app_messages", "m1", doc(json!({ "read": true })))
        .await
        .unwrap();
    let after_read = timeout(Duration::from_secs(1), stream.snapshots.recv())
        .await
        .unwrap()
        .unwrap();
    match after_read {
        Snapshot::Batch(documents) => assert!(documents.is_empty()),
        other => panic!("expected batch snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_watch_stops_emitting() {
    let (_dir, store) = create_test_store();

    let mut stream = store
        .watch(WatchTarget::document("buses", "B1"))
        .unwrap();
    let _ = stream.snapshots.recv().await;

    stream.canceller.cancel();
    // Cancelling twice is fine
    stream.canceller.cancel();

    store
        .set("buses", "B1", doc(json!({ "bus_id": "B1" })))
        .await
        .unwrap();
    // Sender side is gone, so the channel closes without another emission
    let next = timeout(Duration::from_secs(1), stream.snapshots.recv())
        .await
        .unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn test_unrelated_collection_does_not_notify() {
    let (_dir, store) = create_test_store();

    let mut stream = store
        .watch(WatchTarget::document("buses", "B1"))
        .unwrap();
    let _ = stream.snapshots.recv().await;

    store
        .set("routes", "R1", doc(json!({ "route_id": "R1" })))
        .await
        .unwrap();
    let quiet = timeout(Duration::from_millis(100), stream.snapshots.recv()).await;
    assert!(quiet.is_err(), "watch on buses fired for a routes write");
}

#[test]
fn test_topic_keys_are_deterministic() {
    let a = WatchTarget::document("buses", "B1");
    let b = WatchTarget::document("buses", "B1");
    assert_eq!(a.topic_key(), b.topic_key());
    assert_eq!(a.topic_key(), "doc:buses/B1");

    let q1 = WatchTarget::query(
        Query::collection("cross_app_messages")
            .where_eq("receiver_id", "S1")
            .where_eq("read", false)
            .order_by("created_at", Direction::Descending)
            .limit(50),
    );
    let q2 = WatchTarget::query(
        Query::collection("cross_app_messages")
            .where_eq("receiver_id", "S1")
            .where_eq("read", false)
            .order_by("created_at", Direction::Descending)
            .limit(50),
    );
    assert_eq!(q1.topic_key(), q2.topic_key());

    let other = WatchTarget::query(
        Query::collection("cross_app_messages").where_eq("receiver_id", "S2"),
    );
    assert_ne!(q1.topic_key(), other.topic_key());
}

#[test]
fn test_encode_rejects_non_objects() {
    assert!(encode(&"just a string").is_err());
    assert!(encode(&json!({ "ok": true })).is_ok());
}
