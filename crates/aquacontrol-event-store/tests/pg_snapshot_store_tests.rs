//! Integration tests for `PgSnapshotStore`.

use aquacontrol_core::snapshot::{Snapshot, SnapshotStore};
use aquacontrol_event_store::pg_snapshot_store::PgSnapshotStore;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

fn make_snapshot(aggregate_id: Uuid, version: i64) -> Snapshot {
    Snapshot {
        aggregate_id,
        aggregate_type: "tank".to_string(),
        payload: serde_json::json!({"name": "Broodstock A", "version": version}),
        version,
        taken_at: Utc::now(),
    }
}

#[sqlx::test(migrator = "aquacontrol_event_store::schema::MIGRATOR")]
async fn test_load_returns_none_when_no_snapshot(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);

    assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
}

#[sqlx::test(migrator = "aquacontrol_event_store::schema::MIGRATOR")]
async fn test_save_and_load_round_trip(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let aggregate_id = Uuid::new_v4();
    let snapshot = make_snapshot(aggregate_id, 10);

    store.save(snapshot.clone()).await.unwrap();

    let loaded = store.load(aggregate_id).await.unwrap().unwrap();
    assert_eq!(loaded.aggregate_type, "tank");
    assert_eq!(loaded.payload, snapshot.payload);
    assert_eq!(loaded.version, 10);
}

#[sqlx::test(migrator = "aquacontrol_event_store::schema::MIGRATOR")]
async fn test_newer_snapshot_replaces_and_older_is_ignored(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let aggregate_id = Uuid::new_v4();

    store.save(make_snapshot(aggregate_id, 10)).await.unwrap();
    store.save(make_snapshot(aggregate_id, 20)).await.unwrap();
    store.save(make_snapshot(aggregate_id, 15)).await.unwrap();

    let loaded = store.load(aggregate_id).await.unwrap().unwrap();
    assert_eq!(loaded.version, 20);
}

#[sqlx::test(migrator = "aquacontrol_event_store::schema::MIGRATOR")]
async fn test_delete_removes_snapshot(pool: PgPool) {
    let store = PgSnapshotStore::new(pool);
    let aggregate_id = Uuid::new_v4();
    store.save(make_snapshot(aggregate_id, 10)).await.unwrap();

    store.delete(aggregate_id).await.unwrap();

    assert!(store.load(aggregate_id).await.unwrap().is_none());
}
