//! Integration tests for `PgReadModelStore`.

use aquacontrol_core::read_model::{ReadModelRow, ReadModelStore};
use aquacontrol_event_store::pg_read_model_store::PgReadModelStore;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

fn make_row(projection: &str, aggregate_id: Uuid, version: i64) -> ReadModelRow {
    ReadModelRow {
        projection: projection.to_string(),
        aggregate_id,
        version,
        state: serde_json::json!({"version": version}),
        updated_at: Utc::now(),
    }
}

#[sqlx::test(migrator = "aquacontrol_event_store::schema::MIGRATOR")]
async fn test_upsert_creates_then_updates_row(pool: PgPool) {
    let store = PgReadModelStore::new(pool);
    let aggregate_id = Uuid::new_v4();

    assert!(store.upsert_if_newer(make_row("tank_summary", aggregate_id, 1)).await.unwrap());
    assert!(store.upsert_if_newer(make_row("tank_summary", aggregate_id, 2)).await.unwrap());

    let row = store.load("tank_summary", aggregate_id).await.unwrap().unwrap();
    assert_eq!(row.version, 2);
    assert_eq!(row.state, serde_json::json!({"version": 2}));
}

#[sqlx::test(migrator = "aquacontrol_event_store::schema::MIGRATOR")]
async fn test_duplicate_and_stale_versions_are_not_written(pool: PgPool) {
    let store = PgReadModelStore::new(pool);
    let aggregate_id = Uuid::new_v4();
    store.upsert_if_newer(make_row("tank_summary", aggregate_id, 3)).await.unwrap();

    let duplicate = store.upsert_if_newer(make_row("tank_summary", aggregate_id, 3)).await.unwrap();
    let stale = store.upsert_if_newer(make_row("tank_summary", aggregate_id, 2)).await.unwrap();

    assert!(!duplicate);
    assert!(!stale);
    let row = store.load("tank_summary", aggregate_id).await.unwrap().unwrap();
    assert_eq!(row.version, 3);
}

#[sqlx::test(migrator = "aquacontrol_event_store::schema::MIGRATOR")]
async fn test_list_and_clear_are_scoped_to_projection(pool: PgPool) {
    let store = PgReadModelStore::new(pool);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    store.upsert_if_newer(make_row("tank_summary", a, 1)).await.unwrap();
    store.upsert_if_newer(make_row("tank_summary", b, 1)).await.unwrap();
    store.upsert_if_newer(make_row("tank_water_quality", a, 1)).await.unwrap();

    assert_eq!(store.list("tank_summary").await.unwrap().len(), 2);

    let removed = store.clear("tank_summary").await.unwrap();

    assert_eq!(removed, 2);
    assert!(store.list("tank_summary").await.unwrap().is_empty());
    assert_eq!(store.list("tank_water_quality").await.unwrap().len(), 1);
}
