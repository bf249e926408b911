//! AquaControl storage backends.
//!
//! PostgreSQL implementations of the core store traits for production, and
//! in-memory implementations for tests and local runs.

pub mod memory_event_store;
pub mod memory_read_model_store;
pub mod memory_snapshot_store;
mod pg_error;
pub mod pg_event_store;
pub mod pg_read_model_store;
pub mod pg_snapshot_store;
pub mod schema;

pub use memory_event_store::InMemoryEventStore;
pub use memory_read_model_store::InMemoryReadModelStore;
pub use memory_snapshot_store::InMemorySnapshotStore;
pub use pg_event_store::PgEventStore;
pub use pg_read_model_store::PgReadModelStore;
pub use pg_snapshot_store::PgSnapshotStore;
