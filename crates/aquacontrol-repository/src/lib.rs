//! AquaControl Repository — loads and saves event-sourced aggregates.
//!
//! [`AggregateRepository`] composes an event store and a snapshot store:
//! loads start from the newest usable snapshot and replay the tail, saves
//! append under optimistic concurrency, snapshot on policy and hand the
//! committed events to an [`EventSink`](aquacontrol_core::sink::EventSink).

pub mod compaction;
pub mod config;
pub mod repository;
pub mod retry;

pub use compaction::{CompactionReport, compact_snapshots};
pub use config::RepositoryConfig;
pub use repository::AggregateRepository;
pub use retry::retry_on_conflict;
