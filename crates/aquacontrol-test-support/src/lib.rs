//! Shared test doubles and builders for the AquaControl engine.

mod clock;
mod events;
mod sink;
mod stores;

pub use clock::{FixedClock, fixed_time};
pub use events::StoredEventBuilder;
pub use sink::{FailingEventSink, HangingEventSink, RecordingEventSink};
pub use stores::{
    FailingEventStore, FailingReadModelStore, FailingSnapshotStore, HangingSnapshotStore,
    RecordingSnapshotStore,
};
