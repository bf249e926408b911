//! AquaControl Projection — keeps read models in step with the event log.
//!
//! A [`Projection`] folds the events of one aggregate into a single read
//! model row. The [`ProjectionDispatcher`] routes committed events to every
//! projection that handles their type, applies each event at most once per
//! row, retries transient failures and dead-letters the rest. It can run
//! inline as the repository's event sink or behind a [`QueuedDispatcher`].

mod backoff;
pub mod dead_letter;
pub mod dispatcher;
pub mod projection;
pub mod queued;
pub mod rebuild;

pub use dead_letter::{DeadLetter, DeadLetterQueue};
pub use dispatcher::{Delivery, DispatchOutcome, ProjectionDispatcher};
pub use projection::Projection;
pub use queued::QueuedDispatcher;
pub use rebuild::RebuildReport;
