//! Events a projection could not apply.

use std::sync::{Mutex, MutexGuard, PoisonError};

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event_store::StoredEvent;
use chrono::{DateTime, Utc};

/// One event that exhausted its delivery attempts for one projection.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    /// The projection that failed.
    pub projection: &'static str,
    /// The event it could not apply. It remains stored in the event log.
    pub event: StoredEvent,
    /// The error of the last attempt.
    pub error: DomainError,
    /// How many attempts were made.
    pub attempts: u32,
    /// When the event was given up on.
    pub failed_at: DateTime<Utc>,
}

/// In-process holding area for dead letters, inspected by operators and
/// drained for redelivery.
#[derive(Debug, Default)]
pub struct DeadLetterQueue {
    entries: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Entries stay consistent across a panicking holder.
    fn lock(&self) -> MutexGuard<'_, Vec<DeadLetter>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a dead letter.
    pub fn push(&self, letter: DeadLetter) {
        self.lock().push(letter);
    }

    /// Number of dead letters held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been dead-lettered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copies the held dead letters, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.lock().clone()
    }

    /// Removes and returns every held dead letter, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.lock())
    }
}
