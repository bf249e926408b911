//! Asynchronous dispatch through a bounded queue and a single worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use aquacontrol_core::error::DomainError;
use aquacontrol_core::event_store::StoredEvent;
use aquacontrol_core::sink::EventSink;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatcher::ProjectionDispatcher;

/// An [`EventSink`] that enqueues committed batches and applies them on a
/// background task.
///
/// One worker drains the queue, so batches reach the projections in publish
/// order. Read models lag the event log by [`pending`](Self::pending)
/// events. When the queue is full, `publish` waits for room.
#[derive(Debug)]
pub struct QueuedDispatcher {
    sender: Mutex<Option<mpsc::Sender<Vec<StoredEvent>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
}

impl QueuedDispatcher {
    /// Spawns the worker on the current tokio runtime with room for
    /// `capacity` batches.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(dispatcher: Arc<ProjectionDispatcher>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Vec<StoredEvent>>(capacity);
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_pending = Arc::clone(&pending);

        let worker = tokio::spawn(async move {
            while let Some(batch) = receiver.recv().await {
                for event in &batch {
                    let outcome = dispatcher.dispatch(event).await;
                    worker_pending.fetch_sub(1, Ordering::SeqCst);
                    debug!(
                        event_id = %event.event_id,
                        applied = outcome.applied(),
                        dead_lettered = outcome.dead_lettered(),
                        "queued event dispatched"
                    );
                }
            }
            info!("projection queue drained, worker stopped");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            pending,
        }
    }

    /// Events published but not yet applied.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stops accepting batches, waits for the worker to apply everything
    /// already queued, then returns. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "projection worker ended abnormally");
            }
        }
    }
}

#[async_trait]
impl EventSink for QueuedDispatcher {
    async fn publish(&self, events: &[StoredEvent]) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                DomainError::StorageUnavailable("projection queue is shut down".into())
            })?;

        self.pending.fetch_add(events.len(), Ordering::SeqCst);
        if sender.send(events.to_vec()).await.is_err() {
            self.pending.fetch_sub(events.len(), Ordering::SeqCst);
            return Err(DomainError::StorageUnavailable(
                "projection worker stopped".into(),
            ));
        }
        Ok(())
    }
}
