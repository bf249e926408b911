//! In-memory implementation of the `ReadModelStore` trait.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::read_model::{ReadModelRow, ReadModelStore};

/// Read model store keeping projection rows in memory, ordered by
/// `(projection, aggregate_id)`.
#[derive(Debug, Default)]
pub struct InMemoryReadModelStore {
    rows: Mutex<BTreeMap<(String, Uuid), ReadModelRow>>,
}

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    DomainError::StorageUnavailable("in-memory read model store lock poisoned".into())
}

impl InMemoryReadModelStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadModelStore for InMemoryReadModelStore {
    async fn load(
        &self,
        projection: &str,
        aggregate_id: Uuid,
    ) -> Result<Option<ReadModelRow>, DomainError> {
        let rows = self.rows.lock().map_err(poisoned)?;
        Ok(rows.get(&(projection.to_owned(), aggregate_id)).cloned())
    }

    async fn upsert_if_newer(&self, row: ReadModelRow) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let key = (row.projection.clone(), row.aggregate_id);
        let is_newer = rows
            .get(&key)
            .is_none_or(|existing| existing.version < row.version);
        if is_newer {
            rows.insert(key, row);
        }
        Ok(is_newer)
    }

    async fn list(&self, projection: &str) -> Result<Vec<ReadModelRow>, DomainError> {
        let rows = self.rows.lock().map_err(poisoned)?;
        Ok(rows
            .iter()
            .filter(|((name, _), _)| name == projection)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn clear(&self, projection: &str) -> Result<u64, DomainError> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let before = rows.len();
        rows.retain(|(name, _), _| name != projection);
        Ok((before - rows.len()) as u64)
    }
}
