//! In-process store. Nothing survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ThreadStore, rebuild};
use crate::conversation::{Checkpoint, Thread, ThreadId, ThreadSummary, Turn};
use crate::errors::StoreError;

struct Record {
    turns: Vec<Turn>,
    checkpoint: Checkpoint,
    updated_at: DateTime<Utc>,
    revision: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    threads: Mutex<HashMap<ThreadId, Record>>,
    revision: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> Result<u64, StoreError> {
        let mut revision = self.revision.lock().map_err(|_| StoreError::LockPoisoned)?;
        *revision += 1;
        Ok(*revision)
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn create(
        &self,
        id: &ThreadId,
        first: &Turn,
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let revision = self.next_revision()?;
        let mut threads = self.threads.lock().map_err(|_| StoreError::LockPoisoned)?;
        if threads.contains_key(id) {
            return Err(StoreError::ThreadExists(id.to_string()));
        }
        threads.insert(
            id.clone(),
            Record {
                turns: vec![first.clone()],
                checkpoint,
                updated_at: Utc::now(),
                revision,
            },
        );
        Ok(())
    }

    async fn append(
        &self,
        id: &ThreadId,
        turns: &[Turn],
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let revision = self.next_revision()?;
        let mut threads = self.threads.lock().map_err(|_| StoreError::LockPoisoned)?;
        let record = threads.entry(id.clone()).or_insert_with(|| Record {
            turns: Vec::new(),
            checkpoint,
            updated_at: Utc::now(),
            revision,
        });
        record.turns.extend_from_slice(turns);
        record.checkpoint = checkpoint;
        record.updated_at = Utc::now();
        record.revision = revision;
        Ok(())
    }

    async fn load(&self, id: &ThreadId) -> Result<Option<Thread>, StoreError> {
        let threads = self.threads.lock().map_err(|_| StoreError::LockPoisoned)?;
        threads
            .get(id)
            .map(|r| rebuild(id, r.turns.clone(), r.checkpoint))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>, StoreError> {
        let threads = self.threads.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut records: Vec<_> = threads.iter().collect();
        records.sort_by(|a, b| b.1.revision.cmp(&a.1.revision));
        Ok(records
            .into_iter()
            .map(|(id, r)| ThreadSummary {
                id: id.clone(),
                turns: r.turns.len(),
                checkpoint: r.checkpoint,
                updated_at: r.updated_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[tokio::test]
    async fn test_append_then_load() {
        contract::append_then_load(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_checkpoint_only_append() {
        contract::checkpoint_only_append(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        contract::list_most_recent_first(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_create_is_exclusive() {
        contract::create_is_exclusive(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_rejects_log_without_user_first() {
        contract::rejects_log_without_user_first(&MemoryStore::new()).await;
    }
}
