//! Thread persistence.
//!
//! A store is append-only: each stage commits its new turns together with
//! the checkpoint that follows them, so a crash or failed stage leaves the
//! thread at the last completed stage.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::conversation::{Checkpoint, ConversationLog, Thread, ThreadId, ThreadSummary, Turn};
use crate::errors::StoreError;

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Create a thread holding `first`. Fails with [`StoreError::ThreadExists`]
    /// if any thread already uses `id`; the check and the write are one step.
    async fn create(
        &self,
        id: &ThreadId,
        first: &Turn,
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError>;

    /// Append `turns` to a thread (creating it if needed) and record `checkpoint`.
    async fn append(
        &self,
        id: &ThreadId,
        turns: &[Turn],
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError>;

    async fn load(&self, id: &ThreadId) -> Result<Option<Thread>, StoreError>;

    /// All threads, most recently updated first.
    async fn list(&self) -> Result<Vec<ThreadSummary>, StoreError>;
}

fn rebuild(id: &ThreadId, turns: Vec<Turn>, checkpoint: Checkpoint) -> Result<Thread, StoreError> {
    let log = ConversationLog::from_turns(turns).map_err(|e| StoreError::CorruptRecord {
        thread: id.to_string(),
        message: e.to_string(),
    })?;
    Ok(Thread {
        id: id.clone(),
        log,
        checkpoint,
    })
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every store must share.

    use super::*;
    use crate::conversation::Origin;
    use crate::workflow::WorkflowState;

    pub async fn append_then_load(store: &dyn ThreadStore) {
        let id = ThreadId::new("todo_app_1");
        assert!(store.load(&id).await.unwrap().is_none());

        store
            .append(&id, &[Turn::user("a todo app")], Checkpoint::default())
            .await
            .unwrap();
        store
            .append(
                &id,
                &[Turn::new(Origin::Router, "clear")],
                Checkpoint::at(WorkflowState::Generating),
            )
            .await
            .unwrap();

        let thread = store.load(&id).await.unwrap().unwrap();
        assert_eq!(thread.log.len(), 2);
        assert_eq!(thread.log.first().content, "a todo app");
        assert_eq!(thread.log.last().origin, Origin::Router);
        assert_eq!(thread.checkpoint, Checkpoint::at(WorkflowState::Generating));
    }

    pub async fn checkpoint_only_append(store: &dyn ThreadStore) {
        let id = ThreadId::new("t");
        store
            .append(&id, &[Turn::user("x")], Checkpoint::default())
            .await
            .unwrap();
        store
            .append(&id, &[], Checkpoint::awaiting_human())
            .await
            .unwrap();
        let thread = store.load(&id).await.unwrap().unwrap();
        assert_eq!(thread.log.len(), 1);
        assert!(thread.checkpoint.awaiting_human);
    }

    pub async fn list_most_recent_first(store: &dyn ThreadStore) {
        assert!(store.list().await.unwrap().is_empty());
        for name in ["first", "second"] {
            store
                .append(&ThreadId::new(name), &[Turn::user(name)], Checkpoint::default())
                .await
                .unwrap();
        }
        store
            .append(
                &ThreadId::new("first"),
                &[Turn::new(Origin::Router, "go")],
                Checkpoint::at(WorkflowState::Generating),
            )
            .await
            .unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id.as_str(), "first");
        assert_eq!(list[0].turns, 2);
        assert_eq!(list[0].checkpoint.next, WorkflowState::Generating);
        assert_eq!(list[1].id.as_str(), "second");
    }

    pub async fn create_is_exclusive(store: &dyn ThreadStore) {
        let id = ThreadId::new("clock_1");
        store
            .create(&id, &Turn::user("a clock"), Checkpoint::default())
            .await
            .unwrap();
        assert!(matches!(
            store.create(&id, &Turn::user("a clock"), Checkpoint::default()).await,
            Err(StoreError::ThreadExists(_))
        ));

        // A thread first written through `append` is taken as well.
        let appended = ThreadId::new("appended_1");
        store
            .append(&appended, &[Turn::user("x")], Checkpoint::default())
            .await
            .unwrap();
        assert!(matches!(
            store.create(&appended, &Turn::user("x"), Checkpoint::default()).await,
            Err(StoreError::ThreadExists(_))
        ));

        let raced = ThreadId::new("raced_1");
        let first = Turn::user("first");
        let second = Turn::user("second");
        let (a, b) = tokio::join!(
            store.create(&raced, &first, Checkpoint::default()),
            store.create(&raced, &second, Checkpoint::default()),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

        let thread = store.load(&id).await.unwrap().unwrap();
        assert_eq!(thread.log.len(), 1);
        assert_eq!(store.load(&raced).await.unwrap().unwrap().log.len(), 1);
    }

    pub async fn rejects_log_without_user_first(store: &dyn ThreadStore) {
        let id = ThreadId::new("bad");
        store
            .append(&id, &[Turn::new(Origin::Router, "orphan")], Checkpoint::default())
            .await
            .unwrap();
        assert!(matches!(
            store.load(&id).await,
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
