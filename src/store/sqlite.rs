use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::{ThreadStore, rebuild};
use crate::conversation::{Checkpoint, Origin, Thread, ThreadId, ThreadSummary, Turn};
use crate::errors::StoreError;

/// SQLite-backed thread store.
///
/// The connection sits behind `Arc<Mutex>` and every query runs on tokio's
/// blocking pool via `spawn_blocking`.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Mutex<ThreadDb>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = ThreadDb { conn };
        db.init()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut ThreadDb) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl ThreadStore for SqliteStore {
    async fn create(
        &self,
        id: &ThreadId,
        first: &Turn,
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let id = id.clone();
        let first = first.clone();
        tracing::debug!(thread = %id, "store create");
        self.call(move |db| db.create(&id, &first, checkpoint)).await
    }

    async fn append(
        &self,
        id: &ThreadId,
        turns: &[Turn],
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let id = id.clone();
        let turns = turns.to_vec();
        tracing::debug!(thread = %id, turns = turns.len(), next = %checkpoint.next, "store append");
        self.call(move |db| db.append(&id, &turns, checkpoint)).await
    }

    async fn load(&self, id: &ThreadId) -> Result<Option<Thread>, StoreError> {
        let id = id.clone();
        self.call(move |db| db.load(&id)).await
    }

    async fn list(&self) -> Result<Vec<ThreadSummary>, StoreError> {
        self.call(|db| db.list()).await
    }
}

struct ThreadDb {
    conn: Connection,
}

impl ThreadDb {
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS turns (
                thread_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                origin TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (thread_id, seq)
            );
            CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                next_state TEXT NOT NULL,
                awaiting_human INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_checkpoints_thread ON checkpoints(thread_id);",
        )?;
        Ok(())
    }

    fn create(
        &mut self,
        id: &ThreadId,
        first: &Turn,
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let claimed = claim_thread(&tx, id)?;
        let has_turns: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM turns WHERE thread_id = ?1)",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if !claimed || has_turns {
            return Err(StoreError::ThreadExists(id.to_string()));
        }
        write_turns(&tx, id, std::slice::from_ref(first), checkpoint)?;
        tx.commit()?;
        Ok(())
    }

    fn append(
        &mut self,
        id: &ThreadId,
        turns: &[Turn],
        checkpoint: Checkpoint,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        claim_thread(&tx, id)?;
        write_turns(&tx, id, turns, checkpoint)?;
        tx.commit()?;
        Ok(())
    }

    fn load(&self, id: &ThreadId) -> Result<Option<Thread>, StoreError> {
        let checkpoint = self
            .conn
            .query_row(
                "SELECT next_state, awaiting_human FROM checkpoints
                 WHERE thread_id = ?1 ORDER BY id DESC LIMIT 1",
                params![id.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;
        let Some((next, awaiting_human)) = checkpoint else {
            return Ok(None);
        };
        let checkpoint = Checkpoint {
            next: parse_field(id, &next)?,
            awaiting_human,
        };

        let mut stmt = self.conn.prepare(
            "SELECT origin, content, created_at FROM turns WHERE thread_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let turns = rows
            .into_iter()
            .map(|(origin, content, created_at)| {
                Ok(Turn {
                    origin: parse_field::<Origin>(id, &origin)?,
                    content,
                    created_at: parse_time(id, &created_at)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        rebuild(id, turns, checkpoint).map(Some)
    }

    fn list(&self) -> Result<Vec<ThreadSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.thread_id, c.next_state, c.awaiting_human, c.created_at,
                    (SELECT COUNT(*) FROM turns t WHERE t.thread_id = c.thread_id)
             FROM checkpoints c
             WHERE c.id = (SELECT MAX(id) FROM checkpoints WHERE thread_id = c.thread_id)
             ORDER BY c.id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(thread, next, awaiting_human, updated_at, turns)| {
                let id = ThreadId::new(thread);
                Ok(ThreadSummary {
                    checkpoint: Checkpoint {
                        next: parse_field(&id, &next)?,
                        awaiting_human,
                    },
                    updated_at: parse_time(&id, &updated_at)?,
                    turns: turns as usize,
                    id,
                })
            })
            .collect()
    }
}

/// Register `id` in `threads`. Returns false if it was already there.
fn claim_thread(tx: &Transaction<'_>, id: &ThreadId) -> Result<bool, StoreError> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO threads (id, created_at) VALUES (?1, ?2)",
        params![id.as_str(), Utc::now().to_rfc3339()],
    )?;
    Ok(inserted == 1)
}

fn write_turns(
    tx: &Transaction<'_>,
    id: &ThreadId,
    turns: &[Turn],
    checkpoint: Checkpoint,
) -> Result<(), StoreError> {
    let next_seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(seq) + 1, 0) FROM turns WHERE thread_id = ?1",
        params![id.as_str()],
        |row| row.get(0),
    )?;
    for (offset, turn) in turns.iter().enumerate() {
        tx.execute(
            "INSERT INTO turns (thread_id, seq, origin, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.as_str(),
                next_seq + offset as i64,
                turn.origin.as_str(),
                turn.content,
                turn.created_at.to_rfc3339(),
            ],
        )?;
    }
    tx.execute(
        "INSERT INTO checkpoints (thread_id, next_state, awaiting_human, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            id.as_str(),
            checkpoint.next.as_str(),
            checkpoint.awaiting_human,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn parse_field<T>(id: &ThreadId, value: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = anyhow::Error>,
{
    value.parse().map_err(|e: anyhow::Error| StoreError::CorruptRecord {
        thread: id.to_string(),
        message: e.to_string(),
    })
}

fn parse_time(id: &ThreadId, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord {
            thread: id.to_string(),
            message: format!("bad timestamp '{}': {}", value, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[tokio::test]
    async fn test_append_then_load() {
        contract::append_then_load(&SqliteStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_checkpoint_only_append() {
        contract::checkpoint_only_append(&SqliteStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        contract::list_most_recent_first(&SqliteStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_create_is_exclusive() {
        contract::create_is_exclusive(&SqliteStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_rejects_log_without_user_first() {
        contract::rejects_log_without_user_first(&SqliteStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("threads.db");
        let id = ThreadId::new("clock_1");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .append(&id, &[Turn::user("a clock")], Checkpoint::default())
                .await
                .unwrap();
            store
                .append(
                    &id,
                    &[Turn::new(Origin::Checker, "please review")],
                    Checkpoint::awaiting_human(),
                )
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let thread = store.load(&id).await.unwrap().unwrap();
        assert_eq!(thread.log.len(), 2);
        assert_eq!(thread.log.turns()[1].content, "please review");
        assert_eq!(thread.checkpoint, Checkpoint::awaiting_human());
    }

    #[tokio::test]
    async fn test_turn_text_round_trips_exactly() {
        let store = SqliteStore::in_memory().unwrap();
        let id = ThreadId::new("quotes");
        let content = "it's a \"page\" with ```html\n<p>x</p>\n``` and unicode é";
        store
            .append(&id, &[Turn::user(content)], Checkpoint::default())
            .await
            .unwrap();
        let thread = store.load(&id).await.unwrap().unwrap();
        assert_eq!(thread.log.first().content, content);
    }
}
