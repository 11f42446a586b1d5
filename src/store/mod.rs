mod db;
mod lists;
mod sets;
mod snapshot;
mod sort;
mod strings;
mod value;
mod zsets;

pub use db::Database;
pub use lists::End;
pub use sets::SetOp;
pub use sort::SortOptions;
pub use value::{Entry, SortedSet, Value};
pub use zsets::{parse_score, ScoreBound};

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error as ThisError;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("no such key")]
    NoSuchKey,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("invalid DB index")]
    InvalidDbIndex,
    #[error("source and destination objects are the same")]
    SameObject,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("increment or decrement would overflow")]
    Overflow,
    #[error("resulting score is not a number (NaN)")]
    NanScore,
    #[error("One or more scores can't be converted into double")]
    SortNotANumber,
    #[error("snapshot error: {0}")]
    Snapshot(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Current wall clock time as unix milliseconds. Expirations are absolute so they survive a
/// snapshot round trip.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The Store owns every logical database of the server. All access goes through `lock`, which
/// hands out a guard over the whole keyspace: one command, or one whole `EXEC` batch, runs
/// while holding it, so no other connection can observe a partial effect.
///
/// Expired keys are dropped lazily whenever they are looked up. A background task sweeps them
/// as well so keys nobody touches again do not linger in memory.
///
/// The store is designed to be thread-safe, allowing it to be shared and cloned cheaply using
/// reference counting.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new(databases: usize, snapshot_path: impl Into<PathBuf>) -> Store {
        Store::with_sweep_interval(databases, snapshot_path, Duration::from_secs(1))
    }

    pub fn with_sweep_interval(
        databases: usize,
        snapshot_path: impl Into<PathBuf>,
        max_idle: Duration,
    ) -> Store {
        let state = State {
            databases: (0..databases.max(1)).map(|_| Database::new()).collect(),
        };

        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
            waker: Notify::new(),
            snapshot_path: snapshot_path.into(),
            connected: AtomicUsize::new(0),
        });

        tokio::spawn({
            let inner = inner.clone();
            async move { remove_expired_keys(inner, max_idle).await }
        });

        Self { inner }
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct InnerStore {
    state: Mutex<State>,
    waker: Notify,
    snapshot_path: PathBuf,
    connected: AtomicUsize,
}

impl InnerStore {
    pub fn lock(&self) -> StoreGuard<'_> {
        // A panicking command cannot leave the keyspace half written: every operation
        // validates before it mutates. Keep serving instead of poisoning every connection.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        StoreGuard { state, inner: self }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn client_connected(&self) -> usize {
        self.connected.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn client_disconnected(&self) -> usize {
        self.connected.fetch_sub(1, Ordering::Relaxed) - 1
    }

    pub fn connected_clients(&self) -> usize {
        self.connected.load(Ordering::Relaxed)
    }
}

struct State {
    databases: Vec<Database>,
}

/// Exclusive access to the keyspace.
pub struct StoreGuard<'a> {
    state: MutexGuard<'a, State>,
    inner: &'a InnerStore,
}

impl<'a> StoreGuard<'a> {
    pub fn databases(&self) -> usize {
        self.state.databases.len()
    }

    /// Validates a client supplied database index.
    pub fn db_index(&self, index: i64) -> Result<usize, StoreError> {
        usize::try_from(index)
            .ok()
            .filter(|index| *index < self.databases())
            .ok_or(StoreError::InvalidDbIndex)
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range. Indexes reach here only after `db_index` or from a
    /// session whose selected database was validated the same way.
    pub fn db(&mut self, index: usize) -> &mut Database {
        &mut self.state.databases[index]
    }

    pub fn connected_clients(&self) -> usize {
        self.inner.connected_clients()
    }

    /// Sets or clears the expiration of `key`. Returns whether the key exists.
    pub fn expire_at(&mut self, index: usize, key: &str, at: Option<u64>) -> bool {
        let updated = self.db(index).set_expire(key, at);
        if updated && at.is_some() {
            self.inner.waker.notify_one();
        }
        updated
    }

    /// Moves `key` from database `from` to database `to`.
    ///
    /// Returns `false`, leaving both databases untouched, when the destination already holds
    /// the key.
    pub fn move_key(&mut self, from: usize, key: &str, to: usize) -> Result<bool, StoreError> {
        if from == to {
            return Err(StoreError::SameObject);
        }

        if !self.db(from).contains(key) {
            return Err(StoreError::NoSuchKey);
        }

        if self.db(to).contains(key) {
            return Ok(false);
        }

        let Some(entry) = self.db(from).remove(key) else {
            return Err(StoreError::NoSuchKey);
        };
        self.db(to).insert_entry(key.to_string(), entry);

        Ok(true)
    }

    pub fn flush_all(&mut self) {
        for db in self.state.databases.iter_mut() {
            db.clear();
        }
    }

    /// Drops expired keys in every database and returns the earliest pending expiration.
    fn remove_expired_keys(&mut self) -> Option<u64> {
        let now = now_millis();

        self.state
            .databases
            .iter_mut()
            .filter_map(|db| db.remove_expired(now))
            .min()
    }
}

async fn remove_expired_keys(store: Arc<InnerStore>, max_idle: Duration) {
    loop {
        let next_expiration = store.lock().remove_expired_keys();

        let idle = next_expiration
            .map(|at| Duration::from_millis(at.saturating_sub(now_millis())))
            .map_or(max_idle, |until| until.min(max_idle));

        debug!("Expiry sweep sleeping for {:?}", idle);

        tokio::select! {
            _ = sleep(idle) => {}
            _ = store.waker.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn string(s: &str) -> Value {
        Value::String(Bytes::from(s.to_string()))
    }

    #[tokio::test]
    async fn sweep_removes_expired_keys() {
        let store = Store::with_sweep_interval(1, "unused.db", Duration::from_millis(10));

        {
            let mut store = store.lock();
            store.db(0).insert("key1".to_string(), string("value1"));
            store.db(0).insert("key2".to_string(), string("value2"));
            store.expire_at(0, "key1", Some(now_millis() + 20));
        }

        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut store = store.lock();
        assert_eq!(store.db(0).raw_len(), 1);
        assert!(store.db(0).contains("key2"));
    }

    #[tokio::test]
    async fn move_key_between_databases() {
        let store = Store::new(2, "unused.db");
        let mut store = store.lock();

        store.db(0).insert("k".to_string(), string("v"));
        store.expire_at(0, "k", Some(now_millis() + 60_000));

        assert!(store.move_key(0, "k", 1).unwrap());
        assert!(!store.db(0).contains("k"));
        assert_eq!(store.db(1).get_string("k").unwrap(), Some(Bytes::from("v")));
        assert!(store.db(1).ttl("k") > 0);
    }

    #[tokio::test]
    async fn move_key_fails_when_destination_holds_key() {
        let store = Store::new(2, "unused.db");
        let mut store = store.lock();

        store.db(0).insert("k".to_string(), string("v0"));
        store.db(1).insert("k".to_string(), string("v1"));

        assert!(!store.move_key(0, "k", 1).unwrap());
        assert_eq!(store.db(0).get_string("k").unwrap(), Some(Bytes::from("v0")));
        assert_eq!(store.db(1).get_string("k").unwrap(), Some(Bytes::from("v1")));
    }

    #[tokio::test]
    async fn move_missing_key() {
        let store = Store::new(2, "unused.db");
        let mut store = store.lock();

        assert!(matches!(
            store.move_key(0, "k", 1),
            Err(StoreError::NoSuchKey)
        ));
        assert!(matches!(
            store.move_key(0, "k", 0),
            Err(StoreError::SameObject)
        ));
    }

    #[tokio::test]
    async fn db_index_bounds() {
        let store = Store::new(16, "unused.db");
        let store = store.lock();

        assert_eq!(store.db_index(0).unwrap(), 0);
        assert_eq!(store.db_index(15).unwrap(), 15);
        assert!(matches!(store.db_index(16), Err(StoreError::InvalidDbIndex)));
        assert!(matches!(store.db_index(-1), Err(StoreError::InvalidDbIndex)));
    }

    #[tokio::test]
    async fn flush_all_clears_every_database() {
        let store = Store::new(3, "unused.db");
        let mut store = store.lock();

        for index in 0..3 {
            store.db(index).insert("k".to_string(), string("v"));
        }

        store.flush_all();

        for index in 0..3 {
            assert_eq!(store.db(index).len(), 0);
        }
    }
}
