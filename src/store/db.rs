use glob_match::glob_match;
use rand::seq::IteratorRandom;
use std::collections::{BTreeSet, HashMap};

use crate::store::{now_millis, Entry, StoreError, Value};

/// One logical database: a map from key to entry.
///
/// Every lookup checks the entry's expiration first and drops it when it is due, so an expired
/// key is never observable no matter whether the background sweep already ran.
#[derive(Debug, Default)]
pub struct Database {
    entries: HashMap<String, Entry>,
    // Pending expirations, `(expires_at, key)`, one per entry that has an expiration. Every
    // path that replaces, removes or re-times an entry updates it.
    expirations: BTreeSet<(u64, String)>,
}

impl Database {
    pub fn new() -> Database {
        Database::default()
    }

    fn purge_if_expired(&mut self, key: &str) {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(now_millis()));

        if expired {
            self.remove_entry(key);
        }
    }

    /// Removes `key` from both the map and the expiration index.
    fn remove_entry(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.forget_expiration(key, &entry);
        Some(entry)
    }

    fn forget_expiration(&mut self, key: &str, entry: &Entry) {
        if let Some(at) = entry.expires_at {
            self.expirations.remove(&(at, key.to_string()));
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&Entry> {
        self.purge_if_expired(key);
        self.entries.get(key)
    }

    // Private: changing `expires_at` through it would bypass the expiration index.
    fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.purge_if_expired(key);
        self.entries.get_mut(key)
    }

    pub fn value(&mut self, key: &str) -> Option<&Value> {
        self.get(key).map(|entry| &entry.value)
    }

    pub fn value_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Returns the value under `key`, creating it with `default` when the key is absent.
    pub fn value_or_insert_with(
        &mut self,
        key: &str,
        default: impl FnOnce() -> Value,
    ) -> &mut Value {
        self.purge_if_expired(key);
        &mut self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(default()))
            .value
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Stores `value` under `key`, replacing whatever was there, expiration included.
    pub fn insert(&mut self, key: String, value: Value) {
        self.insert_entry(key, Entry::new(value));
    }

    /// Stores a whole entry, keeping its expiration.
    pub fn insert_entry(&mut self, key: String, entry: Entry) {
        self.remove_entry(&key);
        if let Some(at) = entry.expires_at {
            self.expirations.insert((at, key.clone()));
        }
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.purge_if_expired(key);
        self.remove_entry(key)
    }

    /// Drops `key` if it holds a collection that became empty.
    pub fn remove_if_empty(&mut self, key: &str) {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.value.is_empty_collection())
        {
            self.remove_entry(key);
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = now_millis();
        self.entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored entries, including expired ones not reclaimed yet.
    pub fn raw_len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.expirations.clear();
    }

    /// Live entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> + '_ {
        let now = now_millis();
        self.entries
            .iter()
            .filter(move |(_, entry)| !entry.is_expired(now))
    }

    /// Live keys matching a glob-style `pattern`, sorted.
    pub fn keys(&self, pattern: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .iter()
            .map(|(key, _)| key)
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        keys.sort();
        keys
    }

    pub fn random_key(&self) -> Option<String> {
        self.iter()
            .map(|(key, _)| key)
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    /// Renames `from` to `to`, overwriting `to`. The entry keeps its expiration.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        let entry = self.remove(from).ok_or(StoreError::NoSuchKey)?;
        self.insert_entry(to.to_string(), entry);
        Ok(())
    }

    /// Like `rename`, but leaves both keys untouched when `to` already exists.
    pub fn rename_nx(&mut self, from: &str, to: &str) -> Result<bool, StoreError> {
        if !self.contains(from) {
            return Err(StoreError::NoSuchKey);
        }

        if self.contains(to) {
            return Ok(false);
        }

        self.rename(from, to)?;
        Ok(true)
    }

    /// Sets or clears the expiration of `key`. Returns whether the key exists.
    ///
    /// An expiration at or before now deletes the key right away.
    pub fn set_expire(&mut self, key: &str, at: Option<u64>) -> bool {
        let Some(entry) = self.get_mut(key) else {
            return false;
        };

        let previous = std::mem::replace(&mut entry.expires_at, at);
        if let Some(previous) = previous {
            self.expirations.remove(&(previous, key.to_string()));
        }

        match at {
            Some(at) if at <= now_millis() => {
                self.entries.remove(key);
            }
            Some(at) => {
                self.expirations.insert((at, key.to_string()));
            }
            None => {}
        }

        true
    }

    /// Remaining time to live in milliseconds; `-1` for a key without expiration and `-2` for
    /// a missing key.
    pub fn ttl(&mut self, key: &str) -> i64 {
        match self.get(key) {
            None => -2,
            Some(Entry {
                expires_at: None, ..
            }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => at.saturating_sub(now_millis()) as i64,
        }
    }

    /// Removes every entry whose expiration passed. Returns the next pending expiration.
    pub(crate) fn remove_expired(&mut self, now: u64) -> Option<u64> {
        while let Some(&(at, _)) = self.expirations.first() {
            if at > now {
                return Some(at);
            }

            if let Some((_, key)) = self.expirations.pop_first() {
                self.entries.remove(&key);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::VecDeque;

    fn string(s: &str) -> Value {
        Value::String(Bytes::from(s.to_string()))
    }

    #[test]
    fn expired_keys_are_absent() {
        let mut db = Database::new();
        db.insert("key".to_string(), string("value"));
        db.insert_entry(
            "old".to_string(),
            Entry {
                value: string("value"),
                expires_at: Some(now_millis() - 1),
            },
        );

        assert!(!db.contains("old"));
        assert!(db.value("old").is_none());
        assert_eq!(db.ttl("old"), -2);
        assert_eq!(db.len(), 1);
        assert_eq!(db.keys("*"), vec!["key".to_string()]);
    }

    #[test]
    fn set_expire_in_the_past_deletes() {
        let mut db = Database::new();
        db.insert("key".to_string(), string("value"));

        assert!(db.set_expire("key", Some(now_millis() - 1000)));
        assert!(!db.contains("key"));
        assert!(!db.set_expire("key", Some(now_millis() + 1000)));
    }

    #[test]
    fn ttl_reports_remaining_millis() {
        let mut db = Database::new();
        db.insert("key".to_string(), string("value"));

        assert_eq!(db.ttl("key"), -1);
        assert_eq!(db.ttl("missing"), -2);

        db.set_expire("key", Some(now_millis() + 10_000));
        let ttl = db.ttl("key");
        assert!(ttl > 9_000 && ttl <= 10_000);

        db.set_expire("key", None);
        assert_eq!(db.ttl("key"), -1);
    }

    #[test]
    fn overwrite_clears_expiration() {
        let mut db = Database::new();
        db.insert("key".to_string(), string("value"));
        db.set_expire("key", Some(now_millis() + 10_000));

        db.insert("key".to_string(), string("other"));

        assert_eq!(db.ttl("key"), -1);
    }

    #[test]
    fn keys_with_pattern() {
        let mut db = Database::new();
        for key in ["one", "two", "three", "four"] {
            db.insert(key.to_string(), string("x"));
        }

        assert_eq!(db.keys("t*"), vec!["three".to_string(), "two".to_string()]);
        assert_eq!(db.keys("?ne"), vec!["one".to_string()]);
        assert_eq!(db.keys("*").len(), 4);
        assert!(db.keys("z*").is_empty());
    }

    #[test]
    fn random_key() {
        let mut db = Database::new();
        assert_eq!(db.random_key(), None);

        db.insert("only".to_string(), string("x"));
        assert_eq!(db.random_key(), Some("only".to_string()));
    }

    #[test]
    fn rename_keeps_value_and_ttl() {
        let mut db = Database::new();
        db.insert("a".to_string(), Value::List(VecDeque::from([Bytes::from("x")])));
        db.set_expire("a", Some(now_millis() + 10_000));
        db.insert("b".to_string(), string("old"));

        db.rename("a", "b").unwrap();

        assert!(!db.contains("a"));
        assert_eq!(db.value("b").unwrap().type_name(), "list");
        assert!(db.ttl("b") > 0);
    }

    #[test]
    fn rename_missing_source() {
        let mut db = Database::new();

        assert!(matches!(db.rename("a", "b"), Err(StoreError::NoSuchKey)));
        assert!(matches!(db.rename_nx("a", "b"), Err(StoreError::NoSuchKey)));
    }

    #[test]
    fn rename_nx_refuses_existing_destination() {
        let mut db = Database::new();
        db.insert("a".to_string(), string("1"));
        db.insert("b".to_string(), string("2"));

        assert!(!db.rename_nx("a", "b").unwrap());
        assert!(db.contains("a"));

        db.remove("b");
        assert!(db.rename_nx("a", "b").unwrap());
        assert!(!db.contains("a"));
    }

    #[test]
    fn remove_expired_drops_due_keys_only() {
        let mut db = Database::new();
        let now = now_millis();

        db.insert("replaced".to_string(), string("x"));
        db.set_expire("replaced", Some(now + 50));
        // A later write replaced the expiring entry.
        db.insert("replaced".to_string(), string("y"));

        db.insert("due".to_string(), string("x"));
        db.set_expire("due", Some(now + 60));

        db.insert("later".to_string(), string("x"));
        db.set_expire("later", Some(now + 10_000));

        let next = db.remove_expired(now + 100);

        assert_eq!(next, Some(now + 10_000));
        assert_eq!(db.raw_len(), 2);
        assert!(db.contains("replaced"));
        assert!(db.contains("later"));
    }

    #[test]
    fn expiration_index_holds_one_hint_per_key() {
        let mut db = Database::new();
        let base = now_millis() + 60_000;

        db.insert("session".to_string(), string("x"));
        for offset in 0..1_000 {
            db.set_expire("session", Some(base + offset));
        }
        assert_eq!(db.expirations.len(), 1);

        db.set_expire("session", None);
        assert!(db.expirations.is_empty());

        db.set_expire("session", Some(base));
        db.remove("session");
        assert!(db.expirations.is_empty());

        db.insert("a".to_string(), string("x"));
        db.set_expire("a", Some(base));
        db.insert("a".to_string(), string("y"));
        assert!(db.expirations.is_empty());

        db.set_expire("a", Some(base));
        db.rename("a", "b").unwrap();
        assert_eq!(db.expirations.len(), 1);
        assert!(db.expirations.contains(&(base, "b".to_string())));

        db.insert("c".to_string(), string("x"));
        db.set_expire("c", Some(base + 1));
        db.rename("c", "b").unwrap();
        assert_eq!(
            db.expirations.iter().collect::<Vec<_>>(),
            vec![&(base + 1, "b".to_string())]
        );
    }

    #[test]
    fn emptied_collection_drops_its_hint() {
        let mut db = Database::new();
        db.insert(
            "list".to_string(),
            Value::List(VecDeque::from([Bytes::from("x")])),
        );
        db.set_expire("list", Some(now_millis() + 60_000));

        db.pop("list", crate::store::End::Head).unwrap();

        assert!(!db.contains("list"));
        assert!(db.expirations.is_empty());
    }

    #[test]
    fn lazily_expired_key_drops_its_hint() {
        let mut db = Database::new();
        db.insert_entry(
            "old".to_string(),
            Entry {
                value: string("x"),
                expires_at: Some(now_millis() - 1),
            },
        );
        assert_eq!(db.expirations.len(), 1);

        assert!(!db.contains("old"));
        assert!(db.expirations.is_empty());
    }
}
