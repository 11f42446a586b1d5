use bytes::{Bytes, BytesMut};

use crate::store::{Database, StoreError, Value};

impl Database {
    /// The string stored at `key`, if any.
    pub fn get_string(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.value(key)
            .map(|value| value.as_string().cloned())
            .transpose()
    }

    pub fn set(&mut self, key: String, value: Bytes) {
        self.insert(key, Value::String(value));
    }

    /// Sets `key` and returns its previous string value.
    pub fn get_set(&mut self, key: &str, value: Bytes) -> Result<Option<Bytes>, StoreError> {
        let previous = self.get_string(key)?;
        self.set(key.to_string(), value);
        Ok(previous)
    }

    /// Sets `key` only when it does not exist yet.
    pub fn set_nx(&mut self, key: &str, value: Bytes) -> bool {
        if self.contains(key) {
            return false;
        }
        self.set(key.to_string(), value);
        true
    }

    /// Values for each key. Missing keys, and keys holding anything but a string, yield `None`.
    pub fn mget(&mut self, keys: &[String]) -> Vec<Option<Bytes>> {
        keys.iter()
            .map(|key| self.get_string(key).ok().flatten())
            .collect()
    }

    pub fn mset(&mut self, pairs: Vec<(String, Bytes)>) {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }

    /// Sets all pairs, or none of them if any key already exists.
    pub fn mset_nx(&mut self, pairs: Vec<(String, Bytes)>) -> bool {
        if pairs.iter().any(|(key, _)| self.contains(key)) {
            return false;
        }
        self.mset(pairs);
        true
    }

    /// Appends to the string at `key`, creating it when missing. Returns the new length.
    pub fn append(&mut self, key: &str, suffix: &[u8]) -> Result<usize, StoreError> {
        let current = self
            .value_or_insert_with(key, || Value::String(Bytes::new()))
            .as_string_mut()?;

        let mut appended = BytesMut::with_capacity(current.len() + suffix.len());
        appended.extend_from_slice(&current[..]);
        appended.extend_from_slice(suffix);
        *current = appended.freeze();

        Ok(current.len())
    }

    /// Adds `increment` to the integer stored at `key`, starting from zero when the key is
    /// missing. The expiration of an existing key is kept.
    pub fn incr_by(&mut self, key: &str, increment: i64) -> Result<i64, StoreError> {
        let current = match self.value_mut(key) {
            Some(value) => parse_integer(value.as_string()?)?,
            None => 0,
        };

        let updated = current
            .checked_add(increment)
            .ok_or(StoreError::Overflow)?;
        let encoded = Bytes::from(updated.to_string());

        match self.value_mut(key) {
            Some(value) => *value = Value::String(encoded),
            None => self.set(key.to_string(), encoded),
        }

        Ok(updated)
    }
}

fn parse_integer(bytes: &[u8]) -> Result<i64, StoreError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(StoreError::NotAnInteger)
}
