use bytes::Bytes;
use rand::seq::IteratorRandom;
use std::collections::HashSet;

use crate::store::{Database, StoreError, Value};

/// How `set_op` combines its input sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetOp {
    Inter,
    Union,
    Diff,
}

impl Database {
    fn members(&mut self, key: &str) -> Result<Option<&HashSet<Bytes>>, StoreError> {
        self.value(key).map(Value::as_set).transpose()
    }

    fn members_mut(&mut self, key: &str) -> Result<Option<&mut HashSet<Bytes>>, StoreError> {
        self.value_mut(key).map(Value::as_set_mut).transpose()
    }

    /// Adds `member`, creating the set when missing. Returns whether it was new.
    pub fn sadd(&mut self, key: &str, member: Bytes) -> Result<bool, StoreError> {
        let set = self
            .value_or_insert_with(key, || Value::Set(HashSet::new()))
            .as_set_mut()?;

        Ok(set.insert(member))
    }

    pub fn srem(&mut self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let Some(set) = self.members_mut(key)? else {
            return Ok(false);
        };

        let removed = set.remove(member);
        self.remove_if_empty(key);

        Ok(removed)
    }

    /// Removes and returns a random member.
    pub fn spop(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let Some(set) = self.members_mut(key)? else {
            return Ok(None);
        };

        let member = set.iter().choose(&mut rand::thread_rng()).cloned();
        if let Some(member) = &member {
            set.remove(member);
        }

        self.remove_if_empty(key);
        Ok(member)
    }

    /// A random member, left in place.
    pub fn srandmember(&mut self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self
            .members(key)?
            .and_then(|set| set.iter().choose(&mut rand::thread_rng()).cloned()))
    }

    /// Moves `member` from `source` to `destination`. Returns `false` when `source` does not
    /// contain it.
    pub fn smove(
        &mut self,
        source: &str,
        destination: &str,
        member: Bytes,
    ) -> Result<bool, StoreError> {
        // Both types are checked before anything moves.
        self.members(destination)?;
        if !self.members(source)?.is_some_and(|set| set.contains(&member)) {
            return Ok(false);
        }

        self.srem(source, &member)?;
        self.sadd(destination, member)?;

        Ok(true)
    }

    pub fn scard(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.members(key)?.map_or(0, HashSet::len))
    }

    pub fn sismember(&mut self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        Ok(self.members(key)?.is_some_and(|set| set.contains(member)))
    }

    pub fn smembers(&mut self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        Ok(self
            .members(key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Combines the sets stored at `keys`. Missing keys, and keys holding anything but a set,
    /// count as empty sets.
    pub fn set_op(&mut self, keys: &[String], op: SetOp) -> HashSet<Bytes> {
        let mut sets = keys
            .iter()
            .map(|key| self.members(key).ok().flatten().cloned().unwrap_or_default());

        let Some(first) = sets.next() else {
            return HashSet::new();
        };

        sets.fold(first, |acc, set| match op {
            SetOp::Inter => acc.intersection(&set).cloned().collect(),
            SetOp::Union => acc.union(&set).cloned().collect(),
            SetOp::Diff => acc.difference(&set).cloned().collect(),
        })
    }

    /// Stores the result of `set_op` under `destination`, replacing it. An empty result
    /// removes `destination`. Returns the size of the result.
    pub fn set_op_store(&mut self, destination: &str, keys: &[String], op: SetOp) -> usize {
        let result = self.set_op(keys, op);
        let len = result.len();

        if result.is_empty() {
            self.remove(destination);
        } else {
            self.insert(destination.to_string(), Value::Set(result));
        }

        len
    }
}
