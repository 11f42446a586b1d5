use bytes::Bytes;
use std::collections::VecDeque;

use crate::store::{Database, StoreError, Value};

/// Which side of a list an operation works on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum End {
    Head,
    Tail,
}

/// Resolves an inclusive `start..=end` range given with possibly negative (from the tail)
/// indexes against a sequence of `len` elements. Out of range bounds are clamped; `None` means
/// the range selects nothing.
pub(crate) fn normalize_range(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;

    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };

    if start > end || start >= len {
        return None;
    }

    Some((start as usize, end as usize))
}

impl Database {
    fn list(&mut self, key: &str) -> Result<Option<&VecDeque<Bytes>>, StoreError> {
        self.value(key).map(Value::as_list).transpose()
    }

    fn list_mut(&mut self, key: &str) -> Result<Option<&mut VecDeque<Bytes>>, StoreError> {
        self.value_mut(key).map(Value::as_list_mut).transpose()
    }

    /// Pushes `value` to one end of the list, creating it when missing. Returns the new
    /// length.
    pub fn push(&mut self, key: &str, value: Bytes, end: End) -> Result<usize, StoreError> {
        let list = self
            .value_or_insert_with(key, || Value::List(VecDeque::new()))
            .as_list_mut()?;

        match end {
            End::Head => list.push_front(value),
            End::Tail => list.push_back(value),
        }

        Ok(list.len())
    }

    pub fn llen(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.list(key)?.map_or(0, VecDeque::len))
    }

    pub fn lrange(&mut self, key: &str, start: i64, end: i64) -> Result<Vec<Bytes>, StoreError> {
        let Some(list) = self.list(key)? else {
            return Ok(vec![]);
        };

        let range = match normalize_range(start, end, list.len()) {
            Some((start, end)) => list.range(start..=end).cloned().collect(),
            None => vec![],
        };

        Ok(range)
    }

    /// Keeps only the elements in `start..=end`. An empty result removes the key.
    pub fn ltrim(&mut self, key: &str, start: i64, end: i64) -> Result<(), StoreError> {
        let Some(list) = self.list_mut(key)? else {
            return Ok(());
        };

        match normalize_range(start, end, list.len()) {
            Some((start, end)) => {
                list.truncate(end + 1);
                list.drain(..start);
            }
            None => list.clear(),
        }

        self.remove_if_empty(key);
        Ok(())
    }

    pub fn lindex(&mut self, key: &str, index: i64) -> Result<Option<Bytes>, StoreError> {
        let Some(list) = self.list(key)? else {
            return Ok(None);
        };

        Ok(resolve_index(index, list.len()).and_then(|index| list.get(index).cloned()))
    }

    pub fn lset(&mut self, key: &str, index: i64, value: Bytes) -> Result<(), StoreError> {
        let list = self.list_mut(key)?.ok_or(StoreError::NoSuchKey)?;

        let slot = resolve_index(index, list.len())
            .and_then(|index| list.get_mut(index))
            .ok_or(StoreError::IndexOutOfRange)?;

        *slot = value;
        Ok(())
    }

    /// Removes elements equal to `value`: the first `count` from the head when positive, the
    /// first `|count|` from the tail when negative, all of them when zero. Returns how many
    /// were removed.
    pub fn lrem(&mut self, key: &str, count: i64, value: &[u8]) -> Result<usize, StoreError> {
        let Some(list) = self.list_mut(key)? else {
            return Ok(0);
        };

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };

        let mut removed = 0;
        let mut kept = VecDeque::with_capacity(list.len());

        if count >= 0 {
            for item in list.drain(..) {
                if removed < limit && item == value {
                    removed += 1;
                } else {
                    kept.push_back(item);
                }
            }
        } else {
            for item in list.drain(..).rev() {
                if removed < limit && item == value {
                    removed += 1;
                } else {
                    kept.push_front(item);
                }
            }
        }

        *list = kept;
        self.remove_if_empty(key);

        Ok(removed)
    }

    pub fn pop(&mut self, key: &str, end: End) -> Result<Option<Bytes>, StoreError> {
        let Some(list) = self.list_mut(key)? else {
            return Ok(None);
        };

        let popped = match end {
            End::Head => list.pop_front(),
            End::Tail => list.pop_back(),
        };

        self.remove_if_empty(key);
        Ok(popped)
    }

    /// Atomically pops the tail of `source` and pushes it onto the head of `destination`.
    pub fn rpoplpush(
        &mut self,
        source: &str,
        destination: &str,
    ) -> Result<Option<Bytes>, StoreError> {
        // Both types are checked before anything moves.
        self.list(destination)?;
        if self.list(source)?.is_none() {
            return Ok(None);
        }

        let Some(value) = self.pop(source, End::Tail)? else {
            return Ok(None);
        };

        self.push(destination, value.clone(), End::Head)?;
        Ok(Some(value))
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };

    (0..len).contains(&index).then_some(index as usize)
}
