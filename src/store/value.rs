use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use strum_macros::IntoStaticStr;

use crate::store::StoreError;

/// A typed value held under a key.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    #[strum(serialize = "zset")]
    SortedSet(SortedSet),
}

impl Value {
    /// Name reported by `TYPE`.
    pub fn type_name(&self) -> &'static str {
        self.into()
    }

    /// Collections are dropped from the keyspace once their last element goes away.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::String(_) => false,
            Value::List(list) => list.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::SortedSet(zset) => zset.is_empty(),
        }
    }

    pub fn as_string(&self) -> Result<&Bytes, StoreError> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_string_mut(&mut self) -> Result<&mut Bytes, StoreError> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_list(&self) -> Result<&VecDeque<Bytes>, StoreError> {
        match self {
            Value::List(list) => Ok(list),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_list_mut(&mut self) -> Result<&mut VecDeque<Bytes>, StoreError> {
        match self {
            Value::List(list) => Ok(list),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_set(&self) -> Result<&HashSet<Bytes>, StoreError> {
        match self {
            Value::Set(set) => Ok(set),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_set_mut(&mut self) -> Result<&mut HashSet<Bytes>, StoreError> {
        match self {
            Value::Set(set) => Ok(set),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_sorted_set(&self) -> Result<&SortedSet, StoreError> {
        match self {
            Value::SortedSet(zset) => Ok(zset),
            _ => Err(StoreError::WrongType),
        }
    }

    pub fn as_sorted_set_mut(&mut self) -> Result<&mut SortedSet, StoreError> {
        match self {
            Value::SortedSet(zset) => Ok(zset),
            _ => Err(StoreError::WrongType),
        }
    }
}

/// A value plus its optional expiration, as an absolute unix time in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<u64>,
}

impl Entry {
    pub fn new(value: Value) -> Entry {
        Entry {
            value,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Members unique by name, ordered by `(score, member)`.
///
/// Scores are looked up through the map, ordered traversal goes through the tree. Both are
/// kept in sync by every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
    ordered: BTreeSet<(OrderedFloat<f64>, Bytes)>,
}

impl SortedSet {
    pub fn new() -> SortedSet {
        SortedSet::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Inserts `member` or moves it to `score`. Returns whether the member is new.
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        match self.scores.insert(member.clone(), score) {
            Some(previous) => {
                self.ordered.remove(&(OrderedFloat(previous), member.clone()));
                self.ordered.insert((OrderedFloat(score), member));
                false
            }
            None => {
                self.ordered.insert((OrderedFloat(score), member));
                true
            }
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered
                    .remove(&(OrderedFloat(score), Bytes::copy_from_slice(member)));
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Zero based position of `member` in ascending order.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.ordered
            .iter()
            .position(|(s, m)| s.0 == score && m.as_ref() == member)
    }

    /// Members in ascending `(score, member)` order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Bytes, f64)> + '_ {
        self.ordered.iter().map(|(score, member)| (member, score.0))
    }
}
