use bytes::Bytes;

use crate::store::lists::normalize_range;
use crate::store::{Database, SortedSet, StoreError, Value};

/// One end of a score interval, as given to `ZRANGEBYSCORE` and friends.
///
/// Bounds are inclusive unless written with a leading `(`. `-inf` and `+inf` are accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> ScoreBound {
        ScoreBound {
            value,
            exclusive: false,
        }
    }

    /// Parses a bound, `None` when it is not a valid number.
    pub fn parse(s: &str) -> Option<ScoreBound> {
        let (exclusive, number) = match s.strip_prefix('(') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let value = parse_score(number)?;

        Some(ScoreBound { value, exclusive })
    }

    fn below(&self, score: f64) -> bool {
        if self.exclusive {
            self.value < score
        } else {
            self.value <= score
        }
    }

    fn above(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

/// Parses a score, accepting `inf`, `+inf` and `-inf` but rejecting NaN.
pub fn parse_score(s: &str) -> Option<f64> {
    let value = match s.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        other => other.parse::<f64>().ok()?,
    };

    (!value.is_nan()).then_some(value)
}

fn in_range(score: f64, min: &ScoreBound, max: &ScoreBound) -> bool {
    min.below(score) && max.above(score)
}

impl Database {
    fn sorted_set(&mut self, key: &str) -> Result<Option<&SortedSet>, StoreError> {
        self.value(key).map(Value::as_sorted_set).transpose()
    }

    fn sorted_set_mut(&mut self, key: &str) -> Result<Option<&mut SortedSet>, StoreError> {
        self.value_mut(key).map(Value::as_sorted_set_mut).transpose()
    }

    /// Adds `member` with `score`, or updates its score. Returns whether it was new.
    pub fn zadd(&mut self, key: &str, score: f64, member: Bytes) -> Result<bool, StoreError> {
        if score.is_nan() {
            return Err(StoreError::NanScore);
        }

        let zset = self
            .value_or_insert_with(key, || Value::SortedSet(SortedSet::new()))
            .as_sorted_set_mut()?;

        Ok(zset.insert(member, score))
    }

    /// Adds `delta` to the score of `member`, which starts at zero when absent. Returns the
    /// new score.
    pub fn zincrby(&mut self, key: &str, delta: f64, member: Bytes) -> Result<f64, StoreError> {
        let current = self
            .sorted_set(key)?
            .and_then(|zset| zset.score(&member))
            .unwrap_or(0.0);

        let score = current + delta;
        if score.is_nan() {
            return Err(StoreError::NanScore);
        }

        self.zadd(key, score, member)?;
        Ok(score)
    }

    pub fn zrem(&mut self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let Some(zset) = self.sorted_set_mut(key)? else {
            return Ok(false);
        };

        let removed = zset.remove(member);
        self.remove_if_empty(key);

        Ok(removed)
    }

    /// Members between ranks `start` and `end`, inclusive, in ascending order or descending
    /// when `rev` is set. Ranks follow the same rules as list indexes.
    pub fn zrange(
        &mut self,
        key: &str,
        start: i64,
        end: i64,
        rev: bool,
    ) -> Result<Vec<(Bytes, f64)>, StoreError> {
        let Some(zset) = self.sorted_set(key)? else {
            return Ok(vec![]);
        };

        let Some((start, end)) = normalize_range(start, end, zset.len()) else {
            return Ok(vec![]);
        };

        let members = zset.iter().map(|(member, score)| (member.clone(), score));
        let range = if rev {
            members.rev().skip(start).take(end - start + 1).collect()
        } else {
            members.skip(start).take(end - start + 1).collect()
        };

        Ok(range)
    }

    /// Members whose score lies between `min` and `max`, ascending. `offset` members are
    /// skipped and at most `count` returned.
    pub fn zrange_by_score(
        &mut self,
        key: &str,
        min: &ScoreBound,
        max: &ScoreBound,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Vec<(Bytes, f64)>, StoreError> {
        let Some(zset) = self.sorted_set(key)? else {
            return Ok(vec![]);
        };

        Ok(zset
            .iter()
            .skip_while(|(_, score)| !min.below(*score))
            .take_while(|(_, score)| max.above(*score))
            .skip(offset)
            .take(count.unwrap_or(usize::MAX))
            .map(|(member, score)| (member.clone(), score))
            .collect())
    }

    pub fn zcount(
        &mut self,
        key: &str,
        min: &ScoreBound,
        max: &ScoreBound,
    ) -> Result<usize, StoreError> {
        Ok(self.sorted_set(key)?.map_or(0, |zset| {
            zset.iter()
                .filter(|(_, score)| in_range(*score, min, max))
                .count()
        }))
    }

    /// Removes members whose score lies between `min` and `max`. Returns how many were
    /// removed.
    pub fn zrem_range_by_score(
        &mut self,
        key: &str,
        min: &ScoreBound,
        max: &ScoreBound,
    ) -> Result<usize, StoreError> {
        let Some(zset) = self.sorted_set_mut(key)? else {
            return Ok(0);
        };

        let doomed: Vec<Bytes> = zset
            .iter()
            .filter(|(_, score)| in_range(*score, min, max))
            .map(|(member, _)| member.clone())
            .collect();

        for member in &doomed {
            zset.remove(member);
        }

        self.remove_if_empty(key);
        Ok(doomed.len())
    }

    /// Removes members between ranks `start` and `end`, inclusive. Returns how many were
    /// removed.
    pub fn zrem_range_by_rank(
        &mut self,
        key: &str,
        start: i64,
        end: i64,
    ) -> Result<usize, StoreError> {
        let doomed = self.zrange(key, start, end, false)?;

        if let Some(zset) = self.sorted_set_mut(key)? {
            for (member, _) in &doomed {
                zset.remove(member);
            }
        }

        self.remove_if_empty(key);
        Ok(doomed.len())
    }

    pub fn zcard(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.sorted_set(key)?.map_or(0, SortedSet::len))
    }

    pub fn zscore(&mut self, key: &str, member: &[u8]) -> Result<Option<f64>, StoreError> {
        Ok(self.sorted_set(key)?.and_then(|zset| zset.score(member)))
    }

    /// Zero based rank of `member`, counted from the highest score when `rev` is set.
    pub fn zrank(
        &mut self,
        key: &str,
        member: &[u8],
        rev: bool,
    ) -> Result<Option<usize>, StoreError> {
        let Some(zset) = self.sorted_set(key)? else {
            return Ok(None);
        };

        Ok(zset
            .rank(member)
            .map(|rank| if rev { zset.len() - 1 - rank } else { rank }))
    }
}
