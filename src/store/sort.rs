use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::store::zsets::parse_score;
use crate::store::{Database, StoreError, Value};

/// Modifiers accepted by `SORT`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortOptions {
    /// Pattern whose `*` is replaced by each element to find the key holding its weight.
    pub by: Option<String>,
    /// Patterns looked up the same way, one output field per element each. `#` is the
    /// element itself.
    pub get: Vec<String>,
    pub desc: bool,
    pub alpha: bool,
    /// `(offset, count)`, applied after sorting. A negative count means no limit.
    pub limit: Option<(i64, i64)>,
}

impl SortOptions {
    fn sorts(&self) -> bool {
        self.by.as_ref().map_or(true, |pattern| pattern.contains('*'))
    }
}

fn substitute(pattern: &str, element: &[u8]) -> String {
    pattern.replacen('*', &String::from_utf8_lossy(element), 1)
}

enum Weight {
    Alpha(Bytes),
    Numeric(f64),
}

impl Weight {
    fn compare(&self, other: &Weight) -> Ordering {
        match (self, other) {
            (Weight::Alpha(a), Weight::Alpha(b)) => a.cmp(b),
            (Weight::Numeric(a), Weight::Numeric(b)) => a.total_cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl Database {
    fn sort_input(&mut self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        match self.value(key) {
            None => Ok(vec![]),
            Some(Value::List(list)) => Ok(list.iter().cloned().collect()),
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn weight(&mut self, element: &Bytes, options: &SortOptions) -> Result<Weight, StoreError> {
        let raw = match &options.by {
            Some(pattern) => self
                .get_string(&substitute(pattern, element))
                .ok()
                .flatten(),
            None => Some(element.clone()),
        };

        if options.alpha {
            return Ok(Weight::Alpha(raw.unwrap_or_default()));
        }

        let Some(raw) = raw else {
            return Ok(Weight::Numeric(0.0));
        };

        std::str::from_utf8(&raw)
            .ok()
            .and_then(parse_score)
            .map(Weight::Numeric)
            .ok_or(StoreError::SortNotANumber)
    }

    fn lookup(&mut self, pattern: &str, element: &Bytes) -> Option<Bytes> {
        if pattern == "#" {
            return Some(element.clone());
        }
        self.get_string(&substitute(pattern, element)).ok().flatten()
    }

    /// Sorts the list or set stored at `key`. Each element yields one field, or one field per
    /// `GET` pattern when there are any; fields whose key is missing are `None`.
    pub fn sort(
        &mut self,
        key: &str,
        options: &SortOptions,
    ) -> Result<Vec<Option<Bytes>>, StoreError> {
        let mut elements = self.sort_input(key)?;

        if options.sorts() {
            let mut weighted = elements
                .into_iter()
                .map(|element| Ok((self.weight(&element, options)?, element)))
                .collect::<Result<Vec<_>, StoreError>>()?;

            weighted.sort_by(|(a, _), (b, _)| a.compare(b));
            elements = weighted.into_iter().map(|(_, element)| element).collect();
        }

        if options.desc {
            elements.reverse();
        }

        if let Some((offset, count)) = options.limit {
            let offset = offset.max(0) as usize;
            let count = usize::try_from(count).unwrap_or(usize::MAX);
            elements = elements.into_iter().skip(offset).take(count).collect();
        }

        if options.get.is_empty() {
            return Ok(elements.into_iter().map(Some).collect());
        }

        Ok(elements
            .iter()
            .flat_map(|element| {
                options
                    .get
                    .iter()
                    .map(|pattern| self.lookup(pattern, element))
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    /// Like `sort`, but stores the fields as a list under `destination`, replacing it.
    /// Missing fields are stored as empty strings. Returns the length of the stored list.
    pub fn sort_store(
        &mut self,
        key: &str,
        options: &SortOptions,
        destination: &str,
    ) -> Result<usize, StoreError> {
        let sorted: VecDeque<Bytes> = self
            .sort(key, options)?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let len = sorted.len();

        if sorted.is_empty() {
            self.remove(destination);
        } else {
            self.insert(destination.to_string(), Value::List(sorted));
        }

        Ok(len)
    }
}
