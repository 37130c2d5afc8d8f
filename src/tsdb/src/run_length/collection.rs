use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, TsdbError};
use crate::run_length::TsItem;

/// RunCollection is the document store holding run documents, indexed by
/// `start_time`.
pub trait RunCollection: Send + Sync {
    /// latest returns the document with the greatest `start_time`, the most
    /// recently inserted one on ties.
    fn latest(&self) -> Result<Option<TsItem>>;

    fn insert(&self, item: &TsItem) -> Result<()>;

    fn update(&self, item: &TsItem) -> Result<()>;

    /// find_started_between returns the documents with `start_time` in
    /// `[start, end)` and `last_timestamp >= start`, ordered by `start_time`.
    fn find_started_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TsItem>>;

    fn count(&self) -> Result<u64>;
}

/// Documents sharing a `start_time` are ordered by insertion.
#[derive(Default)]
struct Documents {
    by_start: BTreeMap<(DateTime<Utc>, u64), TsItem>,
    key_of: HashMap<Uuid, (DateTime<Utc>, u64)>,
    next_seq: u64,
}

/// MemoryCollection keeps run documents in process memory.
#[derive(Default)]
pub struct MemoryCollection {
    docs: RwLock<Documents>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunCollection for MemoryCollection {
    fn latest(&self) -> Result<Option<TsItem>> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.by_start.values().next_back().cloned())
    }

    fn insert(&self, item: &TsItem) -> Result<()> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        if docs.key_of.contains_key(&item.id) {
            return Err(TsdbError::Collection(format!(
                "document {} already exists",
                item.id
            )));
        }

        let key = (item.start_time, docs.next_seq);
        docs.next_seq += 1;
        docs.key_of.insert(item.id, key);
        docs.by_start.insert(key, item.clone());
        Ok(())
    }

    fn update(&self, item: &TsItem) -> Result<()> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let (start, seq) = match docs.key_of.get(&item.id) {
            Some(key) => *key,
            None => {
                return Err(TsdbError::Collection(format!(
                    "document {} not found",
                    item.id
                )))
            }
        };

        docs.by_start.remove(&(start, seq));
        let key = (item.start_time, seq);
        docs.key_of.insert(item.id, key);
        docs.by_start.insert(key, item.clone());
        Ok(())
    }

    fn find_started_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TsItem>> {
        if start >= end {
            return Ok(vec![]);
        }

        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        let found = docs
            .by_start
            .range((start, 0_u64)..)
            .take_while(|((s, _), _)| *s < end)
            .map(|(_, item)| item)
            .filter(|item| item.last_timestamp >= start)
            .cloned()
            .collect();
        Ok(found)
    }

    fn count(&self) -> Result<u64> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(docs.by_start.len() as u64)
    }
}
