//! In-memory block store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;

use super::BlockStore;
use crate::block::{Block, BlockKey};
use crate::error::{CoreError, DatabaseError, Result};

#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: Mutex<BTreeMap<BlockKey, Block>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upsert fail until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful upserts so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<BlockKey, Block>>> {
        self.blocks
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Locked))
    }
}

impl BlockStore for MemoryStore {
    fn upsert(&self, block: &Block) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Database(DatabaseError::QueryFailed(
                "simulated write failure".to_string(),
            )));
        }
        self.guard()?.insert(block.key(), block.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn fetch_day(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Block>> {
        Ok(self
            .guard()?
            .values()
            .filter(|b| b.user_id == user_id && b.date == date)
            .cloned()
            .collect())
    }

    fn fetch_block(&self, user_id: &str, date: NaiveDate, block_index: u8) -> Result<Option<Block>> {
        let key = BlockKey {
            user_id: user_id.to_string(),
            date,
            block_index,
        };
        Ok(self.guard()?.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn upsert_replaces_by_natural_key() {
        let store = MemoryStore::new();
        let mut block = Block::idle("u", date(), 9);
        store.upsert(&block).unwrap();
        block.note = Some("review".into());
        store.upsert(&block).unwrap();
        assert_eq!(store.len(), 1);
        let fetched = store.fetch_block("u", date(), 9).unwrap().unwrap();
        assert_eq!(fetched.note.as_deref(), Some("review"));
    }

    #[test]
    fn fetch_day_filters_user_and_date() {
        let store = MemoryStore::new();
        store.upsert(&Block::idle("u", date(), 1)).unwrap();
        store.upsert(&Block::idle("other", date(), 1)).unwrap();
        store
            .upsert(&Block::idle("u", date().succ_opt().unwrap(), 1))
            .unwrap();
        assert_eq!(store.fetch_day("u", date()).unwrap().len(), 1);
    }

    #[test]
    fn failing_writes_leave_store_untouched() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.upsert(&Block::idle("u", date(), 1)).is_err());
        assert!(store.is_empty());
        store.set_fail_writes(false);
        store.upsert(&Block::idle("u", date(), 1)).unwrap();
        assert_eq!(store.write_count(), 1);
    }
}
