//! In-memory storage backend
//!
//! Every transaction works on its own copy of the store map. Buckets are
//! shared behind `Arc` and copied on first write, so beginning a
//! transaction costs one map clone. Commit publishes the transaction's map
//! as the new committed state.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::rc::Rc;
use std::sync::{Arc, RwLock};

use crate::errors::{DbError, DbResult};

use super::cancel::CancellationToken;
use super::cursor::{CursorIterator, Entry, RawCursor};
use super::{Engine, IteratorOptions, Store, StoreIterator, Transaction};

#[derive(Debug, Clone, Default)]
struct Bucket {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    sequence: u64,
}

type StoreMap = BTreeMap<Vec<u8>, Arc<Bucket>>;

/// Engine keeping every store in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    committed: Arc<RwLock<StoreMap>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> StoreMap {
        match self.committed.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, stores: StoreMap) {
        match self.committed.write() {
            Ok(mut guard) => *guard = stores,
            Err(poisoned) => *poisoned.into_inner() = stores,
        }
    }
}

impl Engine for MemoryEngine {
    fn begin(&self, cancel: CancellationToken, writable: bool) -> DbResult<Box<dyn Transaction>> {
        cancel.check()?;
        let state = TxState {
            stores: self.snapshot(),
            writable,
            done: false,
            cancel,
        };
        Ok(Box::new(MemoryTransaction {
            engine: self.clone(),
            state: Rc::new(RefCell::new(state)),
        }))
    }
}

struct TxState {
    stores: StoreMap,
    writable: bool,
    done: bool,
    cancel: CancellationToken,
}

impl TxState {
    fn check(&self) -> DbResult<()> {
        if self.done {
            return Err(DbError::tx_discarded());
        }
        self.cancel.check()
    }

    fn check_writable(&self) -> DbResult<()> {
        self.check()?;
        if !self.writable {
            return Err(DbError::read_only());
        }
        Ok(())
    }

    fn bucket(&self, name: &[u8]) -> DbResult<&Bucket> {
        self.stores
            .get(name)
            .map(|b| b.as_ref())
            .ok_or_else(|| DbError::store_not_found(name))
    }

    fn bucket_mut(&mut self, name: &[u8]) -> DbResult<&mut Bucket> {
        self.stores
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| DbError::store_not_found(name))
    }
}

struct MemoryTransaction {
    engine: MemoryEngine,
    state: Rc<RefCell<TxState>>,
}

impl Transaction for MemoryTransaction {
    fn get_store(&self, name: &[u8]) -> DbResult<Box<dyn Store>> {
        let state = self.state.borrow();
        state.check()?;
        state.bucket(name)?;
        Ok(Box::new(MemoryStore {
            name: name.to_vec(),
            state: self.state.clone(),
        }))
    }

    fn create_store(&self, name: &[u8]) -> DbResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_writable()?;
        if state.stores.contains_key(name) {
            return Err(DbError::store_exists(name));
        }
        state
            .stores
            .insert(name.to_vec(), Arc::new(Bucket::default()));
        Ok(())
    }

    fn drop_store(&self, name: &[u8]) -> DbResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_writable()?;
        state
            .stores
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::store_not_found(name))
    }

    fn commit(&self) -> DbResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_writable()?;
        self.engine.publish(std::mem::take(&mut state.stores));
        state.done = true;
        Ok(())
    }

    fn rollback(&self) -> DbResult<()> {
        let mut state = self.state.borrow_mut();
        state.stores.clear();
        state.done = true;
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.state.borrow().writable
    }
}

struct MemoryStore {
    name: Vec<u8>,
    state: Rc<RefCell<TxState>>,
}

impl Store for MemoryStore {
    fn put(&self, key: &[u8], value: &[u8]) -> DbResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_writable()?;
        if key.is_empty() {
            return Err(DbError::encoding("store keys cannot be empty"));
        }
        state
            .bucket_mut(&self.name)?
            .entries
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> DbResult<Vec<u8>> {
        let state = self.state.borrow();
        state.check()?;
        state
            .bucket(&self.name)?
            .entries
            .get(key)
            .cloned()
            .ok_or_else(DbError::key_not_found)
    }

    fn delete(&self, key: &[u8]) -> DbResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_writable()?;
        let bucket = state.bucket_mut(&self.name)?;
        if !bucket.entries.contains_key(key) {
            return Err(DbError::key_not_found());
        }
        bucket.entries.remove(key);
        Ok(())
    }

    fn truncate(&self) -> DbResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_writable()?;
        let sequence = state.bucket(&self.name)?.sequence;
        // Swap in an empty bucket; snapshots keep the old one untouched
        state.stores.insert(
            self.name.clone(),
            Arc::new(Bucket {
                entries: BTreeMap::new(),
                sequence,
            }),
        );
        Ok(())
    }

    fn next_sequence(&self) -> DbResult<u64> {
        let mut state = self.state.borrow_mut();
        state.check_writable()?;
        let bucket = state.bucket_mut(&self.name)?;
        bucket.sequence += 1;
        Ok(bucket.sequence)
    }

    fn iterator(&self, opts: IteratorOptions) -> DbResult<Box<dyn StoreIterator>> {
        let state = self.state.borrow();
        state.check()?;
        state.bucket(&self.name)?;
        let cursor = MemoryCursor {
            name: self.name.clone(),
            state: self.state.clone(),
            pos: None,
        };
        Ok(Box::new(CursorIterator::new(
            cursor,
            state.cancel.clone(),
            opts.reverse,
        )))
    }
}

/// Cursor that re-seeks from its last key on every step, so writes made
/// during iteration never invalidate it
struct MemoryCursor {
    name: Vec<u8>,
    state: Rc<RefCell<TxState>>,
    pos: Option<Vec<u8>>,
}

impl MemoryCursor {
    fn step<F>(&mut self, pick: F) -> DbResult<Option<Entry>>
    where
        F: FnOnce(&BTreeMap<Vec<u8>, Vec<u8>>, Option<&[u8]>) -> Option<Entry>,
    {
        let entry = {
            let state = self.state.borrow();
            state.check()?;
            let bucket = state.bucket(&self.name)?;
            pick(&bucket.entries, self.pos.as_deref())
        };
        self.pos = entry.as_ref().map(|(k, _)| k.clone());
        Ok(entry)
    }
}

fn owned((k, v): (&Vec<u8>, &Vec<u8>)) -> Entry {
    (k.clone(), v.clone())
}

impl RawCursor for MemoryCursor {
    fn first(&mut self) -> DbResult<Option<Entry>> {
        self.step(|entries, _| entries.iter().next().map(owned))
    }

    fn last(&mut self) -> DbResult<Option<Entry>> {
        self.step(|entries, _| entries.iter().next_back().map(owned))
    }

    fn seek(&mut self, key: &[u8]) -> DbResult<Option<Entry>> {
        self.step(|entries, _| {
            entries
                .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next()
                .map(owned)
        })
    }

    fn next(&mut self) -> DbResult<Option<Entry>> {
        self.step(|entries, pos| {
            let pos = pos?;
            entries
                .range::<[u8], _>((Bound::Excluded(pos), Bound::Unbounded))
                .next()
                .map(owned)
        })
    }

    fn prev(&mut self) -> DbResult<Option<Entry>> {
        self.step(|entries, pos| {
            let pos = pos?;
            entries
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(pos)))
                .next_back()
                .map(owned)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DbErrorCode;

    fn writable_tx(engine: &MemoryEngine) -> Box<dyn Transaction> {
        engine.begin(CancellationToken::new(), true).unwrap()
    }

    fn collect(it: &mut dyn StoreIterator) -> Vec<Vec<u8>> {
        let mut keys = Vec::new();
        while it.valid() {
            keys.push(it.item().unwrap().key().to_vec());
            it.next();
        }
        keys
    }

    #[test]
    fn test_put_get_delete() {
        let engine = MemoryEngine::new();
        let tx = writable_tx(&engine);
        tx.create_store(b"s").unwrap();
        let store = tx.get_store(b"s").unwrap();

        store.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v".to_vec());
        store.delete(b"k").unwrap();
        assert!(store.get(b"k").unwrap_err().is_key_not_found());
        assert!(store.delete(b"k").unwrap_err().is_key_not_found());
    }

    #[test]
    fn test_store_catalog_errors() {
        let engine = MemoryEngine::new();
        let tx = writable_tx(&engine);
        assert_eq!(
            tx.get_store(b"missing").err().unwrap().code(),
            DbErrorCode::AeroStoreNotFound
        );
        tx.create_store(b"s").unwrap();
        assert_eq!(
            tx.create_store(b"s").unwrap_err().code(),
            DbErrorCode::AeroStoreExists
        );
        tx.drop_store(b"s").unwrap();
        assert!(tx.get_store(b"s").is_err());
    }

    #[test]
    fn test_commit_publishes_and_rollback_discards() {
        let engine = MemoryEngine::new();

        let tx = writable_tx(&engine);
        tx.create_store(b"s").unwrap();
        tx.get_store(b"s").unwrap().put(b"a", b"1").unwrap();
        tx.commit().unwrap();

        let tx = writable_tx(&engine);
        tx.get_store(b"s").unwrap().put(b"b", b"2").unwrap();
        tx.rollback().unwrap();

        let tx = engine.begin(CancellationToken::new(), false).unwrap();
        let store = tx.get_store(b"s").unwrap();
        assert_eq!(store.get(b"a").unwrap(), b"1".to_vec());
        assert!(store.get(b"b").unwrap_err().is_key_not_found());
    }

    #[test]
    fn test_snapshot_isolation_for_readers() {
        let engine = MemoryEngine::new();
        let setup = writable_tx(&engine);
        setup.create_store(b"s").unwrap();
        setup.commit().unwrap();

        let reader = engine.begin(CancellationToken::new(), false).unwrap();
        let writer = writable_tx(&engine);
        writer.get_store(b"s").unwrap().put(b"k", b"v").unwrap();
        writer.commit().unwrap();

        let store = reader.get_store(b"s").unwrap();
        assert!(store.get(b"k").unwrap_err().is_key_not_found());
    }

    #[test]
    fn test_read_only_commit_rejected() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), false).unwrap();
        assert_eq!(tx.commit().unwrap_err().code(), DbErrorCode::AeroReadOnly);
        assert!(tx.rollback().is_ok());
    }

    #[test]
    fn test_sequence_survives_truncate() {
        let engine = MemoryEngine::new();
        let tx = writable_tx(&engine);
        tx.create_store(b"s").unwrap();
        let store = tx.get_store(b"s").unwrap();

        assert_eq!(store.next_sequence().unwrap(), 1);
        assert_eq!(store.next_sequence().unwrap(), 2);
        store.truncate().unwrap();
        assert_eq!(store.next_sequence().unwrap(), 3);
    }

    #[test]
    fn test_truncate_leaves_snapshots_intact() {
        let engine = MemoryEngine::new();
        let setup = writable_tx(&engine);
        setup.create_store(b"s").unwrap();
        let store = setup.get_store(b"s").unwrap();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        assert_eq!(store.next_sequence().unwrap(), 1);
        setup.commit().unwrap();

        let committed = engine.snapshot();
        let reader = engine.begin(CancellationToken::new(), false).unwrap();
        let writer = writable_tx(&engine);
        let store = writer.get_store(b"s").unwrap();
        store.truncate().unwrap();
        assert!(store.get(b"a").unwrap_err().is_key_not_found());
        assert_eq!(store.next_sequence().unwrap(), 2);
        writer.commit().unwrap();

        assert_eq!(committed[b"s".as_slice()].entries.len(), 2);
        let old = reader.get_store(b"s").unwrap();
        assert_eq!(old.get(b"b").unwrap(), b"2".to_vec());

        let after = engine.begin(CancellationToken::new(), false).unwrap();
        let store = after.get_store(b"s").unwrap();
        let mut it = store.iterator(IteratorOptions::forward()).unwrap();
        it.seek(&[]);
        assert!(collect(it.as_mut()).is_empty());
    }

    #[test]
    fn test_iterator_sees_writes_made_during_iteration() {
        let engine = MemoryEngine::new();
        let tx = writable_tx(&engine);
        tx.create_store(b"s").unwrap();
        let store = tx.get_store(b"s").unwrap();
        store.put(&[1], b"").unwrap();
        store.put(&[3], b"").unwrap();

        let mut it = store.iterator(IteratorOptions::forward()).unwrap();
        it.seek(&[]);
        store.put(&[2], b"").unwrap();
        assert_eq!(collect(it.as_mut()), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_iterator_after_commit_reports_discarded() {
        let engine = MemoryEngine::new();
        let tx = writable_tx(&engine);
        tx.create_store(b"s").unwrap();
        let store = tx.get_store(b"s").unwrap();
        store.put(&[1], b"").unwrap();
        store.put(&[2], b"").unwrap();

        let mut it = store.iterator(IteratorOptions::forward()).unwrap();
        it.seek(&[]);
        tx.commit().unwrap();
        it.next();
        assert!(!it.valid());
        assert_eq!(it.err().unwrap().code(), DbErrorCode::AeroTxDiscarded);
    }
}
