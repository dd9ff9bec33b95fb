//! Tables
//!
//! A table is a store of checksummed document bodies plus its indexes.
//! Keys come from the primary-key path when the table declares one, and
//! from the store's sequence otherwise.

use std::rc::Rc;
use std::sync::Arc;

use crate::document::encoding::{decode_document, encode_document, encode_int_key, encode_value};
use crate::document::{FieldBuffer, FieldPath, StoredDocument};
use crate::engine::{IteratorOptions, Store};
use crate::errors::{DbError, DbResult};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};
use crate::planner::IndexRange;

use super::catalog::TableConfig;
use super::index::Index;
use super::scan::{IndexScan, TableScan};

/// Decodes a stored body. Corruption is logged before it is returned.
pub(crate) fn decode_record(table: &str, key: &[u8], bytes: &[u8]) -> DbResult<StoredDocument> {
    let fields = decode_document(bytes).map_err(|e| {
        let err = DbError::from(e);
        if err.is_fatal() {
            log_event_with_fields(
                Event::DataCorruption,
                &[("table", table), ("reason", err.message())],
            );
        }
        err
    })?;
    Ok(StoredDocument::new(key.to_vec(), fields))
}

pub struct Table {
    name: String,
    config: Rc<TableConfig>,
    store: Rc<dyn Store>,
    indexes: Vec<Index>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Table {
    pub(crate) fn new(
        name: &str,
        config: TableConfig,
        store: Rc<dyn Store>,
        indexes: Vec<Index>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            config: Rc::new(config),
            store,
            indexes,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> Rc<TableConfig> {
        self.config.clone()
    }

    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// First index over exactly `path`
    pub fn index_on(&self, path: &FieldPath) -> Option<&Index> {
        self.indexes.iter().find(|idx| idx.path() == path)
    }

    pub fn index(&self, name: &str) -> DbResult<&Index> {
        self.indexes
            .iter()
            .find(|idx| idx.name() == name)
            .ok_or_else(|| DbError::index_not_found(name))
    }

    /// Returns true when `path` is the declared primary key
    pub fn is_primary_key(&self, path: &FieldPath) -> bool {
        self.config.primary_key.as_ref() == Some(path)
    }

    fn generate_key(&self, doc: &FieldBuffer) -> DbResult<Vec<u8>> {
        let path = match &self.config.primary_key {
            Some(path) => path,
            None => {
                let seq = self.store.next_sequence()?;
                let seq = i64::try_from(seq).map_err(|_| {
                    DbError::encoding(format!("sequence {} does not fit a table key", seq))
                })?;
                return Ok(encode_int_key(seq));
            }
        };

        match path.get_value(doc) {
            Ok(value) => Ok(encode_value(&value)),
            Err(err) if err.is_field_not_found() => Err(DbError::query_invalid(format!(
                "document has no value for primary key '{}'",
                path
            ))),
            Err(err) => Err(err),
        }
    }

    fn exists(&self, key: &[u8]) -> DbResult<bool> {
        match self.store.get(key) {
            Ok(_) => Ok(true),
            Err(err) if err.is_key_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Stores a new document and returns its key
    pub fn insert(&self, doc: &FieldBuffer) -> DbResult<Vec<u8>> {
        let body = encode_document(doc)?;
        let key = self.generate_key(doc)?;
        if self.config.primary_key.is_some() && self.exists(&key)? {
            return Err(DbError::duplicate_document(format!(
                "primary key already exists in table '{}'",
                self.name
            )));
        }

        for index in &self.indexes {
            index.check_unique(doc, &key)?;
        }

        self.store.put(&key, &body)?;
        for index in &self.indexes {
            index.set(doc, &key)?;
        }
        Ok(key)
    }

    pub fn get(&self, key: &[u8]) -> DbResult<StoredDocument> {
        let bytes = self.store.get(key)?;
        decode_record(&self.name, key, &bytes)
    }

    pub fn delete(&self, key: &[u8]) -> DbResult<()> {
        let old = self.get(key)?;
        for index in &self.indexes {
            index.remove(&old, key)?;
        }
        self.store.delete(key)
    }

    /// Replaces the document stored under `key`. The primary key value
    /// cannot change.
    pub fn replace(&self, key: &[u8], doc: &FieldBuffer) -> DbResult<()> {
        let old = self.get(key)?;
        let body = encode_document(doc)?;

        if let Some(path) = &self.config.primary_key {
            let new_key = path.get_value(doc).map(|v| encode_value(&v)).ok();
            if new_key.as_deref() != Some(key) {
                return Err(DbError::query_invalid(format!(
                    "primary key '{}' cannot be changed",
                    path
                )));
            }
        }

        for index in &self.indexes {
            index.check_unique(doc, key)?;
        }
        for index in &self.indexes {
            index.remove(&old, key)?;
        }
        self.store.put(key, &body)?;
        for index in &self.indexes {
            index.set(doc, key)?;
        }
        Ok(())
    }

    /// Removes every document and index entry
    pub fn truncate(&self) -> DbResult<()> {
        self.store.truncate()?;
        for index in &self.indexes {
            index.truncate()?;
        }
        Ok(())
    }

    pub fn scan(&self, reverse: bool) -> DbResult<TableScan> {
        let it = self.store.iterator(IteratorOptions { reverse })?;
        Ok(TableScan::new(&self.name, it, self.metrics.clone()))
    }

    pub fn index_scan(&self, index: &Index, range: IndexRange, reverse: bool) -> DbResult<IndexScan> {
        let it = index.store().iterator(IteratorOptions { reverse })?;
        Ok(IndexScan::new(
            &self.name,
            it,
            index.store(),
            self.store.clone(),
            range,
            reverse,
            self.metrics.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::catalog::IndexConfig;
    use crate::document::encoding::decode_int_key;
    use crate::document::Value;
    use crate::engine::{CancellationToken, Engine, Item, MemoryEngine, StoreIterator, Transaction};
    use crate::errors::DbErrorCode;
    use serde_json::json;
    use std::cell::Cell;

    // =========================================================================
    // Helpers
    // =========================================================================

    fn table(tx: &dyn Transaction, config: TableConfig, indexed: &[(&str, bool)]) -> Table {
        tx.create_store(b"t:users").unwrap();
        let indexes = indexed
            .iter()
            .map(|(field, unique)| {
                let name = format!("users_{}", field);
                let store_name = format!("i:{}", name).into_bytes();
                tx.create_store(&store_name).unwrap();
                let mut cfg = IndexConfig::new(name, "users", FieldPath::parse(field).unwrap());
                cfg.unique = *unique;
                Index::new(cfg, Rc::from(tx.get_store(&store_name).unwrap()))
            })
            .collect();
        Table::new(
            "users",
            config,
            Rc::from(tx.get_store(b"t:users").unwrap()),
            indexes,
            None,
        )
    }

    fn person(name: &str, age: i64) -> FieldBuffer {
        FieldBuffer::from_json(&json!({ "name": name, "age": age }))
    }

    fn ages(scan: impl Iterator<Item = DbResult<StoredDocument>>) -> Vec<i64> {
        scan.map(|d| match d.unwrap().fields.get("age") {
            Some(Value::Integer(i)) => *i,
            other => panic!("unexpected age {:?}", other),
        })
        .collect()
    }

    /// Counts the entries an index scan steps over
    struct CountingIterator {
        inner: Box<dyn StoreIterator>,
        steps: Rc<Cell<usize>>,
    }

    impl StoreIterator for CountingIterator {
        fn seek(&mut self, pivot: &[u8]) {
            self.inner.seek(pivot);
        }

        fn valid(&self) -> bool {
            self.inner.valid()
        }

        fn next(&mut self) {
            self.steps.set(self.steps.get() + 1);
            self.inner.next();
        }

        fn err(&self) -> Option<&DbError> {
            self.inner.err()
        }

        fn item(&self) -> Option<Item<'_>> {
            self.inner.item()
        }

        fn close(&mut self) -> DbResult<()> {
            self.inner.close()
        }
    }

    // =========================================================================
    // Tests
    // =========================================================================

    #[test]
    fn test_sequence_keys_are_increasing() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let users = table(tx.as_ref(), TableConfig::default(), &[]);

        let k1 = users.insert(&person("a", 1)).unwrap();
        let k2 = users.insert(&person("b", 2)).unwrap();
        assert_eq!(decode_int_key(&k1).unwrap(), 1);
        assert_eq!(decode_int_key(&k2).unwrap(), 2);
        assert_eq!(users.get(&k2).unwrap().fields, person("b", 2));
    }

    #[test]
    fn test_primary_key_duplicates_rejected() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let config = TableConfig::with_primary_key(FieldPath::field("name"));
        let users = table(tx.as_ref(), config, &[]);

        let key = users.insert(&person("ada", 36)).unwrap();
        assert_eq!(key, encode_value(&Value::from("ada")));

        let err = users.insert(&person("ada", 37)).unwrap_err();
        assert_eq!(err.code(), DbErrorCode::AeroDuplicateDocument);

        let err = users
            .insert(&FieldBuffer::from_json(&json!({"age": 1})))
            .unwrap_err();
        assert_eq!(err.code(), DbErrorCode::AeroQueryInvalid);
    }

    #[test]
    fn test_replace_cannot_change_primary_key() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let config = TableConfig::with_primary_key(FieldPath::field("name"));
        let users = table(tx.as_ref(), config, &[]);

        let key = users.insert(&person("ada", 36)).unwrap();
        users.replace(&key, &person("ada", 40)).unwrap();
        assert!(users.replace(&key, &person("bob", 40)).is_err());
    }

    #[test]
    fn test_index_follows_insert_replace_delete() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let users = table(tx.as_ref(), TableConfig::default(), &[("age", false)]);

        let k1 = users.insert(&person("a", 30)).unwrap();
        let _k2 = users.insert(&person("b", 10)).unwrap();
        let k3 = users.insert(&person("c", 20)).unwrap();

        let by_age = users.index("users_age").unwrap();
        let scan = users.index_scan(by_age, IndexRange::full(), false).unwrap();
        assert_eq!(ages(scan), vec![10, 20, 30]);

        users.replace(&k1, &person("a", 5)).unwrap();
        users.delete(&k3).unwrap();

        let scan = users.index_scan(by_age, IndexRange::full(), true).unwrap();
        assert_eq!(ages(scan), vec![10, 5]);
    }

    #[test]
    fn test_reverse_index_scan_positions_without_walking() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let users = table(tx.as_ref(), TableConfig::default(), &[("age", false)]);
        for age in [10, 20, 30, 40, 50, 60] {
            users.insert(&person("p", age)).unwrap();
        }
        let by_age = users.index("users_age").unwrap();

        let reverse_below = |upper: i64| {
            let steps = Rc::new(Cell::new(0));
            let it = CountingIterator {
                inner: by_age.store().iterator(IteratorOptions::reverse()).unwrap(),
                steps: steps.clone(),
            };
            let range = IndexRange {
                lower: None,
                upper: Some(encode_value(&Value::Integer(upper))),
            };
            let scan = IndexScan::new(
                "users",
                Box::new(it),
                by_age.store(),
                users.store.clone(),
                range,
                true,
                None,
            );
            let found = ages(scan);
            (found, steps.get())
        };

        // Below every entry: exhausted straight away
        assert_eq!(reverse_below(5), (vec![], 0));
        // Past every entry: starts from the last one
        assert_eq!(reverse_below(1000).0, vec![60, 50, 40, 30, 20, 10]);
        assert_eq!(reverse_below(35).0, vec![30, 20, 10]);
        assert_eq!(reverse_below(30).0, vec![30, 20, 10]);
    }

    #[test]
    fn test_unencodable_document_writes_nothing() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let users = table(tx.as_ref(), TableConfig::default(), &[("age", false)]);
        let key = users.insert(&person("ada", 36)).unwrap();

        let mut bad = person("ada", 36);
        bad.add("score", Value::Double(f64::NAN));
        assert_eq!(users.insert(&bad).unwrap_err().code(), DbErrorCode::AeroEncodingFailed);
        assert_eq!(users.replace(&key, &bad).unwrap_err().code(), DbErrorCode::AeroEncodingFailed);

        let by_age = users.index("users_age").unwrap();
        assert_eq!(ages(users.index_scan(by_age, IndexRange::full(), false).unwrap()), vec![36]);
        assert_eq!(ages(users.scan(false).unwrap()), vec![36]);

        // No sequence number was spent on the refused insert
        let next = users.insert(&person("bob", 40)).unwrap();
        assert_eq!(decode_int_key(&next).unwrap(), 2);
    }

    #[test]
    fn test_unique_index_rejects_insert_without_writing() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let users = table(tx.as_ref(), TableConfig::default(), &[("name", true)]);

        users.insert(&person("ada", 1)).unwrap();
        let err = users.insert(&person("ada", 2)).unwrap_err();
        assert_eq!(err.code(), DbErrorCode::AeroDuplicateDocument);
        assert_eq!(users.scan(false).unwrap().count(), 1);
    }

    #[test]
    fn test_reverse_scan_and_truncate() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let users = table(tx.as_ref(), TableConfig::default(), &[("age", false)]);

        for age in 1..=4 {
            users.insert(&person("p", age)).unwrap();
        }
        assert_eq!(ages(users.scan(true).unwrap()), vec![4, 3, 2, 1]);

        users.truncate().unwrap();
        assert_eq!(users.scan(false).unwrap().count(), 0);
        let by_age = users.index("users_age").unwrap();
        assert_eq!(
            users.index_scan(by_age, IndexRange::full(), false).unwrap().count(),
            0
        );

        // Sequence continues after truncation
        let key = users.insert(&person("q", 9)).unwrap();
        assert_eq!(decode_int_key(&key).unwrap(), 5);
    }

    #[test]
    fn test_corrupted_body_is_fatal() {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        let users = table(tx.as_ref(), TableConfig::default(), &[]);

        let key = users.insert(&person("a", 1)).unwrap();
        let store = tx.get_store(b"t:users").unwrap();
        let mut bytes = store.get(&key).unwrap();
        bytes[3] ^= 0x01;
        store.put(&key, &bytes).unwrap();

        let err = users.get(&key).unwrap_err();
        assert_eq!(err.code(), DbErrorCode::AeroDataCorruption);
        let err = users.scan(false).unwrap().next().unwrap().unwrap_err();
        assert!(err.is_fatal());
    }
}
