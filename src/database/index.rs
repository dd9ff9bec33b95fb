//! Secondary indexes
//!
//! Entry layout: `sort_key(value) ++ table_key -> table_key`. The value
//! encoding is self-delimiting, so entries for one value are contiguous and
//! ordered by table key. Documents without the indexed field are indexed
//! under the missing-value key, which keeps a full index scan complete.

use std::rc::Rc;

use crate::document::encoding::encode_value;
use crate::document::{Document, FieldPath};
use crate::engine::{self, IteratorOptions, Store};
use crate::errors::{DbError, DbResult};
use crate::stream::sort_key;

use super::catalog::IndexConfig;

pub struct Index {
    config: IndexConfig,
    store: Rc<dyn Store>,
}

impl Index {
    pub(crate) fn new(config: IndexConfig, store: Rc<dyn Store>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.index_name
    }

    pub fn path(&self) -> &FieldPath {
        &self.config.path
    }

    pub fn is_unique(&self) -> bool {
        self.config.unique
    }

    pub(crate) fn store(&self) -> Rc<dyn Store> {
        self.store.clone()
    }

    fn entry_key(&self, doc: &dyn Document, table_key: &[u8]) -> DbResult<Vec<u8>> {
        let mut key = sort_key(doc, &self.config.path)?;
        key.extend_from_slice(table_key);
        Ok(key)
    }

    /// Fails with `AERO_DUPLICATE_DOCUMENT` when a unique index already holds
    /// the document's value under another table key. Missing and null values
    /// never conflict.
    pub(crate) fn check_unique(&self, doc: &dyn Document, table_key: &[u8]) -> DbResult<()> {
        if !self.config.unique {
            return Ok(());
        }

        let value = match self.config.path.get_value(doc) {
            Ok(value) if value.is_null() => return Ok(()),
            Ok(value) => value,
            Err(err) if err.is_field_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };

        let prefix = encode_value(&value);
        let mut it = self.store.iterator(IteratorOptions::forward())?;
        it.seek(&prefix);

        let mut conflict = false;
        while let Some(item) = it.item() {
            if !item.key().starts_with(&prefix) {
                break;
            }
            if item.value() != table_key {
                conflict = true;
                break;
            }
            it.next();
        }

        let result = engine::iterator_error(it.as_ref());
        it.close()?;
        result?;

        if conflict {
            return Err(DbError::duplicate_document(format!(
                "value {} already exists in unique index '{}'",
                value, self.config.index_name
            )));
        }
        Ok(())
    }

    pub(crate) fn set(&self, doc: &dyn Document, table_key: &[u8]) -> DbResult<()> {
        let key = self.entry_key(doc, table_key)?;
        self.store.put(&key, table_key)
    }

    /// Removes the document's entry. A missing entry is not an error.
    pub(crate) fn remove(&self, doc: &dyn Document, table_key: &[u8]) -> DbResult<()> {
        let key = self.entry_key(doc, table_key)?;
        match self.store.delete(&key) {
            Err(err) if err.is_key_not_found() => Ok(()),
            other => other,
        }
    }

    pub(crate) fn truncate(&self) -> DbResult<()> {
        self.store.truncate()
    }
}
