//! Table and index catalog
//!
//! Table and index definitions live as JSON records in a dedicated store,
//! so they follow the same transaction as the data they describe.
//!
//! Store layout:
//! - `__catalog`: `table:<name>` and `index:<name>` definitions
//! - `t:<name>`: documents of a table
//! - `i:<name>`: entries of an index

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::document::{EncodingError, FieldPath};
use crate::engine::{self, IteratorOptions, Store};
use crate::errors::{DbError, DbResult};

pub(crate) const CATALOG_STORE: &[u8] = b"__catalog";

const TABLE_PREFIX: &str = "table:";
const INDEX_PREFIX: &str = "index:";

/// Per-table settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Field holding the primary key. Without one, documents are keyed by
    /// the table's sequence.
    #[serde(default)]
    pub primary_key: Option<FieldPath>,
}

impl TableConfig {
    pub fn with_primary_key(path: FieldPath) -> Self {
        Self {
            primary_key: Some(path),
        }
    }
}

/// Secondary index definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub index_name: String,
    pub table_name: String,
    pub path: FieldPath,
    #[serde(default)]
    pub unique: bool,
}

impl IndexConfig {
    pub fn new(index_name: impl Into<String>, table_name: impl Into<String>, path: FieldPath) -> Self {
        Self {
            index_name: index_name.into(),
            table_name: table_name.into(),
            path,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

pub(crate) fn table_store_name(table: &str) -> Vec<u8> {
    format!("t:{}", table).into_bytes()
}

pub(crate) fn index_store_name(index: &str) -> Vec<u8> {
    format!("i:{}", index).into_bytes()
}

/// Catalog view bound to one transaction
pub(crate) struct Catalog {
    store: Box<dyn Store>,
}

impl Catalog {
    pub(crate) fn open(tx: &dyn engine::Transaction) -> DbResult<Self> {
        Ok(Self {
            store: tx.get_store(CATALOG_STORE)?,
        })
    }

    pub(crate) fn get_table(&self, name: &str) -> DbResult<TableConfig> {
        self.read(&entry_key(TABLE_PREFIX, name))?
            .ok_or_else(|| DbError::table_not_found(name))
    }

    pub(crate) fn put_table(&self, name: &str, config: &TableConfig) -> DbResult<()> {
        let key = entry_key(TABLE_PREFIX, name);
        if self.read::<TableConfig>(&key)?.is_some() {
            return Err(DbError::table_exists(name));
        }
        self.write(&key, config)
    }

    pub(crate) fn delete_table(&self, name: &str) -> DbResult<()> {
        self.store
            .delete(&entry_key(TABLE_PREFIX, name))
            .map_err(|e| not_found_as(e, || DbError::table_not_found(name)))
    }

    pub(crate) fn get_index(&self, name: &str) -> DbResult<IndexConfig> {
        self.read(&entry_key(INDEX_PREFIX, name))?
            .ok_or_else(|| DbError::index_not_found(name))
    }

    pub(crate) fn put_index(&self, config: &IndexConfig) -> DbResult<()> {
        let key = entry_key(INDEX_PREFIX, &config.index_name);
        if self.read::<IndexConfig>(&key)?.is_some() {
            return Err(DbError::index_exists(&config.index_name));
        }
        self.write(&key, config)
    }

    pub(crate) fn delete_index(&self, name: &str) -> DbResult<()> {
        self.store
            .delete(&entry_key(INDEX_PREFIX, name))
            .map_err(|e| not_found_as(e, || DbError::index_not_found(name)))
    }

    /// Indexes of `table`, ordered by index name
    pub(crate) fn list_indexes(&self, table: &str) -> DbResult<Vec<IndexConfig>> {
        let prefix = INDEX_PREFIX.as_bytes();
        let mut it = self.store.iterator(IteratorOptions::forward())?;
        let mut indexes = Vec::new();

        it.seek(prefix);
        while let Some(item) = it.item() {
            if !item.key().starts_with(prefix) {
                break;
            }
            let config: IndexConfig = decode_entry(item.value())?;
            if config.table_name == table {
                indexes.push(config);
            }
            it.next();
        }

        let result = engine::iterator_error(it.as_ref());
        it.close()?;
        result.map(|_| indexes)
    }

    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> DbResult<Option<T>> {
        match self.store.get(key) {
            Ok(bytes) => decode_entry(&bytes).map(Some),
            Err(err) if err.is_key_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write<T: Serialize>(&self, key: &[u8], value: &T) -> DbResult<()> {
        let bytes = serde_json::to_vec(value).map_err(EncodingError::from)?;
        self.store.put(key, &bytes)
    }
}

fn entry_key(prefix: &str, name: &str) -> Vec<u8> {
    format!("{}{}", prefix, name).into_bytes()
}

fn decode_entry<T: DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    Ok(serde_json::from_slice(bytes).map_err(EncodingError::from)?)
}

fn not_found_as(err: DbError, replacement: impl FnOnce() -> DbError) -> DbError {
    if err.is_key_not_found() {
        replacement()
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CancellationToken, Engine, MemoryEngine};

    fn catalog_tx() -> Box<dyn engine::Transaction> {
        let engine = MemoryEngine::new();
        let tx = engine.begin(CancellationToken::new(), true).unwrap();
        tx.create_store(CATALOG_STORE).unwrap();
        tx
    }

    #[test]
    fn test_table_definitions() {
        let tx = catalog_tx();
        let catalog = Catalog::open(tx.as_ref()).unwrap();

        let config = TableConfig::with_primary_key(FieldPath::field("id"));
        catalog.put_table("users", &config).unwrap();
        assert_eq!(catalog.get_table("users").unwrap(), config);

        let err = catalog.put_table("users", &TableConfig::default()).unwrap_err();
        assert_eq!(err.code(), crate::errors::DbErrorCode::AeroTableExists);

        catalog.delete_table("users").unwrap();
        let err = catalog.get_table("users").unwrap_err();
        assert_eq!(err.code(), crate::errors::DbErrorCode::AeroTableNotFound);
        assert!(catalog.delete_table("users").is_err());
    }

    #[test]
    fn test_list_indexes_filters_by_table() {
        let tx = catalog_tx();
        let catalog = Catalog::open(tx.as_ref()).unwrap();

        catalog
            .put_index(&IndexConfig::new("users_age", "users", FieldPath::field("age")))
            .unwrap();
        catalog
            .put_index(&IndexConfig::new("orders_total", "orders", FieldPath::field("total")))
            .unwrap();
        catalog
            .put_index(&IndexConfig::new("users_email", "users", FieldPath::field("email")).unique())
            .unwrap();
        catalog.put_table("users", &TableConfig::default()).unwrap();

        let names: Vec<String> = catalog
            .list_indexes("users")
            .unwrap()
            .into_iter()
            .map(|i| i.index_name)
            .collect();
        assert_eq!(names, vec!["users_age", "users_email"]);
        assert!(catalog.get_index("users_email").unwrap().unique);
    }
}
