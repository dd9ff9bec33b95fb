//! Database handle
//!
//! `Database` ties an engine to its configuration and metrics. Transactions
//! are opened from it and expose the catalog (tables, indexes) and
//! statement execution.
//!
//! ```ignore
//! use aerodoc::database::{Database, TableConfig};
//! use aerodoc::query::{expr, SelectStmt};
//!
//! let db = Database::open_in_memory()?;
//! db.update(|tx| tx.create_table("users", TableConfig::default()))?;
//!
//! let select = SelectStmt::new("users").where_expr(expr::gt(expr::field("age")?, expr::lit(7i64)));
//! let adults = db.view(|tx| tx.exec(&select, &[])?.into_stream().into_documents())?;
//! ```

mod catalog;
mod index;
mod scan;
mod table;
mod transaction;

pub use catalog::{IndexConfig, TableConfig};
pub use index::Index;
pub use scan::{into_stream, IndexScan, TableScan};
pub use table::Table;
pub use transaction::Transaction;

use std::sync::Arc;
use std::time::Instant;

use crate::config::DatabaseConfig;
use crate::engine::{CancellationToken, Engine, MemoryEngine};
use crate::errors::{DbError, DbResult};
use crate::observability::MetricsRegistry;

/// Shared handle to an open database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    engine: Arc<dyn Engine>,
    config: Arc<DatabaseConfig>,
    metrics: Arc<MetricsRegistry>,
}

impl Database {
    /// Opens a database over `engine`, creating the catalog store on first
    /// use.
    pub fn new(engine: Arc<dyn Engine>, config: DatabaseConfig) -> DbResult<Self> {
        config
            .validate()
            .map_err(|e| DbError::query_invalid(e.to_string()))?;
        config.apply_log_level();

        let tx = engine.begin(CancellationToken::new(), true)?;
        match tx.create_store(catalog::CATALOG_STORE) {
            Ok(()) => tx.commit()?,
            Err(err) if err.code() == crate::errors::DbErrorCode::AeroStoreExists => {
                tx.rollback()?
            }
            Err(err) => {
                tx.rollback()?;
                return Err(err);
            }
        }

        Ok(Self {
            engine,
            config: Arc::new(config),
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    /// In-memory database with the default configuration
    pub fn open_in_memory() -> DbResult<Self> {
        Self::new(Arc::new(MemoryEngine::new()), DatabaseConfig::default())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Metrics sink handed to scans, absent when metrics are disabled
    pub(crate) fn metrics_sink(&self) -> Option<Arc<MetricsRegistry>> {
        if self.config.metrics_enabled {
            Some(self.metrics.clone())
        } else {
            None
        }
    }

    pub fn begin(&self, writable: bool) -> DbResult<Transaction> {
        self.begin_with_cancel(writable, CancellationToken::new())
    }

    /// Starts a transaction bound to `cancel`. The configured transaction
    /// timeout is added as a deadline.
    pub fn begin_with_cancel(&self, writable: bool, cancel: CancellationToken) -> DbResult<Transaction> {
        let cancel = match self.config.transaction_timeout() {
            Some(timeout) => cancel.with_deadline(Instant::now() + timeout),
            None => cancel,
        };
        let inner = self.engine.begin(cancel, writable)?;
        Ok(Transaction::new(self.clone(), inner, writable))
    }

    /// Runs `f` in a read-only transaction
    pub fn view<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Transaction) -> DbResult<T>,
    {
        let tx = self.begin(false)?;
        let result = f(&tx);
        tx.rollback()?;
        result
    }

    /// Runs `f` in a writable transaction, committing on success and
    /// rolling back on error
    pub fn update<T, F>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Transaction) -> DbResult<T>,
    {
        let tx = self.begin(true)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback()?;
                Err(err)
            }
        }
    }
}
