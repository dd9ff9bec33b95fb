//! Transactions
//!
//! A `Transaction` wraps one engine transaction. Dropping it without
//! committing rolls it back.

use std::rc::Rc;

use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::engine;
use crate::errors::{DbError, DbResult, Severity};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::planner::ExplainPlan;
use crate::query::{Param, SelectStmt, Statement, StatementResult};

use super::catalog::{index_store_name, table_store_name, Catalog, IndexConfig, TableConfig};
use super::index::Index;
use super::table::Table;
use super::Database;

pub struct Transaction {
    id: Uuid,
    db: Database,
    inner: Box<dyn engine::Transaction>,
    writable: bool,
    finished: bool,
}

impl Transaction {
    pub(super) fn new(db: Database, inner: Box<dyn engine::Transaction>, writable: bool) -> Self {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        log_event_with_fields(
            Event::TxBegin,
            &[
                ("tx_id", id_str.as_str()),
                ("writable", if writable { "true" } else { "false" }),
            ],
        );
        if let Some(metrics) = db.metrics_sink() {
            metrics.increment_transactions_begun();
        }

        Self {
            id,
            db,
            inner,
            writable,
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn config(&self) -> &DatabaseConfig {
        self.db.config()
    }

    pub(crate) fn metrics(&self) -> Option<std::sync::Arc<MetricsRegistry>> {
        self.db.metrics_sink()
    }

    fn catalog(&self) -> DbResult<Catalog> {
        Catalog::open(self.inner.as_ref())
    }

    fn check_writable(&self) -> DbResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(DbError::read_only())
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub fn create_table(&self, name: &str, config: TableConfig) -> DbResult<()> {
        if name.is_empty() {
            return Err(DbError::missing_table_selector());
        }
        self.check_writable()?;

        self.catalog()?.put_table(name, &config)?;
        self.inner.create_store(&table_store_name(name))?;

        log_event_with_fields(Event::TableCreated, &[("table", name)]);
        Ok(())
    }

    /// Loads a table together with its indexes
    pub fn get_table(&self, name: &str) -> DbResult<Table> {
        if name.is_empty() {
            return Err(DbError::missing_table_selector());
        }

        let catalog = self.catalog()?;
        let config = catalog.get_table(name)?;
        let store = self.inner.get_store(&table_store_name(name))?;

        let mut indexes = Vec::new();
        for index in catalog.list_indexes(name)? {
            let index_store = self.inner.get_store(&index_store_name(&index.index_name))?;
            indexes.push(Index::new(index, Rc::from(index_store)));
        }

        Ok(Table::new(
            name,
            config,
            Rc::from(store),
            indexes,
            self.metrics(),
        ))
    }

    /// Drops a table, its documents and its indexes
    pub fn drop_table(&self, name: &str) -> DbResult<()> {
        if name.is_empty() {
            return Err(DbError::missing_table_selector());
        }
        self.check_writable()?;

        let catalog = self.catalog()?;
        catalog.get_table(name)?;
        for index in catalog.list_indexes(name)? {
            catalog.delete_index(&index.index_name)?;
            self.inner.drop_store(&index_store_name(&index.index_name))?;
        }
        catalog.delete_table(name)?;
        self.inner.drop_store(&table_store_name(name))?;

        log_event_with_fields(Event::TableDropped, &[("table", name)]);
        Ok(())
    }

    /// Creates an index and fills it from the table's current documents
    pub fn create_index(&self, config: IndexConfig) -> DbResult<()> {
        self.check_writable()?;
        let table = self.get_table(&config.table_name)?;

        let catalog = self.catalog()?;
        catalog.put_index(&config)?;
        let store_name = index_store_name(&config.index_name);
        self.inner.create_store(&store_name)?;

        let index = Index::new(config, Rc::from(self.inner.get_store(&store_name)?));
        let scope = ObservationScope::with_fields(
            "INDEX_BUILD",
            &[("index", index.name()), ("table", table.name())],
        );

        let mut built = 0u64;
        let fill = table.scan(false).and_then(|scan| {
            for doc in scan {
                let doc = doc?;
                index.check_unique(&doc, &doc.key)?;
                index.set(&doc, &doc.key)?;
                built += 1;
            }
            Ok(())
        });
        if let Err(err) = fill {
            scope.fail(&err);
            return Err(err);
        }
        let built = built.to_string();
        scope.complete_with_fields(&[("documents", built.as_str())]);

        log_event_with_fields(
            Event::IndexCreated,
            &[("index", index.name()), ("table", table.name())],
        );
        Ok(())
    }

    pub fn drop_index(&self, name: &str) -> DbResult<()> {
        self.check_writable()?;

        let catalog = self.catalog()?;
        let config = catalog.get_index(name)?;
        catalog.delete_index(name)?;
        self.inner.drop_store(&index_store_name(name))?;

        log_event_with_fields(
            Event::IndexDropped,
            &[("index", name), ("table", config.table_name.as_str())],
        );
        Ok(())
    }

    pub fn list_indexes(&self, table: &str) -> DbResult<Vec<IndexConfig>> {
        let catalog = self.catalog()?;
        catalog.get_table(table)?;
        catalog.list_indexes(table)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Runs a statement. Write statements need a writable transaction.
    pub fn exec<'a>(
        &'a self,
        stmt: &'a dyn Statement,
        params: &'a [Param],
    ) -> DbResult<StatementResult<'a>> {
        let result = if !stmt.is_read_only() && !self.writable {
            Err(DbError::read_only())
        } else {
            stmt.run(self, params)
        };

        let id = self.id.to_string();
        match &result {
            Ok(_) => {
                log_event_with_fields(
                    Event::QueryExecuted,
                    &[("tx_id", id.as_str()), ("statement", stmt.kind())],
                );
                if let Some(metrics) = self.metrics() {
                    metrics.increment_queries_executed();
                }
            }
            Err(err) => self.record_failure(stmt.kind(), &id, err),
        }
        result
    }

    /// Describes how a SELECT would run without running it
    pub fn explain(&self, stmt: &SelectStmt, params: &[Param]) -> DbResult<ExplainPlan> {
        stmt.explain(self, params)
    }

    fn record_failure(&self, kind: &str, id: &str, err: &DbError) {
        let reason = err.to_string();
        let fields = [
            ("tx_id", id),
            ("statement", kind),
            ("code", err.code().code()),
            ("reason", reason.as_str()),
        ];

        if err.is_cancelled() {
            log_event_with_fields(Event::OperationCancelled, &fields);
        } else if err.severity() == Severity::Reject {
            log_event_with_fields(Event::QueryRejected, &fields);
            if let Some(metrics) = self.metrics() {
                metrics.increment_queries_rejected();
            }
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Commits every write. Read-only transactions cannot be committed.
    pub fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        let id = self.id.to_string();

        match self.inner.commit() {
            Ok(()) => {
                log_event_with_fields(Event::TxCommit, &[("tx_id", id.as_str())]);
                if let Some(metrics) = self.metrics() {
                    metrics.increment_transactions_committed();
                }
                Ok(())
            }
            Err(err) => {
                self.abort(&id);
                Err(err)
            }
        }
    }

    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        let id = self.id.to_string();
        self.abort(&id);
        Ok(())
    }

    fn abort(&self, id: &str) {
        // Engine rollback always succeeds
        let _ = self.inner.rollback();
        log_event_with_fields(Event::TxRollback, &[("tx_id", id)]);
        if let Some(metrics) = self.metrics() {
            metrics.increment_transactions_rolled_back();
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            let id = self.id.to_string();
            self.abort(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldPath;
    use crate::errors::DbErrorCode;

    #[test]
    fn test_table_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let tx = db.begin(true).unwrap();

        tx.create_table("users", TableConfig::default()).unwrap();
        assert_eq!(
            tx.create_table("users", TableConfig::default()).unwrap_err().code(),
            DbErrorCode::AeroTableExists
        );
        tx.create_index(IndexConfig::new("users_age", "users", FieldPath::field("age")))
            .unwrap();
        assert_eq!(tx.get_table("users").unwrap().indexes().len(), 1);

        tx.drop_table("users").unwrap();
        assert_eq!(
            tx.get_table("users").err().unwrap().code(),
            DbErrorCode::AeroTableNotFound
        );
        assert_eq!(
            tx.drop_index("users_age").unwrap_err().code(),
            DbErrorCode::AeroIndexNotFound
        );
        tx.commit().unwrap();
    }

    #[test]
    fn test_empty_table_name_is_missing_selector() {
        let db = Database::open_in_memory().unwrap();
        let tx = db.begin(true).unwrap();
        assert_eq!(
            tx.get_table("").err().unwrap().code(),
            DbErrorCode::AeroMissingTableSelector
        );
        assert_eq!(
            tx.create_table("", TableConfig::default()).unwrap_err().code(),
            DbErrorCode::AeroMissingTableSelector
        );
    }

    #[test]
    fn test_read_only_transaction_rejects_catalog_writes() {
        let db = Database::open_in_memory().unwrap();
        let tx = db.begin(false).unwrap();
        assert_eq!(
            tx.create_table("users", TableConfig::default()).unwrap_err().code(),
            DbErrorCode::AeroReadOnly
        );
        assert_eq!(tx.commit().unwrap_err().code(), DbErrorCode::AeroReadOnly);
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        {
            let tx = db.begin(true).unwrap();
            tx.create_table("users", TableConfig::default()).unwrap();
        }
        assert!(db.view(|tx| tx.get_table("users").map(|_| ())).is_err());
        assert_eq!(db.metrics().snapshot().transactions_rolled_back, 2);
    }

    #[test]
    fn test_list_indexes_requires_table() {
        let db = Database::open_in_memory().unwrap();
        db.update(|tx| tx.create_table("users", TableConfig::default()))
            .unwrap();
        db.view(|tx| {
            assert!(tx.list_indexes("users")?.is_empty());
            assert!(tx.list_indexes("orders").is_err());
            Ok(())
        })
        .unwrap();
    }
}
