//! DELETE

use crate::database::Transaction;
use crate::errors::{DbError, DbResult};
use crate::planner::QueryOptimizer;

use super::expr::BoxExpr;
use super::stack::Param;
use super::statement::{Statement, StatementResult};

/// Deletes the documents of a table matching an optional predicate
#[derive(Debug)]
pub struct DeleteStmt {
    table: String,
    where_expr: Option<BoxExpr>,
}

impl DeleteStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_expr: None,
        }
    }

    pub fn where_expr(mut self, expr: BoxExpr) -> Self {
        self.where_expr = Some(expr);
        self
    }
}

impl Statement for DeleteStmt {
    fn kind(&self) -> &'static str {
        "DELETE"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn run<'a>(&'a self, tx: &'a Transaction, params: &'a [Param]) -> DbResult<StatementResult<'a>> {
        if self.table.is_empty() {
            return Err(DbError::missing_table_selector());
        }

        let mut optimizer = QueryOptimizer::new(tx, &self.table)?.params(params);
        if let Some(expr) = &self.where_expr {
            optimizer = optimizer.where_expr(expr.as_ref());
        }

        // Matches are collected first so the scan never sees its own deletes
        let mut keys = Vec::new();
        optimizer.optimize()?.iterate(|doc| {
            let key = doc
                .key()
                .ok_or_else(|| DbError::query_invalid("matched document has no storage key"))?;
            keys.push(key.to_vec());
            Ok(())
        })?;

        let table = optimizer.table();
        for key in &keys {
            table.delete(key)?;
        }

        Ok(StatementResult::Affected {
            count: keys.len() as u64,
            last_key: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Database, TableConfig};
    use crate::document::FieldBuffer;
    use crate::errors::DbErrorCode;
    use crate::query::expr::{field, gt, lit};
    use crate::query::SelectStmt;
    use serde_json::json;

    fn database() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.update(|tx| {
            tx.create_table("users", TableConfig::default())?;
            let users = tx.get_table("users")?;
            for age in 1..=10 {
                users.insert(&FieldBuffer::from_json(&json!({ "age": age })))?;
            }
            Ok(())
        })
        .unwrap();
        db
    }

    #[test]
    fn test_delete_matching() {
        let db = database();
        let stmt = DeleteStmt::new("users").where_expr(gt(field("age").unwrap(), lit(7i64)));
        let affected = db
            .update(|tx| Ok(tx.exec(&stmt, &[])?.affected()))
            .unwrap();
        assert_eq!(affected, 3);

        let remaining = db
            .view(|tx| tx.exec(&SelectStmt::new("users"), &[])?.into_stream().count())
            .unwrap();
        assert_eq!(remaining, 7);
    }

    #[test]
    fn test_delete_all() {
        let db = database();
        let stmt = DeleteStmt::new("users");
        assert_eq!(
            db.update(|tx| Ok(tx.exec(&stmt, &[])?.affected())).unwrap(),
            10
        );
    }

    #[test]
    fn test_delete_in_read_only_transaction() {
        let db = database();
        let stmt = DeleteStmt::new("users");
        let err = db.view(|tx| tx.exec(&stmt, &[]).map(|_| ())).unwrap_err();
        assert_eq!(err.code(), DbErrorCode::AeroReadOnly);
    }
}
