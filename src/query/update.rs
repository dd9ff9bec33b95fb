//! UPDATE

use crate::database::Transaction;
use crate::document::{FieldBuffer, FieldPath};
use crate::errors::{DbError, DbResult};
use crate::planner::QueryOptimizer;

use super::expr::BoxExpr;
use super::stack::{EvalStack, Param};
use super::statement::{Statement, StatementResult};

/// Assigns new values to fields of the matching documents.
///
/// Every assignment is evaluated against the document as it was before the
/// update, so `SET a = b, b = a` swaps the two fields.
#[derive(Debug)]
pub struct UpdateStmt {
    table: String,
    assignments: Vec<(FieldPath, BoxExpr)>,
    where_expr: Option<BoxExpr>,
}

impl UpdateStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            where_expr: None,
        }
    }

    pub fn set(mut self, path: FieldPath, expr: BoxExpr) -> Self {
        self.assignments.push((path, expr));
        self
    }

    pub fn where_expr(mut self, expr: BoxExpr) -> Self {
        self.where_expr = Some(expr);
        self
    }
}

impl Statement for UpdateStmt {
    fn kind(&self) -> &'static str {
        "UPDATE"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn run<'a>(&'a self, tx: &'a Transaction, params: &'a [Param]) -> DbResult<StatementResult<'a>> {
        if self.table.is_empty() {
            return Err(DbError::missing_table_selector());
        }
        if self.assignments.is_empty() {
            return Err(DbError::query_invalid("UPDATE requires at least one SET clause"));
        }

        let mut optimizer = QueryOptimizer::new(tx, &self.table)?.params(params);
        if let Some(expr) = &self.where_expr {
            optimizer = optimizer.where_expr(expr.as_ref());
        }

        let table = optimizer.table();
        let cfg = table.config();
        let mut updates = Vec::new();
        optimizer.optimize()?.iterate(|doc| {
            let key = doc
                .key()
                .ok_or_else(|| DbError::query_invalid("matched document has no storage key"))?
                .to_vec();

            let stack = EvalStack::new(params)
                .with_document(doc)
                .with_tx(tx)
                .with_cfg(cfg);
            let mut updated = FieldBuffer::copy_from(doc)?;
            for (path, expr) in &self.assignments {
                updated.set_by_path(path, expr.eval(&stack)?)?;
            }
            updates.push((key, updated));
            Ok(())
        })?;

        for (key, doc) in &updates {
            table.replace(key, doc)?;
        }

        Ok(StatementResult::Affected {
            count: updates.len() as u64,
            last_key: None,
        })
    }
}
