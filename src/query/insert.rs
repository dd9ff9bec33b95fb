//! INSERT

use crate::database::Transaction;
use crate::document::{FieldBuffer, FieldPath};
use crate::errors::{DbError, DbResult};

use super::expr::BoxExpr;
use super::stack::{EvalStack, Param};
use super::statement::{Statement, StatementResult};

/// Inserts documents into a table.
///
/// Documents come either from ready-made buffers or from rows of
/// expressions laid over a list of field paths. Every row is evaluated
/// before the first write.
#[derive(Debug)]
pub struct InsertStmt {
    table: String,
    fields: Vec<FieldPath>,
    rows: Vec<Vec<BoxExpr>>,
    documents: Vec<FieldBuffer>,
}

impl InsertStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            rows: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// Field paths the VALUES rows are assigned to
    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldPath>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn values(mut self, row: Vec<BoxExpr>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn document(mut self, doc: FieldBuffer) -> Self {
        self.documents.push(doc);
        self
    }

    fn build_documents(&self, tx: &Transaction, params: &[Param]) -> DbResult<Vec<FieldBuffer>> {
        let stack = EvalStack::new(params).with_tx(tx);
        let mut docs = Vec::with_capacity(self.rows.len() + self.documents.len());

        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.fields.len() {
                return Err(DbError::query_invalid(format!(
                    "row {} has {} values for {} fields",
                    i + 1,
                    row.len(),
                    self.fields.len()
                )));
            }
            let mut doc = FieldBuffer::new();
            for (path, expr) in self.fields.iter().zip(row) {
                doc.set_by_path(path, expr.eval(&stack)?)?;
            }
            docs.push(doc);
        }

        docs.extend(self.documents.iter().cloned());
        Ok(docs)
    }
}

impl Statement for InsertStmt {
    fn kind(&self) -> &'static str {
        "INSERT"
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn run<'a>(&'a self, tx: &'a Transaction, params: &'a [Param]) -> DbResult<StatementResult<'a>> {
        if self.table.is_empty() {
            return Err(DbError::missing_table_selector());
        }

        let docs = self.build_documents(tx, params)?;
        if docs.is_empty() {
            return Err(DbError::query_invalid("INSERT has nothing to insert"));
        }

        let table = tx.get_table(&self.table)?;
        let mut last_key = None;
        for doc in &docs {
            last_key = Some(table.insert(doc)?);
        }

        Ok(StatementResult::Affected {
            count: docs.len() as u64,
            last_key,
        })
    }
}
