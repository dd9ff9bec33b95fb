//! SELECT

use crate::database::Transaction;
use crate::document::FieldPath;
use crate::errors::{DbError, DbResult};
use crate::planner::{ExplainPlan, QueryOptimizer};
use crate::stream::{BoxedDocument, SortDirection, Stream};

use super::expr::BoxExpr;
use super::projection::{DocumentMask, ResultField};
use super::stack::{EvalStack, Param};
use super::statement::{eval_row_count, Statement, StatementResult};

/// Reads documents from one table.
///
/// Without explicit result fields every field is returned.
#[derive(Debug)]
pub struct SelectStmt {
    table: String,
    fields: Vec<ResultField>,
    where_expr: Option<BoxExpr>,
    order_by: Option<(FieldPath, SortDirection)>,
    limit: Option<BoxExpr>,
    offset: Option<BoxExpr>,
}

impl SelectStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            where_expr: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    pub fn field(mut self, field: ResultField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = ResultField>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn where_expr(mut self, expr: BoxExpr) -> Self {
        self.where_expr = Some(expr);
        self
    }

    pub fn order_by(mut self, path: FieldPath, direction: SortDirection) -> Self {
        self.order_by = Some((path, direction));
        self
    }

    pub fn limit(mut self, expr: BoxExpr) -> Self {
        self.limit = Some(expr);
        self
    }

    pub fn offset(mut self, expr: BoxExpr) -> Self {
        self.offset = Some(expr);
        self
    }

    /// Validates the statement and configures the optimizer. LIMIT and
    /// OFFSET are evaluated here, before any storage access.
    fn optimizer<'a>(&'a self, tx: &'a Transaction, params: &'a [Param]) -> DbResult<QueryOptimizer<'a>> {
        if self.table.is_empty() {
            return Err(DbError::missing_table_selector());
        }

        let stack = EvalStack::new(params).with_tx(tx);
        let limit = match &self.limit {
            Some(expr) => Some(eval_row_count(expr.as_ref(), &stack, "limit")?),
            None => None,
        };
        let offset = match &self.offset {
            Some(expr) => eval_row_count(expr.as_ref(), &stack, "offset")?,
            None => 0,
        };

        let mut optimizer = QueryOptimizer::new(tx, &self.table)?
            .params(params)
            .limit(limit)
            .offset(offset);
        if let Some(expr) = &self.where_expr {
            optimizer = optimizer.where_expr(expr.as_ref());
        }
        if let Some((path, direction)) = &self.order_by {
            optimizer = optimizer.order_by(path.clone()).direction(*direction);
        }
        Ok(optimizer)
    }

    pub fn explain(&self, tx: &Transaction, params: &[Param]) -> DbResult<ExplainPlan> {
        let plan = self.optimizer(tx, params)?.plan()?;
        Ok(ExplainPlan::from_plan(&plan))
    }
}

impl Statement for SelectStmt {
    fn kind(&self) -> &'static str {
        "SELECT"
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn run<'a>(&'a self, tx: &'a Transaction, params: &'a [Param]) -> DbResult<StatementResult<'a>> {
        let optimizer = self.optimizer(tx, params)?;
        let stream = optimizer.optimize()?;
        if self.fields.is_empty() {
            return Ok(StatementResult::Rows(stream));
        }

        let fields = self.fields.as_slice();
        let cfg = optimizer.table().shared_config();
        let projected: Stream<'a> = stream.map(move |doc| {
            let mask = DocumentMask::new(doc, fields, cfg.clone(), params, Some(tx));
            Ok(Box::new(mask) as BoxedDocument<'a>)
        });
        Ok(StatementResult::Rows(projected))
    }
}
