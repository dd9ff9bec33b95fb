//! Rule-based query optimizer
//!
//! Access path selection (first match wins, no statistics):
//! 1. An AND-conjunct comparing an indexed path with a constant seeks the
//!    index over the derived range.
//! 2. ORDER BY on an indexed path scans that index in the requested order.
//! 3. Otherwise the table is scanned in key order, reversed when ORDER BY
//!    is the primary key descending.
//!
//! WHERE is always re-applied as a filter over the candidates. ORDER BY is
//! sorted in memory only when the access path does not provide it. Offset
//! and limit come last.

use crate::database::{into_stream, Table, Transaction};
use crate::document::encoding::is_seekable;
use crate::document::FieldPath;
use crate::errors::DbResult;
use crate::observability::{log_event_with_fields, Event};
use crate::query::expr::{conjuncts, CmpOp, Expr};
use crate::query::{EvalStack, Param};
use crate::stream::{SortDirection, Stream};

use super::access::{AccessPath, IndexRange};

/// Immutable description of how a query runs
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub table: String,
    pub access: AccessPath,
    /// WHERE clause re-applied to every candidate
    pub filter: Option<String>,
    /// ORDER BY applied in memory
    pub sort: Option<(FieldPath, SortDirection)>,
    pub offset: usize,
    pub limit: Option<usize>,
}

pub struct QueryOptimizer<'a> {
    tx: &'a Transaction,
    table: Table,
    where_expr: Option<&'a dyn Expr>,
    order_by: Option<FieldPath>,
    direction: SortDirection,
    limit: Option<usize>,
    offset: usize,
    params: &'a [Param],
}

impl<'a> QueryOptimizer<'a> {
    /// Loads the table. A missing table fails here, before any stream
    /// exists.
    pub fn new(tx: &'a Transaction, table_name: &str) -> DbResult<Self> {
        Ok(Self {
            tx,
            table: tx.get_table(table_name)?,
            where_expr: None,
            order_by: None,
            direction: SortDirection::Asc,
            limit: None,
            offset: 0,
            params: &[],
        })
    }

    pub fn where_expr(mut self, expr: &'a dyn Expr) -> Self {
        self.where_expr = Some(expr);
        self
    }

    pub fn order_by(mut self, path: FieldPath) -> Self {
        self.order_by = Some(path);
        self
    }

    pub fn direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn params(mut self, params: &'a [Param]) -> Self {
        self.params = params;
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    fn descending(&self) -> bool {
        self.direction == SortDirection::Desc
    }

    /// Chooses the access path
    pub fn plan(&self) -> DbResult<QueryPlan> {
        let access = match self.index_seek()? {
            Some(access) => access,
            None => self.ordered_index_scan().unwrap_or_else(|| self.table_scan()),
        };

        let sort = match &self.order_by {
            Some(path) if !self.provides_order(&access, path) => Some((path.clone(), self.direction)),
            _ => None,
        };

        Ok(QueryPlan {
            table: self.table.name().to_string(),
            access,
            filter: self.where_expr.map(|e| e.to_string()),
            sort,
            offset: self.offset,
            limit: self.limit,
        })
    }

    /// Rule 1: first conjunct of the form `indexed_path <op> constant`
    fn index_seek(&self) -> DbResult<Option<AccessPath>> {
        let predicate = match self.where_expr {
            Some(expr) => expr,
            None => return Ok(None),
        };

        let stack = EvalStack::new(self.params)
            .with_tx(self.tx)
            .with_cfg(self.table.config());

        for conjunct in conjuncts(predicate) {
            let cmp = match conjunct.as_comparison() {
                Some(cmp) => cmp,
                None => continue,
            };

            // Normalize to `path <op> constant`
            let (path, constant, op) = match (cmp.left().as_field(), cmp.right().as_field()) {
                (Some(path), _) if cmp.right().is_constant() => (path, cmp.right(), cmp.op()),
                (_, Some(path)) if cmp.left().is_constant() => (path, cmp.left(), cmp.op().flip()),
                _ => continue,
            };
            if op == CmpOp::Neq {
                continue;
            }

            let index = match self.table.index_on(path) {
                Some(index) => index,
                None => continue,
            };

            let value = constant.eval(&stack)?;
            if !is_seekable(&value) {
                continue;
            }

            if let Some(range) = IndexRange::for_comparison(op, &value) {
                let reverse = self.order_by.as_ref() == Some(path) && self.descending();
                return Ok(Some(AccessPath::Index {
                    index: index.name().to_string(),
                    path: path.clone(),
                    range,
                    reverse,
                }));
            }
        }

        Ok(None)
    }

    /// Rule 2: ORDER BY on an indexed path
    fn ordered_index_scan(&self) -> Option<AccessPath> {
        let path = self.order_by.as_ref()?;
        let index = self.table.index_on(path)?;
        Some(AccessPath::Index {
            index: index.name().to_string(),
            path: path.clone(),
            range: IndexRange::full(),
            reverse: self.descending(),
        })
    }

    /// Rule 3: key order
    fn table_scan(&self) -> AccessPath {
        let by_key = self
            .order_by
            .as_ref()
            .map(|path| self.table.is_primary_key(path))
            .unwrap_or(false);
        AccessPath::TableScan {
            reverse: by_key && self.descending(),
        }
    }

    fn provides_order(&self, access: &AccessPath, order_by: &FieldPath) -> bool {
        match access {
            AccessPath::TableScan { .. } => self.table.is_primary_key(order_by),
            AccessPath::Index { path, .. } => path == order_by,
        }
    }

    /// Plans the query and assembles its stream
    pub fn optimize(&self) -> DbResult<Stream<'a>> {
        let plan = self.plan()?;
        let metrics = self.tx.metrics();

        let scan_type = plan.access.scan_type();
        log_event_with_fields(
            Event::QueryPlanned,
            &[
                ("table", plan.table.as_str()),
                ("scan", scan_type.as_str()),
                ("index", plan.access.index_name().unwrap_or("")),
            ],
        );

        let mut stream = match plan.access {
            AccessPath::TableScan { reverse } => {
                if let Some(metrics) = &metrics {
                    metrics.increment_table_scans();
                }
                into_stream(self.table.scan(reverse)?)
            }
            AccessPath::Index {
                ref index,
                ref range,
                reverse,
                ..
            } => {
                if let Some(metrics) = &metrics {
                    metrics.increment_index_scans();
                }
                let index = self.table.index(index)?;
                into_stream(self.table.index_scan(index, range.clone(), reverse)?)
            }
        };

        if let Some(predicate) = self.where_expr {
            let params = self.params;
            let tx = self.tx;
            let cfg = self.table.shared_config();
            stream = stream.filter(move |doc| {
                let stack = EvalStack::new(params)
                    .with_document(doc)
                    .with_tx(tx)
                    .with_cfg(&cfg);
                Ok(predicate.eval(&stack)?.is_truthy())
            });
        }

        if let Some((path, direction)) = plan.sort {
            if let Some(metrics) = &metrics {
                metrics.increment_in_memory_sorts();
            }
            stream = stream.order_by(path, direction, self.tx.config().max_sort_documents);
        }

        stream = stream.offset(plan.offset);
        if let Some(limit) = plan.limit {
            stream = stream.limit(limit);
        }
        Ok(stream)
    }
}
