//! Statement contract
//!
//! Statements are built programmatically and run inside a transaction.
//! Read statements return a lazy stream; write statements return the number
//! of documents they touched.

use crate::database::Transaction;
use crate::errors::{DbError, DbResult};
use crate::stream::Stream;

use super::expr::Expr;
use super::stack::{EvalStack, Param};

pub trait Statement {
    /// Statement kind used in logs ("SELECT", "INSERT", ...)
    fn kind(&self) -> &'static str;

    fn is_read_only(&self) -> bool;

    fn run<'a>(&'a self, tx: &'a Transaction, params: &'a [Param]) -> DbResult<StatementResult<'a>>;
}

pub enum StatementResult<'a> {
    Rows(Stream<'a>),
    Affected {
        count: u64,
        /// Key of the last inserted document
        last_key: Option<Vec<u8>>,
    },
}

impl<'a> StatementResult<'a> {
    /// Result rows. Write statements yield an empty stream.
    pub fn into_stream(self) -> Stream<'a> {
        match self {
            StatementResult::Rows(stream) => stream,
            StatementResult::Affected { .. } => Stream::empty(),
        }
    }

    pub fn affected(&self) -> u64 {
        match self {
            StatementResult::Rows(_) => 0,
            StatementResult::Affected { count, .. } => *count,
        }
    }

    pub fn last_key(&self) -> Option<&[u8]> {
        match self {
            StatementResult::Affected { last_key, .. } => last_key.as_deref(),
            StatementResult::Rows(_) => None,
        }
    }
}

/// Evaluates a LIMIT or OFFSET expression to a row count
pub(crate) fn eval_row_count(expr: &dyn Expr, stack: &EvalStack<'_>, clause: &str) -> DbResult<usize> {
    let value = expr.eval(stack)?;
    if !value.is_number() {
        return Err(DbError::type_mismatch(format!(
            "{} expression must evaluate to a number, got {}",
            clause,
            value.value_type()
        )));
    }

    let n = value.convert_to_int()?;
    usize::try_from(n).map_err(|_| {
        DbError::conversion_failed(format!("{} must not be negative, got {}", clause, n))
    })
}
