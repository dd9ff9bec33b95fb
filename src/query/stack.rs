//! Evaluation context for expressions

use crate::database::{TableConfig, Transaction};
use crate::document::{Document, Value};
use crate::errors::{DbError, DbResult};

/// A statement parameter, positional or named
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub value: Value,
}

impl Param {
    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }
}

/// What an expression sees while it is evaluated.
///
/// Built per evaluated document and dropped right after.
#[derive(Clone, Copy)]
pub struct EvalStack<'a> {
    pub document: Option<&'a dyn Document>,
    pub tx: Option<&'a Transaction>,
    pub cfg: Option<&'a TableConfig>,
    pub params: &'a [Param],
}

impl<'a> EvalStack<'a> {
    pub fn new(params: &'a [Param]) -> Self {
        Self {
            document: None,
            tx: None,
            cfg: None,
            params,
        }
    }

    pub fn with_document(mut self, document: &'a dyn Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_tx(mut self, tx: &'a Transaction) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn with_cfg(mut self, cfg: &'a TableConfig) -> Self {
        self.cfg = Some(cfg);
        self
    }

    /// Looks up a 1-based positional parameter
    pub fn positional_param(&self, position: usize) -> DbResult<Value> {
        position
            .checked_sub(1)
            .and_then(|i| self.params.get(i))
            .map(|p| p.value.clone())
            .ok_or_else(|| {
                DbError::query_invalid(format!("missing positional parameter ${}", position))
            })
    }

    pub fn named_param(&self, name: &str) -> DbResult<Value> {
        self.params
            .iter()
            .find(|p| p.name.as_deref() == Some(name))
            .map(|p| p.value.clone())
            .ok_or_else(|| DbError::query_invalid(format!("missing named parameter ${}", name)))
    }
}
