//! Result projection
//!
//! Each result field emits zero or more (name, value) pairs per source
//! document. A missing field is an omission here, never a failure. When two
//! result fields emit the same name, the first one wins.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::database::{TableConfig, Transaction};
use crate::document::encoding::decode_int_key;
use crate::document::{Document, Value};
use crate::errors::{DbError, DbResult};
use crate::stream::BoxedDocument;

use super::expr::{self, BoxExpr};
use super::stack::{EvalStack, Param};

/// Output name of the key pseudo-column on tables without a primary key
pub const KEY_COLUMN: &str = "key()";

pub enum ResultField {
    /// Named expression
    Expr { name: String, expr: BoxExpr },
    /// Every field of the source document
    Wildcard,
    /// The document's primary key
    Key,
}

impl ResultField {
    pub fn expr(name: impl Into<String>, expr: BoxExpr) -> Self {
        ResultField::Expr {
            name: name.into(),
            expr,
        }
    }

    /// A field selector named after its path
    pub fn field(path: &str) -> DbResult<Self> {
        Ok(ResultField::Expr {
            name: path.to_string(),
            expr: expr::field(path)?,
        })
    }

    /// Emits this field's pairs for the document on `stack`
    fn emit(
        &self,
        stack: &EvalStack<'_>,
        f: &mut dyn FnMut(&str, Value) -> DbResult<()>,
    ) -> DbResult<()> {
        let doc = match stack.document {
            Some(doc) => doc,
            None => return Ok(()),
        };

        match self {
            ResultField::Expr { name, expr } => match expr.eval(stack) {
                Ok(value) => f(name, value),
                Err(err) if err.is_field_not_found() => Ok(()),
                Err(err) => Err(err),
            },
            ResultField::Wildcard => doc.iterate(f),
            ResultField::Key => match key_value(doc, stack.cfg)? {
                Some((name, value)) => f(&name, value),
                None => Ok(()),
            },
        }
    }
}

impl fmt::Debug for ResultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for ResultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultField::Expr { name, expr } if *name == expr.to_string() => write!(f, "{}", name),
            ResultField::Expr { name, expr } => write!(f, "{} AS {}", expr, name),
            ResultField::Wildcard => write!(f, "*"),
            ResultField::Key => write!(f, "{}", KEY_COLUMN),
        }
    }
}

/// Name and value of the key pseudo-column
fn key_value(doc: &dyn Document, cfg: Option<&TableConfig>) -> DbResult<Option<(String, Value)>> {
    if let Some(path) = cfg.and_then(|c| c.primary_key.as_ref()) {
        return match path.get_value(doc) {
            Ok(value) => Ok(Some((path.to_string(), value))),
            Err(err) if err.is_field_not_found() => Ok(None),
            Err(err) => Err(err),
        };
    }

    match doc.key() {
        Some(key) => Ok(Some((
            KEY_COLUMN.to_string(),
            Value::Integer(decode_int_key(key)?),
        ))),
        None => Ok(None),
    }
}

/// A source document seen through a statement's result fields
pub struct DocumentMask<'a> {
    source: BoxedDocument<'a>,
    fields: &'a [ResultField],
    cfg: Rc<TableConfig>,
    params: &'a [Param],
    tx: Option<&'a Transaction>,
}

impl<'a> DocumentMask<'a> {
    pub fn new(
        source: BoxedDocument<'a>,
        fields: &'a [ResultField],
        cfg: Rc<TableConfig>,
        params: &'a [Param],
        tx: Option<&'a Transaction>,
    ) -> Self {
        Self {
            source,
            fields,
            cfg,
            params,
            tx,
        }
    }

    fn stack(&self) -> EvalStack<'_> {
        let stack = EvalStack::new(self.params)
            .with_document(self.source.as_ref())
            .with_cfg(&self.cfg);
        match self.tx {
            Some(tx) => stack.with_tx(tx),
            None => stack,
        }
    }

    /// Value `field` emits under `name`, if it emits one
    fn lookup(&self, field: &ResultField, name: &str) -> DbResult<Option<Value>> {
        match field {
            ResultField::Expr { name: own, expr } if own == name => match expr.eval(&self.stack()) {
                Ok(value) => Ok(Some(value)),
                Err(err) if err.is_field_not_found() => Ok(None),
                Err(err) => Err(err),
            },
            ResultField::Expr { .. } => Ok(None),
            ResultField::Wildcard => match self.source.get_by_field(name) {
                Ok(value) => Ok(Some(value)),
                Err(err) if err.is_field_not_found() => Ok(None),
                Err(err) => Err(err),
            },
            ResultField::Key => Ok(key_value(self.source.as_ref(), Some(self.cfg.as_ref()))?
                .filter(|(own, _)| own == name)
                .map(|(_, value)| value)),
        }
    }
}

impl Document for DocumentMask<'_> {
    fn get_by_field(&self, name: &str) -> DbResult<Value> {
        for field in self.fields {
            if let Some(value) = self.lookup(field, name)? {
                return Ok(value);
            }
        }
        Err(DbError::field_not_found(name))
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, Value) -> DbResult<()>) -> DbResult<()> {
        let stack = self.stack();
        let mut seen = HashSet::new();
        let mut emit_once = |name: &str, value: Value| -> DbResult<()> {
            if seen.insert(name.to_string()) {
                f(name, value)
            } else {
                Ok(())
            }
        };
        for field in self.fields {
            field.emit(&stack, &mut emit_once)?;
        }
        Ok(())
    }

    fn key(&self) -> Option<&[u8]> {
        self.source.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::encoding::encode_int_key;
    use crate::document::{FieldBuffer, FieldPath, StoredDocument};
    use crate::query::expr::{arith, field, lit, ArithOp};
    use serde_json::json;

    fn stored(key: i64, json: serde_json::Value) -> BoxedDocument<'static> {
        Box::new(StoredDocument::new(
            encode_int_key(key),
            FieldBuffer::from_json(&json),
        ))
    }

    fn project(
        fields: &[ResultField],
        cfg: TableConfig,
        source: BoxedDocument<'static>,
    ) -> serde_json::Value {
        let mask = DocumentMask::new(source, fields, Rc::new(cfg), &[], None);
        FieldBuffer::copy_from(&mask).unwrap().to_json()
    }

    #[test]
    fn test_wildcard_plus_expression() {
        let fields = [
            ResultField::Wildcard,
            ResultField::expr("double_age", arith(ArithOp::Mul, field("age").unwrap(), lit(2i64))),
        ];
        let out = project(
            &fields,
            TableConfig::default(),
            stored(1, json!({"name": "ada", "age": 36})),
        );
        assert_eq!(out, json!({"name": "ada", "age": 36, "double_age": 72}));
    }

    #[test]
    fn test_repeated_name_is_emitted_once() {
        let names = |fields: &[ResultField]| {
            let mask = DocumentMask::new(
                stored(1, json!({"name": "ada", "age": 36})),
                fields,
                Rc::new(TableConfig::default()),
                &[],
                None,
            );
            let out = FieldBuffer::copy_from(&mask).unwrap();
            out.fields()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect::<Vec<_>>()
        };

        let fields = [ResultField::Wildcard, ResultField::field("name").unwrap()];
        assert_eq!(
            names(&fields),
            vec![
                ("age".to_string(), Value::Integer(36)),
                ("name".to_string(), Value::from("ada")),
            ]
        );

        // The first writer wins, matching lookups through the mask
        let fields = [ResultField::expr("name", lit("bob")), ResultField::Wildcard];
        assert_eq!(
            names(&fields),
            vec![
                ("name".to_string(), Value::from("bob")),
                ("age".to_string(), Value::Integer(36)),
            ]
        );
    }

    #[test]
    fn test_missing_field_is_omitted() {
        let fields = [
            ResultField::field("name").unwrap(),
            ResultField::field("email").unwrap(),
        ];
        let out = project(&fields, TableConfig::default(), stored(1, json!({"name": "ada"})));
        assert_eq!(out, json!({"name": "ada"}));
    }

    #[test]
    fn test_other_errors_abort() {
        let fields = [ResultField::expr(
            "boom",
            arith(ArithOp::Add, lit(i64::MAX), lit(1i64)),
        )];
        let mask = DocumentMask::new(
            stored(1, json!({})),
            &fields,
            Rc::new(TableConfig::default()),
            &[],
            None,
        );
        assert!(FieldBuffer::copy_from(&mask).is_err());
    }

    #[test]
    fn test_key_pseudo_column_decodes_sequence_key() {
        let out = project(
            &[ResultField::Key],
            TableConfig::default(),
            stored(42, json!({"name": "ada"})),
        );
        assert_eq!(out, json!({"key()": 42}));
    }

    #[test]
    fn test_key_pseudo_column_uses_primary_key_path() {
        let cfg = TableConfig::with_primary_key(FieldPath::field("email"));
        let out = project(
            &[ResultField::Key],
            cfg,
            stored(1, json!({"email": "a@x.io", "name": "ada"})),
        );
        assert_eq!(out, json!({"email": "a@x.io"}));
    }

    #[test]
    fn test_lookup_matches_declared_names_only() {
        let fields = [ResultField::field("name").unwrap(), ResultField::Key];
        let mask = DocumentMask::new(
            stored(7, json!({"name": "ada", "age": 36})),
            &fields,
            Rc::new(TableConfig::default()),
            &[],
            None,
        );
        assert_eq!(mask.get_by_field("name").unwrap(), Value::from("ada"));
        assert_eq!(mask.get_by_field(KEY_COLUMN).unwrap(), Value::Integer(7));
        assert!(mask.get_by_field("age").unwrap_err().is_field_not_found());
    }

    #[test]
    fn test_lookup_through_wildcard() {
        let fields = [ResultField::Wildcard];
        let mask = DocumentMask::new(
            stored(1, json!({"age": 36})),
            &fields,
            Rc::new(TableConfig::default()),
            &[],
            None,
        );
        assert_eq!(mask.get_by_field("age").unwrap(), Value::Integer(36));
        assert!(mask.get_by_field("name").is_err());
        assert!(mask.key().is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(ResultField::Wildcard.to_string(), "*");
        assert_eq!(ResultField::field("a.b").unwrap().to_string(), "a.b");
        assert_eq!(ResultField::expr("n", lit(1i64)).to_string(), "1 AS n");
    }
}
