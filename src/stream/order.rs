//! In-memory ORDER BY
//!
//! Documents are ordered by the key encoding of the sort value, the same
//! order an index over that path yields. Documents without the field sort
//! first. Equal keys keep their input order when ascending and reverse it
//! when descending, again matching an index scan.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::encoding::{encode_missing, encode_value};
use crate::document::{Document, FieldPath};
use crate::errors::{DbError, DbResult};

use super::{BoxedDocument, DocumentIter};

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Sort key for a document at `path`
pub(crate) fn sort_key(doc: &dyn Document, path: &FieldPath) -> DbResult<Vec<u8>> {
    match path.get_value(doc) {
        Ok(value) => Ok(encode_value(&value)),
        Err(err) if err.is_field_not_found() => Ok(encode_missing()),
        Err(err) => Err(err),
    }
}

pub(super) struct OrderBy<'a> {
    source: Option<DocumentIter<'a>>,
    path: FieldPath,
    direction: SortDirection,
    max_documents: usize,
    sorted: std::vec::IntoIter<BoxedDocument<'a>>,
}

impl<'a> OrderBy<'a> {
    pub(super) fn new(
        source: DocumentIter<'a>,
        path: FieldPath,
        direction: SortDirection,
        max_documents: usize,
    ) -> Self {
        Self {
            source: Some(source),
            path,
            direction,
            max_documents,
            sorted: Vec::new().into_iter(),
        }
    }

    fn fill(&mut self, source: DocumentIter<'a>) -> DbResult<()> {
        let mut keyed = Vec::new();
        for doc in source {
            let doc = doc?;
            if keyed.len() == self.max_documents {
                return Err(DbError::execution_limit(format!(
                    "ORDER BY {} exceeds the in-memory sort limit of {} documents",
                    self.path, self.max_documents
                )));
            }
            let key = sort_key(doc.as_ref(), &self.path)?;
            keyed.push((key, doc));
        }

        // Stable sort, then reverse for DESC so ties mirror a reverse scan
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if self.direction == SortDirection::Desc {
            keyed.reverse();
        }

        self.sorted = keyed
            .into_iter()
            .map(|(_, doc)| doc)
            .collect::<Vec<_>>()
            .into_iter();
        Ok(())
    }
}

impl<'a> Iterator for OrderBy<'a> {
    type Item = DbResult<BoxedDocument<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        // The source is consumed and dropped on the first pull
        if let Some(source) = self.source.take() {
            if let Err(err) = self.fill(source) {
                return Some(Err(err));
            }
        }
        self.sorted.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FieldBuffer, Value};
    use crate::errors::DbErrorCode;
    use crate::stream::Stream;
    use serde_json::json;

    fn people() -> Stream<'static> {
        Stream::from_documents(vec![
            FieldBuffer::from_json(&json!({"name": "c", "age": 30})),
            FieldBuffer::from_json(&json!({"name": "a", "age": 20})),
            FieldBuffer::from_json(&json!({"name": "x"})),
            FieldBuffer::from_json(&json!({"name": "b", "age": 25.5})),
        ])
    }

    fn names(stream: Stream<'_>) -> Vec<String> {
        stream
            .into_documents()
            .unwrap()
            .iter()
            .map(|d| match d.get("name") {
                Some(Value::Text(s)) => s.clone(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn test_sort_ascending_missing_first() {
        let age = FieldPath::parse("age").unwrap();
        let sorted = people().order_by(age, SortDirection::Asc, 100);
        assert_eq!(names(sorted), vec!["x", "a", "b", "c"]);
    }

    #[test]
    fn test_sort_descending() {
        let age = FieldPath::parse("age").unwrap();
        let sorted = people().order_by(age, SortDirection::Desc, 100);
        assert_eq!(names(sorted), vec!["c", "b", "a", "x"]);
    }

    #[test]
    fn test_sort_limit_exceeded() {
        let age = FieldPath::parse("age").unwrap();
        let err = people()
            .order_by(age, SortDirection::Asc, 3)
            .count()
            .unwrap_err();
        assert_eq!(err.code(), DbErrorCode::AeroExecutionLimit);
    }

    #[test]
    fn test_sort_exactly_at_limit() {
        let age = FieldPath::parse("age").unwrap();
        assert_eq!(
            people().order_by(age, SortDirection::Asc, 4).count().unwrap(),
            4
        );
    }
}
