//! Owned documents
//!
//! `FieldBuffer` keeps fields in insertion order. It is the document type
//! used for inserts, decoded records and projected results.

use serde::{Deserialize, Serialize};

use crate::errors::{DbError, DbResult};

use super::path::{FieldPath, PathFragment};
use super::value::Value;
use super::Document;

/// Ordered list of name/value pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldBuffer {
    fields: Vec<(String, Value)>,
}

impl FieldBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field without checking for an existing one
    pub fn add(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Replaces the named field or appends it
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Removes the named field, returning its value
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Sets the value at a path, creating intermediate documents as needed.
    ///
    /// Array fragments must address an existing element.
    pub fn set_by_path(&mut self, path: &FieldPath, value: Value) -> DbResult<()> {
        set_in_buffer(self, path.fragments(), value, path)
    }

    /// Copies every field of a document into a new buffer
    pub fn copy_from(doc: &dyn Document) -> DbResult<Self> {
        let mut buf = FieldBuffer::new();
        doc.iterate(&mut |name, value| {
            buf.add(name, value);
            Ok(())
        })?;
        Ok(buf)
    }

    /// Builds a buffer from a JSON object. Non-objects yield an empty buffer.
    pub fn from_json(json: &serde_json::Value) -> Self {
        let mut buf = FieldBuffer::new();
        if let serde_json::Value::Object(map) = json {
            for (name, value) in map {
                buf.add(name.clone(), Value::from_json(value));
            }
        }
        buf
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(n, v)| (n.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

fn set_in_buffer(
    buf: &mut FieldBuffer,
    fragments: &[PathFragment],
    value: Value,
    path: &FieldPath,
) -> DbResult<()> {
    let (head, rest) = match fragments.split_first() {
        Some(split) => split,
        None => return Err(DbError::query_invalid("cannot set an empty path")),
    };

    let name = match head {
        PathFragment::Field(name) => name,
        PathFragment::Index(_) => return Err(DbError::field_not_found(path)),
    };

    if rest.is_empty() {
        buf.set(name.clone(), value);
        return Ok(());
    }

    if buf.get(name).is_none() {
        buf.set(name.clone(), Value::Document(FieldBuffer::new()));
    }
    let slot = buf
        .fields
        .iter_mut()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
        .ok_or_else(|| DbError::field_not_found(path))?;

    set_in_value(slot, rest, value, path)
}

fn set_in_value(
    slot: &mut Value,
    fragments: &[PathFragment],
    value: Value,
    path: &FieldPath,
) -> DbResult<()> {
    match (slot, fragments.first()) {
        (Value::Document(inner), Some(PathFragment::Field(_))) => {
            set_in_buffer(inner, fragments, value, path)
        }
        (Value::Array(items), Some(PathFragment::Index(idx))) => {
            let item = items
                .get_mut(*idx)
                .ok_or_else(|| DbError::field_not_found(path))?;
            if fragments.len() == 1 {
                *item = value;
                Ok(())
            } else {
                set_in_value(item, &fragments[1..], value, path)
            }
        }
        _ => Err(DbError::field_not_found(path)),
    }
}

impl Document for FieldBuffer {
    fn get_by_field(&self, name: &str) -> DbResult<Value> {
        self.get(name)
            .cloned()
            .ok_or_else(|| DbError::field_not_found(name))
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, Value) -> DbResult<()>) -> DbResult<()> {
        for (name, value) in &self.fields {
            f(name, value.clone())?;
        }
        Ok(())
    }
}
