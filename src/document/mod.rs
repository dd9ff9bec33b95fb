//! Document model
//!
//! Documents are read-only views mapping field names to values. Field
//! lookup never has side effects, and a missing field is reported as
//! `AERO_FIELD_NOT_FOUND` so callers can tell it apart from a null value.

pub mod buffer;
pub mod encoding;
pub mod path;
pub mod value;

pub use buffer::FieldBuffer;
pub use encoding::EncodingError;
pub use path::{FieldPath, PathFragment};
pub use value::{Value, ValueType};

use crate::errors::DbResult;

/// Read-only view of a document
pub trait Document {
    /// Returns the value of a top-level field
    fn get_by_field(&self, name: &str) -> DbResult<Value>;

    /// Calls `f` once per field, in document order. Stops at the first error.
    fn iterate(&self, f: &mut dyn FnMut(&str, Value) -> DbResult<()>) -> DbResult<()>;

    /// Storage key the document was read from, if any
    fn key(&self) -> Option<&[u8]> {
        None
    }
}

/// A decoded record together with its storage key
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: Vec<u8>,
    pub fields: FieldBuffer,
}

impl StoredDocument {
    pub fn new(key: Vec<u8>, fields: FieldBuffer) -> Self {
        Self { key, fields }
    }
}

impl Document for StoredDocument {
    fn get_by_field(&self, name: &str) -> DbResult<Value> {
        self.fields.get_by_field(name)
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, Value) -> DbResult<()>) -> DbResult<()> {
        self.fields.iterate(f)
    }

    fn key(&self) -> Option<&[u8]> {
        Some(&self.key)
    }
}

impl<D: Document + ?Sized> Document for Box<D> {
    fn get_by_field(&self, name: &str) -> DbResult<Value> {
        (**self).get_by_field(name)
    }

    fn iterate(&self, f: &mut dyn FnMut(&str, Value) -> DbResult<()>) -> DbResult<()> {
        (**self).iterate(f)
    }

    fn key(&self) -> Option<&[u8]> {
        (**self).key()
    }
}
