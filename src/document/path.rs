//! Field paths
//!
//! A path such as `address.lines.0` selects a value inside nested documents
//! and arrays. Numeric fragments index arrays; every other fragment names a
//! document field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{DbError, DbResult};

use super::value::Value;
use super::Document;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathFragment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFragment::Field(name) => write!(f, "{}", name),
            PathFragment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Dotted path into a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    fragments: Vec<PathFragment>,
}

impl FieldPath {
    /// Parses a dotted path. Empty paths and empty fragments are rejected.
    pub fn parse(path: &str) -> DbResult<Self> {
        if path.is_empty() {
            return Err(DbError::query_invalid("field path cannot be empty"));
        }

        let mut fragments = Vec::new();
        for (i, part) in path.split('.').enumerate() {
            if part.is_empty() {
                return Err(DbError::query_invalid(format!(
                    "empty fragment in field path '{}'",
                    path
                )));
            }
            // The first fragment always names a field
            match part.parse::<usize>() {
                Ok(idx) if i > 0 => fragments.push(PathFragment::Index(idx)),
                _ => fragments.push(PathFragment::Field(part.to_string())),
            }
        }

        Ok(Self { fragments })
    }

    /// Builds a single-fragment path
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            fragments: vec![PathFragment::Field(name.into())],
        }
    }

    pub fn fragments(&self) -> &[PathFragment] {
        &self.fragments
    }

    /// Returns the top-level field name
    pub fn first_field(&self) -> &str {
        match self.fragments.first() {
            Some(PathFragment::Field(name)) => name,
            _ => "",
        }
    }

    /// Resolves the path against a document.
    pub fn get_value(&self, doc: &dyn Document) -> DbResult<Value> {
        let mut current = doc
            .get_by_field(self.first_field())
            .map_err(|e| self.rename_miss(e))?;

        for fragment in &self.fragments[1..] {
            current = match (fragment, current) {
                (PathFragment::Field(name), Value::Document(buf)) => buf
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DbError::field_not_found(self))?,
                (PathFragment::Index(idx), Value::Array(mut items)) if *idx < items.len() => {
                    items.swap_remove(*idx)
                }
                _ => return Err(DbError::field_not_found(self)),
            };
        }

        Ok(current)
    }

    fn rename_miss(&self, err: DbError) -> DbError {
        if err.is_field_not_found() {
            DbError::field_not_found(self)
        } else {
            err
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", fragment)?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPath::parse(&raw).map_err(|e| serde::de::Error::custom(e.message().to_string()))
    }
}
