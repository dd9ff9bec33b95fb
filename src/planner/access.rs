//! Access paths
//!
//! An access path says where a query's candidate documents come from: the
//! table itself in key order, or an index over a key range.

use serde::Serialize;

use crate::document::encoding::{encode_value, type_prefix};
use crate::document::{FieldPath, Value};
use crate::query::expr::CmpOp;

/// Scan type chosen by the optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanType {
    /// Every document in key order
    TableScan,
    /// Index entries within a derived range
    IndexSeek,
    /// Every index entry, used for ordering
    IndexScan,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::TableScan => "TABLE_SCAN",
            ScanType::IndexSeek => "INDEX_SEEK",
            ScanType::IndexScan => "INDEX_SCAN",
        }
    }
}

/// Bounds on encoded index keys.
///
/// `lower` is inclusive. `upper` is an inclusive prefix: a key is within it
/// when it starts with `upper` or sorts below it. Index entries carry the
/// table key after the value, so a prefix bound keeps every entry of the
/// bounding value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRange {
    pub lower: Option<Vec<u8>>,
    pub upper: Option<Vec<u8>>,
}

impl IndexRange {
    /// Every entry of the index
    pub fn full() -> Self {
        Self::default()
    }

    /// Range covering `field <op> value`. `!=` has no useful range.
    pub fn for_comparison(op: CmpOp, value: &Value) -> Option<Self> {
        let encoded = encode_value(value);
        let range = match op {
            CmpOp::Eq => Self {
                lower: Some(encoded.clone()),
                upper: Some(encoded),
            },
            CmpOp::Gt | CmpOp::Gte => Self {
                lower: Some(encoded),
                upper: Some(type_prefix(value)),
            },
            CmpOp::Lt | CmpOp::Lte => Self {
                lower: Some(type_prefix(value)),
                upper: Some(encoded),
            },
            CmpOp::Neq => return None,
        };
        Some(range)
    }

    pub fn is_full(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    pub fn above_lower(&self, key: &[u8]) -> bool {
        match &self.lower {
            Some(lower) => key >= lower.as_slice(),
            None => true,
        }
    }

    pub fn below_upper(&self, key: &[u8]) -> bool {
        match &self.upper {
            Some(upper) => key.starts_with(upper) || key < upper.as_slice(),
            None => true,
        }
    }
}

/// Where candidate documents are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPath {
    TableScan {
        reverse: bool,
    },
    Index {
        index: String,
        path: FieldPath,
        range: IndexRange,
        reverse: bool,
    },
}

impl AccessPath {
    pub fn scan_type(&self) -> ScanType {
        match self {
            AccessPath::TableScan { .. } => ScanType::TableScan,
            AccessPath::Index { range, .. } if range.is_full() => ScanType::IndexScan,
            AccessPath::Index { .. } => ScanType::IndexSeek,
        }
    }

    pub fn index_name(&self) -> Option<&str> {
        match self {
            AccessPath::TableScan { .. } => None,
            AccessPath::Index { index, .. } => Some(index),
        }
    }

    pub fn is_reverse(&self) -> bool {
        match self {
            AccessPath::TableScan { reverse } | AccessPath::Index { reverse, .. } => *reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: impl Into<Value>, table_key: &[u8]) -> Vec<u8> {
        let mut key = encode_value(&value.into());
        key.extend_from_slice(table_key);
        key
    }

    #[test]
    fn test_equality_range_keeps_every_entry_of_the_value() {
        let range = IndexRange::for_comparison(CmpOp::Eq, &Value::Integer(5)).unwrap();
        assert!(range.above_lower(&entry(5i64, b"k1")));
        assert!(range.below_upper(&entry(5i64, b"\xff\xff")));
        assert!(!range.below_upper(&entry(6i64, b"")));
        assert!(!range.above_lower(&entry(4i64, b"\xff")));
    }

    #[test]
    fn test_greater_than_range_stays_within_type() {
        let range = IndexRange::for_comparison(CmpOp::Gt, &Value::Integer(7)).unwrap();
        assert!(range.above_lower(&entry(8i64, b"k")));
        assert!(range.below_upper(&entry(1e300, b"k")));
        assert!(!range.below_upper(&entry("text", b"k")));
    }

    #[test]
    fn test_less_than_range_starts_at_type() {
        let range = IndexRange::for_comparison(CmpOp::Lt, &Value::from("m")).unwrap();
        assert!(range.above_lower(&entry("", b"k")));
        assert!(!range.above_lower(&entry(99i64, b"k")));
        assert!(range.below_upper(&entry("a", b"k")));
        assert!(!range.below_upper(&entry("z", b"k")));
    }

    #[test]
    fn test_not_equal_has_no_range() {
        assert!(IndexRange::for_comparison(CmpOp::Neq, &Value::Integer(1)).is_none());
    }

    #[test]
    fn test_scan_types() {
        let path = FieldPath::field("age");
        let full = AccessPath::Index {
            index: "by_age".to_string(),
            path: path.clone(),
            range: IndexRange::full(),
            reverse: true,
        };
        assert_eq!(full.scan_type(), ScanType::IndexScan);
        assert!(full.is_reverse());
        assert_eq!(full.index_name(), Some("by_age"));

        let seek = AccessPath::Index {
            index: "by_age".to_string(),
            path,
            range: IndexRange::for_comparison(CmpOp::Eq, &Value::Integer(1)).unwrap(),
            reverse: false,
        };
        assert_eq!(seek.scan_type().as_str(), "INDEX_SEEK");
        assert_eq!(AccessPath::TableScan { reverse: false }.scan_type().as_str(), "TABLE_SCAN");
    }
}
