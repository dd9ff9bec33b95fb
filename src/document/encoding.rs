//! Key and document encoding
//!
//! Keys are encoded so that byte order matches value order. Every encoded
//! value is self-delimiting, so an index entry can append the primary key
//! after the indexed value without breaking the ordering.
//!
//! Integers and doubles share one numeric encoding and sort together. A
//! number key is the nearest double followed by the exact integer residual,
//! so integers beyond 2^53 keep distinct keys while `3` and `3.0` share one.
//!
//! Document bodies are JSON followed by a little-endian CRC32 of the JSON
//! bytes. A mismatch on read is reported as data corruption. NaN and the
//! infinities have no JSON form and are refused at write time.

use thiserror::Error;

use crate::errors::DbError;

use super::buffer::FieldBuffer;
use super::value::Value;

// Type prefixes. Order matters: they determine cross-type ordering.
const TYPE_MISSING: u8 = 0x00;
const TYPE_NULL: u8 = 0x01;
const TYPE_BOOL: u8 = 0x02;
const TYPE_NUMBER: u8 = 0x03;
const TYPE_TEXT: u8 = 0x04;
const TYPE_BLOB: u8 = 0x05;
const TYPE_ARRAY: u8 = 0x06;
const TYPE_DOCUMENT: u8 = 0x07;

const CHECKSUM_LEN: usize = 4;

/// Byte-level codec failures
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Truncated data")]
    TruncatedData,

    #[error("Invalid encoding format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<EncodingError> for DbError {
    fn from(err: EncodingError) -> Self {
        match err {
            EncodingError::ChecksumMismatch { .. } => DbError::data_corruption(err.to_string()),
            other => DbError::encoding(other.to_string()),
        }
    }
}

/// Encodes a value as an order-preserving key
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_value_into(value, &mut out);
    out
}

fn encode_value_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TYPE_NULL),
        Value::Bool(b) => {
            out.push(TYPE_BOOL);
            out.push(u8::from(*b));
        }
        Value::Integer(i) => {
            let nearest = *i as f64;
            // Exact in i128: |i - nearest| is at most 2^10
            let residual = (i128::from(*i) - nearest as i128) as i64;
            encode_number(nearest, residual, out);
        }
        Value::Double(d) => encode_number(*d, 0, out),
        Value::Text(s) => {
            out.push(TYPE_TEXT);
            escape_bytes(s.as_bytes(), out);
        }
        Value::Blob(b) => {
            out.push(TYPE_BLOB);
            escape_bytes(b, out);
        }
        Value::Array(items) => {
            out.push(TYPE_ARRAY);
            for item in items {
                // Marker byte keeps shorter arrays ahead of longer ones
                out.push(0x01);
                encode_value_into(item, out);
            }
            out.push(0x00);
        }
        Value::Document(doc) => {
            out.push(TYPE_DOCUMENT);
            for (name, field) in doc.fields() {
                out.push(0x01);
                escape_bytes(name.as_bytes(), out);
                encode_value_into(field, out);
            }
            out.push(0x00);
        }
    }
}

fn encode_number(f: f64, residual: i64, out: &mut Vec<u8>) {
    // Fold -0.0 into 0.0 so equal numbers share one key
    let f = if f == 0.0 { 0.0 } else { f };
    let bits = f.to_bits();
    let ordered = if bits & (1u64 << 63) != 0 {
        !bits
    } else {
        bits | (1u64 << 63)
    };
    out.push(TYPE_NUMBER);
    out.extend_from_slice(&ordered.to_be_bytes());
    out.extend_from_slice(&encode_int_key(residual));
}

fn escape_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    for &byte in bytes {
        if byte == 0x00 {
            out.extend_from_slice(&[0x00, 0xFF]);
        } else {
            out.push(byte);
        }
    }
    out.extend_from_slice(&[0x00, 0x00]);
}

/// Key for a document that has no value at an indexed or sorted path.
/// Sorts before every encoded value.
pub fn encode_missing() -> Vec<u8> {
    vec![TYPE_MISSING]
}

/// Returns the one-byte prefix shared by every key of the value's type.
/// Integers and doubles share a prefix.
pub fn type_prefix(value: &Value) -> Vec<u8> {
    let tag = match value {
        Value::Null => TYPE_NULL,
        Value::Bool(_) => TYPE_BOOL,
        Value::Integer(_) | Value::Double(_) => TYPE_NUMBER,
        Value::Text(_) => TYPE_TEXT,
        Value::Blob(_) => TYPE_BLOB,
        Value::Array(_) => TYPE_ARRAY,
        Value::Document(_) => TYPE_DOCUMENT,
    };
    vec![tag]
}

/// Returns true when the value has a stable scalar key encoding usable for
/// index range seeks
pub fn is_seekable(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Document(_))
}

/// Returns the smallest key greater than every key starting with `prefix`,
/// or None when no such key exists
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Encodes a storage-assigned sequence number as a table key
pub fn encode_int_key(i: i64) -> Vec<u8> {
    let unsigned = (i as u64) ^ (1u64 << 63);
    unsigned.to_be_bytes().to_vec()
}

/// Decodes a key produced by `encode_int_key`
pub fn decode_int_key(bytes: &[u8]) -> Result<i64, EncodingError> {
    let buf: [u8; 8] = bytes.try_into().map_err(|_| {
        EncodingError::InvalidFormat(format!("integer key must be 8 bytes, got {}", bytes.len()))
    })?;
    Ok((u64::from_be_bytes(buf) ^ (1u64 << 63)) as i64)
}

/// Encodes a document body with a trailing checksum
pub fn encode_document(doc: &FieldBuffer) -> Result<Vec<u8>, EncodingError> {
    for (name, value) in doc.fields() {
        check_finite(name, value)?;
    }
    let mut body = serde_json::to_vec(doc)?;
    let checksum = crc32fast::hash(&body);
    body.extend_from_slice(&checksum.to_le_bytes());
    Ok(body)
}

fn check_finite(name: &str, value: &Value) -> Result<(), EncodingError> {
    match value {
        Value::Double(d) if !d.is_finite() => Err(EncodingError::InvalidFormat(format!(
            "field '{}' holds non-finite double {}",
            name, d
        ))),
        Value::Array(items) => items.iter().try_for_each(|item| check_finite(name, item)),
        Value::Document(doc) => doc.fields().try_for_each(|(_, field)| check_finite(name, field)),
        _ => Ok(()),
    }
}

/// Decodes a document body, verifying its checksum first
pub fn decode_document(bytes: &[u8]) -> Result<FieldBuffer, EncodingError> {
    if bytes.len() < CHECKSUM_LEN {
        return Err(EncodingError::TruncatedData);
    }

    let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut stored = [0u8; CHECKSUM_LEN];
    stored.copy_from_slice(trailer);
    let stored = u32::from_le_bytes(stored);
    let computed = crc32fast::hash(body);

    if stored != computed {
        return Err(EncodingError::ChecksumMismatch { stored, computed });
    }

    Ok(serde_json::from_slice(body)?)
}
