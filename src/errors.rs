//! Error types for aerodoc
//!
//! Every subsystem reports failures through `DbError`, a code plus a
//! human-readable message. Codes follow the `AERO_CATEGORY_NAME` format.
//!
//! Error codes:
//! - AERO_KEY_NOT_FOUND (ERROR)
//! - AERO_READ_ONLY (REJECT)
//! - AERO_CANCELLED (ERROR)
//! - AERO_TYPE_MISMATCH (REJECT)
//! - AERO_CONVERSION_FAILED (REJECT)
//! - AERO_FIELD_NOT_FOUND (ERROR)
//! - AERO_MISSING_TABLE_SELECTOR (REJECT)
//! - AERO_TABLE_NOT_FOUND (REJECT)
//! - AERO_TABLE_EXISTS (REJECT)
//! - AERO_INDEX_NOT_FOUND (REJECT)
//! - AERO_INDEX_EXISTS (REJECT)
//! - AERO_STORE_NOT_FOUND (ERROR)
//! - AERO_STORE_EXISTS (ERROR)
//! - AERO_TX_DISCARDED (ERROR)
//! - AERO_DUPLICATE_DOCUMENT (REJECT)
//! - AERO_QUERY_INVALID (REJECT)
//! - AERO_ARITHMETIC_OVERFLOW (REJECT)
//! - AERO_EXECUTION_LIMIT (ERROR)
//! - AERO_ENCODING_FAILED (ERROR)
//! - AERO_DATA_CORRUPTION (FATAL)

use std::fmt;

/// Severity levels for database errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected before or during validation
    Reject,
    /// Operation failed but the database is healthy
    Error,
    /// Stored data can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Error codes shared by the storage and query layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorCode {
    /// Get/Delete on an absent key
    AeroKeyNotFound,
    /// Mutation attempted on a read-only store or transaction
    AeroReadOnly,
    /// Cancellation signal or deadline observed
    AeroCancelled,
    /// Value has the wrong type for the operation
    AeroTypeMismatch,
    /// Lossy or meaningless value conversion
    AeroConversionFailed,
    /// Document field lookup miss
    AeroFieldNotFound,
    /// Statement has no target table
    AeroMissingTableSelector,
    /// Table does not exist
    AeroTableNotFound,
    /// Table already exists
    AeroTableExists,
    /// Index does not exist
    AeroIndexNotFound,
    /// Index already exists
    AeroIndexExists,
    /// Backend namespace does not exist
    AeroStoreNotFound,
    /// Backend namespace already exists
    AeroStoreExists,
    /// Handle used after its transaction ended
    AeroTxDiscarded,
    /// Primary key or unique index collision
    AeroDuplicateDocument,
    /// Malformed statement
    AeroQueryInvalid,
    /// Arithmetic overflowed or left the finite range
    AeroArithmeticOverflow,
    /// Execution bound exceeded
    AeroExecutionLimit,
    /// Key or document could not be encoded or decoded
    AeroEncodingFailed,
    /// Checksum mismatch on read
    AeroDataCorruption,
}

impl DbErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            DbErrorCode::AeroKeyNotFound => "AERO_KEY_NOT_FOUND",
            DbErrorCode::AeroReadOnly => "AERO_READ_ONLY",
            DbErrorCode::AeroCancelled => "AERO_CANCELLED",
            DbErrorCode::AeroTypeMismatch => "AERO_TYPE_MISMATCH",
            DbErrorCode::AeroConversionFailed => "AERO_CONVERSION_FAILED",
            DbErrorCode::AeroFieldNotFound => "AERO_FIELD_NOT_FOUND",
            DbErrorCode::AeroMissingTableSelector => "AERO_MISSING_TABLE_SELECTOR",
            DbErrorCode::AeroTableNotFound => "AERO_TABLE_NOT_FOUND",
            DbErrorCode::AeroTableExists => "AERO_TABLE_EXISTS",
            DbErrorCode::AeroIndexNotFound => "AERO_INDEX_NOT_FOUND",
            DbErrorCode::AeroIndexExists => "AERO_INDEX_EXISTS",
            DbErrorCode::AeroStoreNotFound => "AERO_STORE_NOT_FOUND",
            DbErrorCode::AeroStoreExists => "AERO_STORE_EXISTS",
            DbErrorCode::AeroTxDiscarded => "AERO_TX_DISCARDED",
            DbErrorCode::AeroDuplicateDocument => "AERO_DUPLICATE_DOCUMENT",
            DbErrorCode::AeroQueryInvalid => "AERO_QUERY_INVALID",
            DbErrorCode::AeroArithmeticOverflow => "AERO_ARITHMETIC_OVERFLOW",
            DbErrorCode::AeroExecutionLimit => "AERO_EXECUTION_LIMIT",
            DbErrorCode::AeroEncodingFailed => "AERO_ENCODING_FAILED",
            DbErrorCode::AeroDataCorruption => "AERO_DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            DbErrorCode::AeroReadOnly
            | DbErrorCode::AeroTypeMismatch
            | DbErrorCode::AeroConversionFailed
            | DbErrorCode::AeroMissingTableSelector
            | DbErrorCode::AeroTableNotFound
            | DbErrorCode::AeroTableExists
            | DbErrorCode::AeroIndexNotFound
            | DbErrorCode::AeroIndexExists
            | DbErrorCode::AeroDuplicateDocument
            | DbErrorCode::AeroQueryInvalid
            | DbErrorCode::AeroArithmeticOverflow => Severity::Reject,
            DbErrorCode::AeroDataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Database error with full context
#[derive(Debug, Clone)]
pub struct DbError {
    code: DbErrorCode,
    message: String,
}

impl DbError {
    /// Create an error from a code and message
    pub fn new(code: DbErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a key not found error
    pub fn key_not_found() -> Self {
        Self::new(DbErrorCode::AeroKeyNotFound, "Key not found")
    }

    /// Create a read-only violation error
    pub fn read_only() -> Self {
        Self::new(DbErrorCode::AeroReadOnly, "Transaction is read-only")
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroCancelled, reason)
    }

    /// Create a type mismatch error
    pub fn type_mismatch(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroTypeMismatch, reason)
    }

    /// Create a conversion failure error
    pub fn conversion_failed(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroConversionFailed, reason)
    }

    /// Create a field not found error
    pub fn field_not_found(field: impl fmt::Display) -> Self {
        Self::new(
            DbErrorCode::AeroFieldNotFound,
            format!("Field '{}' not found", field),
        )
    }

    /// Create a missing table selector error
    pub fn missing_table_selector() -> Self {
        Self::new(DbErrorCode::AeroMissingTableSelector, "missing table selector")
    }

    /// Create a table not found error
    pub fn table_not_found(name: &str) -> Self {
        Self::new(
            DbErrorCode::AeroTableNotFound,
            format!("Table '{}' not found", name),
        )
    }

    /// Create a table already exists error
    pub fn table_exists(name: &str) -> Self {
        Self::new(
            DbErrorCode::AeroTableExists,
            format!("Table '{}' already exists", name),
        )
    }

    /// Create an index not found error
    pub fn index_not_found(name: &str) -> Self {
        Self::new(
            DbErrorCode::AeroIndexNotFound,
            format!("Index '{}' not found", name),
        )
    }

    /// Create an index already exists error
    pub fn index_exists(name: &str) -> Self {
        Self::new(
            DbErrorCode::AeroIndexExists,
            format!("Index '{}' already exists", name),
        )
    }

    /// Create a store not found error
    pub fn store_not_found(name: &[u8]) -> Self {
        Self::new(
            DbErrorCode::AeroStoreNotFound,
            format!("Store '{}' not found", String::from_utf8_lossy(name)),
        )
    }

    /// Create a store already exists error
    pub fn store_exists(name: &[u8]) -> Self {
        Self::new(
            DbErrorCode::AeroStoreExists,
            format!("Store '{}' already exists", String::from_utf8_lossy(name)),
        )
    }

    /// Create a transaction discarded error
    pub fn tx_discarded() -> Self {
        Self::new(
            DbErrorCode::AeroTxDiscarded,
            "Transaction has already been committed or rolled back",
        )
    }

    /// Create a duplicate document error
    pub fn duplicate_document(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroDuplicateDocument, reason)
    }

    /// Create a query invalid error
    pub fn query_invalid(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroQueryInvalid, reason)
    }

    /// Create an arithmetic overflow error
    pub fn arithmetic_overflow(op: &str) -> Self {
        Self::new(
            DbErrorCode::AeroArithmeticOverflow,
            format!("Arithmetic overflow in '{}'", op),
        )
    }

    /// Create an execution limit error
    pub fn execution_limit(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroExecutionLimit, reason)
    }

    /// Create an encoding error
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroEncodingFailed, reason)
    }

    /// Create a data corruption error (FATAL)
    pub fn data_corruption(reason: impl Into<String>) -> Self {
        Self::new(DbErrorCode::AeroDataCorruption, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> DbErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns true for a Get/Delete miss
    pub fn is_key_not_found(&self) -> bool {
        self.code == DbErrorCode::AeroKeyNotFound
    }

    /// Returns true for a document field lookup miss
    pub fn is_field_not_found(&self) -> bool {
        self.code == DbErrorCode::AeroFieldNotFound
    }

    /// Returns true when a cancellation signal aborted the operation
    pub fn is_cancelled(&self) -> bool {
        self.code == DbErrorCode::AeroCancelled
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for DbError {}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
