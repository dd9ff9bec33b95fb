//! Observable events
//!
//! Events are explicit and typed; each one maps to a fixed log name and a
//! default severity.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Transactions
    TxBegin,
    TxCommit,
    TxRollback,

    // Queries
    QueryPlanned,
    QueryExecuted,
    QueryRejected,

    // Catalog
    TableCreated,
    TableDropped,
    IndexCreated,
    IndexDropped,

    /// Cancellation signal or deadline observed
    OperationCancelled,
    /// Checksum mismatch on read (FATAL)
    DataCorruption,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::TxBegin => "TX_BEGIN",
            Event::TxCommit => "TX_COMMIT",
            Event::TxRollback => "TX_ROLLBACK",
            Event::QueryPlanned => "QUERY_PLANNED",
            Event::QueryExecuted => "QUERY_COMPLETE",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::TableCreated => "TABLE_CREATED",
            Event::TableDropped => "TABLE_DROPPED",
            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexDropped => "INDEX_DROPPED",
            Event::OperationCancelled => "OPERATION_CANCELLED",
            Event::DataCorruption => "DATA_CORRUPTION",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::DataCorruption => Severity::Fatal,
            Event::QueryRejected | Event::OperationCancelled => Severity::Warn,
            Event::QueryPlanned => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::TxBegin,
            Event::TxCommit,
            Event::TxRollback,
            Event::QueryPlanned,
            Event::QueryExecuted,
            Event::QueryRejected,
            Event::TableCreated,
            Event::TableDropped,
            Event::IndexCreated,
            Event::IndexDropped,
            Event::OperationCancelled,
            Event::DataCorruption,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert_eq!(Event::DataCorruption.severity(), Severity::Fatal);
        assert_eq!(Event::TxCommit.severity(), Severity::Info);
        assert_eq!(Event::QueryRejected.severity(), Severity::Warn);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::QueryExecuted), "QUERY_COMPLETE");
    }
}
