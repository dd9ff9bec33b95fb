//! ObservationScope for begin/complete logging around an operation
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when finished
//! - Logs `{name}_INCOMPLETE` if dropped without either

use std::cell::Cell;
use std::time::Instant;

use crate::errors::DbError;

use super::logger::{Logger, Severity};

pub struct ObservationScope<'a> {
    name: &'a str,
    finished: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    started: Instant,
}

impl<'a> ObservationScope<'a> {
    /// Fields given here are repeated on the completion line
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::trace(&format!("{}_BEGIN", name), fields);

        Self {
            name,
            finished: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
        }
    }

    /// Logs `{name}_COMPLETE` with the elapsed time and any extra fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.finished.set(true);
        let elapsed = self.elapsed_ms();
        let mut all_fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        all_fields.extend(extra_fields.iter().copied());
        all_fields.push(("elapsed_ms", elapsed.as_str()));

        Logger::info(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    /// Logs `{name}_FAILED`. Fatal errors are logged at FATAL, rejections
    /// at WARN, everything else at ERROR.
    pub fn fail(self, err: &DbError) {
        self.finished.set(true);
        let severity = if err.is_fatal() {
            Severity::Fatal
        } else if err.severity() == crate::errors::Severity::Reject {
            Severity::Warn
        } else {
            Severity::Error
        };
        let message = err.to_string();
        let mut all_fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        all_fields.push(("code", err.code().code()));
        all_fields.push(("reason", message.as_str()));

        Logger::log(severity, &format!("{}_FAILED", self.name), &all_fields);
    }

    fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
