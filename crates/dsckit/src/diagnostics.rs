//! Diagnostic channel
//!
//! Operations report debug state dumps and user-visible failures here,
//! separately from their return values. This keeps the crate usable without
//! depending on a specific logging or UI setup.

use std::sync::{Mutex, PoisonError};

/// Out-of-band reporting for reconciliation operations
pub trait Diagnostics: Send + Sync {
    /// Record a debug message (state dumps, generated scripts)
    fn debug(&self, message: &str);

    /// Record a user-visible failure without aborting the operation
    fn err(&self, message: &str);
}

/// Forwards diagnostics to the `log` facade
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn err(&self, message: &str) {
        log::error!("{message}");
    }
}

/// Severity of a recorded diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Error,
}

/// A single recorded diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub message: String,
}

/// Captures diagnostics in memory
///
/// Useful for hosts that surface errors themselves, and for tests.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    records: Mutex<Vec<Record>>,
}

impl RecordingDiagnostics {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in order
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages recorded at error level
    pub fn errors(&self) -> Vec<String> {
        self.messages(Level::Error)
    }

    /// Messages recorded at debug level
    pub fn debug_messages(&self) -> Vec<String> {
        self.messages(Level::Debug)
    }

    fn messages(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .map(|r| r.message)
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Record {
                level,
                message: message.to_string(),
            });
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn err(&self, message: &str) {
        self.push(Level::Error, message);
    }
}
