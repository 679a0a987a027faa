// Error reporting sink shared by the progress store and the watch monitor.
//
// Core operations never hand failures back to the caller; they are pushed
// through an `ErrorReporter` instead so they stay observable.

use std::sync::Mutex;

use crate::TetsundoError;

/// Receives failures that the core recovers from locally.
pub trait ErrorReporter: Send + Sync {
    /// `context` names the operation that failed, e.g. `"progress.save"`.
    fn report(&self, context: &str, error: &TetsundoError);
}

/// Default reporter, forwards everything to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, context: &str, error: &TetsundoError) {
        match error {
            TetsundoError::PlaybackHandleError { .. } => {
                log::warn!("{}: {}", context, error)
            }
            _ => log::error!("{}: {}", context, error),
        }
    }
}

/// Keeps every report in memory. Useful for tests and for surfacing recent
/// problems to a UI.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of `(context, message)` pairs in the order they were reported.
    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }

    pub fn contexts(&self) -> Vec<String> {
        self.reports().into_iter().map(|(context, _)| context).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.reports().is_empty()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, context: &str, error: &TetsundoError) {
        log::debug!("recording report {}: {}", context, error);
        if let Ok(mut reports) = self.reports.lock() {
            reports.push((context.to_string(), error.to_string()));
        }
    }
}
