//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` when finished
//! - Logs `{name}_INCOMPLETE` if dropped without either

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs begin and end events around one operation
///
/// ```ignore
/// let scope = ObservationScope::with_fields("REJOIN", &[("url", "db1:3306")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("strategy", "flashback")]);
/// ```
///
/// Fields given at creation are repeated on the closing line, together
/// with `duration_ms`.
pub struct ObservationScope {
    name: String,
    completed: bool,
    fields: Vec<(String, String)>,
    timer: Timer,
}

impl ObservationScope {
    pub fn new(name: &str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name: name.to_string(),
            completed: false,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timer: Timer::new(),
        }
    }

    fn closing_fields<'s>(&'s self, duration: &'s str, extra: &[(&'s str, &'s str)]) -> Vec<(&'s str, &'s str)> {
        let mut all: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.push(("duration_ms", duration));
        all.extend(extra.iter().copied());
        all
    }

    /// Logs `{name}_COMPLETE` at INFO level.
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let duration = self.timer.elapsed_ms();
        Logger::info(
            &format!("{}_COMPLETE", self.name),
            &self.closing_fields(&duration, extra_fields),
        );
    }

    /// Logs `{name}_FAILED` at ERROR level.
    pub fn fail(mut self, reason: &str) {
        self.completed = true;
        let duration = self.timer.elapsed_ms();
        Logger::error(
            &format!("{}_FAILED", self.name),
            &self.closing_fields(&duration, &[("reason", reason)]),
        );
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            let event = format!("{}_INCOMPLETE", self.name);
            Logger::warn(&event, &[("reason", "scope dropped without completion")]);
        }
    }
}

/// A simple duration timer for logging elapsed time
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
