//! Module with the diagnostics sink.
//! Every generation phase reports its findings here and continues as long as
//! the invariants allow, so that the user sees multiple problems in one run.

use std::fmt;

use crate::position::Position;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Severity {
    /// The grammar is accepted, but the user should have a look.
    Warning,
    /// The grammar is rejected.
    Error,
}

/// A single user-facing finding.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    /// The severity of the finding.
    pub severity: Severity,
    /// Where in the grammar text the finding applies, if known.
    pub position: Option<Position>,
    /// The message, carrying symbol/production context.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        if let Some(position) = &self.position {
            write!(f, "{}: {}: {}", tag, position, self.message)
        } else {
            write!(f, "{}: {}", tag, self.message)
        }
    }
}

/// The collection of diagnostics of one generation run.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty diagnostics sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a warning.
    pub fn warning(&mut self, position: Option<Position>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            position,
            message: message.into(),
        });
    }

    /// Report an error.
    pub fn error(&mut self, position: Option<Position>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            position,
            message: message.into(),
        });
    }

    /// All collected diagnostics in report order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// The number of collected errors.
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// The number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// True if at least one error was reported.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// Consume the sink and return the diagnostics.
    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}
