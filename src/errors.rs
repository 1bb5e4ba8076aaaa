use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::position::Position;

/// The result type for the `lalrgen` crate.
pub type Result<T> = std::result::Result<T, GenError>;

/// The error type for the `lalrgen` crate.
#[derive(Error, Debug)]
pub struct GenError {
    /// The source of the error.
    pub source: Box<GenErrorKind>,
}

impl GenError {
    /// Create a new `GenError`.
    pub fn new(kind: GenErrorKind) -> Self {
        GenError {
            source: Box::new(kind),
        }
    }
}

impl std::fmt::Display for GenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The error kind type.
#[derive(Error, Debug)]
pub enum GenErrorKind {
    /// A syntax error in the grammar description.
    #[error("{}: {message}", .position.map(|p| p.to_string()).unwrap_or_else(|| "grammar".to_string()))]
    Syntax {
        /// Where the error was detected, if known.
        position: Option<Position>,
        /// The user-facing description.
        message: String,
    },

    /// An error occurred during the parsing of a regex terminal.
    #[error("'{1}' {0}")]
    RegexSyntaxError(regex_syntax::ast::Error, String),

    /// Used regex features that are not supported (yet).
    #[error("Unsupported regex feature: {0}")]
    UnsupportedFeature(String),

    /// The grammar failed one or more integrity checks that prevent table
    /// generation. All collected diagnostics are carried along.
    #[error("grammar rejected: {}", .0.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("; "))]
    Semantic(Vec<Diagnostic>),

    /// A std::io error occurred.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl From<regex_syntax::ast::Error> for GenError {
    fn from(error: regex_syntax::ast::Error) -> Self {
        let pattern = error.pattern().to_string();
        GenError::new(GenErrorKind::RegexSyntaxError(error, pattern))
    }
}

impl From<std::io::Error> for GenError {
    fn from(error: std::io::Error) -> Self {
        GenError::new(GenErrorKind::IoError(error))
    }
}
