#![forbid(missing_docs)]
//! # `lalrgen`
//! The `lalrgen` crate is a library that generates LALR(1) parsers from
//! EBNF-like grammar descriptions. It compiles the grammar into deterministic
//! shift-reduce tables together with an integrated longest-match lexer that
//! is derived from the terminal symbols of the grammar.
//! The result of a generation run is a frozen, language-neutral description
//! of the parser: symbol and production info, the ACTION and GOTO tables and
//! the scanner DFA tables. Template back ends can expand it into source code
//! without further analysis.
//! To parse the regular expressions of terminal symbols, the crate uses the
//! `regex-syntax` crate.

/// Module with the generator configuration.
mod config;
pub use config::{CaseFolding, GeneratorConfig, LexerMode};

/// Module with the diagnostics sink.
mod diagnostics;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};

/// Module with error definitions.
mod errors;
pub use errors::{GenError, GenErrorKind, Result};

/// Module with the frozen export model.
mod export;
pub use export::{
    Action, ActionEntry, DfaEdge, DfaStateRow, DfaTable, ExportSymbolKind, GotoEntry,
    ParserTables, ProductionInfo, SymbolInfo,
};

/// Module with the generator, the public entry point.
mod generator;
pub use generator::{Generated, Generator, GeneratorBuilder};

/// The module with internal implementation details.
mod internal;

/// Module with the position type.
mod position;
pub use position::Position;
