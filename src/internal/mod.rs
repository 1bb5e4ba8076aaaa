/// Module that provides the ACTION/GOTO table construction with conflict
/// resolution and default-production detection.
pub(crate) mod action_table;

/// Module that provides the character class algebra.
pub(crate) mod char_class;

/// Module that provides the grammar integrity checks.
pub(crate) mod checks;

/// Module that provides the conversion of regex class ASTs into character
/// classes.
pub(crate) mod class_builder;

/// Module that provides the DFA and the subset construction.
pub(crate) mod dfa;

/// Module with conversion to graphviz dot format.
#[cfg(feature = "dot_writer")]
pub(crate) mod dot;

/// Module that provides the FIRST and FOLLOW set computation.
pub(crate) mod first_follow;

/// Module that provides the grammar model.
pub(crate) mod grammar;

/// Module that provides the parser for the grammar description language.
pub(crate) mod grammar_parser;

/// Module for several ID types.
mod ids;
pub(crate) use ids::{DfaID, LalrStateID, ProductionID, StateID, SymbolID, TerminalID};

/// Module that provides the LALR(1) automaton construction.
pub(crate) mod lalr;

/// Module that provides the lexer assembly.
pub(crate) mod lexer;

/// Module that provides the DFA minimization.
pub(crate) mod minimizer;

/// The nfa module contains the NFA implementation.
pub(crate) mod nfa;

/// The regex_parser module contains the regex syntax parser.
pub(crate) mod regex_parser;

/// Module that provides the grammar rewriter.
pub(crate) mod rewriter;

/// Module that provides the multi-terminal NFA.
pub(crate) mod terminal_nfa;

/// Module that provides the bitset over terminal ids.
pub(crate) mod terminal_set;
