//! Module with the frozen export model.
//! The export is a language-neutral description of the generated parser:
//! symbol and production info, the ACTION and GOTO tables, the default
//! production per state and the scanner DFA tables. Every id is a direct
//! array index, so template back ends can expand the tables into source
//! code without further analysis.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::internal::action_table::{ActionKind, ParserTable};
use crate::internal::grammar::{Grammar, SymbolKind};
use crate::internal::lexer::LexerTables;

/// The kind of an exported symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExportSymbolKind {
    /// A nonterminal.
    Nonterminal,
    /// A terminal matching one character out of a class.
    CharClassTerminal,
    /// A terminal matching a fixed string.
    StringTerminal,
    /// A terminal matching a regular expression.
    RegexTerminal,
    /// The distinguished end-of-input terminal.
    EndOfInput,
    /// The distinguished error terminal.
    Error,
}

/// One exported symbol.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymbolInfo {
    /// The symbol id; equals the index in the symbol array.
    pub id: usize,
    /// The display name.
    pub name: String,
    /// The symbol kind.
    pub kind: ExportSymbolKind,
    /// The AST node tag, if any.
    pub emit: Option<String>,
    /// The symbol participates in tokenization.
    pub lexem: bool,
    /// Matches are discarded by the scan loop.
    pub whitespace: bool,
    /// The terminal matches greedily.
    pub greedy: bool,
    /// The user-declared value type, opaque text.
    pub value_type: Option<String>,
}

/// One exported production.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductionInfo {
    /// The production id; equals the index in the production array.
    pub id: usize,
    /// The symbol id of the left-hand side.
    pub lhs: usize,
    /// The symbol ids of the right-hand side.
    pub rhs: Vec<usize>,
    /// The number of right-hand side symbols.
    pub length: usize,
    /// The AST node tag, if any.
    pub emit: Option<String>,
    /// The opaque semantic action text, if any.
    pub semantic_action: Option<String>,
}

/// A parse action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Action {
    /// Push the terminal and go to the state.
    Shift(usize),
    /// Reduce by the production.
    Reduce(usize),
    /// Push the terminal and immediately reduce by the production.
    ShiftReduce(usize),
    /// The input is accepted.
    Accept,
}

/// One entry of an action row: the terminal's symbol id and the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActionEntry {
    /// The symbol id of the terminal.
    pub symbol: usize,
    /// The resolved action.
    pub action: Action,
}

/// One entry of a goto row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GotoEntry {
    /// The symbol id of the nonterminal.
    pub symbol: usize,
    /// The successor state.
    pub target: usize,
}

/// One edge of a DFA state: an inclusive code point range and the target
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DfaEdge {
    /// The lower bound of the range.
    pub lo: u32,
    /// The upper bound of the range.
    pub hi: u32,
    /// The target state.
    pub target: usize,
}

/// One row of a DFA table.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DfaStateRow {
    /// The outgoing edges, sorted and pairwise disjoint.
    pub edges: Vec<DfaEdge>,
    /// The dense terminal id accepted in this state, if any.
    pub accept: Option<usize>,
}

/// One scanner DFA. State 0 is the start state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DfaTable {
    /// The states of the DFA.
    pub states: Vec<DfaStateRow>,
}

/// The frozen, language-neutral parser description.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParserTables {
    /// All symbols in their final dense order.
    pub symbols: Vec<SymbolInfo>,
    /// All productions in declaration order after closure expansion.
    pub productions: Vec<ProductionInfo>,
    /// Per state the sorted action entries. Rows covered by a default
    /// production are elided.
    pub actions: Vec<Vec<ActionEntry>>,
    /// Per state the sorted goto entries.
    pub gotos: Vec<Vec<GotoEntry>>,
    /// Per state the default production, or None.
    pub default_productions: Vec<Option<usize>>,
    /// The deduplicated scanner DFAs. Accept entries are dense terminal
    /// ids; the corresponding symbol id is `first_terminal + accept`.
    pub dfas: Vec<DfaTable>,
    /// Per state the index of the DFA to scan with, or None when the state
    /// expects nothing but end-of-input.
    pub dfa_select: Vec<Option<usize>>,
    /// The symbol id of the first terminal. Symbol ids below this are
    /// nonterminals.
    pub first_terminal: usize,
    /// The symbol id of the end-of-input terminal.
    pub eof_id: usize,
    /// The symbol id of the error terminal.
    pub error_id: usize,
    /// The state that accepts on end-of-input.
    pub halt_state: usize,
}

/// Freeze the generation results into the export model.
pub(crate) fn build_export(
    grammar: &Grammar,
    table: &ParserTable,
    lexer: &LexerTables,
) -> ParserTables {
    let symbols = grammar
        .symbols
        .iter()
        .map(|symbol| SymbolInfo {
            id: symbol.id.as_usize(),
            name: symbol.name.clone(),
            kind: match symbol.kind {
                SymbolKind::Nonterminal => ExportSymbolKind::Nonterminal,
                SymbolKind::CharClassTerminal(_) => ExportSymbolKind::CharClassTerminal,
                SymbolKind::StringTerminal(_) => ExportSymbolKind::StringTerminal,
                SymbolKind::RegexTerminal(_) => ExportSymbolKind::RegexTerminal,
                SymbolKind::EndOfInput => ExportSymbolKind::EndOfInput,
                SymbolKind::Error => ExportSymbolKind::Error,
            },
            emit: symbol.emit.clone(),
            lexem: symbol.lexem,
            whitespace: symbol.whitespace,
            greedy: symbol.greedy,
            value_type: symbol.value_type.clone(),
        })
        .collect();

    let productions = grammar
        .productions
        .iter()
        .map(|production| ProductionInfo {
            id: production.id.as_usize(),
            lhs: production.lhs.as_usize(),
            rhs: production.rhs.iter().map(|i| i.symbol.as_usize()).collect(),
            length: production.len(),
            emit: production.emit.clone(),
            semantic_action: production.action.clone(),
        })
        .collect();

    let first_terminal = grammar.first_terminal_index;
    let actions = table
        .actions
        .iter()
        .enumerate()
        .map(|(state, row)| {
            if table.default_productions[state].is_some() {
                // The state's reduces are covered by the default production.
                return Vec::new();
            }
            row.iter()
                .map(|(terminal, action)| ActionEntry {
                    symbol: first_terminal + terminal.as_usize(),
                    action: match action {
                        ActionKind::Shift(target) => Action::Shift(target.as_usize()),
                        ActionKind::Reduce(production) => Action::Reduce(production.as_usize()),
                        ActionKind::ShiftReduce(production) => {
                            Action::ShiftReduce(production.as_usize())
                        }
                        ActionKind::Accept => Action::Accept,
                    },
                })
                .collect()
        })
        .collect();

    let gotos = table
        .gotos
        .iter()
        .map(|row| {
            row.iter()
                .map(|(symbol, target)| GotoEntry {
                    symbol: symbol.as_usize(),
                    target: target.as_usize(),
                })
                .collect()
        })
        .collect();

    let dfas = lexer
        .dfas
        .iter()
        .map(|dfa| DfaTable {
            states: dfa
                .states()
                .iter()
                .map(|state| {
                    let mut edges: Vec<DfaEdge> = state
                        .transitions
                        .iter()
                        .flat_map(|(class, target)| {
                            class.ranges().iter().map(|range| DfaEdge {
                                lo: range.lo,
                                hi: range.hi,
                                target: target.as_usize(),
                            })
                        })
                        .collect();
                    edges.sort_by_key(|edge| edge.lo);
                    DfaStateRow {
                        edges,
                        accept: state.accept.map(|t| t.as_usize()),
                    }
                })
                .collect(),
        })
        .collect();

    ParserTables {
        symbols,
        productions,
        actions,
        gotos,
        default_productions: table
            .default_productions
            .iter()
            .map(|d| d.map(|p| p.as_usize()))
            .collect(),
        dfas,
        dfa_select: lexer
            .dfa_select
            .iter()
            .map(|d| d.map(|id| id.as_usize()))
            .collect(),
        first_terminal,
        eof_id: grammar.eof.as_usize(),
        error_id: grammar.error.as_usize(),
        halt_state: table
            .halt_state
            .map(|s| s.as_usize())
            .unwrap_or_default(),
    }
}
