//! This module contains the grammar integrity checks.
//! Warnings do not block generation; errors abort it after all checks ran,
//! so the user sees every problem of a run at once.

use crate::diagnostics::Diagnostics;

use super::grammar::{Grammar, SymbolKind};
use super::SymbolID;

/// Run all integrity checks on the rewritten grammar.
/// Returns false when an aborting error was found.
pub(crate) fn check_grammar(grammar: &Grammar, diagnostics: &mut Diagnostics) -> bool {
    let before = diagnostics.error_count();
    check_undefined_symbols(grammar, diagnostics);
    check_unused_symbols(grammar, diagnostics);
    check_circular_productions(grammar, diagnostics);
    check_productivity(grammar, diagnostics);
    diagnostics.error_count() == before
}

/// A nonterminal that occurs on a right-hand side but has no productions is
/// undefined.
fn check_undefined_symbols(grammar: &Grammar, diagnostics: &mut Diagnostics) {
    for symbol in &grammar.symbols {
        if symbol.kind == SymbolKind::Nonterminal && symbol.used && !symbol.defined {
            diagnostics.error(
                symbol.position,
                format!("undefined symbol '{}'", symbol.name),
            );
        }
    }
}

/// Defined symbols that are never used are reported. The distinguished
/// terminals and whitespace terminals are exempt.
fn check_unused_symbols(grammar: &Grammar, diagnostics: &mut Diagnostics) {
    for symbol in &grammar.symbols {
        if symbol.used || symbol.whitespace {
            continue;
        }
        if matches!(symbol.kind, SymbolKind::EndOfInput | SymbolKind::Error) {
            continue;
        }
        let kind = if symbol.is_terminal() {
            "terminal"
        } else {
            "nonterminal"
        };
        diagnostics.warning(
            symbol.position,
            format!("unused {} '{}'", kind, symbol.name),
        );
    }
}

/// A production whose right-hand side is exactly its left-hand side can
/// never make progress.
fn check_circular_productions(grammar: &Grammar, diagnostics: &mut Diagnostics) {
    for production in &grammar.productions {
        if production.len() == 1 && production.rhs[0].symbol == production.lhs {
            diagnostics.warning(
                production.position,
                format!(
                    "production '{}' derives only itself",
                    grammar.format_production(production.id, None)
                ),
            );
        }
    }
}

/// The goal must derive at least one terminal string, otherwise the grammar
/// describes the empty language.
fn check_productivity(grammar: &Grammar, diagnostics: &mut Diagnostics) {
    let mut productive: Vec<bool> = grammar
        .symbols
        .iter()
        .map(|symbol| symbol.is_terminal())
        .collect();
    let mut changed = true;
    while changed {
        changed = false;
        for production in &grammar.productions {
            if productive[production.lhs] {
                continue;
            }
            if production
                .rhs
                .iter()
                .all(|item| productive[item.symbol])
            {
                productive[production.lhs] = true;
                changed = true;
            }
        }
    }
    let goal = grammar.goal.expect("grammar is rewritten");
    if !productive[goal] {
        let unproductive: Vec<&str> = grammar
            .symbols
            .iter()
            .filter(|s| !productive[s.id] && s.kind == SymbolKind::Nonterminal)
            .map(|s| s.name.as_str())
            .collect();
        diagnostics.error(
            grammar.sym(user_goal(grammar)).position,
            format!(
                "the grammar produces no language; unproductive symbols: {}",
                unproductive.join(", ")
            ),
        );
    }
}

/// The user goal, i.e. the single symbol of the augmented goal production.
fn user_goal(grammar: &Grammar) -> SymbolID {
    let goal = grammar.goal.expect("grammar is rewritten");
    grammar
        .productions_of(goal)
        .next()
        .map(|p| p.rhs[0].symbol)
        .unwrap_or(goal)
}
