//! This module contains the construction of the ACTION and GOTO tables.
//! Shift/reduce and reduce/reduce conflicts are resolved here; every
//! conflict that is not settled by precedence and associativity is reported
//! through the diagnostics sink. States whose actions collapse to a single
//! reduction get a default production, which the export uses to elide the
//! per-terminal entries.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::diagnostics::Diagnostics;

use super::first_follow::FirstSets;
use super::grammar::{Associativity, Grammar};
use super::ids::LalrStateIDBase;
use super::lalr::{Item, LalrAutomaton};
use super::{LalrStateID, ProductionID, SymbolID, TerminalID};

/// A resolved table action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionKind {
    /// Push the terminal and go to the state.
    Shift(LalrStateID),
    /// Reduce by the production.
    Reduce(ProductionID),
    /// Push the terminal and immediately reduce by the production. A
    /// compressed form used when the successor state consists of exactly one
    /// completed item.
    ShiftReduce(ProductionID),
    /// The input is accepted.
    Accept,
}

/// The ACTION and GOTO tables of the parser.
#[derive(Debug)]
pub(crate) struct ParserTable {
    /// Per state the resolved actions, sorted by terminal id. The rows are
    /// complete; default-production elision happens in the export.
    pub(crate) actions: Vec<Vec<(TerminalID, ActionKind)>>,
    /// Per state the nonterminal transitions, sorted by symbol id.
    pub(crate) gotos: Vec<Vec<(SymbolID, LalrStateID)>>,
    /// Per state the default production, present when every action of the
    /// state is the same reduction and no shift contends with it.
    pub(crate) default_productions: Vec<Option<ProductionID>>,
    /// The state that accepts on end-of-input.
    pub(crate) halt_state: Option<LalrStateID>,
    /// The number of conflicts that were reported, i.e. not settled by
    /// precedence and associativity.
    pub(crate) reported_conflicts: usize,
}

/// Build the parser table from the automaton.
pub(crate) fn build_parser_table(
    grammar: &Grammar,
    automaton: &LalrAutomaton,
    first_sets: &FirstSets,
    diagnostics: &mut Diagnostics,
) -> ParserTable {
    let mut table = ParserTable {
        actions: Vec::with_capacity(automaton.states.len()),
        gotos: Vec::with_capacity(automaton.states.len()),
        default_productions: vec![None; automaton.states.len()],
        halt_state: None,
        reported_conflicts: 0,
    };

    for state_index in 0..automaton.states.len() {
        let state_id = LalrStateID::new(state_index as LalrStateIDBase);
        let items = automaton.closure_with_lookaheads(grammar, first_sets, state_id);
        let accepting = items
            .iter()
            .any(|(item, _)| item.production == automaton.goal_production && item.dot == 1);
        if accepting {
            table.halt_state = Some(state_id);
        }

        let mut row: BTreeMap<TerminalID, (ActionKind, Item)> = BTreeMap::new();

        // Shift actions come from the terminal transitions of the state.
        for (symbol, target) in &automaton.states[state_id].transitions {
            if !grammar.sym(*symbol).is_terminal() {
                continue;
            }
            let terminal = grammar.terminal_id_of(*symbol);
            let source = items
                .iter()
                .find(|(item, _)| item.next_symbol(grammar) == Some(*symbol))
                .map(|(item, _)| *item)
                .expect("a shift has a source item");
            let action = if accepting && terminal == grammar.eof_terminal() {
                ActionKind::Accept
            } else {
                ActionKind::Shift(*target)
            };
            row.insert(terminal, (action, source));
        }

        // Reduce actions come from completed items and their lookaheads.
        for (item, lookaheads) in &items {
            if !item.is_complete(grammar) || item.production == automaton.goal_production {
                continue;
            }
            for terminal in lookaheads.iter() {
                match row.get(&terminal) {
                    None => {
                        row.insert(terminal, (ActionKind::Reduce(item.production), *item));
                    }
                    Some((existing, source)) => {
                        let resolved = resolve_conflict(
                            grammar,
                            diagnostics,
                            &mut table.reported_conflicts,
                            terminal,
                            *existing,
                            *source,
                            item.production,
                            *item,
                        );
                        row.insert(terminal, resolved);
                    }
                }
            }
        }

        table
            .actions
            .push(row.into_iter().map(|(t, (a, _))| (t, a)).collect());

        let gotos: Vec<(SymbolID, LalrStateID)> = automaton.states[state_id]
            .transitions
            .iter()
            .filter(|(symbol, _)| !grammar.sym(*symbol).is_terminal())
            .cloned()
            .collect();
        table.gotos.push(gotos);
    }

    compress_shift_reduce(grammar, automaton, &mut table);
    detect_default_productions(&mut table);
    debug!(
        "parser table: {} states, {} reported conflicts",
        table.actions.len(),
        table.reported_conflicts
    );
    table
}

/// Resolve a conflict on one `(state, terminal)` slot.
///
/// Shift/reduce: the precedence of the terminal is compared with the
/// precedence of the reducing production; the higher one wins. On equal
/// levels the associativity decides: left reduces, right shifts, and
/// non-associative slots are reported and default to shift. Missing
/// precedence on either side is reported and defaults to shift.
///
/// Reduce/reduce: the production declared first wins; always reported.
#[allow(clippy::too_many_arguments)]
fn resolve_conflict(
    grammar: &Grammar,
    diagnostics: &mut Diagnostics,
    reported: &mut usize,
    terminal: TerminalID,
    existing: ActionKind,
    existing_source: Item,
    production: ProductionID,
    reduce_source: Item,
) -> (ActionKind, Item) {
    let terminal_symbol = grammar.symbol_of_terminal(terminal);
    match existing {
        ActionKind::Shift(_) | ActionKind::Accept => {
            let terminal_prec = grammar.sym(terminal_symbol).precedence;
            let production_prec = grammar.prod(production).precedence;
            match (terminal_prec, production_prec) {
                (Some(t), Some(p)) if t.level != p.level => {
                    trace!(
                        "shift/reduce on '{}' settled by precedence",
                        grammar.sym(terminal_symbol).name
                    );
                    if t.level > p.level {
                        (existing, existing_source)
                    } else {
                        (ActionKind::Reduce(production), reduce_source)
                    }
                }
                (Some(t), Some(_)) => match t.assoc {
                    Associativity::Left => (ActionKind::Reduce(production), reduce_source),
                    Associativity::Right => (existing, existing_source),
                    Associativity::NonAssoc => {
                        report_shift_reduce(
                            grammar,
                            diagnostics,
                            reported,
                            terminal,
                            existing_source,
                            reduce_source,
                        );
                        (existing, existing_source)
                    }
                },
                _ => {
                    report_shift_reduce(
                        grammar,
                        diagnostics,
                        reported,
                        terminal,
                        existing_source,
                        reduce_source,
                    );
                    (existing, existing_source)
                }
            }
        }
        ActionKind::Reduce(other) | ActionKind::ShiftReduce(other) => {
            // Reduce/reduce: the production with the smaller id, i.e. the
            // one declared first, wins.
            let winner = if production < other { production } else { other };
            *reported += 1;
            diagnostics.warning(
                grammar.prod(winner).position,
                format!(
                    "reduce/reduce conflict on {} between '{}' and '{}'; reducing '{}'",
                    grammar.sym(terminal_symbol).name,
                    grammar.format_production(other, Some(existing_source.dot as usize)),
                    grammar.format_production(production, Some(reduce_source.dot as usize)),
                    grammar.format_production(winner, None),
                ),
            );
            if winner == production {
                (ActionKind::Reduce(production), reduce_source)
            } else {
                (existing, existing_source)
            }
        }
    }
}

fn report_shift_reduce(
    grammar: &Grammar,
    diagnostics: &mut Diagnostics,
    reported: &mut usize,
    terminal: TerminalID,
    shift_source: Item,
    reduce_source: Item,
) {
    *reported += 1;
    let terminal_symbol = grammar.symbol_of_terminal(terminal);
    diagnostics.warning(
        grammar.prod(shift_source.production).position,
        format!(
            "shift/reduce conflict on {} between '{}' and '{}'; resolved to shift",
            grammar.sym(terminal_symbol).name,
            grammar.format_production(shift_source.production, Some(shift_source.dot as usize)),
            grammar.format_production(reduce_source.production, Some(reduce_source.dot as usize)),
        ),
    );
}

/// Replace shifts into states that consist of exactly one completed item by
/// the combined shift-reduce action.
fn compress_shift_reduce(grammar: &Grammar, automaton: &LalrAutomaton, table: &mut ParserTable) {
    let single_reduce: Vec<Option<ProductionID>> = automaton
        .states
        .iter()
        .map(|state| match state.kernel.as_slice() {
            [only]
                if only.is_complete(grammar) && only.production != automaton.goal_production =>
            {
                Some(only.production)
            }
            _ => None,
        })
        .collect();
    for row in table.actions.iter_mut() {
        for (_, action) in row.iter_mut() {
            if let ActionKind::Shift(target) = action {
                if let Some(production) = single_reduce[*target] {
                    *action = ActionKind::ShiftReduce(production);
                }
            }
        }
    }
}

/// A state whose actions are exactly one distinct reduction and nothing
/// else gets a default production. Compression is suppressed as soon as the
/// state has any shift, so a latent shift can never be hidden.
fn detect_default_productions(table: &mut ParserTable) {
    for (state, row) in table.actions.iter().enumerate() {
        let mut default = None;
        let mut eligible = !row.is_empty();
        for (_, action) in row {
            match action {
                ActionKind::Reduce(production) => match default {
                    None => default = Some(*production),
                    Some(existing) if existing == *production => {}
                    _ => {
                        eligible = false;
                        break;
                    }
                },
                _ => {
                    eligible = false;
                    break;
                }
            }
        }
        if eligible {
            table.default_productions[state] = default;
        }
    }
}
