//! This module contains the lexer assembly.
//! The terminal patterns of the grammar are combined into one multi-terminal
//! NFA. Depending on the configured mode either one DFA over all terminals
//! is built, or one DFA per parser state restricted to the state's viable
//! terminal set. States with equal viable sets or isomorphic automata share
//! one table index.

use std::collections::BTreeSet;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::config::{CaseFolding, GeneratorConfig, LexerMode};
use crate::diagnostics::Diagnostics;
use crate::Result;

use super::action_table::ParserTable;
use super::class_builder::ClassBuilder;
use super::dfa::Dfa;
use super::grammar::{Grammar, SymbolKind};
use super::ids::DfaIDBase;
use super::minimizer::Minimizer;
use super::nfa::Nfa;
use super::regex_parser::parse_regex_syntax;
use super::terminal_nfa::TerminalNfa;
use super::{DfaID, TerminalID};

/// The scanner tables of the generated parser.
#[derive(Debug)]
pub(crate) struct LexerTables {
    /// The deduplicated, minimized DFAs.
    pub(crate) dfas: Vec<Dfa>,
    /// Per parser state the DFA to scan with, or None when the state
    /// expects nothing but end-of-input.
    pub(crate) dfa_select: Vec<Option<DfaID>>,
}

/// Build the scanner tables.
pub(crate) fn assemble_lexer(
    grammar: &Grammar,
    table: &ParserTable,
    config: &GeneratorConfig,
    folding: CaseFolding,
    diagnostics: &mut Diagnostics,
) -> Result<LexerTables> {
    let nfa = build_terminal_nfa(grammar, config, folding, diagnostics)?;
    let whitespace: Vec<TerminalID> = grammar
        .terminals()
        .filter(|s| s.whitespace)
        .map(|s| grammar.terminal_id_of(s.id))
        .collect();

    let mut registry = DfaRegistry::default();
    let state_count = table.actions.len();
    let mut dfa_select: Vec<Option<DfaID>> = vec![None; state_count];

    match config.lexer_mode {
        LexerMode::Single => {
            let all: Vec<TerminalID> = nfa.terminals().collect();
            if !all.is_empty() {
                let dfa = Minimizer::minimize(Dfa::from_nfa(&nfa, &all));
                let id = registry.add(dfa);
                for (state, select) in dfa_select.iter_mut().enumerate() {
                    if !viable_terminals(grammar, table, state, &whitespace).is_empty() {
                        *select = Some(id);
                    }
                }
            }
        }
        LexerMode::Selective => {
            // States with the same viable set share a DFA without building
            // it twice; isomorphic results of different viable sets are
            // caught by the registry.
            let mut dfa_of_viable: FxHashMap<BTreeSet<TerminalID>, DfaID> = FxHashMap::default();
            for state in 0..state_count {
                let viable = viable_terminals(grammar, table, state, &whitespace);
                if viable.is_empty() {
                    continue;
                }
                let key: BTreeSet<TerminalID> = viable.iter().copied().collect();
                let id = if let Some(existing) = dfa_of_viable.get(&key) {
                    *existing
                } else {
                    let dfa = Minimizer::minimize(Dfa::from_nfa(&nfa, &viable));
                    let id = registry.add(dfa);
                    dfa_of_viable.insert(key, id);
                    id
                };
                dfa_select[state] = Some(id);
            }
        }
    }

    debug!(
        "lexer assembly produced {} distinct DFAs for {} states",
        registry.dfas.len(),
        state_count
    );
    Ok(LexerTables {
        dfas: registry.dfas,
        dfa_select,
    })
}

/// Build the combined NFA over all scannable terminals. The end-of-input
/// and error terminals have no pattern and are skipped. Patterns that match
/// the empty word are reported, they would stall the scan loop.
fn build_terminal_nfa(
    grammar: &Grammar,
    config: &GeneratorConfig,
    folding: CaseFolding,
    diagnostics: &mut Diagnostics,
) -> Result<TerminalNfa> {
    let class_builder = ClassBuilder::new(config.max_code_point);
    let mut nfa = TerminalNfa::new();
    for symbol in grammar.terminals() {
        let fragment = match &symbol.kind {
            SymbolKind::CharClassTerminal(class) => {
                Nfa::from_char_class(class.case_fold(folding))
            }
            SymbolKind::StringTerminal(text) => Nfa::from_string(text, folding),
            SymbolKind::RegexTerminal(pattern) => {
                let ast = parse_regex_syntax(pattern)?;
                Nfa::try_from_ast(&ast, &class_builder, folding)?
            }
            SymbolKind::Nonterminal | SymbolKind::EndOfInput | SymbolKind::Error => continue,
        };
        if fragment.matches_empty() {
            diagnostics.warning(
                symbol.position,
                format!("terminal {} matches the empty string", symbol.name),
            );
        }
        nfa.add_terminal(grammar.terminal_id_of(symbol.id), fragment);
        trace!("added terminal {} to the scanner NFA", symbol.name);
    }
    Ok(nfa)
}

/// The viable terminal set of a parser state: every terminal the state has
/// a resolved action for, conservatively including all reduce lookaheads,
/// plus the whitespace terminals. End-of-input and the error terminal are
/// never scanned.
fn viable_terminals(
    grammar: &Grammar,
    table: &ParserTable,
    state: usize,
    whitespace: &[TerminalID],
) -> Vec<TerminalID> {
    let eof = grammar.eof_terminal();
    let error = grammar.terminal_id_of(grammar.error);
    let mut viable: Vec<TerminalID> = table.actions[state]
        .iter()
        .map(|(terminal, _)| *terminal)
        .filter(|terminal| *terminal != eof && *terminal != error)
        .collect();
    // Any state that acts at all gets the whitespace terminals, so trailing
    // whitespace is consumed even before a plain end-of-input check.
    if !table.actions[state].is_empty() {
        viable.extend_from_slice(whitespace);
    }
    viable.sort_unstable();
    viable.dedup();
    viable
}

/// Deduplication of equal DFAs. The DFAs are renumbered in BFS order before
/// comparison, so isomorphic automata compare equal.
#[derive(Debug, Default)]
struct DfaRegistry {
    dfas: Vec<Dfa>,
    index: FxHashMap<Dfa, DfaID>,
}

impl DfaRegistry {
    fn add(&mut self, dfa: Dfa) -> DfaID {
        if let Some(existing) = self.index.get(&dfa) {
            trace!("sharing DFA table {}", existing);
            return *existing;
        }
        let id = DfaID::new(self.dfas.len() as DfaIDBase);
        self.dfas.push(dfa.clone());
        self.index.insert(dfa, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::action_table::build_parser_table;
    use crate::internal::first_follow::FirstSets;
    use crate::internal::grammar_parser::parse_grammar;
    use crate::internal::lalr::LalrAutomaton;
    use crate::internal::rewriter::rewrite;
    use crate::internal::StateID;

    fn assemble(text: &str, config: &GeneratorConfig) -> (Grammar, ParserTable, LexerTables) {
        let mut diagnostics = Diagnostics::new();
        let mut parsed = parse_grammar(text, config, &mut diagnostics).unwrap();
        rewrite(&mut parsed.grammar).unwrap();
        let grammar = parsed.grammar;
        let first_sets = FirstSets::compute(&grammar);
        let automaton = LalrAutomaton::build(&grammar, &first_sets);
        let table = build_parser_table(&grammar, &automaton, &first_sets, &mut diagnostics);
        let lexer =
            assemble_lexer(&grammar, &table, config, CaseFolding::None, &mut diagnostics).unwrap();
        (grammar, table, lexer)
    }

    fn scan(dfa: &Dfa, input: &str) -> Option<TerminalID> {
        let mut state = StateID::new(0);
        for c in input.chars() {
            state = dfa.step(state, c as u32)?;
        }
        dfa.states()[state].accept
    }

    #[test]
    fn test_single_mode_builds_one_dfa() {
        let config = GeneratorConfig {
            lexer_mode: LexerMode::Single,
            ..GeneratorConfig::default()
        };
        let (_, _, lexer) = assemble("S$ : 'a' 'b' ;", &config);
        assert_eq!(lexer.dfas.len(), 1);
        let selected: Vec<_> = lexer.dfa_select.iter().flatten().collect();
        assert!(!selected.is_empty());
    }

    #[test]
    fn test_selective_mode_restricts_terminals() {
        let config = GeneratorConfig::default();
        let (_, _, lexer) = assemble("S$ : 'a' 'b' ;", &config);
        // The start state expects only 'a'.
        let start_dfa = &lexer.dfas[lexer.dfa_select[0].unwrap()];
        assert!(scan(start_dfa, "a").is_some());
        assert!(scan(start_dfa, "b").is_none());
    }

    #[test]
    fn test_states_with_equal_viable_sets_share_a_dfa() {
        let config = GeneratorConfig::default();
        let (_, _, lexer) = assemble("S$ : A A ;\nA : 'a' ;", &config);
        let mut by_dfa: FxHashMap<DfaID, usize> = FxHashMap::default();
        for id in lexer.dfa_select.iter().flatten() {
            *by_dfa.entry(*id).or_default() += 1;
        }
        // Both positions expecting 'a' select the same table.
        assert!(by_dfa.values().any(|count| *count > 1));
    }

    #[test]
    fn test_whitespace_is_part_of_every_viable_set() {
        let config = GeneratorConfig::default();
        let (grammar, _, lexer) = assemble("%whitespace / +/ ;\nS$ : 'a' 'b' ;", &config);
        let whitespace = grammar
            .terminals()
            .find(|s| s.whitespace)
            .map(|s| grammar.terminal_id_of(s.id))
            .unwrap();
        for id in lexer.dfa_select.iter().flatten() {
            let dfa = &lexer.dfas[*id];
            assert_eq!(scan(dfa, "   "), Some(whitespace));
        }
    }

    #[test]
    fn test_eof_only_state_has_no_dfa() {
        let config = GeneratorConfig::default();
        let (_, table, lexer) = assemble("S$ : 'a' ;", &config);
        // The halt state and the accept successor expect nothing but EOF.
        let mut saw_none = false;
        for (state, select) in lexer.dfa_select.iter().enumerate() {
            if select.is_none() {
                saw_none = true;
                assert!(table.actions[state].iter().all(|(_, a)| matches!(
                    a,
                    crate::internal::action_table::ActionKind::Accept
                        | crate::internal::action_table::ActionKind::Reduce(_)
                )));
            }
        }
        assert!(saw_none);
    }

    #[test]
    fn test_empty_matching_terminal_is_reported() {
        let config = GeneratorConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut parsed = parse_grammar("S$ : /a*/ 'b' ;", &config, &mut diagnostics).unwrap();
        rewrite(&mut parsed.grammar).unwrap();
        let grammar = parsed.grammar;
        let first_sets = FirstSets::compute(&grammar);
        let automaton = LalrAutomaton::build(&grammar, &first_sets);
        let table = build_parser_table(&grammar, &automaton, &first_sets, &mut diagnostics);
        assemble_lexer(&grammar, &table, &config, CaseFolding::None, &mut diagnostics).unwrap();
        assert!(diagnostics
            .entries()
            .iter()
            .any(|d| d.message.contains("matches the empty string")));
    }
}
