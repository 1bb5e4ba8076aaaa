//! This module contains the FIRST and FOLLOW set computation.
//! Both computations are standard fixpoints over the productions of the
//! rewritten grammar. The sets are bitsets over the dense terminal id space.

use log::trace;

use super::grammar::Grammar;
use super::terminal_set::TerminalSet;
use super::{SymbolID, TerminalID};

/// The FIRST sets and nullability of all symbols.
#[derive(Debug)]
pub(crate) struct FirstSets {
    first: Vec<TerminalSet>,
    nullable: Vec<bool>,
}

impl FirstSets {
    /// Compute the FIRST sets with the usual fixpoint iteration.
    pub(crate) fn compute(grammar: &Grammar) -> Self {
        let terminal_count = grammar.terminal_count();
        let mut sets = FirstSets {
            first: vec![TerminalSet::new(terminal_count); grammar.symbols.len()],
            nullable: vec![false; grammar.symbols.len()],
        };
        for symbol in &grammar.symbols {
            if symbol.is_terminal() {
                sets.first[symbol.id].insert(grammar.terminal_id_of(symbol.id));
            }
        }
        let mut changed = true;
        while changed {
            changed = false;
            for production in &grammar.productions {
                let mut rhs_nullable = true;
                let mut addition = TerminalSet::new(terminal_count);
                for item in &production.rhs {
                    addition.union_with(&sets.first[item.symbol]);
                    if !sets.nullable[item.symbol] {
                        rhs_nullable = false;
                        break;
                    }
                }
                changed |= sets.first[production.lhs].union_with(&addition);
                if rhs_nullable && !sets.nullable[production.lhs] {
                    sets.nullable[production.lhs] = true;
                    changed = true;
                }
            }
        }
        trace!("FIRST sets computed for {} symbols", grammar.symbols.len());
        sets
    }

    pub(crate) fn first_of(&self, symbol: SymbolID) -> &TerminalSet {
        &self.first[symbol]
    }

    pub(crate) fn is_nullable(&self, symbol: SymbolID) -> bool {
        self.nullable[symbol]
    }

    /// The FIRST set of a symbol sequence and whether the whole sequence is
    /// nullable.
    pub(crate) fn first_of_sequence(
        &self,
        grammar: &Grammar,
        symbols: impl Iterator<Item = SymbolID>,
    ) -> (TerminalSet, bool) {
        let mut first = TerminalSet::new(grammar.terminal_count());
        for symbol in symbols {
            first.union_with(&self.first[symbol]);
            if !self.nullable[symbol] {
                return (first, false);
            }
        }
        (first, true)
    }
}

/// The FOLLOW sets of all nonterminals.
#[derive(Debug)]
pub(crate) struct FollowSets {
    follow: Vec<TerminalSet>,
}

impl FollowSets {
    /// Compute the FOLLOW sets. The end-of-input terminal is seeded into the
    /// FOLLOW set of the augmented goal.
    pub(crate) fn compute(grammar: &Grammar, first_sets: &FirstSets) -> Self {
        let terminal_count = grammar.terminal_count();
        let mut sets = FollowSets {
            follow: vec![TerminalSet::new(terminal_count); grammar.symbols.len()],
        };
        let goal = grammar.goal.expect("grammar is rewritten");
        sets.follow[goal].insert(grammar.eof_terminal());

        let mut changed = true;
        while changed {
            changed = false;
            for production in &grammar.productions {
                for (index, item) in production.rhs.iter().enumerate() {
                    if grammar.sym(item.symbol).is_terminal() {
                        continue;
                    }
                    let (suffix_first, suffix_nullable) = first_sets.first_of_sequence(
                        grammar,
                        production.rhs[index + 1..].iter().map(|i| i.symbol),
                    );
                    changed |= sets.follow[item.symbol].union_with(&suffix_first);
                    if suffix_nullable {
                        let lhs_follow = sets.follow[production.lhs].clone();
                        changed |= sets.follow[item.symbol].union_with(&lhs_follow);
                    }
                }
            }
        }
        sets
    }

    pub(crate) fn follow_of(&self, symbol: SymbolID) -> &TerminalSet {
        &self.follow[symbol]
    }

    /// True if the terminal may follow the nonterminal somewhere.
    #[allow(dead_code)]
    pub(crate) fn contains(&self, symbol: SymbolID, terminal: TerminalID) -> bool {
        self.follow[symbol].contains(terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::diagnostics::Diagnostics;
    use crate::internal::grammar_parser::parse_grammar;
    use crate::internal::rewriter::rewrite;

    fn grammar_of(text: &str) -> Grammar {
        let config = GeneratorConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut parsed = parse_grammar(text, &config, &mut diagnostics).unwrap();
        rewrite(&mut parsed.grammar).unwrap();
        parsed.grammar
    }

    fn terminal_of(grammar: &Grammar, name: &str) -> TerminalID {
        let symbol = grammar.find_symbol(name).unwrap();
        grammar.terminal_id_of(symbol)
    }

    #[test]
    fn test_first_of_terminal_is_itself() {
        let grammar = grammar_of("S$ : 'a' ;");
        let first_sets = FirstSets::compute(&grammar);
        let a = grammar.find_symbol("'a'").unwrap();
        let first: Vec<_> = first_sets.first_of(a).iter().collect();
        assert_eq!(first, vec![grammar.terminal_id_of(a)]);
    }

    #[test]
    fn test_first_flows_through_nonterminals() {
        let grammar = grammar_of("S$ : A 'x' ;\nA : 'a' | 'b' ;");
        let first_sets = FirstSets::compute(&grammar);
        let s = grammar.find_symbol("S").unwrap();
        let firsts: Vec<_> = first_sets.first_of(s).iter().collect();
        assert_eq!(
            firsts,
            vec![terminal_of(&grammar, "'a'"), terminal_of(&grammar, "'b'")]
        );
    }

    #[test]
    fn test_nullable_propagation() {
        let grammar = grammar_of("S$ : A B ;\nA : 'a' | ;\nB : 'b' | ;");
        let first_sets = FirstSets::compute(&grammar);
        let s = grammar.find_symbol("S").unwrap();
        let a = grammar.find_symbol("A").unwrap();
        assert!(first_sets.is_nullable(a));
        assert!(first_sets.is_nullable(s));
        // FIRST(S) contains both 'a' and 'b' because A is nullable.
        let firsts: Vec<_> = first_sets.first_of(s).iter().collect();
        assert_eq!(firsts.len(), 2);
    }

    #[test]
    fn test_follow_seeded_with_eof() {
        let grammar = grammar_of("S$ : 'a' ;");
        let first_sets = FirstSets::compute(&grammar);
        let follow_sets = FollowSets::compute(&grammar, &first_sets);
        let goal = grammar.goal.unwrap();
        assert!(follow_sets.follow_of(goal).contains(grammar.eof_terminal()));
        // The user goal is followed by EOF through the augmented production.
        let s = grammar.find_symbol("S").unwrap();
        assert!(follow_sets.follow_of(s).contains(grammar.eof_terminal()));
    }

    #[test]
    fn test_follow_across_productions() {
        let grammar = grammar_of("S$ : A 'x' ;\nA : 'a' ;");
        let first_sets = FirstSets::compute(&grammar);
        let follow_sets = FollowSets::compute(&grammar, &first_sets);
        let a = grammar.find_symbol("A").unwrap();
        assert!(follow_sets
            .follow_of(a)
            .contains(terminal_of(&grammar, "'x'")));
    }

    #[test]
    fn test_follow_of_nullable_suffix_includes_lhs_follow() {
        let grammar = grammar_of("S$ : A B 'x' ;\nA : 'a' ;\nB : | 'b' ;");
        let first_sets = FirstSets::compute(&grammar);
        let follow_sets = FollowSets::compute(&grammar, &first_sets);
        let a = grammar.find_symbol("A").unwrap();
        // B is nullable, so 'x' is in FOLLOW(A) next to FIRST(B).
        assert!(follow_sets
            .follow_of(a)
            .contains(terminal_of(&grammar, "'b'")));
        assert!(follow_sets
            .follow_of(a)
            .contains(terminal_of(&grammar, "'x'")));
    }

    #[test]
    fn test_error_terminal_in_follow_where_used() {
        let grammar = grammar_of("S$ : A %error 'x' ;\nA : 'a' ;");
        let first_sets = FirstSets::compute(&grammar);
        let follow_sets = FollowSets::compute(&grammar, &first_sets);
        let a = grammar.find_symbol("A").unwrap();
        let error_terminal = grammar.terminal_id_of(grammar.error);
        assert!(follow_sets.follow_of(a).contains(error_terminal));
    }
}
