//! This module contains the LALR(1) automaton construction.
//! The LR(0) states are built first with a BFS from the start kernel; the
//! LALR(1) lookaheads are then computed with spontaneous generation and
//! channel propagation between kernel items until a fixpoint is reached.

use log::{debug, trace};
use rustc_hash::FxHashMap;

use super::first_follow::FirstSets;
use super::grammar::Grammar;
use super::ids::LalrStateIDBase;
use super::terminal_set::TerminalSet;
use super::{LalrStateID, ProductionID, SymbolID, TerminalID};

/// An LR(0) item: a production with a dot position. Two items with equal
/// cores are the same item; lookaheads are kept separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Item {
    pub(crate) production: ProductionID,
    pub(crate) dot: u32,
}

impl Item {
    pub(crate) fn new(production: ProductionID, dot: u32) -> Self {
        Item { production, dot }
    }

    /// The symbol right of the dot, or None for a completed item.
    pub(crate) fn next_symbol(&self, grammar: &Grammar) -> Option<SymbolID> {
        grammar
            .prod(self.production)
            .rhs
            .get(self.dot as usize)
            .map(|item| item.symbol)
    }

    pub(crate) fn is_complete(&self, grammar: &Grammar) -> bool {
        self.dot as usize == grammar.prod(self.production).len()
    }

    /// The item with the dot advanced over the next symbol.
    pub(crate) fn advanced(&self) -> Item {
        Item {
            production: self.production,
            dot: self.dot + 1,
        }
    }
}

/// One LALR(1) parser state.
#[derive(Debug)]
pub(crate) struct LalrState {
    /// The canonical kernel, sorted by `(production, dot)`. It uniquely
    /// identifies the state.
    pub(crate) kernel: Vec<Item>,
    /// The lookahead set per kernel item, parallel to `kernel`.
    pub(crate) lookaheads: Vec<TerminalSet>,
    /// The outgoing transitions, sorted by symbol id.
    pub(crate) transitions: Vec<(SymbolID, LalrStateID)>,
}

impl LalrState {
    /// The successor state under the given symbol, if any.
    pub(crate) fn transition(&self, symbol: SymbolID) -> Option<LalrStateID> {
        self.transitions
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, target)| *target)
    }
}

/// The LALR(1) automaton.
#[derive(Debug)]
pub(crate) struct LalrAutomaton {
    pub(crate) states: Vec<LalrState>,
    /// The production `S' : S $end` of the augmented goal.
    pub(crate) goal_production: ProductionID,
}

impl LalrAutomaton {
    /// Build the automaton for the rewritten grammar.
    pub(crate) fn build(grammar: &Grammar, first_sets: &FirstSets) -> Self {
        let goal = grammar.goal.expect("grammar is rewritten");
        let goal_production = grammar
            .productions_of(goal)
            .next()
            .expect("the augmented goal has exactly one production")
            .id;
        let mut automaton = LalrAutomaton {
            states: Vec::new(),
            goal_production,
        };
        automaton.build_lr0_states(grammar, Item::new(goal_production, 0));
        automaton.compute_lookaheads(grammar, first_sets);
        debug!("LALR automaton has {} states", automaton.states.len());
        automaton
    }

    /// Build the LR(0) states with a BFS from the start kernel. Successors
    /// of a state are created in ascending symbol order, which makes the
    /// state numbering deterministic.
    fn build_lr0_states(&mut self, grammar: &Grammar, start: Item) {
        let mut state_of_kernel: FxHashMap<Vec<Item>, LalrStateID> = FxHashMap::default();
        let start_kernel = vec![start];
        state_of_kernel.insert(start_kernel.clone(), LalrStateID::new(0));
        self.states.push(LalrState {
            kernel: start_kernel,
            lookaheads: Vec::new(),
            transitions: Vec::new(),
        });

        let mut next = 0;
        while next < self.states.len() {
            let state_id = LalrStateID::new(next as LalrStateIDBase);
            next += 1;
            let closure = self.closure(grammar, &self.states[state_id].kernel);

            // Group the items by the symbol right of the dot.
            let mut successors: Vec<(SymbolID, Vec<Item>)> = Vec::new();
            for item in &closure {
                let Some(symbol) = item.next_symbol(grammar) else {
                    continue;
                };
                let advanced = item.advanced();
                match successors.iter_mut().find(|(s, _)| *s == symbol) {
                    Some((_, kernel)) => kernel.push(advanced),
                    None => successors.push((symbol, vec![advanced])),
                }
            }
            successors.sort_by_key(|(symbol, _)| *symbol);

            for (symbol, mut kernel) in successors {
                kernel.sort_unstable();
                kernel.dedup();
                let target = if let Some(existing) = state_of_kernel.get(&kernel) {
                    *existing
                } else {
                    let id = LalrStateID::new(self.states.len() as LalrStateIDBase);
                    state_of_kernel.insert(kernel.clone(), id);
                    self.states.push(LalrState {
                        kernel,
                        lookaheads: Vec::new(),
                        transitions: Vec::new(),
                    });
                    id
                };
                self.states[state_id].transitions.push((symbol, target));
            }
        }
    }

    /// The LR(0) closure of a kernel.
    pub(crate) fn closure(&self, grammar: &Grammar, kernel: &[Item]) -> Vec<Item> {
        let mut closure: Vec<Item> = kernel.to_vec();
        let mut i = 0;
        while i < closure.len() {
            let item = closure[i];
            i += 1;
            let Some(symbol) = item.next_symbol(grammar) else {
                continue;
            };
            if grammar.sym(symbol).is_terminal() {
                continue;
            }
            for production in grammar.productions_of(symbol) {
                let new_item = Item::new(production.id, 0);
                if !closure.contains(&new_item) {
                    closure.push(new_item);
                }
            }
        }
        closure.sort_unstable();
        closure
    }

    /// Compute the LALR(1) lookaheads of all kernel items.
    ///
    /// For every kernel item K of a state I the LR(1) closure of
    /// `(K, #)` is computed once, where `#` is a terminal not in the
    /// grammar. A closure item `B : γ • X δ` with lookahead `a` contributes
    /// `a` spontaneously to the kernel item `B : γ X • δ` of GOTO(I, X);
    /// when `a` is `#`, the lookaheads of K propagate there instead. The
    /// propagation channels are then iterated until nothing changes.
    fn compute_lookaheads(&mut self, grammar: &Grammar, first_sets: &FirstSets) {
        let terminal_count = grammar.terminal_count();
        // The extended terminal space has one extra slot for '#'.
        let hash_mark = TerminalID::from(terminal_count);

        for state in self.states.iter_mut() {
            state.lookaheads = vec![TerminalSet::new(terminal_count); state.kernel.len()];
        }
        // The start item of the augmented goal sees end-of-input.
        self.states[0].lookaheads[0].insert(grammar.eof_terminal());

        // (from_state, from_item) -> (to_state, to_item) channels.
        let mut channels: Vec<((LalrStateID, usize), (LalrStateID, usize))> = Vec::new();

        for state_index in 0..self.states.len() {
            let state_id = LalrStateID::new(state_index as LalrStateIDBase);
            for kernel_index in 0..self.states[state_id].kernel.len() {
                let kernel_item = self.states[state_id].kernel[kernel_index];
                let mut seed = FxHashMap::default();
                let mut la = TerminalSet::new(terminal_count + 1);
                la.insert(hash_mark);
                seed.insert(kernel_item, la);
                let closure = self.lr1_closure(grammar, first_sets, seed);

                for (item, lookaheads) in closure {
                    let Some(symbol) = item.next_symbol(grammar) else {
                        continue;
                    };
                    let target = self.states[state_id]
                        .transition(symbol)
                        .expect("transition exists for every closure item symbol");
                    let target_index = self.states[target]
                        .kernel
                        .binary_search(&item.advanced())
                        .expect("advanced item is a kernel item of the successor");
                    for lookahead in lookaheads.iter() {
                        if lookahead == hash_mark {
                            channels.push(((state_id, kernel_index), (target, target_index)));
                        } else {
                            self.states[target].lookaheads[target_index].insert(lookahead);
                        }
                    }
                }
            }
        }

        trace!("{} lookahead channels", channels.len());
        let mut changed = true;
        while changed {
            changed = false;
            for ((from_state, from_item), (to_state, to_item)) in &channels {
                let source = self.states[*from_state].lookaheads[*from_item].clone();
                changed |= self.states[*to_state].lookaheads[*to_item].union_with(&source);
            }
        }
    }

    /// The LR(1) closure over a seed of items with lookahead sets in the
    /// extended terminal space.
    fn lr1_closure(
        &self,
        grammar: &Grammar,
        first_sets: &FirstSets,
        seed: FxHashMap<Item, TerminalSet>,
    ) -> FxHashMap<Item, TerminalSet> {
        let terminal_count = grammar.terminal_count();
        let mut closure = seed;
        let mut changed = true;
        while changed {
            changed = false;
            let snapshot: Vec<(Item, TerminalSet)> =
                closure.iter().map(|(i, l)| (*i, l.clone())).collect();
            for (item, lookaheads) in snapshot {
                let Some(symbol) = item.next_symbol(grammar) else {
                    continue;
                };
                if grammar.sym(symbol).is_terminal() {
                    continue;
                }
                // FIRST of the suffix after the nonterminal; when it is
                // nullable the item's own lookaheads flow through.
                let suffix = grammar.prod(item.production).rhs[item.dot as usize + 1..]
                    .iter()
                    .map(|i| i.symbol);
                let (suffix_first, suffix_nullable) =
                    first_sets.first_of_sequence(grammar, suffix);
                let mut new_lookaheads = TerminalSet::new(terminal_count + 1);
                for terminal in suffix_first.iter() {
                    new_lookaheads.insert(terminal);
                }
                if suffix_nullable {
                    new_lookaheads.union_with(&lookaheads);
                }
                for production in grammar.productions_of(symbol) {
                    let new_item = Item::new(production.id, 0);
                    let entry = closure
                        .entry(new_item)
                        .or_insert_with(|| TerminalSet::new(terminal_count + 1));
                    changed |= entry.union_with(&new_lookaheads);
                }
            }
        }
        closure
    }

    /// The full item set of a state with final lookaheads: the kernel items
    /// with their computed lookahead sets plus all closure items derived
    /// from them. Used by the action table construction.
    pub(crate) fn closure_with_lookaheads(
        &self,
        grammar: &Grammar,
        first_sets: &FirstSets,
        state: LalrStateID,
    ) -> Vec<(Item, TerminalSet)> {
        let terminal_count = grammar.terminal_count();
        let mut seed = FxHashMap::default();
        for (item, lookaheads) in self.states[state]
            .kernel
            .iter()
            .zip(self.states[state].lookaheads.iter())
        {
            let mut extended = TerminalSet::new(terminal_count + 1);
            for terminal in lookaheads.iter() {
                extended.insert(terminal);
            }
            seed.insert(*item, extended);
        }
        let closure = self.lr1_closure(grammar, first_sets, seed);
        let mut items: Vec<(Item, TerminalSet)> = closure
            .into_iter()
            .map(|(item, extended)| {
                // Shrink back into the real terminal space; '#' cannot occur
                // in final lookaheads.
                let mut lookaheads = TerminalSet::new(terminal_count);
                for terminal in extended.iter() {
                    debug_assert!(terminal.as_usize() < terminal_count);
                    lookaheads.insert(terminal);
                }
                (item, lookaheads)
            })
            .collect();
        items.sort_by_key(|(item, _)| *item);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::diagnostics::Diagnostics;
    use crate::internal::grammar_parser::parse_grammar;
    use crate::internal::rewriter::rewrite;

    fn automaton_of(text: &str) -> (Grammar, LalrAutomaton) {
        let config = GeneratorConfig::default();
        let mut diagnostics = Diagnostics::new();
        let mut parsed = parse_grammar(text, &config, &mut diagnostics).unwrap();
        rewrite(&mut parsed.grammar).unwrap();
        let grammar = parsed.grammar;
        let first_sets = FirstSets::compute(&grammar);
        let automaton = LalrAutomaton::build(&grammar, &first_sets);
        (grammar, automaton)
    }

    #[cfg(feature = "dot_writer")]
    #[test]
    fn test_render_automaton_to_dot() {
        let (grammar, automaton) = automaton_of("E$ : E '+' E | 'n' ;");
        let mut f = std::fs::File::create("target/ExpressionLalr.dot").unwrap();
        crate::internal::dot::lalr_render(&automaton, &grammar, "Expression", &mut f);
    }

    #[test]
    fn test_no_two_states_share_a_kernel() {
        let (_, automaton) = automaton_of("L$ : L 'x' | 'x' ;");
        for (i, a) in automaton.states.iter().enumerate() {
            for b in automaton.states.iter().skip(i + 1) {
                assert_ne!(a.kernel, b.kernel);
            }
        }
    }

    #[test]
    fn test_kernels_are_canonical() {
        let (_, automaton) = automaton_of("E$ : E '+' E | 'n' ;");
        for state in &automaton.states {
            let mut sorted = state.kernel.clone();
            sorted.sort_unstable();
            assert_eq!(state.kernel, sorted);
        }
    }

    #[test]
    fn test_left_recursive_list_state_count() {
        // L' : L $end, L : L 'x', L : 'x' gives the classic four-state
        // automaton plus the accept successor.
        let (_, automaton) = automaton_of("L$ : L 'x' | 'x' ;");
        assert_eq!(automaton.states.len(), 5);
    }

    #[test]
    fn test_lookahead_of_goal_item_is_eof() {
        let (grammar, automaton) = automaton_of("S$ : 'a' ;");
        assert!(automaton.states[0].lookaheads[0].contains(grammar.eof_terminal()));
    }

    #[test]
    fn test_reduce_lookaheads_follow_the_list() {
        let (grammar, automaton) = automaton_of("L$ : L 'x' | 'x' ;");
        let first_sets = FirstSets::compute(&grammar);
        let x = grammar.terminal_id_of(grammar.find_symbol("'x'").unwrap());
        // Find the state whose kernel is the completed production L : 'x' •.
        let mut found = false;
        for state in 0..automaton.states.len() {
            let state_id = LalrStateID::from(state);
            for (item, lookaheads) in
                automaton.closure_with_lookaheads(&grammar, &first_sets, state_id)
            {
                if item.is_complete(&grammar)
                    && grammar.prod(item.production).len() == 1
                    && item.dot == 1
                    && grammar.prod(item.production).lhs
                        == grammar.find_symbol("L").unwrap()
                {
                    // The list continues with 'x' or ends at EOF.
                    assert!(lookaheads.contains(x));
                    assert!(lookaheads.contains(grammar.eof_terminal()));
                    found = true;
                }
            }
        }
        assert!(found);
    }

    #[test]
    fn test_lalr_lookaheads_contain_lr0_follow_information() {
        // In SLR terms every reduce lookahead is a subset of FOLLOW(lhs);
        // LALR keeps at least the lookaheads needed to accept the LR(0)
        // language.
        let (grammar, automaton) = automaton_of("S$ : A 'x' ;\nA : 'a' ;");
        let first_sets = FirstSets::compute(&grammar);
        let follow_sets =
            crate::internal::first_follow::FollowSets::compute(&grammar, &first_sets);
        for state in 0..automaton.states.len() {
            let state_id = LalrStateID::from(state);
            for (item, lookaheads) in
                automaton.closure_with_lookaheads(&grammar, &first_sets, state_id)
            {
                if item.is_complete(&grammar) {
                    let lhs = grammar.prod(item.production).lhs;
                    for lookahead in lookaheads.iter() {
                        assert!(
                            follow_sets.follow_of(lhs).contains(lookahead),
                            "lookahead outside FOLLOW"
                        );
                    }
                }
            }
        }
    }
}
