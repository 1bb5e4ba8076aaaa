//! This module contains the DFA implementation.
//! The DFA is generated from the multi-terminal NFA using the subset
//! construction algorithm. The outgoing edges of every DFA state are labeled
//! with pairwise disjoint character classes, so every input character matches
//! at most one edge.

use log::trace;
use rustc_hash::FxHashMap;

use super::char_class::CharClass;
use super::ids::StateIDBase;
use super::terminal_nfa::TerminalNfa;
use super::{StateID, TerminalID};

/// The DFA implementation.
/// It is created for a subset of the terminals of the grammar, the viable
/// terminal set of a parser state, or for all terminals in single-lexer mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct Dfa {
    // The states of the DFA. The start state is always the first state in the vector, i.e. state 0.
    states: Vec<DfaState>,
}

/// A single DFA state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct DfaState {
    // The transitions of the state, sorted by character class and pairwise
    // disjoint.
    pub(crate) transitions: Vec<(CharClass, StateID)>,
    // The accept id of the state, i.e. the terminal that matches when the
    // scan stops here.
    pub(crate) accept: Option<TerminalID>,
}

impl Dfa {
    /// Create a DFA directly from its states. Used by the minimizer.
    pub(crate) fn from_states(states: Vec<DfaState>) -> Self {
        Dfa { states }
    }

    /// Get the states of the DFA.
    pub(crate) fn states(&self) -> &[DfaState] {
        &self.states
    }

    /// Find the successor of the given state for a code point.
    /// The transitions are disjoint, so at most one edge can match.
    pub(crate) fn step(&self, state: StateID, c: u32) -> Option<StateID> {
        self.states[state]
            .transitions
            .iter()
            .find(|(class, _)| class.contains(c))
            .map(|(_, target)| *target)
    }

    /// Create a DFA from the multi-terminal NFA, restricted to the given
    /// terminals. The subset construction takes one transition per block of
    /// the disjoint partition of all outgoing character classes of an NFA
    /// subset. The accept id of a DFA state is the minimum accept id among
    /// its NFA members.
    pub(crate) fn from_nfa(nfa: &TerminalNfa, terminals: &[TerminalID]) -> Self {
        let mut dfa = Dfa { states: Vec::new() };
        let start_set = nfa.start_closure(terminals);
        if start_set.is_empty() {
            // No terminal contributes states; the scanner rejects everything.
            dfa.states.push(DfaState::default());
            return dfa;
        }

        let mut subset_to_state: FxHashMap<Vec<StateID>, StateID> = FxHashMap::default();
        let mut subsets: Vec<Vec<StateID>> = Vec::new();

        let start_id = StateID::new(0);
        subset_to_state.insert(start_set.clone(), start_id);
        subsets.push(start_set);
        dfa.states.push(DfaState::default());

        // The work list is processed in creation order which makes the state
        // numbering a BFS order from the start state.
        let mut next = 0;
        while next < subsets.len() {
            let subset = subsets[next].clone();
            let state_id = StateID::new(next as StateIDBase);
            next += 1;

            dfa.states[state_id].accept = nfa.accept_of_set(&subset);

            for (block, target_subset) in partition_moves(nfa, &subset) {
                let target_id = if let Some(id) = subset_to_state.get(&target_subset) {
                    *id
                } else {
                    let id = StateID::new(dfa.states.len() as StateIDBase);
                    subset_to_state.insert(target_subset.clone(), id);
                    subsets.push(target_subset);
                    dfa.states.push(DfaState::default());
                    id
                };
                dfa.states[state_id].transitions.push((block, target_id));
            }
        }

        trace!("subset construction produced {} states", dfa.states.len());
        dfa
    }

    /// Renumber the states of the DFA in BFS order from the start state.
    /// This gives two isomorphic DFAs identical state numbers, which makes
    /// equal-DFA deduplication a plain comparison.
    pub(crate) fn renumber_bfs(&self) -> Dfa {
        let mut order: Vec<StateID> = vec![StateID::new(0)];
        let mut new_id_of: FxHashMap<StateID, StateID> = FxHashMap::default();
        new_id_of.insert(StateID::new(0), StateID::new(0));
        let mut i = 0;
        while i < order.len() {
            let state = order[i];
            i += 1;
            for (_, target) in &self.states[state].transitions {
                if !new_id_of.contains_key(target) {
                    new_id_of.insert(*target, StateID::new(order.len() as StateIDBase));
                    order.push(*target);
                }
            }
        }
        let states = order
            .iter()
            .map(|old_id| {
                let old = &self.states[*old_id];
                DfaState {
                    transitions: old
                        .transitions
                        .iter()
                        .map(|(class, target)| (class.clone(), new_id_of[target]))
                        .collect(),
                    accept: old.accept,
                }
            })
            .collect();
        Dfa { states }
    }
}

/// Compute the disjoint partition of the outgoing character classes of the
/// given NFA subset and the epsilon-closed target subset per block. Blocks
/// that lead to the same target subset are unified into one character class.
fn partition_moves(nfa: &TerminalNfa, subset: &[StateID]) -> Vec<(CharClass, Vec<StateID>)> {
    // Collect the boundaries of all outgoing ranges. Every elementary
    // interval between two neighboring boundaries behaves uniformly.
    let mut points: Vec<u32> = Vec::new();
    for (class, _) in nfa.transitions_of_set(subset) {
        for range in class.ranges() {
            points.push(range.lo);
            points.push(range.hi + 1);
        }
    }
    points.sort_unstable();
    points.dedup();

    // Group the elementary intervals by their target subset, preserving the
    // order of first appearance.
    let mut moves: Vec<(CharClass, Vec<StateID>)> = Vec::new();
    for window in points.windows(2) {
        let (lo, hi) = (window[0], window[1] - 1);
        let targets = nfa.move_set(subset, lo, hi);
        if targets.is_empty() {
            continue;
        }
        let target_subset = nfa.epsilon_closure_set(targets);
        if let Some((class, _)) = moves.iter_mut().find(|(_, s)| *s == target_subset) {
            let mut extended = class.clone();
            extended.add_range(lo, hi);
            *class = extended;
        } else {
            moves.push((CharClass::from_range(lo, hi), target_subset));
        }
    }
    // Sort the transitions by their character class for deterministic
    // output. The classes are pairwise disjoint, so ordering by the first
    // range is total.
    moves.sort_by(|(a, _), (b, _)| a.cmp(b));
    moves
}
