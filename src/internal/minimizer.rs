//! This module contains the DFA minimization.
//! The minimization uses partition refinement: the initial partition groups
//! the accepting states by their accept id and puts all non-accepting states
//! into one group. Groups are split until no group contains two states with
//! distinguishable transition behavior.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use super::char_class::CharClass;
use super::dfa::{Dfa, DfaState};
use super::ids::StateIDBase;
use super::StateID;

// A state group is a sorted set of states that are in the same partition group.
type StateGroup = BTreeSet<StateID>;
// A partition is a vector of state groups.
type Partition = Vec<StateGroup>;

// The canonical transition behavior of a state with respect to a partition:
// for every reachable partition group the union of all character classes
// leading into it. Two states are distinguishable iff these differ.
type TransitionsToPartitionGroups = Vec<(usize, CharClass)>;

// The minimizer is a struct that is used to minimize the number of states in a DFA.
#[derive(Debug)]
pub(crate) struct Minimizer;

impl Minimizer {
    /// Minimize the DFA and renumber the resulting states in BFS order from
    /// the start state.
    pub(crate) fn minimize(dfa: Dfa) -> Dfa {
        trace!("minimize DFA with {} states", dfa.states().len());
        let mut partition_old = Self::calculate_initial_partition(&dfa);
        let mut partition_new;
        loop {
            partition_new = Self::calculate_new_partition(&dfa, &partition_old);
            if partition_new == partition_old {
                break;
            }
            partition_old = partition_new;
        }
        trace!("minimized to {} groups", partition_new.len());
        Self::create_from_partition(&dfa, &partition_new).renumber_bfs()
    }

    /// The start partition is created as follows:
    /// 1. The non-accepting states are put together into the first group.
    /// 2. The accepting states are grouped by their accept id, one group per
    ///    distinct terminal.
    fn calculate_initial_partition(dfa: &Dfa) -> Partition {
        let mut accept_ids: Vec<_> = dfa.states().iter().filter_map(|s| s.accept).collect();
        accept_ids.sort_unstable();
        accept_ids.dedup();

        let mut partition = vec![StateGroup::new(); accept_ids.len() + 1];
        for (id, state) in dfa.states().iter().enumerate() {
            let state_id = StateID::new(id as StateIDBase);
            match state.accept {
                None => {
                    partition[0].insert(state_id);
                }
                Some(terminal) => {
                    let index = accept_ids.iter().position(|t| *t == terminal).unwrap();
                    partition[index + 1].insert(state_id);
                }
            }
        }
        partition.retain(|group| !group.is_empty());
        partition
    }

    /// Calculate the new partition based on the old partition.
    /// Each group is split into subgroups of states with equal canonical
    /// transition behavior.
    fn calculate_new_partition(dfa: &Dfa, partition: &[StateGroup]) -> Partition {
        let mut new_partition = Partition::new();
        for group in partition {
            for new_group in Self::split_group(dfa, group, partition) {
                new_partition.push(new_group);
            }
        }
        new_partition
    }

    fn split_group(dfa: &Dfa, group: &StateGroup, partition: &[StateGroup]) -> Partition {
        // If the group contains only one state, the group can't be split further.
        if group.len() == 1 {
            return vec![group.clone()];
        }
        let mut transition_map_to_states: BTreeMap<TransitionsToPartitionGroups, StateGroup> =
            BTreeMap::new();
        for state_id in group {
            let signature = Self::transition_signature(dfa, *state_id, partition);
            transition_map_to_states
                .entry(signature)
                .or_default()
                .insert(*state_id);
        }
        transition_map_to_states.into_values().collect()
    }

    /// Build the canonical transition behavior of a state: all character
    /// classes leading into the same partition group are unified, so that
    /// two states that split the same code point ranges differently still
    /// compare equal.
    fn transition_signature(
        dfa: &Dfa,
        state_id: StateID,
        partition: &[StateGroup],
    ) -> TransitionsToPartitionGroups {
        let mut classes_per_group: BTreeMap<usize, CharClass> = BTreeMap::new();
        for (class, target) in &dfa.states()[state_id].transitions {
            let group = Self::find_group(*target, partition).unwrap();
            classes_per_group
                .entry(group)
                .and_modify(|c| *c = c.union(class))
                .or_insert_with(|| class.clone());
        }
        classes_per_group.into_iter().collect()
    }

    fn find_group(state_id: StateID, partition: &[StateGroup]) -> Option<usize> {
        partition.iter().position(|group| group.contains(&state_id))
    }

    /// Create a DFA from a partition. Each group is collapsed into one state
    /// whose transitions are those of a representative member, rewritten to
    /// point at groups.
    fn create_from_partition(dfa: &Dfa, partition: &[StateGroup]) -> Dfa {
        // The group of the original start state has to become state 0.
        let start_group = Self::find_group(StateID::new(0), partition).unwrap();
        let mut group_order: Vec<usize> = (0..partition.len()).collect();
        group_order.swap(0, start_group);
        let mut new_id_of_group = vec![0usize; partition.len()];
        for (new_id, group) in group_order.iter().enumerate() {
            new_id_of_group[*group] = new_id;
        }

        let mut states = vec![DfaState::default(); partition.len()];
        for (group_id, group) in partition.iter().enumerate() {
            // All states in a group are equivalent; take the first one as
            // representative.
            let representative = group.first().unwrap();
            let mut classes_per_target: BTreeMap<usize, CharClass> = BTreeMap::new();
            for (class, target) in &dfa.states()[*representative].transitions {
                let target_group = new_id_of_group[Self::find_group(*target, partition).unwrap()];
                classes_per_target
                    .entry(target_group)
                    .and_modify(|c| *c = c.union(class))
                    .or_insert_with(|| class.clone());
            }
            let mut transitions: Vec<(CharClass, StateID)> = classes_per_target
                .into_iter()
                .map(|(group, class)| (class, StateID::new(group as StateIDBase)))
                .collect();
            transitions.sort_by(|(a, _), (b, _)| a.cmp(b));
            let state = &mut states[new_id_of_group[group_id]];
            state.transitions = transitions;
            state.accept = dfa.states()[*representative].accept;
        }
        Dfa::from_states(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaseFolding;
    use crate::internal::char_class::DEFAULT_MAX_CODE_POINT;
    use crate::internal::class_builder::ClassBuilder;
    use crate::internal::nfa::Nfa;
    use crate::internal::regex_parser::parse_regex_syntax;
    use crate::internal::terminal_nfa::TerminalNfa;
    use crate::internal::TerminalID;

    fn minimized(patterns: &[&str]) -> Dfa {
        let class_builder = ClassBuilder::new(DEFAULT_MAX_CODE_POINT);
        let mut nfa = TerminalNfa::new();
        for (i, pattern) in patterns.iter().enumerate() {
            let fragment = Nfa::try_from_ast(
                &parse_regex_syntax(pattern).unwrap(),
                &class_builder,
                CaseFolding::None,
            )
            .unwrap();
            nfa.add_terminal(TerminalID::new(i as u32), fragment);
        }
        let terminals: Vec<TerminalID> = nfa.terminals().collect();
        Minimizer::minimize(Dfa::from_nfa(&nfa, &terminals))
    }

    fn accepts(dfa: &Dfa, input: &str) -> Option<TerminalID> {
        let mut state = StateID::new(0);
        for c in input.chars() {
            state = dfa.step(state, c as u32)?;
        }
        dfa.states()[state].accept
    }

    struct TestData {
        name: &'static str,
        pattern: &'static str,
        expected_states: usize,
    }

    const TEST_DATA: &[TestData] = &[
        TestData {
            name: "SingleCharacter",
            pattern: "a",
            expected_states: 2,
        },
        TestData {
            name: "Alternation",
            pattern: "a|b",
            expected_states: 2,
        },
        TestData {
            name: "KleeneStar",
            pattern: "a*",
            expected_states: 1,
        },
        TestData {
            name: "KleeneStarAlternation",
            pattern: "(a|b)*",
            expected_states: 1,
        },
        TestData {
            name: "Complex",
            pattern: "(a|b)*abb",
            expected_states: 4,
        },
        TestData {
            name: "Keyword",
            pattern: "if",
            expected_states: 3,
        },
    ];

    #[test]
    fn test_minimal_state_counts() {
        for data in TEST_DATA {
            let dfa = minimized(&[data.pattern]);
            assert_eq!(
                dfa.states().len(),
                data.expected_states,
                "state count for '{}:{}' is wrong",
                data.name,
                data.pattern
            );
        }
    }

    #[test]
    fn test_language_preserved() {
        let dfa = minimized(&["(a|b)*abb"]);
        assert_eq!(accepts(&dfa, "abb"), Some(TerminalID::new(0)));
        assert_eq!(accepts(&dfa, "babb"), Some(TerminalID::new(0)));
        assert_eq!(accepts(&dfa, "ab"), None);
        assert_eq!(accepts(&dfa, "ba"), None);
    }

    #[test]
    fn test_minimization_is_idempotent() {
        let dfa = minimized(&["(a|b)*abb", "[0-9]+"]);
        let again = Minimizer::minimize(dfa.clone());
        assert_eq!(dfa, again);
    }

    #[test]
    fn test_accepting_states_with_distinct_terminals_stay_apart() {
        let dfa = minimized(&["a", "b"]);
        // Both accepting states accept different terminals and must not be
        // merged even though their transition behavior is identical.
        assert_eq!(dfa.states().len(), 3);
        assert_eq!(accepts(&dfa, "a"), Some(TerminalID::new(0)));
        assert_eq!(accepts(&dfa, "b"), Some(TerminalID::new(1)));
    }

    #[test]
    fn test_differently_split_edges_are_merged() {
        // [0-4] and [5-9] lead to equivalent accepting states which the
        // minimizer has to merge into a single [0-9] edge.
        let dfa = minimized(&["[0-4]|[5-9]"]);
        assert_eq!(dfa.states().len(), 2);
        assert_eq!(dfa.states()[0].transitions.len(), 1);
        assert_eq!(
            dfa.states()[0].transitions[0].0,
            crate::internal::char_class::CharClass::from_range('0' as u32, '9' as u32)
        );
    }
}
