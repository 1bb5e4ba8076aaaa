//! This module contains the implementation of the multi-terminal NFA.
//! All terminal patterns of the grammar are combined into one state arena so
//! that scanner DFAs can be built for arbitrary subsets of terminals. Each
//! terminal keeps its own start and end state; the end state carries the
//! accept id of the terminal. Lower terminal ids have higher priority.

use super::char_class::CharClass;
use super::nfa::{Nfa, NfaState};
use super::{StateID, TerminalID};

#[derive(Debug, Clone, Default)]
pub(crate) struct TerminalNfa {
    /// All states of all terminal NFAs with globally unique dense ids.
    states: Vec<NfaState>,
    /// The start state of each added terminal.
    starts: Vec<(TerminalID, StateID)>,
    /// The accept id per state. Only fragment end states accept.
    accepts: Vec<Option<TerminalID>>,
}

impl TerminalNfa {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add the NFA of a terminal to the arena. The state ids of the fragment
    /// are shifted into the global id space.
    pub(crate) fn add_terminal(&mut self, terminal: TerminalID, mut nfa: Nfa) {
        let (start, end) = nfa.shift_ids(self.states.len());
        self.states.append(&mut nfa.states);
        self.accepts.resize(self.states.len(), None);
        self.accepts[end] = Some(terminal);
        self.starts.push((terminal, start));
        debug_assert!(self
            .states
            .iter()
            .enumerate()
            .all(|(i, s)| s.id().as_usize() == i));
    }

    pub(crate) fn states(&self) -> &[NfaState] {
        &self.states
    }

    pub(crate) fn terminals(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.starts.iter().map(|(t, _)| *t)
    }

    /// The start state of the given terminal, if the terminal was added.
    pub(crate) fn start_of(&self, terminal: TerminalID) -> Option<StateID> {
        self.starts
            .iter()
            .find(|(t, _)| *t == terminal)
            .map(|(_, s)| *s)
    }

    /// The epsilon closure of the start states of the given terminals.
    /// This is the seed of the subset construction for a scanner restricted
    /// to those terminals.
    pub(crate) fn start_closure(&self, terminals: &[TerminalID]) -> Vec<StateID> {
        let starts = self
            .starts
            .iter()
            .filter(|(t, _)| terminals.contains(t))
            .map(|(_, s)| *s);
        self.epsilon_closure_set(starts)
    }

    /// Calculate the epsilon closure of a set of states and return the
    /// unique sorted states.
    pub(crate) fn epsilon_closure_set<I>(&self, states: I) -> Vec<StateID>
    where
        I: IntoIterator<Item = StateID>,
    {
        let mut closure: Vec<StateID> = states.into_iter().collect();
        let mut i = 0;
        while i < closure.len() {
            let current_state = closure[i];
            for epsilon_transition in self.states[current_state].epsilon_transitions() {
                if !closure.contains(&epsilon_transition.target_state()) {
                    closure.push(epsilon_transition.target_state());
                }
            }
            i += 1;
        }
        closure.sort_unstable();
        closure.dedup();
        closure
    }

    /// The accept id of a set of states. When several terminals accept, the
    /// smallest accept id wins.
    pub(crate) fn accept_of_set(&self, states: &[StateID]) -> Option<TerminalID> {
        states
            .iter()
            .filter_map(|s| self.accepts[*s])
            .min()
    }

    /// All consuming transitions leaving the given set of states.
    pub(crate) fn transitions_of_set(&self, states: &[StateID]) -> Vec<(&CharClass, StateID)> {
        let mut transitions = Vec::new();
        for state in states {
            for transition in self.states[*state].transitions() {
                transitions.push((transition.char_class(), transition.target_state()));
            }
        }
        transitions
    }

    /// Calculate move(T, [lo, hi]) for a set of states T, i.e. the targets of
    /// consuming edges whose character class overlaps the probe range.
    pub(crate) fn move_set(&self, states: &[StateID], lo: u32, hi: u32) -> Vec<StateID> {
        let mut move_set = Vec::new();
        for state in states {
            for transition in self.states[*state].transitions() {
                if transition.char_class().intersects_range(lo, hi) {
                    move_set.push(transition.target_state());
                }
            }
        }
        move_set.sort_unstable();
        move_set.dedup();
        move_set
    }
}
