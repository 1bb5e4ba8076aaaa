//! This module contains the NFA (Non-deterministic Finite Automaton) implementation.
//! The NFA is used to represent a terminal pattern as a finite automaton.
//! A state has either one consuming edge labeled with a character class or up
//! to two epsilon edges. Fragments have exactly one start and one end state.

use regex_syntax::ast::{Ast, FlagsItemKind, GroupKind, RepetitionKind, RepetitionRange};

use crate::config::CaseFolding;
use crate::{GenError, Result};

use super::char_class::CharClass;
use super::class_builder::ClassBuilder;
use super::ids::StateIDBase;
use super::StateID;

macro_rules! unsupported {
    ($feature:expr) => {
        GenError::new($crate::GenErrorKind::UnsupportedFeature(
            $feature.to_string(),
        ))
    };
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Nfa {
    pub(crate) states: Vec<NfaState>,
    // Used during NFA construction
    pub(crate) start_state: StateID,
    // Used during NFA construction
    pub(crate) end_state: StateID,
}

impl Nfa {
    pub(crate) fn new() -> Self {
        Self {
            states: vec![NfaState::default()],
            start_state: StateID::default(),
            end_state: StateID::default(),
        }
    }

    // Returns true if the NFA is empty, i.e. no states and no transitions have been added.
    pub(crate) fn is_empty(&self) -> bool {
        self.start_state == StateID::default()
            && self.end_state == StateID::default()
            && self.states.len() == 1
            && self.states[0].is_empty()
    }

    pub(crate) fn start_state(&self) -> StateID {
        self.start_state
    }

    pub(crate) fn end_state(&self) -> StateID {
        self.end_state
    }

    pub(crate) fn states(&self) -> &[NfaState] {
        &self.states
    }

    pub(crate) fn add_state(&mut self, state: NfaState) {
        self.states.push(state);
    }

    pub(crate) fn set_start_state(&mut self, state: StateID) {
        self.start_state = state;
    }

    pub(crate) fn set_end_state(&mut self, state: StateID) {
        self.end_state = state;
    }

    pub(crate) fn add_transition(&mut self, from: StateID, chars: CharClass, target_state: StateID) {
        debug_assert!(!chars.is_empty());
        self.states[from].transitions.push(NfaTransition {
            char_class: chars,
            target_state,
        });
        // A consuming state has exactly one successor and no epsilon edges.
        debug_assert!(self.states[from].transitions.len() <= 1);
        debug_assert!(self.states[from].epsilon_transitions.is_empty());
    }

    pub(crate) fn add_epsilon_transition(&mut self, from: StateID, target_state: StateID) {
        self.states[from]
            .epsilon_transitions
            .push(EpsilonTransition { target_state });
        debug_assert!(
            self.states[from].epsilon_transitions.len() + self.states[from].transitions.len() <= 2
        );
    }

    pub(crate) fn new_state(&mut self) -> StateID {
        let state = StateID::new(self.states.len() as StateIDBase);
        self.add_state(NfaState::new(state));
        state
    }

    /// Apply an offset to every state number.
    pub(crate) fn shift_ids(&mut self, offset: usize) -> (StateID, StateID) {
        for state in self.states.iter_mut() {
            state.offset(offset);
        }
        self.start_state = StateID::new(self.start_state.id() + offset as StateIDBase);
        self.end_state = StateID::new(self.end_state.id() + offset as StateIDBase);
        (self.start_state, self.end_state)
    }

    /// Replace this still-empty NFA by the given one.
    fn take_over(&mut self, nfa: Nfa) {
        debug_assert!(self.is_empty());
        self.start_state = nfa.start_state;
        self.end_state = nfa.end_state;
        self.states = nfa.states;
    }

    /// Append the given NFA behind this one.
    pub(crate) fn concat(&mut self, mut nfa: Nfa) {
        if self.is_empty() {
            self.take_over(nfa);
            return;
        }
        let (nfa_start_state, nfa_end_state) = nfa.shift_ids(self.states.len());
        self.append(nfa);
        // Bridge from the old end into the appended fragment and adopt its
        // end state.
        self.add_epsilon_transition(self.end_state, nfa_start_state);
        self.set_end_state(nfa_end_state);
    }

    /// Turn this NFA into the alternation of itself and the given NFA.
    pub(crate) fn alternation(&mut self, mut nfa: Nfa) {
        if self.is_empty() {
            self.take_over(nfa);
            return;
        }
        let (nfa_start_state, nfa_end_state) = nfa.shift_ids(self.states.len());
        self.append(nfa);

        // A fork state in front of both branches, a join state behind them.
        let start_state = self.new_state();
        self.add_epsilon_transition(start_state, self.start_state);
        self.add_epsilon_transition(start_state, nfa_start_state);
        let end_state = self.new_state();
        self.add_epsilon_transition(self.end_state, end_state);
        self.add_epsilon_transition(nfa_end_state, end_state);

        self.set_start_state(start_state);
        self.set_end_state(end_state);
    }

    pub(crate) fn zero_or_one(&mut self) {
        // A fresh start state that can bypass the fragment entirely.
        let start_state = self.new_state();
        self.add_epsilon_transition(start_state, self.start_state);
        self.add_epsilon_transition(start_state, self.end_state);
        self.set_start_state(start_state);
    }

    pub(crate) fn one_or_more(&mut self) {
        let start_state = self.new_state();
        self.add_epsilon_transition(start_state, self.start_state);
        // The old end state loops back for further repetitions.
        let end_state = self.new_state();
        self.add_epsilon_transition(self.end_state, end_state);
        self.add_epsilon_transition(self.end_state, self.start_state);
        self.set_start_state(start_state);
        self.set_end_state(end_state);
    }

    pub(crate) fn zero_or_more(&mut self) {
        // one_or_more with an additional bypass from the fresh start state
        // to the old end state.
        let start_state = self.new_state();
        self.add_epsilon_transition(start_state, self.start_state);
        self.add_epsilon_transition(start_state, self.end_state);
        let end_state = self.new_state();
        self.add_epsilon_transition(self.end_state, end_state);
        self.add_epsilon_transition(self.end_state, self.start_state);
        self.set_start_state(start_state);
        self.set_end_state(end_state);
    }

    /// Move the states of the given NFA into this one, consuming it. The
    /// state ids must already be shifted into place.
    pub(crate) fn append(&mut self, mut nfa: Nfa) {
        self.states.append(nfa.states.as_mut());
        debug_assert!(self
            .states
            .iter()
            .enumerate()
            .all(|(i, s)| s.id().as_usize() == i));
    }

    /// Build an NFA that accepts exactly the characters of the given class.
    pub(crate) fn from_char_class(class: CharClass) -> Self {
        let mut nfa = Nfa::new();
        let start_state = nfa.end_state();
        let end_state = nfa.new_state();
        nfa.set_end_state(end_state);
        nfa.add_transition(start_state, class, end_state);
        nfa
    }

    /// Build an NFA that accepts exactly the given string.
    pub(crate) fn from_string(text: &str, folding: CaseFolding) -> Self {
        let mut nfa = Nfa::new();
        for c in text.chars() {
            let class = CharClass::from_char(c).case_fold(folding);
            nfa.concat(Nfa::from_char_class(class));
        }
        nfa
    }

    pub(crate) fn try_from_ast(
        ast: &Ast,
        class_builder: &ClassBuilder,
        folding: CaseFolding,
    ) -> Result<Self> {
        let mut nfa = Nfa::new();
        match ast {
            Ast::Empty(_) => Ok(nfa),
            Ast::Flags(f) => Err(unsupported!(format!("{:?}", f.flags.items))),
            Ast::Literal(_) | Ast::Dot(_) | Ast::ClassUnicode(_) | Ast::ClassPerl(_)
            | Ast::ClassBracketed(_) => {
                let class = class_builder.class_from_ast(ast)?.case_fold(folding);
                Ok(Nfa::from_char_class(class))
            }
            Ast::Assertion(a) => Err(unsupported!(format!("Assertion {:?}", a.kind))),
            Ast::Repetition(r) => {
                let mut nfa2 = Self::try_from_ast(&r.ast, class_builder, folding)?;
                if !r.greedy {
                    Err(unsupported!(format!("{}: Non-greedy repetitions", ast)))?;
                }
                match &r.op.kind {
                    RepetitionKind::ZeroOrOne => {
                        nfa2.zero_or_one();
                        nfa = nfa2;
                    }
                    RepetitionKind::ZeroOrMore => {
                        nfa2.zero_or_more();
                        nfa = nfa2;
                    }
                    RepetitionKind::OneOrMore => {
                        nfa2.one_or_more();
                        nfa = nfa2;
                    }
                    RepetitionKind::Range(r) => match r {
                        RepetitionRange::Exactly(c) => {
                            for _ in 0..*c {
                                nfa.concat(nfa2.clone());
                            }
                        }
                        RepetitionRange::AtLeast(c) => {
                            for _ in 0..*c {
                                nfa.concat(nfa2.clone());
                            }
                            let mut nfa_zero_or_more = nfa2.clone();
                            nfa_zero_or_more.zero_or_more();
                            nfa.concat(nfa_zero_or_more);
                        }
                        RepetitionRange::Bounded(least, most) => {
                            for _ in 0..*least {
                                nfa.concat(nfa2.clone());
                            }
                            let mut nfa_zero_or_one = nfa2.clone();
                            nfa_zero_or_one.zero_or_one();
                            for _ in *least..*most {
                                nfa.concat(nfa_zero_or_one.clone());
                            }
                        }
                    },
                }
                Ok(nfa)
            }
            Ast::Group(g) => {
                if let GroupKind::NonCapturing(flags) = &g.kind {
                    if flags
                        .items
                        .iter()
                        .any(|f| matches!(f.kind, FlagsItemKind::Flag(_)))
                    {
                        Err(unsupported!(format!(
                            "{:?}: Flags in non-capturing group",
                            flags.items
                        )))?;
                    }
                }
                nfa = Self::try_from_ast(&g.ast, class_builder, folding)?;
                Ok(nfa)
            }
            Ast::Alternation(a) => {
                for ast in a.asts.iter() {
                    let nfa2 = Self::try_from_ast(ast, class_builder, folding)?;
                    nfa.alternation(nfa2);
                }
                Ok(nfa)
            }
            Ast::Concat(c) => {
                for ast in c.asts.iter() {
                    let nfa2 = Self::try_from_ast(ast, class_builder, folding)?;
                    nfa.concat(nfa2);
                }
                Ok(nfa)
            }
        }
    }

    /// Calculate the epsilon closure of a state.
    pub(crate) fn epsilon_closure(&self, state: StateID) -> Vec<StateID> {
        // The state itself is always part of the ε-closure
        let mut closure = vec![state];
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

    /// Returns true if the NFA accepts the empty word, i.e. the end state is
    /// in the epsilon closure of the start state. Such patterns are dangerous
    /// in a scanner and are reported by the integrity checks.
    pub(crate) fn matches_empty(&self) -> bool {
        self.epsilon_closure(self.start_state)
            .contains(&self.end_state)
    }

    pub(crate) fn contains_state(&self, state: StateID) -> bool {
        state.as_usize() < self.states.len()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NfaState {
    state: StateID,
    epsilon_transitions: Vec<EpsilonTransition>,
    transitions: Vec<NfaTransition>,
}

impl NfaState {
    pub(crate) fn new(state: StateID) -> Self {
        Self {
            state,
            epsilon_transitions: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.epsilon_transitions.is_empty()
    }

    pub(crate) fn id(&self) -> StateID {
        self.state
    }

    pub(crate) fn transitions(&self) -> &[NfaTransition] {
        &self.transitions
    }

    pub(crate) fn epsilon_transitions(&self) -> &[EpsilonTransition] {
        &self.epsilon_transitions
    }

    /// Apply an offset to every state number.
    pub(crate) fn offset(&mut self, offset: usize) {
        self.state = StateID::new(self.state.id() + offset as StateIDBase);
        for transition in self.transitions.iter_mut() {
            transition.target_state =
                StateID::new(transition.target_state.id() + offset as StateIDBase);
        }
        for epsilon_transition in self.epsilon_transitions.iter_mut() {
            epsilon_transition.target_state =
                StateID::new(epsilon_transition.target_state.id() + offset as StateIDBase);
        }
    }
}

/// A consuming transition in the NFA.
#[derive(Debug, Clone)]
pub(crate) struct NfaTransition {
    /// The characters to match.
    char_class: CharClass,
    /// The next state to transition to
    target_state: StateID,
}

impl NfaTransition {
    pub(crate) fn target_state(&self) -> StateID {
        self.target_state
    }

    pub(crate) fn char_class(&self) -> &CharClass {
        &self.char_class
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EpsilonTransition {
    pub(crate) target_state: StateID,
}

impl EpsilonTransition {
    /// Create a new epsilon transition to the given state.
    #[inline]
    pub(crate) fn new(target_state: StateID) -> Self {
        Self { target_state }
    }

    #[inline]
    pub(crate) fn target_state(&self) -> StateID {
        self.target_state
    }
}
