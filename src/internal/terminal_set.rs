//! This module contains a bitset over the dense terminal id space.
//! FIRST/FOLLOW sets and LALR lookahead sets are unions of terminals; the
//! fixpoint computations only ever grow them, so the set offers change
//! reporting on insert and union.

use super::TerminalID;

/// A bitset over terminal ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct TerminalSet {
    bits: Vec<u64>,
}

impl TerminalSet {
    /// Create an empty set for a terminal id space of the given size.
    pub(crate) fn new(terminal_count: usize) -> Self {
        TerminalSet {
            bits: vec![0; terminal_count.div_ceil(64)],
        }
    }

    /// Insert a terminal. Returns true if the set changed.
    pub(crate) fn insert(&mut self, terminal: TerminalID) -> bool {
        let index = terminal.as_usize();
        let word = index / 64;
        let mask = 1u64 << (index % 64);
        let changed = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        changed
    }

    pub(crate) fn contains(&self, terminal: TerminalID) -> bool {
        let index = terminal.as_usize();
        self.bits[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Union the other set into this one. Returns true if the set changed.
    pub(crate) fn union_with(&mut self, other: &TerminalSet) -> bool {
        debug_assert_eq!(self.bits.len(), other.bits.len());
        let mut changed = false;
        for (word, other_word) in self.bits.iter_mut().zip(other.bits.iter()) {
            let merged = *word | *other_word;
            changed |= merged != *word;
            *word = merged;
        }
        changed
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub(crate) fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate the contained terminals in ascending id order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.bits.iter().enumerate().flat_map(|(word_index, word)| {
            (0..64)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| TerminalID::from(word_index * 64 + bit))
        })
    }
}
