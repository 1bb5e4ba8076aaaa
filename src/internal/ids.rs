macro_rules! impl_id {
    ($name:ident, $tp:ty) => {
        /// The ID type $name.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub(crate) struct $name($tp);

        impl $name {
            /// Create a new id.
            #[inline]
            pub(crate) const fn new(index: $tp) -> Self {
                $name(index)
            }

            /// Get the id as usize.
            #[allow(dead_code)]
            #[inline]
            pub(crate) fn as_usize(&self) -> usize {
                self.0 as usize
            }

            /// Get the id as $tp.
            #[allow(dead_code)]
            #[inline]
            pub(crate) fn id(&self) -> $tp {
                self.0
            }
        }

        impl<T> std::ops::Index<$name> for [T] {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0 as usize]
            }
        }

        impl<T> std::ops::IndexMut<$name> for [T] {
            #[inline]
            fn index_mut(&mut self, index: $name) -> &mut T {
                &mut self[index.0 as usize]
            }
        }

        impl<T> std::ops::Index<$name> for Vec<T> {
            type Output = T;

            #[inline]
            fn index(&self, index: $name) -> &Self::Output {
                &self[index.0 as usize]
            }
        }

        impl<T> std::ops::IndexMut<$name> for Vec<T> {
            #[inline]
            fn index_mut(&mut self, index: $name) -> &mut T {
                &mut self[index.0 as usize]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$tp> for $name {
            fn from(index: $tp) -> Self {
                $name::new(index)
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                $name::new(index as $tp)
            }
        }
    };
}

/// The ID type for automata states. Used in NFA and DFA.
pub(crate) type StateIDBase = u32;
impl_id!(StateID, StateIDBase);

/// The ID type for symbols. After the rewriter has assigned the final symbol
/// order this is the index of the symbol in the symbol vector of the grammar.
pub(crate) type SymbolIDBase = u32;
impl_id!(SymbolID, SymbolIDBase);

/// The ID type for productions. The index of the production in the production
/// vector of the grammar. It determines the priority of the production during
/// reduce/reduce conflict resolution, i.e. lower indices win.
pub(crate) type ProductionIDBase = u32;
impl_id!(ProductionID, ProductionIDBase);

/// The ID type for terminals. This is the dense index of a terminal in the
/// terminal id space used by FIRST/FOLLOW sets, lookaheads and the lexer.
/// The accept id of a terminal in the scanner DFAs is its terminal id, where
/// lower ids have higher priority.
pub(crate) type TerminalIDBase = u32;
impl_id!(TerminalID, TerminalIDBase);

/// The ID type for LALR(1) parser states.
pub(crate) type LalrStateIDBase = u32;
impl_id!(LalrStateID, LalrStateIDBase);

/// The ID type for deduplicated scanner DFA tables.
pub(crate) type DfaIDBase = u32;
impl_id!(DfaID, DfaIDBase);
