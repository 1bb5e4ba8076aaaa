//! This module contains the grammar model.
//! Symbols and productions are stored in flat vectors and reference each
//! other through typed indices, never through pointers. The rewriter assigns
//! the final dense symbol order; afterwards the id of a symbol or production
//! equals its array position.

use crate::position::Position;

use super::char_class::CharClass;
use super::{ProductionID, SymbolID, TerminalID};

/// The associativity of a precedence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Associativity {
    Left,
    Right,
    /// Declared but neither left nor right; equal-precedence conflicts are
    /// reported and default to shift.
    NonAssoc,
}

/// A precedence level with its associativity. Higher levels bind tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Precedence {
    pub(crate) level: u32,
    pub(crate) assoc: Associativity,
}

/// The discriminated symbol kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    Nonterminal,
    /// A terminal matching one character out of a class, e.g. `'0-9'`.
    CharClassTerminal(CharClass),
    /// A terminal matching a fixed string, e.g. `'if'`.
    StringTerminal(String),
    /// A terminal matching a regular expression, e.g. `/[0-9]+/`.
    RegexTerminal(String),
    /// The distinguished end-of-input terminal.
    EndOfInput,
    /// The distinguished error terminal.
    Error,
}

impl SymbolKind {
    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self, SymbolKind::Nonterminal)
    }
}

/// A grammar symbol.
#[derive(Debug, Clone)]
pub(crate) struct Symbol {
    pub(crate) id: SymbolID,
    pub(crate) name: String,
    pub(crate) kind: SymbolKind,
    /// The AST node tag emitted for this symbol, if any.
    pub(crate) emit: Option<String>,
    /// The user-declared value type, opaque text.
    pub(crate) value_type: Option<String>,
    pub(crate) precedence: Option<Precedence>,
    /// The symbol participates in tokenization.
    pub(crate) lexem: bool,
    /// Matches of this terminal are discarded by the scan loop.
    pub(crate) whitespace: bool,
    /// The terminal matches greedily.
    pub(crate) greedy: bool,
    /// The symbol has a definition (productions or a pattern).
    pub(crate) defined: bool,
    /// The symbol occurs on some right-hand side or is the goal.
    pub(crate) used: bool,
    /// Where the symbol was first mentioned, for diagnostics.
    pub(crate) position: Option<Position>,
}

impl Symbol {
    fn new(id: SymbolID, name: String, kind: SymbolKind) -> Self {
        let greedy = !matches!(kind, SymbolKind::Nonterminal);
        Symbol {
            id,
            name,
            kind,
            emit: None,
            value_type: None,
            precedence: None,
            lexem: false,
            whitespace: false,
            greedy,
            defined: false,
            used: false,
            position: None,
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// One item of a production's right-hand side.
#[derive(Debug, Clone)]
pub(crate) struct RhsItem {
    pub(crate) symbol: SymbolID,
    /// The binding name used in semantic actions, e.g. `expr:lhs`.
    pub(crate) binding: Option<String>,
    /// A closure suffix operator that the rewriter expands.
    pub(crate) closure: Option<ClosureOp>,
}

impl RhsItem {
    pub(crate) fn plain(symbol: SymbolID) -> Self {
        RhsItem {
            symbol,
            binding: None,
            closure: None,
        }
    }
}

/// The closure suffix operators of the grammar surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ClosureOp {
    /// `X?`
    Optional,
    /// `X*`
    ZeroOrMore,
    /// `X+`
    OneOrMore,
}

/// A production of the grammar.
#[derive(Debug, Clone)]
pub(crate) struct Production {
    pub(crate) id: ProductionID,
    pub(crate) lhs: SymbolID,
    pub(crate) rhs: Vec<RhsItem>,
    /// Explicit via `%prec` or inherited from the rightmost
    /// precedence-carrying terminal.
    pub(crate) precedence: Option<Precedence>,
    pub(crate) emit: Option<String>,
    /// Opaque semantic action text.
    pub(crate) action: Option<String>,
    pub(crate) position: Option<Position>,
}

impl Production {
    pub(crate) fn len(&self) -> usize {
        self.rhs.len()
    }
}

/// The grammar: symbol registry plus production list.
#[derive(Debug, Clone)]
pub(crate) struct Grammar {
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) productions: Vec<Production>,
    pub(crate) goal: Option<SymbolID>,
    pub(crate) eof: SymbolID,
    pub(crate) error: SymbolID,
    /// The index of the first terminal after reordering. Terminal ids are
    /// dense from here on.
    pub(crate) first_terminal_index: usize,
}

impl Grammar {
    pub(crate) fn new() -> Self {
        let mut grammar = Grammar {
            symbols: Vec::new(),
            productions: Vec::new(),
            goal: None,
            eof: SymbolID::default(),
            error: SymbolID::default(),
            first_terminal_index: 0,
        };
        grammar.eof = grammar.intern("$end".to_string(), SymbolKind::EndOfInput);
        grammar.error = grammar.intern("$error".to_string(), SymbolKind::Error);
        grammar.symbols[grammar.eof].defined = true;
        grammar.symbols[grammar.error].defined = true;
        grammar
    }

    pub(crate) fn sym(&self, id: SymbolID) -> &Symbol {
        &self.symbols[id]
    }

    pub(crate) fn sym_mut(&mut self, id: SymbolID) -> &mut Symbol {
        &mut self.symbols[id]
    }

    pub(crate) fn prod(&self, id: ProductionID) -> &Production {
        &self.productions[id]
    }

    fn intern(&mut self, name: String, kind: SymbolKind) -> SymbolID {
        let id = SymbolID::from(self.symbols.len());
        self.symbols.push(Symbol::new(id, name, kind));
        id
    }

    /// Find a named symbol. Anonymous literal terminals are found through
    /// their canonical form instead.
    pub(crate) fn find_symbol(&self, name: &str) -> Option<SymbolID> {
        self.symbols.iter().find(|s| s.name == name).map(|s| s.id)
    }

    /// Find or create a nonterminal with the given name.
    pub(crate) fn add_nonterminal(&mut self, name: &str) -> SymbolID {
        if let Some(id) = self.find_symbol(name) {
            id
        } else {
            self.intern(name.to_string(), SymbolKind::Nonterminal)
        }
    }

    /// Find or create a character-class terminal. Identical classes collapse
    /// to one terminal.
    pub(crate) fn add_char_class_terminal(&mut self, class: CharClass) -> SymbolID {
        if let Some(id) = self
            .symbols
            .iter()
            .find(|s| matches!(&s.kind, SymbolKind::CharClassTerminal(c) if *c == class))
            .map(|s| s.id)
        {
            return id;
        }
        let name = format!("'{}'", class);
        let id = self.intern(name, SymbolKind::CharClassTerminal(class));
        self.symbols[id].defined = true;
        id
    }

    /// Find or create a string terminal. Identical strings collapse to one
    /// terminal.
    pub(crate) fn add_string_terminal(&mut self, text: &str) -> SymbolID {
        if let Some(id) = self
            .symbols
            .iter()
            .find(|s| matches!(&s.kind, SymbolKind::StringTerminal(t) if t == text))
            .map(|s| s.id)
        {
            return id;
        }
        let name = format!("'{}'", text.escape_default());
        let id = self.intern(name, SymbolKind::StringTerminal(text.to_string()));
        self.symbols[id].defined = true;
        id
    }

    /// Find or create a regex terminal. Anonymous regex terminals with the
    /// same pattern collapse to one terminal; named ones are looked up by
    /// name like any other definition.
    pub(crate) fn add_regex_terminal(&mut self, name: Option<&str>, pattern: &str) -> SymbolID {
        if let Some(name) = name {
            let id = if let Some(id) = self.find_symbol(name) {
                id
            } else {
                self.intern(name.to_string(), SymbolKind::RegexTerminal(pattern.to_string()))
            };
            self.symbols[id].defined = true;
            return id;
        }
        if let Some(id) = self
            .symbols
            .iter()
            .find(|s| matches!(&s.kind, SymbolKind::RegexTerminal(p) if p == pattern))
            .map(|s| s.id)
        {
            return id;
        }
        let display = format!("/{}/", pattern);
        let id = self.intern(display, SymbolKind::RegexTerminal(pattern.to_string()));
        self.symbols[id].defined = true;
        id
    }

    /// Add a production. The left-hand side becomes defined, all right-hand
    /// side symbols become used.
    pub(crate) fn add_production(&mut self, mut production: Production) -> ProductionID {
        let id = ProductionID::from(self.productions.len());
        production.id = id;
        self.symbols[production.lhs].defined = true;
        for item in &production.rhs {
            self.symbols[item.symbol].used = true;
        }
        self.productions.push(production);
        id
    }

    /// The productions with the given left-hand side, in declaration order.
    pub(crate) fn productions_of(&self, lhs: SymbolID) -> impl Iterator<Item = &Production> {
        self.productions.iter().filter(move |p| p.lhs == lhs)
    }

    /// All terminal symbols in id order. Only meaningful after reordering.
    pub(crate) fn terminals(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.is_terminal())
    }

    /// The number of terminals.
    pub(crate) fn terminal_count(&self) -> usize {
        self.symbols.len() - self.first_terminal_index
    }

    /// The dense terminal id of a terminal symbol. Only valid after the
    /// rewriter has assigned the final symbol order.
    pub(crate) fn terminal_id_of(&self, symbol: SymbolID) -> TerminalID {
        debug_assert!(self.sym(symbol).is_terminal());
        debug_assert!(symbol.as_usize() >= self.first_terminal_index);
        TerminalID::from(symbol.as_usize() - self.first_terminal_index)
    }

    /// The symbol id of a dense terminal id.
    pub(crate) fn symbol_of_terminal(&self, terminal: TerminalID) -> SymbolID {
        SymbolID::from(self.first_terminal_index + terminal.as_usize())
    }

    /// The dense terminal id of the end-of-input terminal.
    pub(crate) fn eof_terminal(&self) -> TerminalID {
        self.terminal_id_of(self.eof)
    }

    /// Render a production as `lhs : a b c`, optionally with a dot marking a
    /// position. Used in conflict diagnostics.
    pub(crate) fn format_production(&self, id: ProductionID, dot: Option<usize>) -> String {
        let production = self.prod(id);
        let mut parts = vec![self.sym(production.lhs).name.clone(), ":".to_string()];
        for (i, item) in production.rhs.iter().enumerate() {
            if dot == Some(i) {
                parts.push("•".to_string());
            }
            parts.push(self.sym(item.symbol).name.clone());
        }
        if dot == Some(production.rhs.len()) {
            parts.push("•".to_string());
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_symbols_exist() {
        let grammar = Grammar::new();
        assert_eq!(grammar.sym(grammar.eof).kind, SymbolKind::EndOfInput);
        assert_eq!(grammar.sym(grammar.error).kind, SymbolKind::Error);
    }

    #[test]
    fn test_char_class_terminals_are_interned() {
        let mut grammar = Grammar::new();
        let a1 = grammar.add_char_class_terminal(CharClass::from_char('a'));
        let a2 = grammar.add_char_class_terminal(CharClass::from_char('a'));
        let b = grammar.add_char_class_terminal(CharClass::from_char('b'));
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn test_string_terminals_are_interned() {
        let mut grammar = Grammar::new();
        let if1 = grammar.add_string_terminal("if");
        let if2 = grammar.add_string_terminal("if");
        assert_eq!(if1, if2);
    }

    #[test]
    fn test_add_production_updates_flags() {
        let mut grammar = Grammar::new();
        let list = grammar.add_nonterminal("list");
        let x = grammar.add_string_terminal("x");
        grammar.add_production(Production {
            id: ProductionID::default(),
            lhs: list,
            rhs: vec![RhsItem::plain(list), RhsItem::plain(x)],
            precedence: None,
            emit: None,
            action: None,
            position: None,
        });
        assert!(grammar.sym(list).defined);
        assert!(grammar.sym(list).used);
        assert!(grammar.sym(x).used);
    }

    #[test]
    fn test_format_production_with_dot() {
        let mut grammar = Grammar::new();
        let list = grammar.add_nonterminal("list");
        let x = grammar.add_string_terminal("x");
        let id = grammar.add_production(Production {
            id: ProductionID::default(),
            lhs: list,
            rhs: vec![RhsItem::plain(list), RhsItem::plain(x)],
            precedence: None,
            emit: None,
            action: None,
            position: None,
        });
        assert_eq!(grammar.format_production(id, Some(1)), "list : list • 'x'");
    }
}
