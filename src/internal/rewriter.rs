//! This module contains the grammar rewriter.
//! The rewriter brings the parsed grammar into the normal form the LALR(1)
//! construction works on. The steps run in a strict order: goal
//! augmentation, virtual closure expansion, terminal unification, precedence
//! inheritance, emit and value-type inheritance and finally the symbol
//! reordering that assigns the stable dense ids.

use log::debug;
use rustc_hash::FxHashMap;

use crate::{GenError, GenErrorKind, Result};

use super::char_class::CharClass;
use super::grammar::{ClosureOp, Grammar, Production, RhsItem, SymbolKind};
use super::{ProductionID, SymbolID};

/// Rewrite the grammar in place.
pub(crate) fn rewrite(grammar: &mut Grammar) -> Result<()> {
    let mut rewriter = Rewriter::default();
    rewriter.augment_goal(grammar)?;
    rewriter.expand_closures(grammar);
    rewriter.unify_terminals(grammar);
    rewriter.inherit_precedence(grammar);
    rewriter.inherit_emit_and_value_types(grammar);
    rewriter.reorder_symbols(grammar);
    debug!(
        "rewritten grammar: {} symbols, {} productions",
        grammar.symbols.len(),
        grammar.productions.len()
    );
    Ok(())
}

#[derive(Default)]
struct Rewriter {
    /// Closure nonterminals already created, keyed by base symbol and
    /// operator so that repeated closures of the same base are reused.
    closure_cache: FxHashMap<(SymbolID, ClosureOp), SymbolID>,
    /// Symbols replaced during terminal unification. They are dropped by the
    /// reordering step.
    replaced: FxHashMap<SymbolID, SymbolID>,
}

impl Rewriter {
    /// Introduce the augmented goal `S' : S $end`.
    fn augment_goal(&mut self, grammar: &mut Grammar) -> Result<()> {
        let Some(goal) = grammar.goal else {
            return Err(GenError::new(GenErrorKind::Syntax {
                position: None,
                message: "no goal symbol; mark one nonterminal with '$'".to_string(),
            }));
        };
        let name = format!("{}'", grammar.sym(goal).name);
        let augmented = grammar.add_nonterminal(&name);
        let eof = grammar.eof;
        grammar.add_production(Production {
            id: ProductionID::default(),
            lhs: augmented,
            rhs: vec![RhsItem::plain(goal), RhsItem::plain(eof)],
            precedence: None,
            emit: None,
            action: None,
            position: None,
        });
        grammar.sym_mut(augmented).used = true;
        grammar.goal = Some(augmented);
        Ok(())
    }

    /// Expand `X?`, `X*` and `X+` into fresh nonterminals with ordinary
    /// productions. The list productions are left-recursive so that the
    /// parser stack stays bounded.
    fn expand_closures(&mut self, grammar: &mut Grammar) {
        let mut production = 0;
        while production < grammar.productions.len() {
            for item_index in 0..grammar.productions[production].rhs.len() {
                let item = grammar.productions[production].rhs[item_index].clone();
                let Some(op) = item.closure else {
                    continue;
                };
                let closure_symbol = self.closure_nonterminal(grammar, item.symbol, op);
                let rewritten = &mut grammar.productions[production].rhs[item_index];
                rewritten.symbol = closure_symbol;
                rewritten.closure = None;
                grammar.sym_mut(closure_symbol).used = true;
            }
            production += 1;
        }
    }

    fn closure_nonterminal(
        &mut self,
        grammar: &mut Grammar,
        base: SymbolID,
        op: ClosureOp,
    ) -> SymbolID {
        if let Some(existing) = self.closure_cache.get(&(base, op)) {
            return *existing;
        }
        let suffix = match op {
            ClosureOp::Optional => "opt",
            ClosureOp::ZeroOrMore => "star",
            ClosureOp::OneOrMore => "plus",
        };
        let base_name = derived_base_name(&grammar.sym(base).name);
        let mut name = format!("{}_{}", base_name, suffix);
        while grammar.find_symbol(&name).is_some() {
            name.push('\'');
        }
        // Derived symbols carry the value type and emit tag of their base.
        let value_type = grammar.sym(base).value_type.clone();
        let emit = grammar.sym(base).emit.clone();
        let symbol = grammar.add_nonterminal(&name);
        grammar.sym_mut(symbol).value_type = value_type;
        grammar.sym_mut(symbol).emit = emit;

        match op {
            ClosureOp::Optional => {
                // opt : | X
                self.add_closure_production(grammar, symbol, vec![]);
                self.add_closure_production(grammar, symbol, vec![RhsItem::plain(base)]);
            }
            ClosureOp::ZeroOrMore => {
                // star : | star X
                self.add_closure_production(grammar, symbol, vec![]);
                self.add_closure_production(
                    grammar,
                    symbol,
                    vec![RhsItem::plain(symbol), RhsItem::plain(base)],
                );
            }
            ClosureOp::OneOrMore => {
                // plus : X | plus X
                self.add_closure_production(grammar, symbol, vec![RhsItem::plain(base)]);
                self.add_closure_production(
                    grammar,
                    symbol,
                    vec![RhsItem::plain(symbol), RhsItem::plain(base)],
                );
            }
        }
        self.closure_cache.insert((base, op), symbol);
        symbol
    }

    fn add_closure_production(
        &mut self,
        grammar: &mut Grammar,
        lhs: SymbolID,
        rhs: Vec<RhsItem>,
    ) {
        grammar.add_production(Production {
            id: ProductionID::default(),
            lhs,
            rhs,
            precedence: None,
            emit: None,
            action: None,
            position: None,
        });
    }

    /// Collapse duplicate terminals to one canonical symbol. String
    /// terminals of length one become character-class terminals; regex
    /// terminals with identical patterns collapse to the earliest one.
    fn unify_terminals(&mut self, grammar: &mut Grammar) {
        for id in 0..grammar.symbols.len() {
            let symbol_id = SymbolID::from(id);
            if self.replaced.contains_key(&symbol_id) {
                continue;
            }
            let canonical = match &grammar.sym(symbol_id).kind {
                SymbolKind::StringTerminal(text) if text.chars().count() == 1 => {
                    let c = text.chars().next().unwrap();
                    Some(CharClass::from_char(c))
                }
                _ => None,
            };
            if let Some(class) = canonical {
                let replacement = grammar.add_char_class_terminal(class);
                if replacement != symbol_id {
                    self.merge_terminal_attributes(grammar, symbol_id, replacement);
                    self.replaced.insert(symbol_id, replacement);
                }
            }
        }
        // Regex terminals: a named definition and an inline literal with the
        // same pattern denote the same terminal.
        for id in 0..grammar.symbols.len() {
            let symbol_id = SymbolID::from(id);
            if self.replaced.contains_key(&symbol_id) {
                continue;
            }
            let SymbolKind::RegexTerminal(pattern) = grammar.sym(symbol_id).kind.clone() else {
                continue;
            };
            let first = grammar
                .symbols
                .iter()
                .find(|s| {
                    !self.replaced.contains_key(&s.id)
                        && matches!(&s.kind, SymbolKind::RegexTerminal(p) if *p == pattern)
                })
                .map(|s| s.id)
                .unwrap();
            if first != symbol_id {
                self.merge_terminal_attributes(grammar, symbol_id, first);
                self.replaced.insert(symbol_id, first);
            }
        }
        if self.replaced.is_empty() {
            return;
        }
        for production in grammar.productions.iter_mut() {
            for item in production.rhs.iter_mut() {
                if let Some(replacement) = self.replaced.get(&item.symbol) {
                    item.symbol = *replacement;
                }
            }
        }
    }

    /// Carry flags and attributes of a replaced terminal over to its
    /// canonical symbol.
    fn merge_terminal_attributes(&self, grammar: &mut Grammar, from: SymbolID, to: SymbolID) {
        let (used, lexem, whitespace, precedence, emit, value_type) = {
            let s = grammar.sym(from);
            (
                s.used,
                s.lexem,
                s.whitespace,
                s.precedence,
                s.emit.clone(),
                s.value_type.clone(),
            )
        };
        let target = grammar.sym_mut(to);
        target.used |= used;
        target.lexem |= lexem;
        target.whitespace |= whitespace;
        if target.precedence.is_none() {
            target.precedence = precedence;
        }
        if target.emit.is_none() {
            target.emit = emit;
        }
        if target.value_type.is_none() {
            target.value_type = value_type;
        }
    }

    /// A production without explicit precedence inherits the precedence of
    /// its rightmost precedence-carrying terminal.
    fn inherit_precedence(&mut self, grammar: &mut Grammar) {
        for production in 0..grammar.productions.len() {
            if grammar.productions[production].precedence.is_some() {
                continue;
            }
            let inherited = grammar.productions[production]
                .rhs
                .iter()
                .rev()
                .filter(|item| grammar.sym(item.symbol).is_terminal())
                .find_map(|item| grammar.sym(item.symbol).precedence);
            grammar.productions[production].precedence = inherited;
        }
    }

    /// A production without an emit tag inherits the tag of its left-hand
    /// side. A nonterminal without a declared value type inherits the unique
    /// result type of its productions, when all of them agree.
    fn inherit_emit_and_value_types(&mut self, grammar: &mut Grammar) {
        for production in 0..grammar.productions.len() {
            if grammar.productions[production].emit.is_none() {
                let lhs = grammar.productions[production].lhs;
                let emit = grammar.sym(lhs).emit.clone();
                grammar.productions[production].emit = emit;
            }
        }
        for id in 0..grammar.symbols.len() {
            let symbol = SymbolID::from(id);
            if grammar.sym(symbol).kind != SymbolKind::Nonterminal
                || grammar.sym(symbol).value_type.is_some()
            {
                continue;
            }
            // The result type of a production is the value type of its
            // rightmost symbol, the value that ends up on top of the stack.
            let result_types: Vec<Option<String>> = grammar
                .productions_of(symbol)
                .map(|p| {
                    p.rhs
                        .last()
                        .and_then(|item| grammar.sym(item.symbol).value_type.clone())
                })
                .collect();
            let mut result_types = result_types.into_iter();
            let Some(Some(first)) = result_types.next() else {
                continue;
            };
            if result_types.all(|t| t.as_deref() == Some(first.as_str())) {
                grammar.sym_mut(symbol).value_type = Some(first);
            }
        }
    }

    /// Assign the stable final symbol order: the augmented goal first, then
    /// the remaining nonterminals in declaration order, then the terminals
    /// in declaration order with the end-of-input terminal in the last slot.
    /// Replaced terminals are dropped. Afterwards every symbol id equals its
    /// array position.
    fn reorder_symbols(&mut self, grammar: &mut Grammar) {
        let goal = grammar.goal.expect("goal is set after augmentation");
        let mut order: Vec<SymbolID> = Vec::with_capacity(grammar.symbols.len());
        order.push(goal);
        for symbol in &grammar.symbols {
            if symbol.kind == SymbolKind::Nonterminal && symbol.id != goal {
                order.push(symbol.id);
            }
        }
        let first_terminal_index = order.len();
        // Literal terminals come before regex terminals, so an exact
        // keyword beats a pattern of the same match length through its
        // smaller accept id. Within each group the declaration order is
        // kept.
        for symbol in &grammar.symbols {
            if symbol.is_terminal()
                && symbol.id != grammar.eof
                && !matches!(symbol.kind, SymbolKind::RegexTerminal(_))
                && !self.replaced.contains_key(&symbol.id)
            {
                order.push(symbol.id);
            }
        }
        for symbol in &grammar.symbols {
            if matches!(symbol.kind, SymbolKind::RegexTerminal(_))
                && !self.replaced.contains_key(&symbol.id)
            {
                order.push(symbol.id);
            }
        }
        order.push(grammar.eof);

        let mut new_id_of: FxHashMap<SymbolID, SymbolID> = FxHashMap::default();
        for (new_id, old_id) in order.iter().enumerate() {
            new_id_of.insert(*old_id, SymbolID::from(new_id));
        }
        // Replaced symbols map to the new id of their canonical symbol.
        for (from, to) in &self.replaced {
            let target = new_id_of[to];
            new_id_of.insert(*from, target);
        }

        let mut symbols = Vec::with_capacity(order.len());
        for old_id in &order {
            let mut symbol = grammar.symbols[*old_id].clone();
            symbol.id = new_id_of[old_id];
            symbols.push(symbol);
        }
        grammar.symbols = symbols;
        grammar.first_terminal_index = first_terminal_index;
        grammar.goal = Some(new_id_of[&goal]);
        grammar.eof = new_id_of[&grammar.eof];
        grammar.error = new_id_of[&grammar.error];
        for (index, production) in grammar.productions.iter_mut().enumerate() {
            production.id = ProductionID::from(index);
            production.lhs = new_id_of[&production.lhs];
            for item in production.rhs.iter_mut() {
                item.symbol = new_id_of[&item.symbol];
            }
        }
        debug_assert!(grammar
            .symbols
            .iter()
            .enumerate()
            .all(|(i, s)| s.id.as_usize() == i));
    }
}

/// Strip the quotes of literal display names for derived symbol names.
fn derived_base_name(name: &str) -> String {
    let trimmed = name.trim_matches('\'').trim_matches('"');
    if trimmed.is_empty() {
        name.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::internal::grammar_parser::parse_grammar;

    fn rewritten(text: &str) -> Grammar {
        let config = GeneratorConfig::default();
        let mut diagnostics = crate::diagnostics::Diagnostics::new();
        let mut parsed = parse_grammar(text, &config, &mut diagnostics).unwrap();
        rewrite(&mut parsed.grammar).unwrap();
        parsed.grammar
    }

    #[test]
    fn test_augmented_goal() {
        let grammar = rewritten("S$ : 'a' ;");
        let goal = grammar.goal.unwrap();
        assert_eq!(goal.as_usize(), 0);
        assert_eq!(grammar.sym(goal).name, "S'");
        let production = grammar.productions_of(goal).next().unwrap();
        assert_eq!(production.len(), 2);
        assert_eq!(production.rhs[1].symbol, grammar.eof);
    }

    #[test]
    fn test_symbol_order_is_dense() {
        let grammar = rewritten("S$ : A 'x' ;\nA : 'y' | ;");
        for (index, symbol) in grammar.symbols.iter().enumerate() {
            assert_eq!(symbol.id.as_usize(), index);
        }
        // Goal first, nonterminals before terminals, EOF last.
        assert_eq!(grammar.sym(grammar.goal.unwrap()).name, "S'");
        assert_eq!(grammar.eof.as_usize(), grammar.symbols.len() - 1);
        let first_terminal = grammar.first_terminal_index;
        assert!(grammar.symbols[..first_terminal]
            .iter()
            .all(|s| !s.is_terminal()));
        assert!(grammar.symbols[first_terminal..]
            .iter()
            .all(|s| s.is_terminal()));
    }

    #[test]
    fn test_star_closure_expansion() {
        let grammar = rewritten("A$ : 'b'* 'c' ;");
        let star = grammar.find_symbol("b_star").unwrap();
        let productions: Vec<_> = grammar.productions_of(star).collect();
        assert_eq!(productions.len(), 2);
        assert_eq!(productions[0].len(), 0);
        // The list production is left-recursive.
        assert_eq!(productions[1].rhs[0].symbol, star);
        assert_eq!(productions[1].len(), 2);
    }

    #[test]
    fn test_opt_and_plus_closure_expansion() {
        let grammar = rewritten("A$ : 'b'? 'c'+ ;");
        let opt = grammar.find_symbol("b_opt").unwrap();
        let plus = grammar.find_symbol("c_plus").unwrap();
        let opt_productions: Vec<_> = grammar.productions_of(opt).collect();
        assert_eq!(opt_productions.len(), 2);
        assert_eq!(opt_productions[0].len(), 0);
        assert_eq!(opt_productions[1].len(), 1);
        let plus_productions: Vec<_> = grammar.productions_of(plus).collect();
        assert_eq!(plus_productions.len(), 2);
        assert_eq!(plus_productions[0].len(), 1);
        assert_eq!(plus_productions[1].rhs[0].symbol, plus);
    }

    #[test]
    fn test_closure_reuse() {
        let grammar = rewritten("A$ : 'b'* 'c' 'b'* ;");
        let stars: Vec<_> = grammar
            .symbols
            .iter()
            .filter(|s| s.name.contains("_star"))
            .collect();
        assert_eq!(stars.len(), 1);
    }

    #[test]
    fn test_precedence_inheritance() {
        let grammar = rewritten("<< '+' ;\n<< '*' ;\nE$ : E '+' E | E '*' E | 'n' ;");
        let productions: Vec<_> = grammar
            .productions
            .iter()
            .filter(|p| p.len() == 3)
            .collect();
        let plus_level = productions[0].precedence.unwrap().level;
        let star_level = productions[1].precedence.unwrap().level;
        assert!(star_level > plus_level);
    }

    #[test]
    fn test_single_char_string_unified_with_char_class() {
        let grammar = rewritten("S$ : \"a\" 'a' ;");
        let production = grammar
            .productions
            .iter()
            .find(|p| p.len() == 2 && p.lhs != grammar.goal.unwrap())
            .unwrap();
        assert_eq!(production.rhs[0].symbol, production.rhs[1].symbol);
    }

    #[test]
    fn test_duplicate_regex_terminals_unified() {
        let grammar = rewritten("Int : /[0-9]+/ ;\nS$ : Int /[0-9]+/ ;");
        let production = grammar
            .productions
            .iter()
            .find(|p| p.len() == 2 && p.lhs != grammar.goal.unwrap())
            .unwrap();
        assert_eq!(production.rhs[0].symbol, production.rhs[1].symbol);
    }

    #[test]
    fn test_value_type_inheritance() {
        let grammar = rewritten("Int<i64> : /[0-9]+/ ;\nnum : Int ;\nS$ : num ;");
        let num = grammar.find_symbol("num").unwrap();
        assert_eq!(grammar.sym(num).value_type.as_deref(), Some("i64"));
    }

    #[test]
    fn test_no_goal_is_an_error() {
        let config = GeneratorConfig::default();
        let mut diagnostics = crate::diagnostics::Diagnostics::new();
        let mut parsed = parse_grammar("S : 'a' ;", &config, &mut diagnostics).unwrap();
        let result = rewrite(&mut parsed.grammar);
        assert!(result.is_err());
    }
}
