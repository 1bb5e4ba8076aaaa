//! End-to-end tests that generate tables from small grammars and drive them
//! with a minimal table interpreter: a longest-match scan loop over the
//! exported DFAs and a shift-reduce loop over the ACTION/GOTO tables.

use lalrgen::{Generator, GeneratorBuilder, LexerMode, ParserTables};

/// A minimal driver over the exported tables, used only by the tests.
mod driver {
    use lalrgen::{Action, ParserTables};

    /// A scanned token: the symbol id, the matched text range and the
    /// position after the token.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Token {
        pub symbol: usize,
        pub start: usize,
        pub end: usize,
    }

    /// The summary of an accepted parse.
    #[derive(Debug)]
    pub struct Summary {
        /// The productions in reduction order.
        pub reductions: Vec<usize>,
        /// The parser stack depth at the accept action.
        pub stack_depth: usize,
    }

    /// Scan one token with the DFA selected for the given parser state.
    /// Whitespace matches are discarded and the scan restarts. Returns the
    /// end-of-input token at the end of the text.
    pub fn scan(
        tables: &ParserTables,
        state: usize,
        text: &[char],
        mut pos: usize,
    ) -> Result<Token, usize> {
        loop {
            if pos >= text.len() {
                return Ok(Token {
                    symbol: tables.eof_id,
                    start: pos,
                    end: pos,
                });
            }
            let Some(dfa_index) = tables.dfa_select[state] else {
                // Only an end-of-input check is expected here.
                return Err(pos);
            };
            let dfa = &tables.dfas[dfa_index];
            let mut dfa_state = 0usize;
            let mut cursor = pos;
            let mut last_accept: Option<(usize, usize)> = None;
            while cursor < text.len() {
                let c = text[cursor] as u32;
                let Some(edge) = dfa.states[dfa_state]
                    .edges
                    .iter()
                    .find(|edge| edge.lo <= c && c <= edge.hi)
                else {
                    break;
                };
                dfa_state = edge.target;
                cursor += 1;
                if let Some(accept) = dfa.states[dfa_state].accept {
                    last_accept = Some((accept, cursor));
                }
            }
            let Some((terminal, end)) = last_accept else {
                return Err(pos);
            };
            let symbol = tables.first_terminal + terminal;
            if tables.symbols[symbol].whitespace {
                pos = end;
                continue;
            }
            return Ok(Token {
                symbol,
                start: pos,
                end,
            });
        }
    }

    /// Parse the text against the tables. Returns the reduction summary on
    /// accept or the input position of the offending token on reject.
    pub fn parse(tables: &ParserTables, input: &str) -> Result<Summary, usize> {
        let text: Vec<char> = input.chars().collect();
        let mut stack: Vec<usize> = vec![0];
        let mut pos = 0usize;
        let mut lookahead: Option<Token> = None;
        let mut reductions = Vec::new();

        loop {
            let state = *stack.last().unwrap();
            let token = match &lookahead {
                Some(token) => token.clone(),
                None => {
                    let token = scan(tables, state, &text, pos)?;
                    lookahead = Some(token.clone());
                    token
                }
            };

            let action = tables.actions[state]
                .iter()
                .find(|entry| entry.symbol == token.symbol)
                .map(|entry| entry.action)
                .or_else(|| tables.default_productions[state].map(Action::Reduce));

            match action {
                None => return Err(token.start),
                Some(Action::Shift(target)) => {
                    stack.push(target);
                    pos = token.end;
                    lookahead = None;
                }
                Some(Action::ShiftReduce(production)) => {
                    // The pushed state is popped right away by the
                    // reduction, its number does not matter.
                    stack.push(usize::MAX);
                    pos = token.end;
                    lookahead = None;
                    reduce(tables, &mut stack, &mut reductions, production);
                }
                Some(Action::Reduce(production)) => {
                    reduce(tables, &mut stack, &mut reductions, production);
                }
                Some(Action::Accept) => {
                    return Ok(Summary {
                        reductions,
                        stack_depth: stack.len(),
                    });
                }
            }
        }
    }

    fn reduce(
        tables: &ParserTables,
        stack: &mut Vec<usize>,
        reductions: &mut Vec<usize>,
        production: usize,
    ) {
        let info = &tables.productions[production];
        for _ in 0..info.length {
            stack.pop();
        }
        let state = *stack.last().unwrap();
        let target = tables.gotos[state]
            .iter()
            .find(|entry| entry.symbol == info.lhs)
            .map(|entry| entry.target)
            .expect("a goto exists after every reduction");
        stack.push(target);
        reductions.push(production);
    }

    /// Tokenize the whole input with the scanner of the start state.
    pub fn tokenize(tables: &ParserTables, input: &str) -> (Vec<(usize, String)>, Option<usize>) {
        let text: Vec<char> = input.chars().collect();
        let mut pos = 0;
        let mut tokens = Vec::new();
        loop {
            match scan(tables, 0, &text, pos) {
                Ok(token) if token.symbol == tables.eof_id => return (tokens, None),
                Ok(token) => {
                    tokens.push((
                        token.symbol,
                        text[token.start..token.end].iter().collect(),
                    ));
                    pos = token.end;
                }
                Err(at) => return (tokens, Some(at)),
            }
        }
    }
}

fn generate(text: &str) -> ParserTables {
    let _ = env_logger::builder().is_test(true).try_init();
    Generator::new().generate(text).unwrap().tables
}

fn production_of(tables: &ParserTables, lhs_name: &str, length: usize) -> usize {
    let lhs = tables
        .symbols
        .iter()
        .find(|s| s.name == lhs_name)
        .unwrap()
        .id;
    tables
        .productions
        .iter()
        .find(|p| p.lhs == lhs && p.length == length)
        .unwrap()
        .id
}

#[test]
fn empty_alternative_grammar() {
    let tables = generate("S$ : 'a' | ;");
    // Two user productions next to the augmented goal production.
    let goal = tables.symbols[0].id;
    let user_productions = tables
        .productions
        .iter()
        .filter(|p| p.lhs != goal)
        .count();
    assert_eq!(user_productions, 2);

    assert!(driver::parse(&tables, "").is_ok());
    assert!(driver::parse(&tables, "a").is_ok());
    assert_eq!(driver::parse(&tables, "aa").err(), Some(1));
}

#[test]
fn left_recursive_list() {
    let tables = generate("L$ : L 'x' | 'x' ;");
    let summary = driver::parse(&tables, "xxx").unwrap();
    assert_eq!(summary.reductions.len(), 3);
    assert_eq!(summary.stack_depth, 2);
    assert!(driver::parse(&tables, "").is_err());
}

#[test]
fn operator_precedence() {
    let text = "<< '+' ;\n<< '*' ;\nE$ : E '+' E | E '*' E | 'n' ;";
    let generated = Generator::new().generate(text).unwrap();
    // Precedence resolves every conflict silently.
    assert_eq!(generated.diagnostics.warning_count(), 0);
    assert_eq!(generated.diagnostics.error_count(), 0);
    let tables = generated.tables;

    let plus = production_of(&tables, "E", 3);
    let mult = plus + 1;
    let n = production_of(&tables, "E", 1);

    // "n+n*n" parses as n + (n*n): the multiplication reduces right after
    // its operands, before the addition.
    let summary = driver::parse(&tables, "n+n*n").unwrap();
    assert_eq!(summary.reductions, vec![n, n, n, mult, plus]);

    // "n*n+n" parses as (n*n) + n.
    let summary = driver::parse(&tables, "n*n+n").unwrap();
    assert_eq!(summary.reductions, vec![n, n, mult, n, plus]);
}

#[test]
fn left_associativity_groups_to_the_left() {
    let tables = generate("<< '+' ;\nE$ : E '+' E | 'n' ;");
    let plus = production_of(&tables, "E", 3);
    let n = production_of(&tables, "E", 1);
    // "n+n+n" reduces the left addition first.
    let summary = driver::parse(&tables, "n+n+n").unwrap();
    assert_eq!(summary.reductions, vec![n, n, plus, n, plus]);
}

#[test]
fn regex_terminal_tokenization() {
    let tables = generate("S$ : Int ;\nInt : /[0-9]+/ ;");
    let int_symbol = tables.symbols.iter().find(|s| s.name == "Int").unwrap().id;

    let (tokens, error) = driver::tokenize(&tables, "123a");
    assert_eq!(tokens, vec![(int_symbol, "123".to_string())]);
    assert_eq!(error, Some(3));

    assert!(driver::parse(&tables, "123").is_ok());
    assert_eq!(driver::parse(&tables, "123a").err(), Some(3));
}

#[test]
fn closure_expansion() {
    let tables = generate("A$ : 'b'* 'c' ;");
    // The closure becomes a fresh nonterminal with an empty and a
    // left-recursive production.
    let star = tables
        .symbols
        .iter()
        .find(|s| s.name == "b_star")
        .expect("the closure nonterminal is exported");
    let star_productions: Vec<_> = tables
        .productions
        .iter()
        .filter(|p| p.lhs == star.id)
        .collect();
    assert_eq!(star_productions.len(), 2);
    assert_eq!(star_productions[0].length, 0);
    assert_eq!(star_productions[1].rhs[0], star.id);

    assert!(driver::parse(&tables, "c").is_ok());
    assert!(driver::parse(&tables, "bbbc").is_ok());
    assert!(driver::parse(&tables, "b").is_err());
}

#[test]
fn dangling_else_conflict() {
    let text = "S$ : 'if' E 'then' S | 'if' E 'then' S 'else' S | 'x' ;\nE : 'e' ;";
    let generated = Generator::new().generate(text).unwrap();
    let conflicts: Vec<_> = generated
        .diagnostics
        .entries()
        .iter()
        .filter(|d| d.message.contains("shift/reduce conflict"))
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].message.contains("resolved to shift"));

    // The else binds to the inner if, so the nested input parses.
    let tables = generated.tables;
    assert!(driver::parse(&tables, "ifethenifethenxelsex").is_ok());
    assert!(driver::parse(&tables, "ifethenxelsex").is_ok());
}

#[test]
fn whitespace_is_discarded() {
    let tables = generate("%whitespace /[ \\t]+/ ;\nL$ : L 'x' | 'x' ;");
    assert!(driver::parse(&tables, "x x  x").is_ok());
    assert!(driver::parse(&tables, "  x  ").is_ok());
    assert!(driver::parse(&tables, "   ").is_err());
}

#[test]
fn keywords_and_identifiers() {
    let text = r#"
        %whitespace /[ \t\n]+/ ;
        Id : /[a-z][a-z0-9]*/ ;
        S$ : 'if' Id | Id ;
    "#;
    let tables = generate(text);
    // The keyword wins over the identifier for the exact text "if" because
    // it was declared with a smaller terminal id in the viable set.
    assert!(driver::parse(&tables, "if abc").is_ok());
    assert!(driver::parse(&tables, "abc").is_ok());
}

#[test]
fn case_insensitive_directive() {
    let tables = generate("%case-insensitive ;\nS$ : 'abc' ;");
    assert!(driver::parse(&tables, "abc").is_ok());
    assert!(driver::parse(&tables, "ABC").is_ok());
    assert!(driver::parse(&tables, "aBc").is_ok());
}

#[test]
fn single_lexer_mode() {
    let generator = GeneratorBuilder::new().lexer_mode(LexerMode::Single).build();
    let generated = generator.generate("S$ : 'a' 'b' ;").unwrap();
    let tables = generated.tables;
    assert_eq!(tables.dfas.len(), 1);
    assert!(driver::parse(&tables, "ab").is_ok());
    assert!(driver::parse(&tables, "ba").is_err());
}

#[test]
fn default_production_compression_is_observably_equivalent() {
    let tables = generate("L$ : L 'x' | 'x' ;");
    // States with a default production have elided action rows; parsing
    // still behaves as with explicit reduce entries.
    assert!(tables
        .default_productions
        .iter()
        .any(|d| d.is_some()));
    assert!(driver::parse(&tables, "xx").is_ok());
}

#[test]
fn dfa_select_shares_tables_between_states() {
    let tables = generate("S$ : A A ;\nA : 'a' ;");
    let selected: Vec<usize> = tables.dfa_select.iter().flatten().copied().collect();
    assert!(selected.len() > tables.dfas.len());
}

#[test]
fn error_ids_are_exported() {
    let tables = generate("S$ : 'a' ;");
    assert_eq!(tables.symbols[tables.eof_id].name, "$end");
    assert_eq!(tables.symbols[tables.error_id].name, "$error");
    assert!(tables.eof_id >= tables.first_terminal);
    assert_eq!(tables.eof_id, tables.symbols.len() - 1);
}
