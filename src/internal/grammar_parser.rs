//! This module contains the parser for the grammar description language.
//!
//! The language is line-oriented BNF with closure suffix operators:
//!
//! ```text
//! << '+' '-' ;                       // left associative precedence level
//! >> '^' ;                           // right associative, binds tighter
//! %whitespace /[ \t\n]+/ ;
//! Int : /[0-9]+/ ;                   // named regex terminal
//! calc$ : expr ;                     // '$' marks the goal
//! expr<int> : expr:a '+' expr:b = add [* a + b *]
//!           | Int
//!           ;
//! ```
//!
//! Single-quoted literals are character-class terminals when they consist of
//! one character or contain an unescaped range dash, string terminals
//! otherwise. Double-quoted literals are always string terminals.

use crate::config::GeneratorConfig;
use crate::diagnostics::Diagnostics;
use crate::position::Position;
use crate::{GenError, GenErrorKind, Result};

use super::char_class::CharClass;
use super::grammar::{
    Associativity, ClosureOp, Grammar, Precedence, Production, RhsItem, SymbolKind,
};
use super::{ProductionID, SymbolID};

/// The result of parsing a grammar description.
#[derive(Debug)]
pub(crate) struct ParsedGrammar {
    pub(crate) grammar: Grammar,
    /// Set by the `%case-insensitive` directive.
    pub(crate) case_insensitive: bool,
}

/// Parse the grammar description into the grammar model.
pub(crate) fn parse_grammar(
    text: &str,
    config: &GeneratorConfig,
    diagnostics: &mut Diagnostics,
) -> Result<ParsedGrammar> {
    Parser::new(text, config).parse(diagnostics)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Directive(String),
    /// Raw inner text of a single-quoted literal, escapes undecoded.
    SingleQuoted(String),
    /// Decoded inner text of a double-quoted literal.
    DoubleQuoted(String),
    /// Raw regex text between slashes.
    Regex(String),
    /// Opaque semantic action text.
    Action(String),
    Colon,
    Semi,
    Pipe,
    Question,
    Star,
    Plus,
    Dollar,
    Equals,
    Lt,
    PrecLeft,
    PrecRight,
    PrecNone,
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Directive(name) => write!(f, "'%{}'", name),
            Token::SingleQuoted(text) => write!(f, "'{}'", text),
            Token::DoubleQuoted(text) => write!(f, "\"{}\"", text),
            Token::Regex(text) => write!(f, "/{}/", text),
            Token::Action(_) => write!(f, "semantic action"),
            Token::Colon => write!(f, "':'"),
            Token::Semi => write!(f, "';'"),
            Token::Pipe => write!(f, "'|'"),
            Token::Question => write!(f, "'?'"),
            Token::Star => write!(f, "'*'"),
            Token::Plus => write!(f, "'+'"),
            Token::Dollar => write!(f, "'$'"),
            Token::Equals => write!(f, "'='"),
            Token::Lt => write!(f, "'<'"),
            Token::PrecLeft => write!(f, "'<<'"),
            Token::PrecRight => write!(f, "'>>'"),
            Token::PrecNone => write!(f, "'^^'"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    action_open: String,
    action_close: String,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, config: &GeneratorConfig) -> Self {
        Scanner {
            chars: text.chars().peekable(),
            line: 1,
            column: 1,
            action_open: config.action_delimiters.0.clone(),
            action_close: config.action_delimiters.1.clone(),
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        c
    }

    fn error(&self, message: impl Into<String>) -> GenError {
        GenError::new(GenErrorKind::Syntax {
            position: Some(self.position()),
            message: message.into(),
        })
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    // Only comments are skipped here; a regex literal is
                    // handled by next_token.
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.bump() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            let mut last = ' ';
                            loop {
                                match self.bump() {
                                    Some('/') if last == '*' => break,
                                    Some(c) => last = c,
                                    None => return Err(self.error("unterminated comment")),
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<(Position, Token)> {
        self.skip_trivia()?;
        let position = self.position();
        let Some(c) = self.chars.peek().copied() else {
            return Ok((position, Token::Eof));
        };
        // The action opener is looked for before single-char tokens because
        // its first character may collide with one of them.
        if c == self.action_open.chars().next().unwrap() && self.peek_str(&self.action_open.clone())
        {
            return Ok((position, self.scan_action()?));
        }
        let token = match c {
            ':' => {
                self.bump();
                Token::Colon
            }
            ';' => {
                self.bump();
                Token::Semi
            }
            '|' => {
                self.bump();
                Token::Pipe
            }
            '?' => {
                self.bump();
                Token::Question
            }
            '*' => {
                self.bump();
                Token::Star
            }
            '+' => {
                self.bump();
                Token::Plus
            }
            '$' => {
                self.bump();
                Token::Dollar
            }
            '=' => {
                self.bump();
                Token::Equals
            }
            '<' => {
                self.bump();
                if self.chars.peek() == Some(&'<') {
                    self.bump();
                    Token::PrecLeft
                } else {
                    Token::Lt
                }
            }
            '>' => {
                self.bump();
                if self.chars.peek() == Some(&'>') {
                    self.bump();
                    Token::PrecRight
                } else {
                    return Err(self.error("unexpected '>'"));
                }
            }
            '^' => {
                self.bump();
                if self.chars.peek() == Some(&'^') {
                    self.bump();
                    Token::PrecNone
                } else {
                    return Err(self.error("unexpected '^'"));
                }
            }
            '%' => {
                self.bump();
                let name = self.scan_ident(true)?;
                Token::Directive(name)
            }
            '\'' => {
                self.bump();
                Token::SingleQuoted(self.scan_quoted('\'')?)
            }
            '"' => {
                self.bump();
                let raw = self.scan_quoted('"')?;
                Token::DoubleQuoted(unescape(&raw).map_err(|m| self.error(m))?)
            }
            '/' => {
                self.bump();
                Token::Regex(self.scan_regex()?)
            }
            c if is_ident_start(c) => Token::Ident(self.scan_ident(false)?),
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };
        Ok((position, token))
    }

    fn peek_str(&self, needle: &str) -> bool {
        let mut lookahead = self.chars.clone();
        needle.chars().all(|c| lookahead.next() == Some(c))
    }

    fn scan_action(&mut self) -> Result<Token> {
        for _ in 0..self.action_open.chars().count() {
            self.bump();
        }
        let close = self.action_close.clone();
        let mut text = String::new();
        loop {
            if self.peek_str(&close) {
                for _ in 0..close.chars().count() {
                    self.bump();
                }
                return Ok(Token::Action(text.trim().to_string()));
            }
            match self.bump() {
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated semantic action")),
            }
        }
    }

    fn scan_ident(&mut self, allow_dash: bool) -> Result<String> {
        let mut name = String::new();
        match self.chars.peek() {
            Some(c) if is_ident_start(*c) => {
                name.push(*c);
                self.bump();
            }
            _ => return Err(self.error("expected an identifier")),
        }
        while let Some(c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || *c == '_' || (allow_dash && *c == '-') {
                name.push(*c);
                self.bump();
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn scan_quoted(&mut self, quote: char) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(text),
                Some('\\') => {
                    text.push('\\');
                    match self.bump() {
                        Some(c) => text.push(c),
                        None => return Err(self.error("unterminated literal")),
                    }
                }
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated literal")),
            }
        }
    }

    fn scan_regex(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('/') => return Ok(text),
                Some('\\') => {
                    match self.chars.peek() {
                        // An escaped slash becomes a plain slash; all other
                        // escapes are passed through to the regex parser.
                        Some('/') => {
                            text.push('/');
                            self.bump();
                        }
                        _ => text.push('\\'),
                    }
                }
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated regex literal")),
            }
        }
    }

    /// Scan opaque value-type text up to the matching closing angle bracket.
    fn scan_type_text(&mut self) -> Result<String> {
        let mut depth = 0usize;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('>') if depth == 0 => return Ok(text.trim().to_string()),
                Some('>') => {
                    depth -= 1;
                    text.push('>');
                }
                Some('<') => {
                    depth += 1;
                    text.push('<');
                }
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated value type")),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Decode the escape sequences of a quoted literal.
fn unescape(raw: &str) -> std::result::Result<String, String> {
    let mut result = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            return Err("dangling escape".to_string());
        };
        let decoded = match e {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0C',
            'v' => '\x0B',
            'x' => decode_hex(&mut chars, 2)?,
            'u' => decode_hex(&mut chars, 4)?,
            'U' => decode_hex(&mut chars, 8)?,
            '0'..='7' => {
                let mut value = e as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            value = value * 8 + (*d as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                char::from_u32(value).ok_or("invalid code point")?
            }
            other => other,
        };
        result.push(decoded);
    }
    Ok(result)
}

fn decode_hex(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    digits: usize,
) -> std::result::Result<char, String> {
    let mut value = 0u32;
    for _ in 0..digits {
        let d = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or("malformed hex escape")?;
        value = value * 16 + d;
    }
    char::from_u32(value).ok_or_else(|| "invalid code point".to_string())
}

/// An unescaped dash between two members makes a single-quoted literal a
/// character class.
fn has_unescaped_dash(raw: &str) -> bool {
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == '-' && i > 0 && i + 1 < chars.len() {
            return true;
        }
        i += 1;
    }
    false
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    token: Token,
    token_position: Position,
    prec_level: u32,
    case_insensitive: bool,
    /// `%lexeme` names are resolved after the whole text is parsed.
    pending_lexemes: Vec<(Position, String)>,
    /// `%prec` references are resolved after all precedence declarations are
    /// known.
    pending_prec: Vec<(ProductionID, SymbolID)>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, config: &GeneratorConfig) -> Self {
        Parser {
            scanner: Scanner::new(text, config),
            token: Token::Eof,
            token_position: Position::default(),
            prec_level: 0,
            case_insensitive: false,
            pending_lexemes: Vec::new(),
            pending_prec: Vec::new(),
        }
    }

    fn advance(&mut self) -> Result<()> {
        let (position, token) = self.scanner.next_token()?;
        self.token = token;
        self.token_position = position;
        Ok(())
    }

    fn error_here(&self, message: impl Into<String>) -> GenError {
        GenError::new(GenErrorKind::Syntax {
            position: Some(self.token_position),
            message: message.into(),
        })
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.token == expected {
            self.advance()
        } else {
            Err(self.error_here(format!("expected {}, found {}", expected, self.token)))
        }
    }

    fn parse(mut self, diagnostics: &mut Diagnostics) -> Result<ParsedGrammar> {
        let mut grammar = Grammar::new();
        self.advance()?;
        loop {
            match &self.token {
                Token::Eof => break,
                Token::PrecLeft => self.parse_prec_decl(&mut grammar, Associativity::Left)?,
                Token::PrecRight => self.parse_prec_decl(&mut grammar, Associativity::Right)?,
                Token::PrecNone => self.parse_prec_decl(&mut grammar, Associativity::NonAssoc)?,
                Token::Directive(_) => self.parse_directive(&mut grammar)?,
                Token::Ident(_) => self.parse_definition(&mut grammar, diagnostics)?,
                other => {
                    return Err(self.error_here(format!("unexpected {}", other)));
                }
            }
        }
        self.finalize(&mut grammar, diagnostics);
        Ok(ParsedGrammar {
            grammar,
            case_insensitive: self.case_insensitive,
        })
    }

    /// `<< 't1' 't2' ;` where each declaration opens a new, tighter level.
    fn parse_prec_decl(&mut self, grammar: &mut Grammar, assoc: Associativity) -> Result<()> {
        self.advance()?;
        self.prec_level += 1;
        let precedence = Precedence {
            level: self.prec_level,
            assoc,
        };
        let mut count = 0;
        while self.token != Token::Semi {
            let symbol = match self.token.clone() {
                Token::Ident(name) => {
                    let id = grammar
                        .find_symbol(&name)
                        .ok_or_else(|| self.error_here(format!("unknown symbol '{}'", name)))?;
                    self.advance()?;
                    id
                }
                Token::SingleQuoted(_) | Token::DoubleQuoted(_) | Token::Regex(_) => {
                    self.parse_literal_terminal(grammar)?
                }
                other => {
                    return Err(
                        self.error_here(format!("expected a terminal in precedence list, found {}", other))
                    )
                }
            };
            if !grammar.sym(symbol).is_terminal() {
                return Err(self.error_here(format!(
                    "precedence can only be declared for terminals, '{}' is a nonterminal",
                    grammar.sym(symbol).name
                )));
            }
            grammar.sym_mut(symbol).precedence = Some(precedence);
            count += 1;
        }
        if count == 0 {
            return Err(self.error_here("empty precedence declaration"));
        }
        self.expect(Token::Semi)
    }

    fn parse_directive(&mut self, grammar: &mut Grammar) -> Result<()> {
        let Token::Directive(name) = self.token.clone() else {
            unreachable!();
        };
        self.advance()?;
        match name.as_str() {
            "whitespace" => {
                let symbol = self.parse_literal_terminal(grammar)?;
                let sym = grammar.sym_mut(symbol);
                sym.whitespace = true;
                sym.lexem = true;
                sym.used = true;
                self.expect(Token::Semi)
            }
            "lexeme" => {
                while let Token::Ident(name) = self.token.clone() {
                    self.pending_lexemes.push((self.token_position, name));
                    self.advance()?;
                }
                self.expect(Token::Semi)
            }
            "case-insensitive" => {
                self.case_insensitive = true;
                self.expect(Token::Semi)
            }
            other => Err(self.error_here(format!("unknown directive '%{}'", other))),
        }
    }

    /// Intern the terminal of a literal token and consume the token.
    fn parse_literal_terminal(&mut self, grammar: &mut Grammar) -> Result<SymbolID> {
        let symbol = match self.token.clone() {
            Token::SingleQuoted(raw) => {
                if has_unescaped_dash(&raw) {
                    let class = CharClass::parse(&raw)?;
                    grammar.add_char_class_terminal(class)
                } else {
                    let text = unescape(&raw).map_err(|m| self.error_here(m))?;
                    let mut chars = text.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => {
                            grammar.add_char_class_terminal(CharClass::from_char(c))
                        }
                        _ => grammar.add_string_terminal(&text),
                    }
                }
            }
            Token::DoubleQuoted(text) => grammar.add_string_terminal(&text),
            Token::Regex(pattern) => grammar.add_regex_terminal(None, &pattern),
            other => return Err(self.error_here(format!("expected a terminal, found {}", other))),
        };
        if grammar.sym(symbol).position.is_none() {
            grammar.sym_mut(symbol).position = Some(self.token_position);
        }
        self.advance()?;
        Ok(symbol)
    }

    /// `name [$] [<type>] : body ;`
    fn parse_definition(
        &mut self,
        grammar: &mut Grammar,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let Token::Ident(name) = self.token.clone() else {
            unreachable!();
        };
        let position = self.token_position;
        self.advance()?;

        let is_goal = if self.token == Token::Dollar {
            self.advance()?;
            true
        } else {
            false
        };

        let value_type = if self.token == Token::Lt {
            // The scanner is still positioned right after the '<'.
            let text = self.scanner.scan_type_text()?;
            self.advance()?;
            Some(text)
        } else {
            None
        };

        self.expect(Token::Colon)?;

        // A definition whose single alternative is exactly one regex literal
        // declares a named terminal. A goal definition is always a
        // nonterminal.
        if let (false, Token::Regex(pattern)) = (is_goal, self.token.clone()) {
            let after_regex_position = self.token_position;
            self.advance()?;
            if matches!(self.token, Token::Semi | Token::Equals) {
                return self.finish_terminal_definition(
                    grammar,
                    &name,
                    position,
                    pattern,
                    value_type,
                    is_goal,
                );
            }
            // The regex was an ordinary first item of a production after
            // all; hand it over to the alternative parser.
            return self.parse_nonterminal_definition(
                grammar,
                diagnostics,
                &name,
                position,
                value_type,
                is_goal,
                Some((after_regex_position, pattern)),
            );
        }

        self.parse_nonterminal_definition(
            grammar,
            diagnostics,
            &name,
            position,
            value_type,
            is_goal,
            None,
        )
    }

    fn finish_terminal_definition(
        &mut self,
        grammar: &mut Grammar,
        name: &str,
        position: Position,
        pattern: String,
        value_type: Option<String>,
        is_goal: bool,
    ) -> Result<()> {
        if is_goal {
            return Err(self.error_here(format!("terminal '{}' cannot be the goal", name)));
        }
        let id = match grammar.find_symbol(name) {
            Some(id) => {
                if grammar.sym(id).defined {
                    return Err(GenError::new(GenErrorKind::Syntax {
                        position: Some(position),
                        message: format!("duplicate definition of '{}'", name),
                    }));
                }
                // The symbol was referenced before its definition and was
                // provisionally created as a nonterminal.
                grammar.sym_mut(id).kind = SymbolKind::RegexTerminal(pattern);
                grammar.sym_mut(id).defined = true;
                grammar.sym_mut(id).greedy = true;
                id
            }
            None => grammar.add_regex_terminal(Some(name), &pattern),
        };
        grammar.sym_mut(id).position = Some(position);
        grammar.sym_mut(id).value_type = value_type;
        if self.token == Token::Equals {
            self.advance()?;
            let Token::Ident(tag) = self.token.clone() else {
                return Err(self.error_here("expected an emit tag name"));
            };
            grammar.sym_mut(id).emit = Some(tag);
            self.advance()?;
        }
        self.expect(Token::Semi)
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_nonterminal_definition(
        &mut self,
        grammar: &mut Grammar,
        diagnostics: &mut Diagnostics,
        name: &str,
        position: Position,
        value_type: Option<String>,
        is_goal: bool,
        first_regex: Option<(Position, String)>,
    ) -> Result<()> {
        let lhs = grammar.add_nonterminal(name);
        if grammar.sym(lhs).is_terminal() {
            return Err(GenError::new(GenErrorKind::Syntax {
                position: Some(position),
                message: format!("'{}' is already defined as a terminal", name),
            }));
        }
        if grammar.sym(lhs).position.is_none() {
            grammar.sym_mut(lhs).position = Some(position);
        }
        if let Some(value_type) = value_type {
            grammar.sym_mut(lhs).value_type = Some(value_type);
        }
        if is_goal {
            match grammar.goal {
                Some(goal) if goal != lhs => {
                    return Err(GenError::new(GenErrorKind::Syntax {
                        position: Some(position),
                        message: format!(
                            "goal symbol redefined; '{}' and '{}' are both marked",
                            grammar.sym(goal).name,
                            name
                        ),
                    }));
                }
                _ => {
                    grammar.goal = Some(lhs);
                    grammar.sym_mut(lhs).used = true;
                }
            }
        }

        let mut pending_regex = first_regex;
        loop {
            self.parse_alternative(grammar, diagnostics, lhs, position, pending_regex.take())?;
            if self.token == Token::Pipe {
                self.advance()?;
                continue;
            }
            break;
        }
        self.expect(Token::Semi)
    }

    fn parse_alternative(
        &mut self,
        grammar: &mut Grammar,
        _diagnostics: &mut Diagnostics,
        lhs: SymbolID,
        position: Position,
        first_regex: Option<(Position, String)>,
    ) -> Result<()> {
        let mut rhs: Vec<RhsItem> = Vec::new();
        if let Some((regex_position, pattern)) = first_regex {
            let symbol = grammar.add_regex_terminal(None, &pattern);
            if grammar.sym(symbol).position.is_none() {
                grammar.sym_mut(symbol).position = Some(regex_position);
            }
            rhs.push(self.parse_item_suffix(symbol)?);
        }
        let mut emit = None;
        let mut action = None;
        let mut prec_symbol = None;
        loop {
            match self.token.clone() {
                Token::Ident(name) => {
                    let position = self.token_position;
                    self.advance()?;
                    let symbol = grammar.add_nonterminal(&name);
                    if grammar.sym(symbol).position.is_none() {
                        grammar.sym_mut(symbol).position = Some(position);
                    }
                    rhs.push(self.parse_item_suffix(symbol)?);
                }
                Token::SingleQuoted(_) | Token::DoubleQuoted(_) | Token::Regex(_) => {
                    let symbol = self.parse_literal_terminal(grammar)?;
                    rhs.push(self.parse_item_suffix(symbol)?);
                }
                Token::Directive(name) if name == "error" => {
                    // The distinguished error terminal used for recovery.
                    self.advance()?;
                    let error = grammar.error;
                    rhs.push(self.parse_item_suffix(error)?);
                }
                Token::Directive(name) if name == "prec" => {
                    self.advance()?;
                    let symbol = match self.token.clone() {
                        Token::Ident(name) => {
                            let id = grammar.find_symbol(&name).ok_or_else(|| {
                                self.error_here(format!("unknown symbol '{}'", name))
                            })?;
                            self.advance()?;
                            id
                        }
                        _ => self.parse_literal_terminal(grammar)?,
                    };
                    prec_symbol = Some(symbol);
                }
                Token::Equals => {
                    self.advance()?;
                    let Token::Ident(tag) = self.token.clone() else {
                        return Err(self.error_here("expected an emit tag name"));
                    };
                    emit = Some(tag);
                    self.advance()?;
                }
                Token::Action(text) => {
                    action = Some(text);
                    self.advance()?;
                }
                Token::Pipe | Token::Semi => break,
                other => {
                    return Err(self.error_here(format!("unexpected {} in production", other)));
                }
            }
        }
        let id = grammar.add_production(Production {
            id: ProductionID::default(),
            lhs,
            rhs,
            precedence: None,
            emit,
            action,
            position: Some(position),
        });
        if let Some(symbol) = prec_symbol {
            self.pending_prec.push((id, symbol));
        }
        Ok(())
    }

    fn parse_item_suffix(&mut self, symbol: SymbolID) -> Result<RhsItem> {
        let mut item = RhsItem::plain(symbol);
        if self.token == Token::Colon {
            self.advance()?;
            let Token::Ident(binding) = self.token.clone() else {
                return Err(self.error_here("expected a binding name"));
            };
            item.binding = Some(binding);
            self.advance()?;
        }
        item.closure = match self.token {
            Token::Question => Some(ClosureOp::Optional),
            Token::Star => Some(ClosureOp::ZeroOrMore),
            Token::Plus => Some(ClosureOp::OneOrMore),
            _ => None,
        };
        if item.closure.is_some() {
            self.advance()?;
        }
        Ok(item)
    }

    fn finalize(&mut self, grammar: &mut Grammar, diagnostics: &mut Diagnostics) {
        for (position, name) in self.pending_lexemes.drain(..) {
            match grammar.find_symbol(&name) {
                Some(id) => grammar.sym_mut(id).lexem = true,
                None => diagnostics.warning(
                    Some(position),
                    format!("%lexeme names unknown symbol '{}'", name),
                ),
            }
        }
        for (production, symbol) in self.pending_prec.drain(..) {
            match grammar.sym(symbol).precedence {
                Some(precedence) => {
                    grammar.productions[production].precedence = Some(precedence);
                }
                None => diagnostics.warning(
                    grammar.prod(production).position,
                    format!(
                        "%prec references '{}' which has no declared precedence",
                        grammar.sym(symbol).name
                    ),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::grammar::SymbolKind;

    fn parse(text: &str) -> ParsedGrammar {
        let config = GeneratorConfig::default();
        let mut diagnostics = Diagnostics::new();
        parse_grammar(text, &config, &mut diagnostics).unwrap()
    }

    #[test]
    fn test_minimal_grammar() {
        let parsed = parse("S$ : 'a' | ;");
        let grammar = &parsed.grammar;
        let goal = grammar.goal.unwrap();
        assert_eq!(grammar.sym(goal).name, "S");
        let productions: Vec<_> = grammar.productions_of(goal).collect();
        assert_eq!(productions.len(), 2);
        assert_eq!(productions[0].len(), 1);
        assert_eq!(productions[1].len(), 0);
    }

    #[test]
    fn test_single_quoted_classification() {
        let parsed = parse("S$ : 'a' '0-9' 'if' ;");
        let grammar = &parsed.grammar;
        let production = grammar.productions_of(grammar.goal.unwrap()).next().unwrap();
        let kinds: Vec<_> = production
            .rhs
            .iter()
            .map(|item| grammar.sym(item.symbol).kind.clone())
            .collect();
        assert!(matches!(kinds[0], SymbolKind::CharClassTerminal(_)));
        assert!(matches!(kinds[1], SymbolKind::CharClassTerminal(_)));
        assert!(matches!(kinds[2], SymbolKind::StringTerminal(ref t) if t == "if"));
    }

    #[test]
    fn test_named_regex_terminal() {
        let parsed = parse("Int : /[0-9]+/ ;\nS$ : Int ;");
        let grammar = &parsed.grammar;
        let int = grammar.find_symbol("Int").unwrap();
        assert!(matches!(
            grammar.sym(int).kind,
            SymbolKind::RegexTerminal(ref p) if p == "[0-9]+"
        ));
        assert!(grammar.sym(int).defined);
        assert!(grammar.sym(int).used);
    }

    #[test]
    fn test_forward_referenced_terminal() {
        let parsed = parse("S$ : Int ;\nInt : /[0-9]+/ ;");
        let grammar = &parsed.grammar;
        let int = grammar.find_symbol("Int").unwrap();
        assert!(matches!(grammar.sym(int).kind, SymbolKind::RegexTerminal(_)));
    }

    #[test]
    fn test_precedence_declarations() {
        let parsed = parse("<< '+' ;\n<< '*' ;\nE$ : E '+' E | E '*' E | 'n' ;");
        let grammar = &parsed.grammar;
        let plus = grammar
            .symbols
            .iter()
            .find(|s| matches!(&s.kind, SymbolKind::CharClassTerminal(c) if c.contains('+' as u32)))
            .unwrap();
        let star = grammar
            .symbols
            .iter()
            .find(|s| matches!(&s.kind, SymbolKind::CharClassTerminal(c) if c.contains('*' as u32)))
            .unwrap();
        let plus_prec = plus.precedence.unwrap();
        let star_prec = star.precedence.unwrap();
        assert_eq!(plus_prec.assoc, Associativity::Left);
        assert!(star_prec.level > plus_prec.level);
    }

    #[test]
    fn test_closure_suffixes_and_bindings() {
        let parsed = parse("A$ : 'b':item* 'c'? 'd'+ ;");
        let grammar = &parsed.grammar;
        let production = grammar.productions_of(grammar.goal.unwrap()).next().unwrap();
        assert_eq!(production.rhs[0].closure, Some(ClosureOp::ZeroOrMore));
        assert_eq!(production.rhs[0].binding.as_deref(), Some("item"));
        assert_eq!(production.rhs[1].closure, Some(ClosureOp::Optional));
        assert_eq!(production.rhs[2].closure, Some(ClosureOp::OneOrMore));
    }

    #[test]
    fn test_emit_tag_and_action() {
        let parsed = parse("E$ : E '+' E = add [* fold(a, b) *] | 'n' ;");
        let grammar = &parsed.grammar;
        let production = grammar.productions_of(grammar.goal.unwrap()).next().unwrap();
        assert_eq!(production.emit.as_deref(), Some("add"));
        assert_eq!(production.action.as_deref(), Some("fold(a, b)"));
    }

    #[test]
    fn test_value_types() {
        let parsed = parse("expr<int> : 'n' ;\nS$ : expr ;");
        let grammar = &parsed.grammar;
        let expr = grammar.find_symbol("expr").unwrap();
        assert_eq!(grammar.sym(expr).value_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_whitespace_directive() {
        let parsed = parse("%whitespace /[ \\t\\n]+/ ;\nS$ : 'a' ;");
        let grammar = &parsed.grammar;
        let ws = grammar.symbols.iter().find(|s| s.whitespace).unwrap();
        assert!(ws.lexem);
        assert!(matches!(ws.kind, SymbolKind::RegexTerminal(_)));
    }

    #[test]
    fn test_case_insensitive_directive() {
        let parsed = parse("%case-insensitive ;\nS$ : 'a' ;");
        assert!(parsed.case_insensitive);
    }

    #[test]
    fn test_comments_are_skipped() {
        let parsed = parse("// comment\nS$ : 'a' /* inline */ ;\n");
        assert_eq!(parsed.grammar.productions.len(), 1);
    }

    #[test]
    fn test_duplicate_goal_rejected() {
        let config = GeneratorConfig::default();
        let mut diagnostics = Diagnostics::new();
        let result = parse_grammar("S$ : 'a' ;\nT$ : 'b' ;", &config, &mut diagnostics);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("goal symbol redefined"));
    }

    #[test]
    fn test_duplicate_terminal_definition_rejected() {
        let config = GeneratorConfig::default();
        let mut diagnostics = Diagnostics::new();
        let result = parse_grammar(
            "Int : /[0-9]+/ ;\nInt : /[0-9]/ ;\nS$ : Int ;",
            &config,
            &mut diagnostics,
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate definition"));
    }

    #[test]
    fn test_rhs_reference_position_points_at_the_identifier() {
        let parsed = parse("S$ : missing ;");
        let grammar = &parsed.grammar;
        let missing = grammar.find_symbol("missing").unwrap();
        let position = grammar.sym(missing).position.unwrap();
        assert_eq!(position.line(), 1);
        assert_eq!(position.column(), 6);
    }

    #[test]
    fn test_syntax_error_carries_position() {
        let config = GeneratorConfig::default();
        let mut diagnostics = Diagnostics::new();
        let result = parse_grammar("S$ : 'a' ;\n;", &config, &mut diagnostics);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("line: 2"), "message was: {}", message);
    }

    #[test]
    fn test_prec_override() {
        let parsed = parse("<< '+' ;\nE$ : E '+' E %prec '+' | 'n' ;");
        let grammar = &parsed.grammar;
        let production = grammar.productions_of(grammar.goal.unwrap()).next().unwrap();
        assert!(production.precedence.is_some());
    }
}
