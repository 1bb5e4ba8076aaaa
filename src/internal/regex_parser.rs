//! This module contains the parser for the regex syntax.
//! The parser is used to parse the regex syntax into an abstract syntax tree (AST).
//! We use the `regex_syntax` crate to parse the regex syntax, although we will only support a
//! subset of the regex syntax.

use regex_syntax::ast::Ast;

use crate::Result;

/// Parse the regex syntax into an abstract syntax tree.
/// Octal escapes are enabled because terminal patterns of classic grammars
/// use them.
/// # Errors
/// An error is returned if the regex syntax is invalid.
pub(crate) fn parse_regex_syntax(input: &str) -> Result<Ast> {
    let mut parser = regex_syntax::ast::parse::ParserBuilder::new()
        .octal(true)
        .build();
    match parser.parse(input) {
        Ok(ast) => Ok(ast),
        Err(e) => Err(e.into()),
    }
}
