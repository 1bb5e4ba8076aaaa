//! This module contains the conversion of regex class ASTs into character
//! classes. Where the regex syntax describes a set of characters, the
//! conversion produces the equivalent canonical range representation, so
//! that all later automata construction works on plain code point ranges.

use regex_syntax::ast::{
    Ast, ClassAscii, ClassAsciiKind, ClassBracketed, ClassPerl, ClassPerlKind, ClassSet,
    ClassSetBinaryOp, ClassSetBinaryOpKind, ClassSetItem, ClassSetRange, ClassSetUnion,
    ClassUnicode, Literal,
};

use crate::{GenError, Result};

use super::char_class::CharClass;

macro_rules! unsupported {
    ($feature:expr) => {
        GenError::new($crate::GenErrorKind::UnsupportedFeature(
            $feature.to_string(),
        ))
    };
}

/// Builds character classes from regex AST nodes.
/// The Perl and POSIX classes are interpreted over the ASCII ranges that
/// classic grammar terminals expect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassBuilder {
    max_code_point: u32,
}

impl ClassBuilder {
    pub(crate) fn new(max_code_point: u32) -> Self {
        ClassBuilder { max_code_point }
    }

    /// Convert a class-like AST node into a character class.
    /// Dots match any character except newline.
    pub(crate) fn class_from_ast(&self, ast: &Ast) -> Result<CharClass> {
        match ast {
            Ast::Literal(l) => {
                let Literal { c, .. } = **l;
                Ok(CharClass::from_char(c))
            }
            Ast::Dot(_) => {
                let newline = CharClass::from_char('\n');
                Ok(newline.negate(self.max_code_point))
            }
            Ast::ClassUnicode(c) => self.from_class_unicode(c),
            Ast::ClassPerl(c) => self.from_class_perl(c),
            Ast::ClassBracketed(c) => self.from_class_bracketed(c),
            _ => Err(unsupported!(format!("{:#?}", ast))),
        }
    }

    fn from_class_unicode(&self, unicode: &ClassUnicode) -> Result<CharClass> {
        // Unicode property classes would require the full property tables.
        // They are rejected so that the scanner tables stay predictable.
        Err(unsupported!(format!("Unicode class {:#?}", unicode.kind)))
    }

    fn from_class_perl(&self, perl: &ClassPerl) -> Result<CharClass> {
        let ClassPerl { negated, kind, .. } = perl;
        let class = match kind {
            ClassPerlKind::Digit => CharClass::from_range('0' as u32, '9' as u32),
            ClassPerlKind::Space => CharClass::parse(r"\t\n\v\f\r ")?,
            ClassPerlKind::Word => CharClass::parse(r"0-9A-Za-z_")?,
        };
        Ok(if *negated {
            class.negate(self.max_code_point)
        } else {
            class
        })
    }

    fn from_class_bracketed(&self, bracketed: &ClassBracketed) -> Result<CharClass> {
        let class = self.from_class_set(&bracketed.kind)?;
        Ok(if bracketed.negated {
            class.negate(self.max_code_point)
        } else {
            class
        })
    }

    fn from_class_set(&self, set: &ClassSet) -> Result<CharClass> {
        match set {
            ClassSet::Item(item) => self.from_set_item(item),
            ClassSet::BinaryOp(bin_op) => self.from_binary_op(bin_op),
        }
    }

    fn from_binary_op(&self, bin_op: &ClassSetBinaryOp) -> Result<CharClass> {
        let ClassSetBinaryOp { kind, lhs, rhs, .. } = bin_op;
        let lhs = self.from_class_set(lhs)?;
        let rhs = self.from_class_set(rhs)?;
        Ok(match kind {
            ClassSetBinaryOpKind::Intersection => lhs.intersection(&rhs),
            ClassSetBinaryOpKind::Difference => lhs.difference(&rhs),
            ClassSetBinaryOpKind::SymmetricDifference => {
                lhs.union(&rhs).difference(&lhs.intersection(&rhs))
            }
        })
    }

    fn from_set_union(&self, union: &ClassSetUnion) -> Result<CharClass> {
        union
            .items
            .iter()
            .try_fold(CharClass::empty(), |acc, item| {
                self.from_set_item(item).map(|c| acc.union(&c))
            })
    }

    fn from_set_item(&self, item: &ClassSetItem) -> Result<CharClass> {
        let class = match item {
            ClassSetItem::Empty(_) => CharClass::empty(),
            ClassSetItem::Literal(l) => {
                let Literal { c, .. } = *l;
                CharClass::from_char(c)
            }
            ClassSetItem::Range(r) => {
                let ClassSetRange { start, end, .. } = r;
                CharClass::from_range(start.c as u32, end.c as u32)
            }
            ClassSetItem::Ascii(a) => {
                let ClassAscii { kind, negated, .. } = a;
                let class = self.from_ascii_kind(kind)?;
                if *negated {
                    class.negate(self.max_code_point)
                } else {
                    class
                }
            }
            ClassSetItem::Unicode(c) => self.from_class_unicode(c)?,
            ClassSetItem::Perl(c) => self.from_class_perl(c)?,
            ClassSetItem::Bracketed(c) => self.from_class_bracketed(c)?,
            ClassSetItem::Union(c) => self.from_set_union(c)?,
        };
        Ok(class)
    }

    fn from_ascii_kind(&self, kind: &ClassAsciiKind) -> Result<CharClass> {
        Ok(match kind {
            ClassAsciiKind::Alnum => CharClass::parse(r"0-9A-Za-z")?,
            ClassAsciiKind::Alpha => CharClass::parse(r"A-Za-z")?,
            ClassAsciiKind::Ascii => CharClass::from_range(0, 0x7F),
            ClassAsciiKind::Blank => CharClass::parse(r"\t ")?,
            ClassAsciiKind::Cntrl => {
                let mut class = CharClass::from_range(0, 0x1F);
                class.add(0x7F);
                class
            }
            ClassAsciiKind::Digit => CharClass::from_range('0' as u32, '9' as u32),
            ClassAsciiKind::Graph => CharClass::from_range(0x21, 0x7E),
            ClassAsciiKind::Lower => CharClass::from_range('a' as u32, 'z' as u32),
            ClassAsciiKind::Print => CharClass::from_range(0x20, 0x7E),
            ClassAsciiKind::Punct => CharClass::parse(r"!-/:-@\x5B-`{-~")?,
            ClassAsciiKind::Space => CharClass::parse(r"\t\n\v\f\r ")?,
            ClassAsciiKind::Upper => CharClass::from_range('A' as u32, 'Z' as u32),
            ClassAsciiKind::Word => CharClass::parse(r"0-9A-Za-z_")?,
            ClassAsciiKind::Xdigit => CharClass::parse(r"0-9A-Fa-f")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::char_class::DEFAULT_MAX_CODE_POINT;
    use crate::internal::regex_parser::parse_regex_syntax;

    fn builder() -> ClassBuilder {
        ClassBuilder::new(DEFAULT_MAX_CODE_POINT)
    }

    #[test]
    fn test_literal() {
        let ast = parse_regex_syntax("a").unwrap();
        let class = builder().class_from_ast(&ast).unwrap();
        assert_eq!(class, CharClass::from_char('a'));
    }

    #[test]
    fn test_bracketed_ranges() {
        let ast = parse_regex_syntax("[0-9a-f]").unwrap();
        let class = builder().class_from_ast(&ast).unwrap();
        assert_eq!(class, CharClass::parse("0-9a-f").unwrap());
    }

    #[test]
    fn test_negated_class() {
        let ast = parse_regex_syntax("[^0-9]").unwrap();
        let class = builder().class_from_ast(&ast).unwrap();
        assert!(!class.contains('5' as u32));
        assert!(class.contains('a' as u32));
        assert!(class.contains(0x10FFFF));
    }

    #[test]
    fn test_perl_digit() {
        let ast = parse_regex_syntax(r"\d").unwrap();
        let class = builder().class_from_ast(&ast).unwrap();
        assert_eq!(class, CharClass::from_range('0' as u32, '9' as u32));
    }

    #[test]
    fn test_dot_excludes_newline() {
        let ast = parse_regex_syntax(".").unwrap();
        let class = builder().class_from_ast(&ast).unwrap();
        assert!(!class.contains('\n' as u32));
        assert!(class.contains('x' as u32));
    }

    #[test]
    fn test_class_intersection() {
        let ast = parse_regex_syntax(r"[a-z&&[^m-p]]").unwrap();
        let class = builder().class_from_ast(&ast).unwrap();
        assert!(class.contains('a' as u32));
        assert!(!class.contains('n' as u32));
        assert!(class.contains('z' as u32));
    }

    #[test]
    fn test_unicode_property_rejected() {
        let ast = parse_regex_syntax(r"\pL").unwrap();
        let result = builder().class_from_ast(&ast);
        assert!(result.is_err());
    }
}
