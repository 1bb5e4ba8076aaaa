//! This module contains the character class implementation.
//! A character class is a canonical sorted sequence of disjoint code point
//! ranges. All algebraic operations reestablish the normalization invariant:
//! ranges are sorted, non-overlapping and non-adjacent.

use crate::config::CaseFolding;
use crate::{GenError, GenErrorKind, Result};

/// The upper bound of the default code point universe.
pub(crate) const DEFAULT_MAX_CODE_POINT: u32 = 0x10FFFF;

/// An inclusive range of code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct CharRange {
    pub(crate) lo: u32,
    pub(crate) hi: u32,
}

impl CharRange {
    pub(crate) fn new(lo: u32, hi: u32) -> Self {
        debug_assert!(lo <= hi);
        CharRange { lo, hi }
    }
}

/// A set of code points stored as sorted disjoint ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct CharClass {
    ranges: Vec<CharRange>,
}

impl CharClass {
    /// The empty character class.
    pub(crate) fn empty() -> Self {
        CharClass { ranges: Vec::new() }
    }

    pub(crate) fn from_char(c: char) -> Self {
        Self::from_range(c as u32, c as u32)
    }

    pub(crate) fn from_range(lo: u32, hi: u32) -> Self {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        CharClass {
            ranges: vec![CharRange::new(lo, hi)],
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The ranges of the character class.
    pub(crate) fn ranges(&self) -> &[CharRange] {
        &self.ranges
    }

    /// The number of code points in the character class.
    pub(crate) fn size(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| (r.hi - r.lo) as u64 + 1)
            .sum()
    }

    /// Add a single code point.
    pub(crate) fn add(&mut self, c: u32) {
        self.add_range(c, c);
    }

    /// Add an inclusive range of code points.
    pub(crate) fn add_range(&mut self, lo: u32, hi: u32) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self.ranges.push(CharRange::new(lo, hi));
        self.normalize();
    }

    /// Reestablish the normalization invariant: sorted, non-overlapping,
    /// non-adjacent ranges.
    fn normalize(&mut self) {
        if self.ranges.len() < 2 {
            return;
        }
        self.ranges.sort_unstable_by_key(|r| r.lo);
        let mut normalized: Vec<CharRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match normalized.last_mut() {
                // Merge overlapping and adjacent ranges.
                Some(last) if range.lo <= last.hi.saturating_add(1) => {
                    last.hi = last.hi.max(range.hi);
                }
                _ => normalized.push(range),
            }
        }
        self.ranges = normalized;
    }

    /// The union of two character classes.
    pub(crate) fn union(&self, other: &CharClass) -> CharClass {
        let mut result = CharClass {
            ranges: Vec::with_capacity(self.ranges.len() + other.ranges.len()),
        };
        result.ranges.extend_from_slice(&self.ranges);
        result.ranges.extend_from_slice(&other.ranges);
        result.normalize();
        result
    }

    /// The intersection of two character classes.
    pub(crate) fn intersection(&self, other: &CharClass) -> CharClass {
        let mut result = CharClass::empty();
        let mut i = 0;
        let mut j = 0;
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let lo = a.lo.max(b.lo);
            let hi = a.hi.min(b.hi);
            if lo <= hi {
                result.ranges.push(CharRange::new(lo, hi));
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        // Overlaps are collected in order and pairwise disjoint already, but
        // adjacent results can occur when `other` splits a range of `self`.
        result.normalize();
        result
    }

    /// The difference of two character classes, i.e. all code points in
    /// `self` that are not in `other`.
    pub(crate) fn difference(&self, other: &CharClass) -> CharClass {
        let mut result = CharClass::empty();
        let mut j = 0;
        for a in &self.ranges {
            let mut lo = a.lo;
            while j < other.ranges.len() && other.ranges[j].hi < lo {
                j += 1;
            }
            let mut k = j;
            while k < other.ranges.len() && other.ranges[k].lo <= a.hi {
                let b = other.ranges[k];
                if b.lo > lo {
                    result.ranges.push(CharRange::new(lo, b.lo - 1));
                }
                lo = b.hi.saturating_add(1);
                if lo > a.hi {
                    break;
                }
                k += 1;
            }
            if lo <= a.hi {
                result.ranges.push(CharRange::new(lo, a.hi));
            }
        }
        // The subtraction emits sorted disjoint ranges, no renormalization
        // needed.
        debug_assert!(result
            .ranges
            .windows(2)
            .all(|w| w[0].hi.saturating_add(1) < w[1].lo));
        result
    }

    /// The complement of the character class within `[0, max_code_point]`.
    pub(crate) fn negate(&self, max_code_point: u32) -> CharClass {
        CharClass::from_range(0, max_code_point).difference(self)
    }

    /// Check if the character class contains the given code point.
    pub(crate) fn contains(&self, c: u32) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if c < r.lo {
                    std::cmp::Ordering::Greater
                } else if c > r.hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Check if the character class overlaps the given inclusive range.
    pub(crate) fn intersects_range(&self, lo: u32, hi: u32) -> bool {
        self.ranges.iter().any(|r| r.lo <= hi && lo <= r.hi)
    }

    /// Check if two character classes share at least one code point.
    pub(crate) fn intersects(&self, other: &CharClass) -> bool {
        let mut i = 0;
        let mut j = 0;
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            if a.lo.max(b.lo) <= a.hi.min(b.hi) {
                return true;
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// Expand the character class by the case-equivalent counterparts of its
    /// members. The folding is performed at compile time so that the DFA
    /// stays minimal.
    pub(crate) fn case_fold(&self, mode: CaseFolding) -> CharClass {
        match mode {
            CaseFolding::None => self.clone(),
            CaseFolding::Ascii => {
                let mut result = self.clone();
                for range in self.ranges.clone() {
                    for c in range.lo..=range.hi {
                        if c.is_ascii_lowercase_cp() {
                            result.add(c - 0x20);
                        } else if c.is_ascii_uppercase_cp() {
                            result.add(c + 0x20);
                        }
                    }
                }
                result
            }
            CaseFolding::Unicode => {
                let mut result = self.clone();
                for range in self.ranges.clone() {
                    for cp in range.lo..=range.hi {
                        let Some(c) = char::from_u32(cp) else {
                            continue;
                        };
                        let mut upper = c.to_uppercase();
                        if upper.len() == 1 {
                            result.add(upper.next().unwrap() as u32);
                        }
                        let mut lower = c.to_lowercase();
                        if lower.len() == 1 {
                            result.add(lower.next().unwrap() as u32);
                        }
                    }
                }
                result
            }
        }
    }

    /// Parse the quoted chardef format, e.g. `0-9A-Za-z_`.
    /// Supported escapes: `\n \r \t \a \b \f \v \\ \' \" \-`, `\xHH`,
    /// `\uHHHH`, `\UHHHHHHHH` and octal `\ooo`.
    pub(crate) fn parse(text: &str) -> Result<CharClass> {
        let mut result = CharClass::empty();
        let mut chars = text.chars().peekable();
        let mut pending: Option<u32> = None;
        while let Some(c) = chars.next() {
            let cp = if c == '\\' {
                parse_escape(&mut chars, text)?
            } else if c == '-' && pending.is_some() {
                // Range operator: the next member closes the range.
                let lo = pending.take().unwrap();
                let next = chars.next().ok_or_else(|| malformed(text))?;
                let hi = if next == '\\' {
                    parse_escape(&mut chars, text)?
                } else {
                    next as u32
                };
                result.add_range(lo, hi);
                continue;
            } else {
                c as u32
            };
            if let Some(prev) = pending.replace(cp) {
                result.add(prev);
            }
        }
        if let Some(prev) = pending {
            result.add(prev);
        }
        Ok(result)
    }
}

trait AsciiCase {
    fn is_ascii_lowercase_cp(&self) -> bool;
    fn is_ascii_uppercase_cp(&self) -> bool;
}

impl AsciiCase for u32 {
    fn is_ascii_lowercase_cp(&self) -> bool {
        (0x61..=0x7A).contains(self)
    }
    fn is_ascii_uppercase_cp(&self) -> bool {
        (0x41..=0x5A).contains(self)
    }
}

fn malformed(text: &str) -> GenError {
    GenError::new(GenErrorKind::Syntax {
        position: None,
        message: format!("malformed character class '{}'", text),
    })
}

fn parse_escape(chars: &mut std::iter::Peekable<std::str::Chars>, text: &str) -> Result<u32> {
    let c = chars.next().ok_or_else(|| malformed(text))?;
    let cp = match c {
        'n' => '\n' as u32,
        'r' => '\r' as u32,
        't' => '\t' as u32,
        'a' => 0x07,
        'b' => 0x08,
        'f' => 0x0C,
        'v' => 0x0B,
        'x' => parse_hex(chars, 2, text)?,
        'u' => parse_hex(chars, 4, text)?,
        'U' => parse_hex(chars, 8, text)?,
        '0'..='7' => {
            let mut value = c as u32 - '0' as u32;
            for _ in 0..2 {
                match chars.peek() {
                    Some(d @ '0'..='7') => {
                        value = value * 8 + (*d as u32 - '0' as u32);
                        chars.next();
                    }
                    _ => break,
                }
            }
            value
        }
        other => other as u32,
    };
    Ok(cp)
}

fn parse_hex(
    chars: &mut std::iter::Peekable<std::str::Chars>,
    digits: usize,
    text: &str,
) -> Result<u32> {
    let mut value = 0u32;
    for _ in 0..digits {
        let d = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| malformed(text))?;
        value = value * 16 + d;
    }
    Ok(value)
}

fn format_code_point(f: &mut std::fmt::Formatter<'_>, cp: u32) -> std::fmt::Result {
    match cp {
        0x07 => write!(f, r"\a"),
        0x08 => write!(f, r"\b"),
        0x09 => write!(f, r"\t"),
        0x0A => write!(f, r"\n"),
        0x0B => write!(f, r"\v"),
        0x0C => write!(f, r"\f"),
        0x0D => write!(f, r"\r"),
        c if c == '\\' as u32 || c == '-' as u32 || c == '\'' as u32 || c == '"' as u32 => {
            write!(f, "\\{}", char::from_u32(c).unwrap())
        }
        c if (0x20..0x7F).contains(&c) => write!(f, "{}", char::from_u32(c).unwrap()),
        c if c <= 0xFF => write!(f, r"\x{:02X}", c),
        c if c <= 0xFFFF => write!(f, r"\u{:04X}", c),
        c => write!(f, r"\U{:08X}", c),
    }
}

impl std::fmt::Display for CharClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for range in &self.ranges {
            format_code_point(f, range.lo)?;
            if range.hi > range.lo {
                write!(f, "-")?;
                format_code_point(f, range.hi)?;
            }
        }
        Ok(())
    }
}
