//! Grammar DSL parser
//!
//! Grammars are written one rule per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! pair    := key {\s*=\s*} value
//! key     := {[A-Za-z_]+}
//! value   := number | word
//! number  := digit+
//! digit   := {[0-9]}
//! word    := {[a-z]+}
//! ```
//!
//! The right-hand side is classified by trying, in this order, until one shape
//! consumes the whole description:
//!
//! 1. Repetition: `name?`, `name*`, `name+`, `name{n}`, `name{n,}`, `name{n,m}`
//! 2. Choice: `a | b | ...` (two or more names)
//! 3. Literal: exactly one `{...}` block (see [`literal`] for escaping)
//! 4. Composition: two or more space/tab separated names or `{...}` blocks
//!
//! The first rule in the file is the start rule. Parsing stops at the first
//! malformed line and reports its 1-based line number.

mod literal;

use crate::regram::grammar::Grammar;
use crate::regram::rules::{Part, Rule, RuleDescription};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

static DEFINITION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9_]*)[ \t]*:=[ \t]*(.*)$").unwrap());

static NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

static REPETITION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_]*)(?:([?*+])|\{([0-9]+)(?:(,)([0-9]*))?\})$").unwrap()
});

static CHOICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(?:[ \t]*\|[ \t]*[A-Za-z][A-Za-z0-9_]*)+$").unwrap()
});

/// A DSL line that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based line number
    pub line_number: usize,
    /// The offending line, untrimmed
    pub line: String,
    pub reason: DescriptionError,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax error on line {}: {} in '{}'",
            self.line_number,
            self.reason,
            self.line.trim()
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Why a line or description was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionError {
    /// The line is not of the form `name := description`
    NotADefinition,
    /// The description matches none of the four rule shapes
    UnrecognizedShape(String),
    /// A repetition bound does not fit in 32 bits
    BoundOutOfRange(String),
}

impl fmt::Display for DescriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionError::NotADefinition => write!(f, "expected 'name := description'"),
            DescriptionError::UnrecognizedShape(desc) => {
                write!(f, "'{desc}' is not a repetition, choice, literal or composition")
            }
            DescriptionError::BoundOutOfRange(bound) => {
                write!(f, "repetition bound '{bound}' is out of range")
            }
        }
    }
}

impl std::error::Error for DescriptionError {}

/// Errors raised while reading a grammar
#[derive(Debug)]
pub enum DslError {
    Syntax(SyntaxError),
    /// Reading the source failed
    Io(io::Error),
}

impl fmt::Display for DslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DslError::Syntax(err) => write!(f, "{err}"),
            DslError::Io(err) => write!(f, "Failed to read grammar: {err}"),
        }
    }
}

impl std::error::Error for DslError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DslError::Syntax(err) => Some(err),
            DslError::Io(err) => Some(err),
        }
    }
}

impl From<SyntaxError> for DslError {
    fn from(err: SyntaxError) -> Self {
        DslError::Syntax(err)
    }
}

impl From<io::Error> for DslError {
    fn from(err: io::Error) -> Self {
        DslError::Io(err)
    }
}

/// Parse grammar source text.
pub fn parse_grammar(source: &str) -> Result<Grammar, DslError> {
    parse_reader(source.as_bytes())
}

/// Parse a grammar file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Grammar, DslError> {
    let file = File::open(path.as_ref())?;
    parse_reader(BufReader::new(file))
}

/// Parse a grammar from any line-oriented reader.
pub fn parse_reader(reader: impl BufRead) -> Result<Grammar, DslError> {
    let mut grammar = Grammar::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(rule) = parse_line(&line, index + 1)? {
            debug!("line {}: {}", index + 1, rule);
            grammar.add_rule(rule);
        }
    }
    Ok(grammar)
}

/// Parse one line. Blank and comment lines yield `Ok(None)`.
fn parse_line(line: &str, line_number: usize) -> Result<Option<Rule>, SyntaxError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let error = |reason| SyntaxError {
        line_number,
        line: line.to_string(),
        reason,
    };

    let captures = DEFINITION_REGEX
        .captures(trimmed)
        .ok_or_else(|| error(DescriptionError::NotADefinition))?;
    let name = &captures[1];
    let description = parse_description(&captures[2]).map_err(error)?;
    Ok(Some(Rule::new(name, description)))
}

/// Classify the right-hand side of a rule.
pub fn parse_description(text: &str) -> Result<RuleDescription, DescriptionError> {
    let text = text.trim();

    if let Some(repetition) = parse_repetition(text)? {
        return Ok(repetition);
    }
    if CHOICE_REGEX.is_match(text) {
        return Ok(RuleDescription::choice(split_tokens(text, &['|'])));
    }
    if let Some((raw, end)) = literal::scan_block(text) {
        if end == text.len() {
            return Ok(RuleDescription::literal(literal::normalize_literal(raw)));
        }
    }
    if let Some(parts) = parse_composition(text) {
        return Ok(RuleDescription::composition(parts));
    }

    Err(DescriptionError::UnrecognizedShape(text.to_string()))
}

fn parse_repetition(text: &str) -> Result<Option<RuleDescription>, DescriptionError> {
    let Some(captures) = REPETITION_REGEX.captures(text) else {
        return Ok(None);
    };
    let rule = &captures[1];

    let (min, max) = match captures.get(2).map(|m| m.as_str()) {
        Some("?") => (0, Some(1)),
        Some("*") => (0, None),
        Some(_) => (1, None),
        None => {
            let min = parse_bound(&captures[3])?;
            match (captures.get(4), captures.get(5).map(|m| m.as_str())) {
                (None, _) => (min, Some(min)),
                (Some(_), None) | (Some(_), Some("")) => (min, None),
                (Some(_), Some(max)) => (min, Some(parse_bound(max)?)),
            }
        }
    };
    Ok(Some(RuleDescription::repetition(rule, min, max)))
}

fn parse_bound(digits: &str) -> Result<u32, DescriptionError> {
    digits
        .parse()
        .map_err(|_| DescriptionError::BoundOutOfRange(digits.to_string()))
}

/// Split a composition into names and `{...}` blocks. Needs at least two parts.
fn parse_composition(text: &str) -> Option<Vec<Part>> {
    let mut parts = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start_matches([' ', '\t']);
        if rest.is_empty() {
            break;
        }

        if rest.starts_with('{') {
            let (raw, end) = literal::scan_block(rest)?;
            parts.push(Part::Literal(literal::normalize_literal(raw)));
            rest = &rest[end..];
        } else {
            let end = rest.find([' ', '\t', '{']).unwrap_or(rest.len());
            let name = &rest[..end];
            if !NAME_REGEX.is_match(name) {
                return None;
            }
            parts.push(Part::Name(name.to_string()));
            rest = &rest[end..];
        }
    }

    (parts.len() >= 2).then_some(parts)
}

/// Split `text` on any of `delimiters` into trimmed, non-empty tokens.
fn split_tokens<'a>(text: &'a str, delimiters: &[char]) -> Vec<&'a str> {
    text.split(delimiters)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}
