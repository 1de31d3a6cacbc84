//! Rule description model
//!
//! A grammar is a list of named [`Rule`]s. Each rule has exactly one right-hand
//! side shape, modelled by the closed [`RuleDescription`] enum:
//!
//! ```text
//! number  := digit+                 Repetition
//! answer  := yes | no               Choice
//! digit   := {[0-9]}                Literal
//! pair    := key {\s*=\s*} value    Composition
//! ```
//!
//! These are plain values. Turning them into regular expressions is the job of
//! [`crate::regram::grammar`]; the `Display` impls here render the canonical DSL
//! form and are only meant for diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A regex quantifier derived from a `(min, max)` repetition pair.
///
/// The DSL and the regex engine share the same quantifier spelling, so the
/// `Display` output is used both when rendering rules and when compiling them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// `{n}`
    Exactly(u32),
    /// `{n,}`
    AtLeast(u32),
    /// `{min,max}`
    Between(u32, u32),
}

impl Quantifier {
    /// Pick the shortest quantifier for the given bounds.
    ///
    /// `max == None` means unbounded. Returns `None` for degenerate bounds
    /// (`0..=0`, or `min > max`): such a repetition can never contribute text.
    pub fn from_bounds(min: u32, max: Option<u32>) -> Option<Self> {
        match (min, max) {
            (0, Some(0)) => None,
            (min, Some(max)) if min > max => None,
            (0, Some(1)) => Some(Quantifier::Optional),
            (0, None) => Some(Quantifier::ZeroOrMore),
            (1, None) => Some(Quantifier::OneOrMore),
            (n, None) => Some(Quantifier::AtLeast(n)),
            (min, Some(max)) if min == max => Some(Quantifier::Exactly(min)),
            (min, Some(max)) => Some(Quantifier::Between(min, max)),
        }
    }

    /// The `(min, max)` pair this quantifier accepts.
    pub fn bounds(&self) -> (u32, Option<u32>) {
        match *self {
            Quantifier::Optional => (0, Some(1)),
            Quantifier::ZeroOrMore => (0, None),
            Quantifier::OneOrMore => (1, None),
            Quantifier::Exactly(n) => (n, Some(n)),
            Quantifier::AtLeast(n) => (n, None),
            Quantifier::Between(min, max) => (min, Some(max)),
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantifier::Optional => write!(f, "?"),
            Quantifier::ZeroOrMore => write!(f, "*"),
            Quantifier::OneOrMore => write!(f, "+"),
            Quantifier::Exactly(n) => write!(f, "{{{n}}}"),
            Quantifier::AtLeast(n) => write!(f, "{{{n},}}"),
            Quantifier::Between(min, max) => write!(f, "{{{min},{max}}}"),
        }
    }
}

/// One element of a composition: a rule reference or an inline pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Part {
    /// Reference to another rule by name
    Name(String),
    /// Escape-normalized regex fragment
    Literal(String),
}

impl Part {
    /// The referenced rule name, if this part is a reference.
    pub fn rule_name(&self) -> Option<&str> {
        match self {
            Part::Name(name) => Some(name),
            Part::Literal(_) => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Part::Literal(_))
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Name(name) => write!(f, "{name}"),
            Part::Literal(pattern) => write!(f, "{{{pattern}}}"),
        }
    }
}

/// The right-hand side of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDescription {
    /// `rule` repeated between `min` and `max` times (`max == None` is unbounded)
    Repetition {
        rule: String,
        min: u32,
        max: Option<u32>,
    },
    /// First matching alternative, in declaration order
    Choice { alternatives: Vec<String> },
    /// A raw regex fragment
    Literal { pattern: String },
    /// Parts matched one after another
    Composition { parts: Vec<Part> },
}

impl RuleDescription {
    pub fn repetition(rule: impl Into<String>, min: u32, max: Option<u32>) -> Self {
        RuleDescription::Repetition {
            rule: rule.into(),
            min,
            max,
        }
    }

    pub fn choice<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleDescription::Choice {
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        }
    }

    pub fn literal(pattern: impl Into<String>) -> Self {
        RuleDescription::Literal {
            pattern: pattern.into(),
        }
    }

    pub fn composition(parts: Vec<Part>) -> Self {
        RuleDescription::Composition { parts }
    }

    /// True iff this description directly names `rule_name`.
    ///
    /// Only immediate references count; a rule reached through another rule does
    /// not. Literal text never counts as a reference.
    pub fn contains_reference(&self, rule_name: &str) -> bool {
        match self {
            RuleDescription::Repetition { rule, .. } => rule == rule_name,
            RuleDescription::Choice { alternatives } => {
                alternatives.iter().any(|alt| alt == rule_name)
            }
            RuleDescription::Literal { .. } => false,
            RuleDescription::Composition { parts } => {
                parts.iter().any(|part| part.rule_name() == Some(rule_name))
            }
        }
    }

    /// Every rule name referenced directly, in declaration order.
    pub fn references(&self) -> Vec<&str> {
        match self {
            RuleDescription::Repetition { rule, .. } => vec![rule.as_str()],
            RuleDescription::Choice { alternatives } => {
                alternatives.iter().map(String::as_str).collect()
            }
            RuleDescription::Literal { .. } => Vec::new(),
            RuleDescription::Composition { parts } => {
                parts.iter().filter_map(Part::rule_name).collect()
            }
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, RuleDescription::Literal { .. })
    }

    /// Short name of the shape, used by formatters and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleDescription::Repetition { .. } => "repetition",
            RuleDescription::Choice { .. } => "choice",
            RuleDescription::Literal { .. } => "literal",
            RuleDescription::Composition { .. } => "composition",
        }
    }
}

impl fmt::Display for RuleDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDescription::Repetition { rule, min, max } => {
                match Quantifier::from_bounds(*min, *max) {
                    Some(quantifier) => write!(f, "{rule}{quantifier}"),
                    // Degenerate bounds have no short form; keep them visible.
                    None => match max {
                        Some(max) => write!(f, "{rule}{{{min},{max}}}"),
                        None => write!(f, "{rule}{{{min},}}"),
                    },
                }
            }
            RuleDescription::Choice { alternatives } => write!(f, "{}", alternatives.join(" | ")),
            RuleDescription::Literal { pattern } => write!(f, "{{{pattern}}}"),
            RuleDescription::Composition { parts } => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

/// A named grammar production.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub description: RuleDescription,
}

impl Rule {
    pub fn new(name: impl Into<String>, description: RuleDescription) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := {}", self.name, self.description)
    }
}
