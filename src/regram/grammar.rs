//! Grammar Engine - compiles rules into flat regular expressions
//!
//! A [`Grammar`] is an ordered list of [`Rule`]s. The first rule is the start rule,
//! and lookups by name return the first rule with that name.
//!
//! ## Compilation
//!
//! [`Grammar::compile`] inlines every rule into a self-contained regex and freezes
//! the result into a [`CompiledGrammar`]. Referenced rules are inlined through
//! non-capturing groups, so the output never contains capturing groups of its own:
//!
//! ```text
//! digit   := {[0-9]}          [0-9]
//! number  := digit+           (?:[0-9])+
//! answer  := yes | no         (?:yes)|(?:no)
//! key     := {[a-z]+}         [a-z]+
//! pair    := key {=} number   (?:[a-z]+)(?:=)(?:(?:[0-9])+)
//! ```
//!
//! Literal parts of a composition get the same non-capturing group as name
//! parts, so a top-level `|` inside one (`{b|c}`) stays local to that part.
//!
//! Each rule is inlined once and memoized, no matter how many rules reference it.
//! Reference cycles and unknown references are compile errors.
//!
//! ## Direct-group patterns
//!
//! Besides the inlined form, every rule gets a "direct-group" pattern where each
//! immediate sub-component sits in its own named capturing group. These are only
//! used by [`CompiledGrammar::match_direct`] to recover structure from a span that
//! has already been matched:
//!
//! ```text
//! number  := digit+          (?P<__part0>[0-9])+
//! answer  := yes | no        (?P<__part0>yes)|(?P<__part1>no)
//! ```
//!
//! Groups are named rather than numbered so that capturing groups written inside
//! literal patterns cannot shift them.

use crate::regram::rules::{Part, Quantifier, Rule, RuleDescription};
use log::{debug, trace, warn};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

/// Name prefix for the per-part capturing groups of direct-group patterns
const PART_GROUP_PREFIX: &str = "__part";

/// Errors raised while compiling a grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// The grammar has no rules, so there is no start rule
    EmptyGrammar,
    /// Two rules share a name; only the first could ever be reached
    DuplicateRule { name: String },
    /// A rule references a name that no rule defines
    UnknownRuleReference { rule: String, reference: String },
    /// Rules reference each other in a loop (`path` starts and ends with the same name)
    CyclicReference { path: Vec<String> },
    /// The regex engine rejected a compiled pattern
    PatternCompilation {
        rule: String,
        pattern: String,
        message: String,
    },
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::EmptyGrammar => write!(f, "Grammar contains no rules"),
            GrammarError::DuplicateRule { name } => {
                write!(f, "Rule '{name}' is defined more than once")
            }
            GrammarError::UnknownRuleReference { rule, reference } => {
                write!(f, "Rule '{rule}' references unknown rule '{reference}'")
            }
            GrammarError::CyclicReference { path } => {
                write!(f, "Cyclic rule reference: {}", path.join(" -> "))
            }
            GrammarError::PatternCompilation {
                rule,
                pattern,
                message,
            } => write!(
                f,
                "Rule '{rule}' compiles to an invalid pattern '{pattern}': {message}"
            ),
        }
    }
}

impl std::error::Error for GrammarError {}

/// An ordered, mutable collection of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grammar {
    rules: Vec<Rule>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Names are not checked for uniqueness here; see [`Grammar::compile`].
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Remove every rule.
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule with the given name.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// The implicit start rule: the first one added.
    pub fn start_rule(&self) -> Option<&Rule> {
        self.rules.first()
    }

    /// Compile every rule into its inlined and direct-group patterns.
    ///
    /// The returned [`CompiledGrammar`] is an immutable snapshot: later calls to
    /// [`Grammar::add_rule`] or [`Grammar::clear`] do not affect it.
    pub fn compile(&self) -> Result<CompiledGrammar, GrammarError> {
        if self.rules.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(GrammarError::DuplicateRule {
                    name: rule.name.clone(),
                });
            }
        }

        let mut inliner = Inliner::new(self);
        let mut compiled = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let source = inliner.inline(rule)?;
            let (direct_source, part_count) = inliner.direct(rule)?;
            let matcher = build_regex(rule, &source)?;
            let direct = build_regex(rule, &format!(r"\A(?:{direct_source})\z"))?;
            compiled.push(CompiledRule {
                source,
                matcher,
                direct_source,
                direct,
                part_count,
            });
        }

        debug!(
            "compiled grammar with {} rules (start rule '{}')",
            self.rules.len(),
            self.rules[0].name
        );

        let index: HashMap<String, usize> = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| (rule.name.clone(), i))
            .collect();
        let ancestors = ancestor_sets(&self.rules);

        Ok(CompiledGrammar {
            rules: self.rules.clone(),
            index,
            compiled,
            ancestors,
        })
    }
}

impl FromIterator<Rule> for Grammar {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

/// For every rule, the indices of all rules that reach it through references.
///
/// Direct referrers come from [`RuleDescription::contains_reference`]; the sets
/// are their transitive closure. Names are unique by the time this runs.
fn ancestor_sets(rules: &[Rule]) -> Vec<HashSet<usize>> {
    let referrers: Vec<Vec<usize>> = rules
        .iter()
        .map(|target| {
            rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.description.contains_reference(&target.name))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    (0..rules.len())
        .map(|target| {
            let mut seen = HashSet::new();
            let mut pending = referrers[target].clone();
            while let Some(i) = pending.pop() {
                if seen.insert(i) {
                    pending.extend(&referrers[i]);
                }
            }
            seen
        })
        .collect()
}

fn build_regex(rule: &Rule, pattern: &str) -> Result<Regex, GrammarError> {
    Regex::new(pattern).map_err(|e| GrammarError::PatternCompilation {
        rule: rule.name.clone(),
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn part_group(index: usize, body: &str) -> String {
    format!("(?P<{PART_GROUP_PREFIX}{index}>{body})")
}

/// Memoizing rule inliner with cycle detection.
struct Inliner<'g> {
    grammar: &'g Grammar,
    memo: HashMap<&'g str, String>,
    in_progress: Vec<&'g str>,
}

impl<'g> Inliner<'g> {
    fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            memo: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Inline the rule named `name`, as referenced from `from`.
    fn reference(&mut self, from: &Rule, name: &str) -> Result<String, GrammarError> {
        let grammar = self.grammar;
        let rule = grammar
            .get(name)
            .ok_or_else(|| GrammarError::UnknownRuleReference {
                rule: from.name.clone(),
                reference: name.to_string(),
            })?;
        self.inline(rule)
    }

    fn inline(&mut self, rule: &'g Rule) -> Result<String, GrammarError> {
        if let Some(source) = self.memo.get(rule.name.as_str()) {
            return Ok(source.clone());
        }
        if let Some(start) = self.in_progress.iter().position(|n| *n == rule.name) {
            let mut path: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|n| n.to_string())
                .collect();
            path.push(rule.name.clone());
            return Err(GrammarError::CyclicReference { path });
        }

        self.in_progress.push(&rule.name);
        let source = match &rule.description {
            RuleDescription::Literal { pattern } => pattern.clone(),
            RuleDescription::Repetition { rule: inner, min, max } => {
                let body = self.reference(rule, inner)?;
                match Quantifier::from_bounds(*min, *max) {
                    Some(quantifier) => format!("(?:{body}){quantifier}"),
                    None => {
                        warn!(
                            "rule '{}' has degenerate repetition bounds {{{},{}}} and never matches text",
                            rule.name,
                            min,
                            max.map_or_else(String::new, |m| m.to_string())
                        );
                        String::new()
                    }
                }
            }
            RuleDescription::Choice { alternatives } => {
                let mut branches = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    branches.push(format!("(?:{})", self.reference(rule, alternative)?));
                }
                branches.join("|")
            }
            RuleDescription::Composition { parts } => {
                let mut source = String::new();
                for part in parts {
                    let body = match part {
                        Part::Name(name) => self.reference(rule, name)?,
                        Part::Literal(pattern) => pattern.clone(),
                    };
                    source.push_str(&format!("(?:{body})"));
                }
                source
            }
        };
        self.in_progress.pop();

        debug!("rule '{}' => {}", rule.name, source);
        self.memo.insert(&rule.name, source.clone());
        Ok(source)
    }

    /// Build the direct-group pattern of `rule`, returning it with its group count.
    fn direct(&mut self, rule: &'g Rule) -> Result<(String, usize), GrammarError> {
        let direct = match &rule.description {
            RuleDescription::Literal { pattern } => (part_group(0, pattern), 1),
            RuleDescription::Repetition { rule: inner, min, max } => {
                let body = self.reference(rule, inner)?;
                match Quantifier::from_bounds(*min, *max) {
                    Some(quantifier) => (format!("{}{quantifier}", part_group(0, &body)), 1),
                    None => (String::new(), 0),
                }
            }
            RuleDescription::Choice { alternatives } => {
                let mut branches = Vec::with_capacity(alternatives.len());
                for (i, alternative) in alternatives.iter().enumerate() {
                    branches.push(part_group(i, &self.reference(rule, alternative)?));
                }
                (branches.join("|"), alternatives.len())
            }
            RuleDescription::Composition { parts } => {
                let mut source = String::new();
                for (i, part) in parts.iter().enumerate() {
                    let body = match part {
                        Part::Name(name) => self.reference(rule, name)?,
                        Part::Literal(pattern) => pattern.clone(),
                    };
                    source.push_str(&part_group(i, &body));
                }
                (source, parts.len())
            }
        };
        Ok(direct)
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    source: String,
    matcher: Regex,
    direct_source: String,
    direct: Regex,
    part_count: usize,
}

/// Result of [`CompiledGrammar::match_direct`]: the rule explaining a span and
/// the span of each of its immediate sub-components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMatch<'g> {
    pub rule: &'g Rule,
    /// One entry per part/alternative, relative to the matched text.
    /// `None` when that sub-component did not participate.
    pub groups: Vec<Option<Range<usize>>>,
}

impl DirectMatch<'_> {
    /// Text of sub-component `index` within `text` (the text that was matched).
    pub fn group<'t>(&self, text: &'t str, index: usize) -> Option<&'t str> {
        self.groups.get(index)?.clone().map(|range| &text[range])
    }
}

/// An immutable, compiled grammar.
///
/// Holds the rule list plus, per rule, its inlined pattern, a find-mode regex and
/// an anchored direct-group regex. Safe to share across threads.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    compiled: Vec<CompiledRule>,
    /// Per rule, every rule that references it directly or indirectly
    ancestors: Vec<HashSet<usize>>,
}

impl CompiledGrammar {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The first rule of the grammar.
    pub fn start_rule(&self) -> &Rule {
        // compile() refuses empty grammars
        &self.rules[0]
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    fn compiled(&self, name: &str) -> Option<&CompiledRule> {
        self.index.get(name).map(|&i| &self.compiled[i])
    }

    /// The inlined pattern of a rule, or `None` if no rule has that name.
    ///
    /// A known rule may legitimately compile to `Some("")` (degenerate repetition).
    pub fn regex_of(&self, name: &str) -> Option<&str> {
        self.compiled(name).map(|c| c.source.as_str())
    }

    /// The direct-group pattern of a rule (unanchored source).
    pub fn direct_regex_of(&self, name: &str) -> Option<&str> {
        self.compiled(name).map(|c| c.direct_source.as_str())
    }

    /// Compiled find-mode regex of a rule.
    pub fn matcher(&self, name: &str) -> Option<&Regex> {
        self.compiled(name).map(|c| &c.matcher)
    }

    /// Rules that reach `name` through references, directly or via other rules,
    /// in declaration order.
    pub fn referrers_of(&self, name: &str) -> Vec<&Rule> {
        let Some(&target) = self.index.get(name) else {
            return Vec::new();
        };
        self.rules
            .iter()
            .enumerate()
            .filter(|(i, _)| self.ancestors[target].contains(i))
            .map(|(_, rule)| rule)
            .collect()
    }

    /// Find the rule whose internal shape explains the whole of `text`.
    ///
    /// Rules are tried in declaration order and the first one that qualifies wins.
    /// Skipped: every rule that references `exclude`, directly or through other
    /// rules (it would wrap the span back into itself), and literal rules, which
    /// have no internal structure. The rule named `exclude` itself stays a
    /// candidate. A rule qualifies when its direct-group pattern matches all of
    /// `text` with its groups populated: every group for compositions and
    /// repetitions, the taken alternative for choices.
    ///
    /// `None` means `text` is a terminal span.
    pub fn match_direct(&self, text: &str, exclude: &str) -> Option<DirectMatch<'_>> {
        let excluded = self.index.get(exclude).map(|&i| &self.ancestors[i]);

        for (i, (rule, compiled)) in self.rules.iter().zip(&self.compiled).enumerate() {
            if excluded.is_some_and(|ancestors| ancestors.contains(&i)) {
                continue;
            }
            if rule.description.is_literal() {
                continue;
            }

            let Some(captures) = compiled.direct.captures(text) else {
                continue;
            };
            let groups: Vec<Option<Range<usize>>> = (0..compiled.part_count)
                .map(|i| {
                    captures
                        .name(&format!("{PART_GROUP_PREFIX}{i}"))
                        .map(|m| m.range())
                })
                .collect();

            if !groups_populated(&rule.description, &groups) {
                trace!(
                    "rule '{}' matches {:?} but leaves groups empty",
                    rule.name,
                    text
                );
                continue;
            }

            trace!("{:?} explained by rule '{}'", text, rule.name);
            return Some(DirectMatch { rule, groups });
        }
        None
    }
}

fn groups_populated(description: &RuleDescription, groups: &[Option<Range<usize>>]) -> bool {
    match description {
        // Alternation leaves the untaken branches empty by construction
        RuleDescription::Choice { .. } => groups.iter().any(Option::is_some),
        RuleDescription::Repetition { .. }
        | RuleDescription::Composition { .. }
        | RuleDescription::Literal { .. } => {
            !groups.is_empty() && groups.iter().all(Option::is_some)
        }
    }
}
