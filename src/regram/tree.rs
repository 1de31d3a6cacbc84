//! Parse Tree Builder
//!
//! Turns an input text into a [`ParseNode`] tree by repeatedly asking the compiled
//! grammar which rule explains a span and then searching that rule's
//! sub-components inside the span.
//!
//! ## Algorithm
//!
//! 1. The root node covers the whole input. If some structural rule matches the
//!    entire input, it becomes the root's single child and the search descends
//!    into it; otherwise every non-overlapping match of the start rule becomes a
//!    child of the root.
//! 2. Descending into a node explained by rule `E`:
//!    - composition: each named part is searched inside the span its group captured
//!    - choice: the taken alternative is searched inside its captured span
//!    - repetition: the repeated rule is searched across the whole span
//! 3. Searching rule `R` inside a span adds one child per non-empty match of
//!    `R`. Each child is then offered to
//!    [`CompiledGrammar::match_direct`] with `R` excluded: if another rule
//!    explains the child's text it is attached below the child and descended
//!    into; if `R` itself does, the search descends into the child directly.
//!
//! A rule never explains the same span twice on one root-to-leaf path: when the
//! explaining rule already sits on that span further up, the child stays a leaf.
//! Spans only shrink or stay equal on the way down, so descent always ends for
//! acyclic grammars.
//!
//! Descent uses an explicit worklist instead of recursion, so deep grammars cannot
//! exhaust the call stack. A configurable depth limit turns runaway descent into a
//! [`TreeError`].
//!
//! Children are always ordered by their start offset, and the same grammar and
//! input always produce the same tree.

use crate::regram::grammar::CompiledGrammar;
use crate::regram::rules::{Rule, RuleDescription};
use log::trace;
use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// Descent depth used when none is configured
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Pattern of the synthetic root rule: any text, newlines included
pub const ROOT_PATTERN: &str = "(?:.|[\n\t])*";

/// A node of the parse tree.
///
/// `span` is a byte range into the input, and `text` is the input sliced by it.
/// The root node carries an unnamed literal rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseNode {
    pub rule: Rule,
    pub span: Range<usize>,
    pub text: String,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn rule_name(&self) -> &str {
        &self.rule.name
    }

    pub fn is_root(&self) -> bool {
        self.rule.name.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order traversal, starting with this node.
    pub fn iter(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }

    /// All nodes produced by the named rule, in pre-order.
    pub fn find_all<'a>(&'a self, rule_name: &'a str) -> impl Iterator<Item = &'a ParseNode> {
        self.iter().filter(move |node| node.rule.name == rule_name)
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Length of the longest root-to-leaf path, counting nodes.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            height = height.max(level);
            stack.extend(node.children.iter().map(|child| (child, level + 1)));
        }
        height
    }
}

/// Iterator returned by [`ParseNode::iter`]
pub struct Nodes<'a> {
    stack: Vec<&'a ParseNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a ParseNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Descent went deeper than the configured limit
    DepthExceeded {
        limit: usize,
        rule: String,
        span: Range<usize>,
    },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::DepthExceeded { limit, rule, span } => write!(
                f,
                "Parse tree exceeds maximum depth {limit} while searching rule '{rule}' in {}..{}",
                span.start, span.end
            ),
        }
    }
}

impl std::error::Error for TreeError {}

/// Builds parse trees for one compiled grammar.
pub struct TreeBuilder<'g> {
    grammar: &'g CompiledGrammar,
    root_rule: Rule,
    max_depth: usize,
}

impl<'g> TreeBuilder<'g> {
    pub fn new(grammar: &'g CompiledGrammar) -> Self {
        Self {
            grammar,
            root_rule: root_rule(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn build(&self, input: &str) -> Result<ParseNode, TreeError> {
        let mut arena = Arena::default();
        let whole = 0..input.len();

        let mut pending = if input.is_empty() {
            Vec::new()
        } else {
            self.explain(&mut arena, None, &self.root_rule, whole.clone(), input, 0)
        };
        if arena.root_children.is_empty() {
            pending.push(Search {
                parent: None,
                span: whole,
                rule: self.grammar.start_rule(),
                depth: 1,
            });
        }

        let mut stack: Vec<Search<'_>> = pending.into_iter().rev().collect();
        while let Some(search) = stack.pop() {
            if search.depth > self.max_depth {
                return Err(TreeError::DepthExceeded {
                    limit: self.max_depth,
                    rule: search.rule.name.clone(),
                    span: search.span,
                });
            }
            let next = self.search(&mut arena, search, input);
            stack.extend(next.into_iter().rev());
        }

        Ok(arena.into_tree(&self.root_rule, input))
    }

    /// Add one child per non-empty match of the searched rule, explaining each.
    fn search<'a>(
        &'a self,
        arena: &mut Arena<'a>,
        search: Search<'a>,
        input: &str,
    ) -> Vec<Search<'a>> {
        let Some(matcher) = self.grammar.matcher(&search.rule.name) else {
            return Vec::new();
        };
        trace!(
            "searching '{}' in {}..{} (depth {})",
            search.rule.name,
            search.span.start,
            search.span.end,
            search.depth
        );

        let offset = search.span.start;
        let mut next = Vec::new();
        for found in matcher.find_iter(&input[search.span.clone()]) {
            if found.as_str().is_empty() {
                continue;
            }
            let span = offset + found.start()..offset + found.end();
            let child = arena.push(search.parent, search.rule, span.clone());
            next.extend(self.explain(arena, Some(child), search.rule, span, input, search.depth));
        }
        next
    }

    /// Ask the grammar which rule explains `span`, attach it under `node` and
    /// return the searches for its sub-components.
    ///
    /// `node_rule` is the rule that produced `node`. If it is also the explaining
    /// rule, the sub-components hang directly off `node`. If the explaining rule
    /// already sits on the same span between `node` and the root, `node` stays a
    /// leaf. `depth` is the depth of the search that produced `node`.
    fn explain<'a>(
        &'a self,
        arena: &mut Arena<'a>,
        node: Option<usize>,
        node_rule: &'a Rule,
        span: Range<usize>,
        input: &str,
        depth: usize,
    ) -> Vec<Search<'a>> {
        let grammar: &'a CompiledGrammar = self.grammar;
        let Some(found) = grammar.match_direct(&input[span.clone()], &node_rule.name) else {
            return Vec::new();
        };
        if found.groups.is_empty() {
            return Vec::new();
        }

        let explained = if found.rule.name == node_rule.name {
            node
        } else if arena.on_path(node, &found.rule.name, &span) {
            trace!(
                "'{}' already covers {}..{} above this node, stopping",
                found.rule.name,
                span.start,
                span.end
            );
            return Vec::new();
        } else {
            Some(arena.push(node, found.rule, span.clone()))
        };

        let offset = span.start;
        let absolute = |range: &Range<usize>| offset + range.start..offset + range.end;
        let search = |name: &str, span: Range<usize>| {
            grammar.get(name).map(|rule| Search {
                parent: explained,
                span,
                rule,
                depth: depth + 1,
            })
        };

        match &found.rule.description {
            RuleDescription::Composition { parts } => parts
                .iter()
                .zip(&found.groups)
                .filter_map(|(part, group)| {
                    let name = part.rule_name()?;
                    search(name, absolute(group.as_ref()?))
                })
                .collect(),
            RuleDescription::Choice { alternatives } => alternatives
                .iter()
                .zip(&found.groups)
                .filter_map(|(name, group)| search(name.as_str(), absolute(group.as_ref()?)))
                .collect(),
            RuleDescription::Repetition { rule, .. } => {
                search(rule.as_str(), span).into_iter().collect()
            }
            // Literal rules are never offered as explanations
            RuleDescription::Literal { .. } => Vec::new(),
        }
    }
}

/// Build a parse tree with the default depth limit.
pub fn build_tree(grammar: &CompiledGrammar, input: &str) -> Result<ParseNode, TreeError> {
    TreeBuilder::new(grammar).build(input)
}

/// The unnamed rule carried by every root node.
pub fn root_rule() -> Rule {
    Rule::new("", RuleDescription::literal(ROOT_PATTERN))
}

/// A pending search of `rule` inside `span`, adding children to `parent`.
#[derive(Debug)]
struct Search<'a> {
    /// `None` is the root
    parent: Option<usize>,
    span: Range<usize>,
    rule: &'a Rule,
    depth: usize,
}

#[derive(Debug)]
struct PendingNode<'a> {
    parent: Option<usize>,
    rule: &'a Rule,
    span: Range<usize>,
    children: Vec<usize>,
}

/// Flat node storage used while the tree is under construction.
///
/// A node is always pushed after its parent, so assembling in reverse index
/// order sees every child before its parent.
#[derive(Debug, Default)]
struct Arena<'a> {
    nodes: Vec<PendingNode<'a>>,
    root_children: Vec<usize>,
}

impl<'a> Arena<'a> {
    fn push(&mut self, parent: Option<usize>, rule: &'a Rule, span: Range<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(PendingNode {
            parent,
            rule,
            span,
            children: Vec::new(),
        });
        match parent {
            Some(parent) => self.nodes[parent].children.push(id),
            None => self.root_children.push(id),
        }
        id
    }

    /// Whether `rule_name` already produced a node over `span` on the path from
    /// `node` up to the root.
    fn on_path(&self, mut node: Option<usize>, rule_name: &str, span: &Range<usize>) -> bool {
        while let Some(id) = node {
            let pending = &self.nodes[id];
            if pending.rule.name == rule_name && pending.span == *span {
                return true;
            }
            node = pending.parent;
        }
        false
    }

    fn into_tree(self, root_rule: &Rule, input: &str) -> ParseNode {
        let mut built: Vec<Option<ParseNode>> = Vec::with_capacity(self.nodes.len());
        built.resize_with(self.nodes.len(), || None);

        for (id, pending) in self.nodes.into_iter().enumerate().rev() {
            let children = take_children(&mut built, &pending.children);
            built[id] = Some(ParseNode {
                rule: pending.rule.clone(),
                text: input[pending.span.clone()].to_string(),
                span: pending.span,
                children,
            });
        }

        ParseNode {
            rule: root_rule.clone(),
            span: 0..input.len(),
            text: input.to_string(),
            children: take_children(&mut built, &self.root_children),
        }
    }
}

fn take_children(built: &mut [Option<ParseNode>], ids: &[usize]) -> Vec<ParseNode> {
    ids.iter().filter_map(|&id| built[id].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regram::dsl::parse_grammar;

    fn compile(source: &str) -> CompiledGrammar {
        parse_grammar(source).unwrap().compile().unwrap()
    }

    /// Compact `rule(text)[children]` rendering for assertions
    fn shape(node: &ParseNode) -> String {
        let name = if node.is_root() { "<root>" } else { node.rule_name() };
        let mut out = format!("{name}({})", node.text);
        if !node.children.is_empty() {
            let children: Vec<_> = node.children.iter().map(shape).collect();
            out.push_str(&format!("[{}]", children.join(" ")));
        }
        out
    }

    #[test]
    fn test_repetition_descends_into_items() {
        let grammar = compile("digit := {[0-9]}\nnumber := digit+\n");
        let tree = build_tree(&grammar, "42").unwrap();
        assert_eq!(shape(&tree), "<root>(42)[number(42)[digit(4) digit(2)]]");
        assert_eq!(tree.children[0].children[1].span, 1..2);
    }

    #[test]
    fn test_choice_descends_into_taken_alternative() {
        let grammar = compile("yes := {yes}\nno := {no}\nanswer := yes | no\n");
        let tree = build_tree(&grammar, "no").unwrap();
        assert_eq!(shape(&tree), "<root>(no)[answer(no)[no(no)]]");
    }

    #[test]
    fn test_composition_descends_into_named_parts() {
        let grammar = compile(
            "pair := key {=} value\n\
             key := {[a-z]+}\n\
             value := number | flag\n\
             number := digit+\n\
             digit := {[0-9]}\n\
             flag := {on|off}\n",
        );
        let tree = build_tree(&grammar, "width=80").unwrap();
        assert_eq!(
            shape(&tree),
            "<root>(width=80)[pair(width=80)[key(width) value(80)[number(80)[digit(8) digit(0)]]]]"
        );
    }

    #[test]
    fn test_falls_back_to_start_rule_matches() {
        let grammar = compile("word := {[a-z]+}\n");
        let tree = build_tree(&grammar, "hi there").unwrap();
        assert_eq!(shape(&tree), "<root>(hi there)[word(hi) word(there)]");
        assert_eq!(tree.children[1].span, 3..8);
    }

    #[test]
    fn test_unmatched_input_is_a_bare_root() {
        let grammar = compile("word := {[a-z]+}\n");
        let tree = build_tree(&grammar, "123").unwrap();
        assert!(tree.is_root());
        assert!(tree.is_leaf());
        assert_eq!(tree.span, 0..3);
    }

    #[test]
    fn test_empty_input() {
        let grammar = compile("maybe := digit?\ndigit := {[0-9]}\n");
        let tree = build_tree(&grammar, "").unwrap();
        assert_eq!(tree.text, "");
        assert!(tree.is_leaf());
    }

    #[test]
    fn test_root_covers_multiline_input() {
        let grammar = compile("word := {[a-z]+}\n");
        let tree = build_tree(&grammar, "one\ntwo").unwrap();
        assert_eq!(tree.text, "one\ntwo");
        assert_eq!(tree.rule.description, RuleDescription::literal(ROOT_PATTERN));
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn test_depth_limit() {
        let grammar = compile("digit := {[0-9]}\nnumber := digit+\n");
        let error = TreeBuilder::new(&grammar)
            .with_max_depth(0)
            .build("42")
            .unwrap_err();
        assert_eq!(
            error,
            TreeError::DepthExceeded {
                limit: 0,
                rule: "digit".into(),
                span: 0..2,
            }
        );
        assert!(TreeBuilder::new(&grammar).with_max_depth(1).build("42").is_ok());
    }

    #[test]
    fn test_sibling_compositions_stop_on_repeated_span() {
        let grammar = compile(
            "s1 := {[a-z]+}\n\
             s2 := {[a-z]+}\n\
             gap := {[ ]*}\n\
             e1 := s1 gap\n\
             e2 := s2 gap\n",
        );
        let tree = build_tree(&grammar, "ab").unwrap();
        assert_eq!(shape(&tree), "<root>(ab)[e1(ab)[s1(ab)[e2(ab)[s2(ab)]]]]");
        assert_eq!(tree.height(), 5);
    }

    #[test]
    fn test_children_cover_parent_in_order() {
        let grammar = compile(
            "line := word+\n\
             word := letters gap\n\
             letters := {[a-z]+}\n\
             gap := {[ ]*}\n",
        );
        let tree = build_tree(&grammar, "ab cd ef").unwrap();
        for node in tree.iter() {
            let mut last_end = node.span.start;
            for child in &node.children {
                assert!(child.span.start >= last_end, "{}", shape(&tree));
                assert!(child.span.end <= node.span.end);
                assert_eq!(child.text, &"ab cd ef"[child.span.clone()]);
                last_end = child.span.end;
            }
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let grammar = compile("word := {[a-z]+}\nwords := word+\n");
        let first = build_tree(&grammar, "abc").unwrap();
        let second = build_tree(&grammar, "abc").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_traversal_helpers() {
        let grammar = compile("digit := {[0-9]}\nnumber := digit+\n");
        let tree = build_tree(&grammar, "123").unwrap();
        let names: Vec<_> = tree.iter().map(ParseNode::rule_name).collect();
        assert_eq!(names, vec!["", "number", "digit", "digit", "digit"]);
        assert_eq!(tree.find_all("digit").count(), 3);
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.height(), 3);
    }
}
