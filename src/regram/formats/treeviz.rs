//! Treeviz formatter for parse trees
//!
//! One line per node, nesting drawn with box connectors and two columns per
//! level. Each line carries an icon for the rule shape, the rule name, the byte
//! span (optional) and the matched text, escaped and truncated:
//!
//! ```text
//! ⧉ <root> 0..8 "width=80"
//! └─ ≔ pair 0..8 "width=80"
//!   ├─ ◦ key 0..5 "width"
//!   └─ • value 6..8 "80"
//!     └─ ☰ number 6..8 "80"
//! ```
//!
//! Icons
//!     Root: ⧉
//!     Composition: ≔
//!     Repetition: ☰
//!     Choice: •
//!     Literal: ◦

use super::registry::{FormatError, Formatter};
use crate::regram::rules::RuleDescription;
use crate::regram::tree::ParseNode;

pub const DEFAULT_TRUNCATE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreevizOptions {
    /// Maximum number of characters of escaped text per line
    pub truncate: usize,
    pub show_spans: bool,
}

impl Default for TreevizOptions {
    fn default() -> Self {
        Self {
            truncate: DEFAULT_TRUNCATE,
            show_spans: true,
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let mut truncated = s.chars().take(max_chars).collect::<String>();
        truncated.push_str("...");
        truncated
    } else {
        s.to_string()
    }
}

fn icon(node: &ParseNode) -> &'static str {
    if node.is_root() {
        return "⧉";
    }
    match node.rule.description {
        RuleDescription::Composition { .. } => "≔",
        RuleDescription::Repetition { .. } => "☰",
        RuleDescription::Choice { .. } => "•",
        RuleDescription::Literal { .. } => "◦",
    }
}

fn label(node: &ParseNode, options: &TreevizOptions) -> String {
    let name = if node.is_root() {
        "<root>"
    } else {
        node.rule_name()
    };
    let text = truncate(&node.text.escape_debug().to_string(), options.truncate);
    if options.show_spans {
        format!(
            "{} {} {}..{} \"{}\"",
            icon(node),
            name,
            node.span.start,
            node.span.end,
            text
        )
    } else {
        format!("{} {} \"{}\"", icon(node), name, text)
    }
}

pub fn to_treeviz_str(tree: &ParseNode, options: &TreevizOptions) -> String {
    let mut result = String::new();
    result.push_str(&label(tree, options));
    result.push('\n');
    append_children(&mut result, &tree.children, "", options);
    result
}

fn append_node(
    result: &mut String,
    node: &ParseNode,
    prefix: &str,
    is_last: bool,
    options: &TreevizOptions,
) {
    let connector = if is_last { "└─" } else { "├─" };
    result.push_str(&format!("{}{} {}\n", prefix, connector, label(node, options)));

    let new_prefix = format!("{}{}", prefix, if is_last { "  " } else { "│ " });
    append_children(result, &node.children, &new_prefix, options);
}

fn append_children(
    result: &mut String,
    children: &[ParseNode],
    prefix: &str,
    options: &TreevizOptions,
) {
    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        append_node(result, child, prefix, is_last, options);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreevizFormatter {
    options: TreevizOptions,
}

impl TreevizFormatter {
    pub fn new(options: TreevizOptions) -> Self {
        Self { options }
    }
}

impl Formatter for TreevizFormatter {
    fn name(&self) -> &str {
        "treeviz"
    }

    fn serialize(&self, tree: &ParseNode) -> Result<String, FormatError> {
        Ok(to_treeviz_str(tree, &self.options))
    }

    fn description(&self) -> &str {
        "Indented tree, one line per node"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regram::dsl::parse_grammar;
    use crate::regram::tree::build_tree;

    fn tree_for(grammar: &str, input: &str) -> ParseNode {
        let compiled = parse_grammar(grammar).unwrap().compile().unwrap();
        build_tree(&compiled, input).unwrap()
    }

    #[test]
    fn test_repetition_tree() {
        let tree = tree_for("digit := {[0-9]}\nnumber := digit+\n", "42");
        let output = to_treeviz_str(&tree, &TreevizOptions::default());
        insta::assert_snapshot!(output.trim_end(), @r#"
        ⧉ <root> 0..2 "42"
        └─ ☰ number 0..2 "42"
          ├─ ◦ digit 0..1 "4"
          └─ ◦ digit 1..2 "2"
        "#);
    }

    #[test]
    fn test_nested_composition() {
        let tree = tree_for(
            "pair := key {=} value\n\
             key := {[a-z]+}\n\
             value := number | flag\n\
             number := digit+\n\
             digit := {[0-9]}\n\
             flag := {on|off}\n",
            "width=80",
        );
        let output = to_treeviz_str(&tree, &TreevizOptions::default());
        insta::assert_snapshot!(output.trim_end(), @r#"
        ⧉ <root> 0..8 "width=80"
        └─ ≔ pair 0..8 "width=80"
          ├─ ◦ key 0..5 "width"
          └─ • value 6..8 "80"
            └─ ☰ number 6..8 "80"
              ├─ ◦ digit 6..7 "8"
              └─ ◦ digit 7..8 "0"
        "#);
    }

    #[test]
    fn test_sibling_prefix_continues() {
        let tree = tree_for("word := {[a-z]+}\nwords := word+\n", "ab");
        let tree = ParseNode {
            children: vec![tree.children[0].clone(), tree.children[0].clone()],
            ..tree
        };
        let output = to_treeviz_str(&tree, &TreevizOptions::default());
        insta::assert_snapshot!(output.trim_end(), @r#"
        ⧉ <root> 0..2 "ab"
        ├─ ☰ words 0..2 "ab"
        │ └─ ◦ word 0..2 "ab"
        └─ ☰ words 0..2 "ab"
          └─ ◦ word 0..2 "ab"
        "#);
    }

    #[test]
    fn test_options_hide_spans_and_truncate() {
        let tree = tree_for("word := {[a-z]+}\n", "abcdefgh\nxy");
        let options = TreevizOptions {
            truncate: 4,
            show_spans: false,
        };
        let output = to_treeviz_str(&tree, &options);
        insta::assert_snapshot!(output.trim_end(), @r#"
        ⧉ <root> "abcd..."
        ├─ ◦ word "abcd..."
        └─ ◦ word "xy"
        "#);
    }

    #[test]
    fn test_control_characters_are_escaped() {
        let tree = tree_for("word := {[a-z]+}\n", "a\tb");
        let output = to_treeviz_str(&tree, &TreevizOptions::default());
        assert!(output.starts_with("⧉ <root> 0..3 \"a\\tb\"\n"));
    }

    #[test]
    fn test_formatter_uses_options() {
        let tree = tree_for("word := {[a-z]+}\n", "abc");
        let formatter = TreevizFormatter::new(TreevizOptions {
            truncate: 1,
            show_spans: true,
        });
        assert_eq!(formatter.name(), "treeviz");
        let output = formatter.serialize(&tree).unwrap();
        assert_eq!(output.lines().next(), Some("⧉ <root> 0..3 \"a...\""));
    }
}
