//! XML-like tag serialization
//!
//! - Rule name → tag name, the root is `<document>`
//! - Byte span → `span` attribute
//! - Matched text → text content (leaves inline, parents before their children)
//!
//! ```text
//! <document span="0..2">
//!   <number span="0..2">42
//!     <digit span="0..1">4</digit>
//!     <digit span="1..2">2</digit>
//!   </number>
//! </document>
//! ```

use super::registry::{FormatError, Formatter};
use crate::regram::tree::ParseNode;

struct TagSerializer {
    output: String,
    indent_level: usize,
}

impl TagSerializer {
    fn indent(&self) -> String {
        "  ".repeat(self.indent_level)
    }

    fn push_indent(&mut self, s: &str) {
        self.output.push_str(&self.indent());
        self.output.push_str(s);
    }

    fn visit(&mut self, node: &ParseNode) {
        let tag = if node.is_root() {
            "document"
        } else {
            node.rule_name()
        };
        let open = format!("<{tag} span=\"{}..{}\">", node.span.start, node.span.end);

        if node.is_root() {
            self.push_indent(&open);
            self.output.push('\n');
            self.visit_children(node);
            self.push_indent(&format!("</{tag}>\n"));
        } else if node.is_leaf() {
            self.push_indent(&format!("{open}{}</{tag}>\n", escape_xml(&node.text)));
        } else {
            self.push_indent(&format!("{open}{}\n", escape_xml(&node.text)));
            self.visit_children(node);
            self.push_indent(&format!("</{tag}>\n"));
        }
    }

    fn visit_children(&mut self, node: &ParseNode) {
        self.indent_level += 1;
        for child in &node.children {
            self.visit(child);
        }
        self.indent_level -= 1;
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn serialize_tree(tree: &ParseNode) -> String {
    let mut serializer = TagSerializer {
        output: String::new(),
        indent_level: 0,
    };
    serializer.visit(tree);
    serializer.output
}

pub struct TagFormatter;

impl Formatter for TagFormatter {
    fn name(&self) -> &str {
        "tag"
    }

    fn serialize(&self, tree: &ParseNode) -> Result<String, FormatError> {
        Ok(serialize_tree(tree))
    }

    fn description(&self) -> &str {
        "XML-like nested tags with spans"
    }
}
