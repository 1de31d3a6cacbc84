//! Main module for regram library functionality

pub mod config;
pub mod dsl;
pub mod formats;
pub mod grammar;
pub mod processor;
pub mod rules;
pub mod tree;

pub use self::config::{load_defaults, Loader, RegramConfig};
pub use dsl::{parse_file, parse_grammar, parse_reader, DslError, SyntaxError};
pub use formats::{FormatError, FormatRegistry, Formatter};
pub use grammar::{CompiledGrammar, DirectMatch, Grammar, GrammarError};
pub use processor::{process, process_files, rule_regex, ProcessOptions, ProcessingError};
pub use rules::{Part, Quantifier, Rule, RuleDescription};
pub use tree::{build_tree, ParseNode, TreeBuilder, TreeError};
