//! File processing API
//!
//! Glues the pipeline together: grammar source → [`Grammar`](crate::regram::Grammar)
//! → [`CompiledGrammar`] → parse tree → formatted output.
//!
//! ```rust,ignore
//! use regram::regram::processor::{process, ProcessOptions};
//!
//! let grammar = "digit := {[0-9]}\nnumber := digit+\n";
//! let output = process(grammar, "42", &ProcessOptions::default())?;
//! ```

use crate::regram::config::RegramConfig;
use crate::regram::dsl::{parse_grammar, DslError};
use crate::regram::formats::{FormatError, FormatRegistry, TreevizFormatter, TreevizOptions};
use crate::regram::grammar::{CompiledGrammar, GrammarError};
use crate::regram::tree::{ParseNode, TreeBuilder, TreeError, DEFAULT_MAX_DEPTH};
use config::ConfigError;
use log::info;
use std::fmt;
use std::fs;
use std::path::Path;

/// Errors that can occur during processing
#[derive(Debug)]
pub enum ProcessingError {
    FileNotFound(String),
    IoError(String),
    /// No rule with this name in the grammar
    UnknownRule(String),
    Config(ConfigError),
    Dsl(DslError),
    Grammar(GrammarError),
    Tree(TreeError),
    Format(FormatError),
}

impl std::error::Error for ProcessingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessingError::Dsl(e) => Some(e),
            ProcessingError::Grammar(e) => Some(e),
            ProcessingError::Tree(e) => Some(e),
            ProcessingError::Format(e) => Some(e),
            ProcessingError::Config(e) => Some(e),
            ProcessingError::FileNotFound(_)
            | ProcessingError::IoError(_)
            | ProcessingError::UnknownRule(_) => None,
        }
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingError::FileNotFound(path) => write!(f, "File not found: {}", path),
            ProcessingError::IoError(msg) => write!(f, "IO error: {}", msg),
            ProcessingError::UnknownRule(name) => write!(f, "Unknown rule: {}", name),
            ProcessingError::Config(e) => write!(f, "Configuration error: {e}"),
            ProcessingError::Dsl(e) => write!(f, "{e}"),
            ProcessingError::Grammar(e) => write!(f, "{e}"),
            ProcessingError::Tree(e) => write!(f, "{e}"),
            ProcessingError::Format(e) => write!(f, "{e}"),
        }
    }
}

impl From<ConfigError> for ProcessingError {
    fn from(e: ConfigError) -> Self {
        ProcessingError::Config(e)
    }
}

impl From<DslError> for ProcessingError {
    fn from(e: DslError) -> Self {
        ProcessingError::Dsl(e)
    }
}

impl From<GrammarError> for ProcessingError {
    fn from(e: GrammarError) -> Self {
        ProcessingError::Grammar(e)
    }
}

impl From<TreeError> for ProcessingError {
    fn from(e: TreeError) -> Self {
        ProcessingError::Tree(e)
    }
}

impl From<FormatError> for ProcessingError {
    fn from(e: FormatError) -> Self {
        ProcessingError::Format(e)
    }
}

/// How a tree is built and rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Name of a registered output format
    pub format: String,
    pub max_depth: usize,
    pub treeviz: TreevizOptions,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            format: "treeviz".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            treeviz: TreevizOptions::default(),
        }
    }
}

impl From<&RegramConfig> for ProcessOptions {
    fn from(config: &RegramConfig) -> Self {
        Self {
            format: config.output.format.clone(),
            max_depth: config.parse.max_depth,
            treeviz: TreevizOptions {
                truncate: config.output.truncate,
                show_spans: config.output.show_spans,
            },
        }
    }
}

impl ProcessOptions {
    /// Default formats, with treeviz configured from these options.
    pub fn registry(&self) -> FormatRegistry {
        let mut registry = FormatRegistry::with_defaults();
        registry.register(TreevizFormatter::new(self.treeviz));
        registry
    }
}

/// Parse and compile grammar source text.
pub fn compile_grammar(grammar_source: &str) -> Result<CompiledGrammar, ProcessingError> {
    Ok(parse_grammar(grammar_source)?.compile()?)
}

/// Compiled pattern of one rule: the find-mode pattern, or the direct-group
/// pattern when `direct` is set.
pub fn rule_regex(
    grammar: &CompiledGrammar,
    rule: &str,
    direct: bool,
) -> Result<String, ProcessingError> {
    let pattern = if direct {
        grammar.direct_regex_of(rule)
    } else {
        grammar.regex_of(rule)
    };
    pattern
        .map(str::to_string)
        .ok_or_else(|| ProcessingError::UnknownRule(rule.to_string()))
}

/// Build the parse tree of `input` without rendering it.
pub fn parse_tree(
    grammar: &CompiledGrammar,
    input: &str,
    options: &ProcessOptions,
) -> Result<ParseNode, ProcessingError> {
    let tree = TreeBuilder::new(grammar)
        .with_max_depth(options.max_depth)
        .build(input)?;
    info!(
        "built parse tree with {} nodes for {} bytes of input",
        tree.node_count(),
        input.len()
    );
    Ok(tree)
}

/// Compile `grammar_source`, parse `input` and render the tree.
pub fn process(
    grammar_source: &str,
    input: &str,
    options: &ProcessOptions,
) -> Result<String, ProcessingError> {
    let registry = options.registry();
    if !registry.has(&options.format) {
        return Err(FormatError::FormatNotFound(options.format.clone()).into());
    }

    let grammar = compile_grammar(grammar_source)?;
    let tree = parse_tree(&grammar, input, options)?;
    Ok(registry.serialize(&tree, &options.format)?)
}

/// Read a text file, mapping a missing file to [`ProcessingError::FileNotFound`].
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String, ProcessingError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ProcessingError::FileNotFound(path.display().to_string()));
    }
    fs::read_to_string(path).map_err(|e| ProcessingError::IoError(e.to_string()))
}

/// [`process`] over the contents of two files.
pub fn process_files<P: AsRef<Path>, Q: AsRef<Path>>(
    grammar_path: P,
    input_path: Q,
    options: &ProcessOptions,
) -> Result<String, ProcessingError> {
    let grammar_source = read_source(grammar_path)?;
    let input = read_source(input_path)?;
    process(&grammar_source, &input, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regram::config::Loader;

    const NUMBER_GRAMMAR: &str = "digit := {[0-9]}\nnumber := digit+\n";

    #[test]
    fn test_process_treeviz() {
        let output = process(NUMBER_GRAMMAR, "42", &ProcessOptions::default()).unwrap();
        assert_eq!(output.lines().count(), 4);
        assert!(output.contains("☰ number 0..2 \"42\""));
    }

    #[test]
    fn test_process_unknown_format() {
        let options = ProcessOptions {
            format: "bogus".into(),
            ..ProcessOptions::default()
        };
        match process(NUMBER_GRAMMAR, "42", &options).unwrap_err() {
            ProcessingError::Format(FormatError::FormatNotFound(name)) => assert_eq!(name, "bogus"),
            other => panic!("Expected FormatNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_process_reports_syntax_errors() {
        let error = process("foo->bar\n", "x", &ProcessOptions::default()).unwrap_err();
        assert!(matches!(error, ProcessingError::Dsl(DslError::Syntax(_))));
        assert!(error.to_string().contains("line 1"));
    }

    #[test]
    fn test_process_reports_grammar_errors() {
        let error = process("list := item*\n", "x", &ProcessOptions::default()).unwrap_err();
        assert!(matches!(
            error,
            ProcessingError::Grammar(GrammarError::UnknownRuleReference { .. })
        ));
    }

    #[test]
    fn test_process_respects_max_depth() {
        let options = ProcessOptions {
            max_depth: 0,
            ..ProcessOptions::default()
        };
        let error = process(NUMBER_GRAMMAR, "42", &options).unwrap_err();
        assert!(matches!(error, ProcessingError::Tree(TreeError::DepthExceeded { .. })));
    }

    #[test]
    fn test_rule_regex() {
        let grammar = compile_grammar(NUMBER_GRAMMAR).unwrap();
        assert_eq!(rule_regex(&grammar, "number", false).unwrap(), "(?:[0-9])+");
        assert_eq!(
            rule_regex(&grammar, "number", true).unwrap(),
            "(?P<__part0>[0-9])+"
        );
        match rule_regex(&grammar, "missing", false).unwrap_err() {
            ProcessingError::UnknownRule(name) => assert_eq!(name, "missing"),
            other => panic!("Expected UnknownRule, got {other:?}"),
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = Loader::new()
            .set_override("output.show_spans", false)
            .unwrap()
            .set_override("output.format", "tag")
            .unwrap()
            .build()
            .unwrap();
        let options = ProcessOptions::from(&config);
        assert_eq!(options.format, "tag");
        assert!(!options.treeviz.show_spans);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_process_files_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let grammar_path = dir.path().join("number.grammar");
        fs::write(&grammar_path, NUMBER_GRAMMAR).unwrap();

        let missing = dir.path().join("missing.txt");
        match process_files(&grammar_path, &missing, &ProcessOptions::default()).unwrap_err() {
            ProcessingError::FileNotFound(path) => assert!(path.ends_with("missing.txt")),
            other => panic!("Expected FileNotFound, got {other:?}"),
        }

        let input_path = dir.path().join("input.txt");
        fs::write(&input_path, "7").unwrap();
        let output = process_files(&grammar_path, &input_path, &ProcessOptions::default()).unwrap();
        assert!(output.contains("◦ digit 0..1 \"7\""));
    }
}
