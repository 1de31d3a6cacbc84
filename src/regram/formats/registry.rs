//! Format registry for parse tree serialization
//!
//! Each output format implements the `Formatter` trait and is registered by name
//! with `FormatRegistry`.

use crate::regram::tree::ParseNode;
use std::collections::HashMap;
use std::fmt;

/// Error that can occur during formatting
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// Format not found in registry
    FormatNotFound(String),
    /// Error during serialization
    SerializationError(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::FormatNotFound(name) => write!(f, "Format '{name}' not found"),
            FormatError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Trait for parse tree formatters
pub trait Formatter: Send + Sync {
    /// The name of this format (e.g., "treeviz", "json")
    fn name(&self) -> &str;

    /// Serialize a parse tree to this format
    fn serialize(&self, tree: &ParseNode) -> Result<String, FormatError>;

    /// Optional description of this format
    fn description(&self) -> &str {
        ""
    }
}

/// Registry of parse tree formatters, looked up by name
pub struct FormatRegistry {
    formatters: HashMap<String, Box<dyn Formatter>>,
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        FormatRegistry {
            formatters: HashMap::new(),
        }
    }

    /// Register a formatter, replacing any formatter with the same name.
    pub fn register<F: Formatter + 'static>(&mut self, formatter: F) {
        self.formatters
            .insert(formatter.name().to_string(), Box::new(formatter));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Formatter> {
        self.formatters.get(name).map(|f| f.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.formatters.contains_key(name)
    }

    /// Serialize a parse tree using the named format
    pub fn serialize(&self, tree: &ParseNode, format: &str) -> Result<String, FormatError> {
        let formatter = self
            .get(format)
            .ok_or_else(|| FormatError::FormatNotFound(format.to_string()))?;
        formatter.serialize(tree)
    }

    /// List all available format names (sorted)
    pub fn list_formats(&self) -> Vec<String> {
        let mut names: Vec<_> = self.formatters.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, description)` pairs, sorted by name
    pub fn describe_formats(&self) -> Vec<(String, String)> {
        self.list_formats()
            .into_iter()
            .map(|name| {
                let description = self
                    .get(&name)
                    .map(|f| f.description().to_string())
                    .unwrap_or_default();
                (name, description)
            })
            .collect()
    }

    /// Create a registry with the built-in formatters
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(super::TreevizFormatter::default());
        registry.register(super::TagFormatter);
        registry.register(super::JsonFormatter);
        registry.register(super::YamlFormatter);

        registry
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regram::tree::root_rule;

    struct TestFormatter;
    impl Formatter for TestFormatter {
        fn name(&self) -> &str {
            "test"
        }
        fn serialize(&self, _tree: &ParseNode) -> Result<String, FormatError> {
            Ok("test output".to_string())
        }
        fn description(&self) -> &str {
            "Test formatter"
        }
    }

    fn bare_root() -> ParseNode {
        ParseNode {
            rule: root_rule(),
            span: 0..5,
            text: "hello".into(),
            children: vec![],
        }
    }

    #[test]
    fn test_registry_register() {
        let mut registry = FormatRegistry::new();
        assert!(registry.list_formats().is_empty());
        registry.register(TestFormatter);

        assert!(registry.has("test"));
        assert!(!registry.has("nonexistent"));
        assert_eq!(registry.list_formats(), vec!["test"]);
        assert_eq!(registry.get("test").unwrap().name(), "test");
    }

    #[test]
    fn test_registry_serialize() {
        let mut registry = FormatRegistry::new();
        registry.register(TestFormatter);
        assert_eq!(registry.serialize(&bare_root(), "test").unwrap(), "test output");
    }

    #[test]
    fn test_registry_serialize_not_found() {
        let registry = FormatRegistry::new();
        match registry.serialize(&bare_root(), "nonexistent").unwrap_err() {
            FormatError::FormatNotFound(name) => assert_eq!(name, "nonexistent"),
            other => panic!("Expected FormatNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_registry_with_defaults() {
        let registry = FormatRegistry::default();
        assert_eq!(registry.list_formats(), vec!["json", "tag", "treeviz", "yaml"]);
        assert!(registry
            .describe_formats()
            .iter()
            .all(|(_, description)| !description.is_empty()));
    }

    #[test]
    fn test_format_error_display() {
        let err1 = FormatError::FormatNotFound("test".to_string());
        assert_eq!(format!("{err1}"), "Format 'test' not found");

        let err2 = FormatError::SerializationError("error".to_string());
        assert_eq!(format!("{err2}"), "Serialization error: error");
    }

    #[test]
    fn test_registry_replace_formatter() {
        let mut registry = FormatRegistry::new();
        registry.register(TestFormatter);
        registry.register(TestFormatter);

        assert_eq!(registry.list_formats().len(), 1);
    }
}
