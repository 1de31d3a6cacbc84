//! YAML serialization of parse trees via serde

use super::registry::{FormatError, Formatter};
use crate::regram::tree::ParseNode;

pub fn to_yaml_str(tree: &ParseNode) -> Result<String, FormatError> {
    serde_yaml::to_string(tree).map_err(|e| FormatError::SerializationError(e.to_string()))
}

pub struct YamlFormatter;

impl Formatter for YamlFormatter {
    fn name(&self) -> &str {
        "yaml"
    }

    fn serialize(&self, tree: &ParseNode) -> Result<String, FormatError> {
        to_yaml_str(tree)
    }

    fn description(&self) -> &str {
        "YAML document of the full tree"
    }
}
