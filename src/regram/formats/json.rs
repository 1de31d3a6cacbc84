//! JSON serialization of parse trees via serde

use super::registry::{FormatError, Formatter};
use crate::regram::tree::ParseNode;

pub fn to_json_str(tree: &ParseNode) -> Result<String, FormatError> {
    serde_json::to_string_pretty(tree).map_err(|e| FormatError::SerializationError(e.to_string()))
}

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn name(&self) -> &str {
        "json"
    }

    fn serialize(&self, tree: &ParseNode) -> Result<String, FormatError> {
        to_json_str(tree)
    }

    fn description(&self) -> &str {
        "Pretty-printed JSON of the full tree"
    }
}
