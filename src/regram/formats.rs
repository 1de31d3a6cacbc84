//! Output formats for parse trees
//!
//! - treeviz: indented one-line-per-node view
//! - tag: XML-like nested tags
//! - json, yaml: serde renderings of the full tree

pub mod json;
pub mod registry;
pub mod tag;
pub mod treeviz;
pub mod yaml;

pub use json::{to_json_str, JsonFormatter};
pub use registry::{FormatError, FormatRegistry, Formatter};
pub use tag::{serialize_tree as serialize_tag, TagFormatter};
pub use treeviz::{to_treeviz_str, TreevizFormatter, TreevizOptions};
pub use yaml::{to_yaml_str, YamlFormatter};
