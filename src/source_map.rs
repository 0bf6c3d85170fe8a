//! Source Map JSON
//!
//! serde model of the version 3 source map object, covering the fields
//! the scopes codec reads and writes. An index map carries `sections`
//! instead of `mappings`; nested maps recurse. Fields the codec does not
//! know about round-trip through `extra`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::position::Position;

/// A version 3 source map, flat or indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceMapJson {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    pub mappings: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SourceMapSection>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Default for SourceMapJson {
    fn default() -> Self {
        SourceMapJson {
            version: 3,
            file: None,
            source_root: None,
            sources: Vec::new(),
            sources_content: None,
            names: None,
            mappings: String::new(),
            scopes: None,
            sections: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl SourceMapJson {
    /// A minimal flat map with `source_count` unnamed sources.
    pub fn with_source_count(source_count: usize) -> Self {
        SourceMapJson {
            sources: vec![None; source_count],
            ..SourceMapJson::default()
        }
    }

    /// Whether this map is an index map composed of offset sections.
    pub fn is_index_map(&self) -> bool {
        self.sections.is_some()
    }
}

/// One section of an index map: a nested map placed at a generated offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapSection {
    pub offset: Position,
    pub map: SourceMapJson,
}
