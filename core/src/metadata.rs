//! Source metadata documents and the template metadata derived from them.
//!
//! Both source documents (`queryMetadata.json`, `.platform`) are read
//! forgivingly: every field is optional and has a stated default, and a
//! document that is not JSON at all is replaced by the empty object. The
//! resulting [`MetadataParseError`] is returned alongside the defaulted value
//! so callers can report it without failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error_codes;

pub const TEMPLATE_VERSION: &str = "1.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{part} is not valid JSON: {reason}")]
pub struct MetadataParseError {
    pub part: String,
    pub reason: String,
}

impl MetadataParseError {
    pub fn code(&self) -> &'static str {
        error_codes::METADATA_PARSE
    }
}

/// Parse a JSON part, tolerating a UTF-8 BOM. `None` (part absent) is the
/// empty object.
pub(crate) fn parse_json_part(
    part: &str,
    bytes: Option<&[u8]>,
) -> (Value, Option<MetadataParseError>) {
    let Some(bytes) = bytes else {
        return (Value::Object(Default::default()), None);
    };
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => (value, None),
        Err(e) => (
            Value::Object(Default::default()),
            Some(MetadataParseError {
                part: part.to_string(),
                reason: e.to_string(),
            }),
        ),
    }
}

fn string_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// One `queriesMetadata` entry. `key` is the object key the entry was
/// stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMetadataEntry {
    pub key: String,
    pub query_id: Option<String>,
    pub query_name: Option<String>,
}

impl QueryMetadataEntry {
    fn from_value(key: &str, value: &Value) -> Self {
        Self {
            key: key.to_string(),
            query_id: string_at(value, "/queryId").map(str::to_string),
            query_name: string_at(value, "/queryName").map(str::to_string),
        }
    }

    /// `queryId`, or the empty string.
    pub fn resolved_id(&self) -> &str {
        self.query_id.as_deref().unwrap_or("")
    }

    /// `queryName`, or the key the entry is stored under.
    pub fn resolved_name(&self) -> &str {
        self.query_name.as_deref().unwrap_or(&self.key)
    }
}

/// Decoded `queryMetadata.json`. Entries keep the document's key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMetadataDoc {
    pub queries: Vec<QueryMetadataEntry>,
}

impl QueryMetadataDoc {
    pub fn from_value(value: &Value) -> Self {
        let queries = value
            .get("queriesMetadata")
            .and_then(Value::as_object)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, entry)| QueryMetadataEntry::from_value(key, entry))
                    .collect()
            })
            .unwrap_or_default();
        Self { queries }
    }

    pub fn parse(bytes: Option<&[u8]>) -> (Self, Option<MetadataParseError>) {
        let (value, err) = parse_json_part(crate::export::QUERY_METADATA_PART, bytes);
        (Self::from_value(&value), err)
    }
}

/// Decoded `.platform`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformMetadata {
    pub display_name: Option<String>,
    pub item_type: Option<String>,
    pub logical_id: Option<String>,
    pub workspace_id: Option<String>,
}

impl PlatformMetadata {
    pub fn from_value(value: &Value) -> Self {
        let owned = |pointer: &str| string_at(value, pointer).map(str::to_string);
        Self {
            display_name: owned("/metadata/displayName"),
            item_type: owned("/metadata/type"),
            logical_id: owned("/config/logicalId"),
            workspace_id: owned("/config/workspaceId"),
        }
    }

    pub fn parse(bytes: Option<&[u8]>) -> (Self, Option<MetadataParseError>) {
        let (value, err) = parse_json_part(crate::export::PLATFORM_PART, bytes);
        (Self::from_value(&value), err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MashupQueryMetadata {
    pub query_id: String,
    pub query_name: String,
}

/// Contents of `MashupMetadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MashupMetadata {
    pub query_groups: Vec<Value>,
    pub queries_metadata: Vec<MashupQueryMetadata>,
}

impl From<&QueryMetadataDoc> for MashupMetadata {
    fn from(doc: &QueryMetadataDoc) -> Self {
        Self {
            query_groups: Vec::new(),
            queries_metadata: doc
                .queries
                .iter()
                .map(|entry| MashupQueryMetadata {
                    query_id: entry.resolved_id().to_string(),
                    query_name: entry.resolved_name().to_string(),
                })
                .collect(),
        }
    }
}

/// Contents of `Metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
}

impl From<&PlatformMetadata> for TemplateMetadata {
    fn from(platform: &PlatformMetadata) -> Self {
        Self {
            name: platform.display_name.clone().unwrap_or_default(),
            description: String::new(),
            version: TEMPLATE_VERSION.to_string(),
        }
    }
}
