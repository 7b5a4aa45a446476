//! Export document decoding.
//!
//! An export document is a JSON envelope whose `definition.parts` array
//! carries the item's files, usually base64-encoded. [`ExportDecoder`] turns
//! one document into a [`DecodedItem`]. Only a broken envelope is fatal; a
//! bad part is recorded in [`DecodedItem::part_errors`] and the remaining
//! parts are still decoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DecodeLimits;
use crate::error_codes;
use crate::identity::ItemIdentity;
use crate::part_path::{PartPath, PartPathError};

pub const MASHUP_PART: &str = "mashup.pq";
pub const QUERY_METADATA_PART: &str = "queryMetadata.json";
pub const PLATFORM_PART: &str = ".platform";

const INLINE_BASE64: &str = "InlineBase64";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    #[error("export document is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("malformed export document: {reason}")]
    Malformed { reason: String },
    #[error("export document is too large: {size} bytes (limit: {limit} bytes)")]
    DocumentTooLarge { size: u64, limit: u64 },
    #[error("export document has too many parts: {parts} (limit: {limit})")]
    TooManyParts { parts: usize, limit: usize },
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::InvalidJson(_) => error_codes::EXPORT_INVALID_JSON,
            ExportError::Malformed { .. } => error_codes::EXPORT_MALFORMED,
            ExportError::DocumentTooLarge { .. } => error_codes::EXPORT_TOO_LARGE,
            ExportError::TooManyParts { .. } => error_codes::EXPORT_TOO_MANY_PARTS,
        }
    }
}

/// Failure confined to a single part. The part is skipped (or, for
/// duplicates, superseded) and decoding carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PartError {
    #[error("part #{index} has no path")]
    MissingPath { index: usize },
    #[error("part #{index} rejected: {source}")]
    UnsafePath {
        index: usize,
        #[source]
        source: PartPathError,
    },
    #[error("part '{path}' payload could not be decoded: {reason}")]
    PayloadDecode { path: String, reason: String },
    #[error("part '{path}' is too large: {size} bytes (limit: {limit} bytes)")]
    PartTooLarge { path: String, size: u64, limit: u64 },
    #[error("part '{path}' appears more than once; the last occurrence wins")]
    DuplicatePath { path: String },
}

impl PartError {
    pub fn code(&self) -> &'static str {
        match self {
            PartError::MissingPath { .. } => error_codes::PART_MISSING_PATH,
            PartError::UnsafePath { .. } => error_codes::PART_UNSAFE_PATH,
            PartError::PayloadDecode { .. } => error_codes::PART_PAYLOAD_DECODE,
            PartError::PartTooLarge { .. } => error_codes::PART_TOO_LARGE,
            PartError::DuplicatePath { .. } => error_codes::PART_DUPLICATE_PATH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadType {
    InlineBase64,
    /// Anything else, including a missing marker. Such payloads are taken
    /// as already-decoded text.
    Other(Option<String>),
}

impl PayloadType {
    fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some(INLINE_BASE64) => PayloadType::InlineBase64,
            other => PayloadType::Other(other.map(str::to_string)),
        }
    }
}

/// One entry of `definition.parts`, with every field optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPart {
    pub path: Option<String>,
    pub payload: Option<String>,
    pub payload_type: PayloadType,
}

impl ExportPart {
    fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str);
        Self {
            path: text("path").map(str::to_string),
            payload: text("payload").map(str::to_string),
            payload_type: PayloadType::from_marker(text("payloadType")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub parts: Vec<ExportPart>,
}

impl ExportDocument {
    pub fn parse(bytes: &[u8], limits: &DecodeLimits) -> Result<Self, ExportError> {
        let size = bytes.len() as u64;
        if size > limits.max_document_bytes {
            return Err(ExportError::DocumentTooLarge {
                size,
                limit: limits.max_document_bytes,
            });
        }

        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let root: Value =
            serde_json::from_slice(bytes).map_err(|e| ExportError::InvalidJson(e.to_string()))?;

        let definition = root.get("definition").ok_or_else(|| ExportError::Malformed {
            reason: "missing 'definition' object".to_string(),
        })?;
        let parts = match definition.get("parts") {
            Some(Value::Array(parts)) => parts,
            Some(_) => {
                return Err(ExportError::Malformed {
                    reason: "'definition.parts' is not an array".to_string(),
                });
            }
            None => {
                return Err(ExportError::Malformed {
                    reason: "missing 'definition.parts' array".to_string(),
                });
            }
        };

        if parts.len() > limits.max_parts {
            return Err(ExportError::TooManyParts {
                parts: parts.len(),
                limit: limits.max_parts,
            });
        }

        Ok(Self {
            parts: parts.iter().map(ExportPart::from_value).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPart {
    pub path: PartPath,
    pub content: Vec<u8>,
    /// Whether `content` is valid UTF-8.
    pub is_text: bool,
}

impl DecodedPart {
    pub fn new(path: PartPath, content: Vec<u8>) -> Self {
        let is_text = std::str::from_utf8(&content).is_ok();
        Self {
            path,
            content,
            is_text,
        }
    }

    pub fn text(&self) -> Option<&str> {
        if self.is_text {
            std::str::from_utf8(&self.content).ok()
        } else {
            None
        }
    }
}

/// Everything decoded from one export document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedItem {
    parts: Vec<DecodedPart>,
    identity: ItemIdentity,
    part_errors: Vec<PartError>,
}

impl DecodedItem {
    /// Assemble an item from already-decoded parts. A repeated path replaces
    /// the earlier part in place.
    pub fn from_parts(parts: impl IntoIterator<Item = DecodedPart>, identity: ItemIdentity) -> Self {
        let mut item = Self {
            identity,
            ..Self::default()
        };
        for part in parts {
            item.insert(part);
        }
        item
    }

    /// Returns `true` when `part` replaced an existing part with the same path.
    fn insert(&mut self, part: DecodedPart) -> bool {
        if let Some(existing) = self.parts.iter_mut().find(|p| p.path == part.path) {
            *existing = part;
            true
        } else {
            self.parts.push(part);
            false
        }
    }

    pub fn parts(&self) -> &[DecodedPart] {
        &self.parts
    }

    pub fn get(&self, path: &str) -> Option<&DecodedPart> {
        self.parts.iter().find(|p| p.path.as_str() == path)
    }

    pub fn content(&self, path: &str) -> Option<&[u8]> {
        self.get(path).map(|p| p.content.as_slice())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn identity(&self) -> &ItemIdentity {
        &self.identity
    }

    pub fn part_errors(&self) -> &[PartError] {
        &self.part_errors
    }

    /// Items without a mashup part are not dataflows and cannot be packaged.
    pub fn is_dataflow(&self) -> bool {
        self.get(MASHUP_PART).is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportDecoder {
    limits: DecodeLimits,
}

impl ExportDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedItem, ExportError> {
        let document = ExportDocument::parse(bytes, &self.limits)?;
        Ok(self.decode_document(&document))
    }

    /// Like [`decode`](Self::decode), then fills identity fields still unknown
    /// from a conventional `WS__...` export file name.
    pub fn decode_named(&self, bytes: &[u8], file_name: &str) -> Result<DecodedItem, ExportError> {
        let mut item = self.decode(bytes)?;
        if let Some(from_name) = ItemIdentity::from_export_file_name(file_name) {
            item.identity.fill_missing_from(&from_name);
        }
        Ok(item)
    }

    pub fn decode_document(&self, document: &ExportDocument) -> DecodedItem {
        let mut item = DecodedItem::default();

        for (index, part) in document.parts.iter().enumerate() {
            match self.decode_part(index, part) {
                Ok(decoded) => {
                    debug!(
                        path = %decoded.path,
                        bytes = decoded.content.len(),
                        is_text = decoded.is_text,
                        "decoded part"
                    );
                    let path = decoded.path.to_string();
                    if item.insert(decoded) {
                        warn!(path = %path, "duplicate part path");
                        item.part_errors.push(PartError::DuplicatePath { path });
                    }
                }
                Err(err) => {
                    warn!(code = err.code(), "skipping part: {err}");
                    item.part_errors.push(err);
                }
            }
        }

        item.identity = identity_from_platform(item.get(PLATFORM_PART));
        item
    }

    fn decode_part(&self, index: usize, part: &ExportPart) -> Result<DecodedPart, PartError> {
        let raw_path = part
            .path
            .as_deref()
            .ok_or(PartError::MissingPath { index })?;
        let path =
            PartPath::parse(raw_path).map_err(|source| PartError::UnsafePath { index, source })?;
        let payload = part.payload.as_deref().unwrap_or("");

        let content = match part.payload_type {
            PayloadType::InlineBase64 => decode_base64_payload(&path, payload, &self.limits)?,
            PayloadType::Other(_) => payload.as_bytes().to_vec(),
        };

        let size = content.len() as u64;
        if size > self.limits.max_part_bytes {
            return Err(PartError::PartTooLarge {
                path: path.to_string(),
                size,
                limit: self.limits.max_part_bytes,
            });
        }

        Ok(DecodedPart::new(path, content))
    }
}

fn decode_base64_payload(
    path: &PartPath,
    payload: &str,
    limits: &DecodeLimits,
) -> Result<Vec<u8>, PartError> {
    let cleaned: String = payload.split_whitespace().collect();
    let estimated = (cleaned.len() as u64 / 4) * 3;
    if estimated > limits.max_part_bytes.saturating_add(3) {
        return Err(PartError::PartTooLarge {
            path: path.to_string(),
            size: estimated,
            limit: limits.max_part_bytes,
        });
    }
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| PartError::PayloadDecode {
            path: path.to_string(),
            reason: e.to_string(),
        })
}

fn identity_from_platform(part: Option<&DecodedPart>) -> ItemIdentity {
    match part {
        Some(part) if part.is_text => ItemIdentity::from_platform_bytes(&part.content),
        Some(_) => {
            warn!(path = PLATFORM_PART, "platform part is not text; identity unavailable");
            ItemIdentity::default()
        }
        None => ItemIdentity::default(),
    }
}

/// Decode with default limits.
pub fn decode(bytes: &[u8]) -> Result<DecodedItem, ExportError> {
    ExportDecoder::default().decode(bytes)
}
