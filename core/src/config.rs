//! Configuration for decoding and packaging.
//!
//! `ConvertConfig` centralizes size limits and batch behavior so callers can
//! tune them in one place (or load them from JSON) instead of passing loose
//! arguments around.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    /// Largest export document accepted, in bytes.
    pub max_document_bytes: u64,
    pub max_parts: usize,
    /// Largest decoded part, in bytes.
    pub max_part_bytes: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: 256 * 1024 * 1024,
            max_parts: 10_000,
            max_part_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerLimits {
    pub max_entries: usize,
    pub max_part_uncompressed_bytes: u64,
    pub max_total_uncompressed_bytes: u64,
}

impl Default for ContainerLimits {
    fn default() -> Self {
        Self {
            max_entries: 64,
            max_part_uncompressed_bytes: 100 * 1024 * 1024,
            max_total_uncompressed_bytes: 500 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub decode: DecodeLimits,
    pub container: ContainerLimits,
    /// Leave the source export file in place after a successful decode.
    pub keep_originals: bool,
    /// Directory (under the convert output) that receives packaged items.
    pub dataflows_dir_name: String,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            decode: DecodeLimits::default(),
            container: ContainerLimits::default(),
            keep_originals: false,
            dataflows_dir_name: "with_dataflows".to_string(),
        }
    }
}

impl ConvertConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
