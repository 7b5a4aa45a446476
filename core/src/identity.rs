//! Best-effort identity of an exported item.
//!
//! Identity is used for traceability only. Every field defaults to the
//! [`NOT_AVAILABLE`] sentinel and nothing downstream depends on it being
//! known.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metadata::PlatformMetadata;

pub const NOT_AVAILABLE: &str = "N/A";

const EXPORT_NAME_PREFIX: &str = "WS";
const EXPORT_NAME_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemIdentity {
    pub workspace_id: String,
    pub item_id: String,
    pub item_type: String,
    pub display_name: String,
}

impl Default for ItemIdentity {
    fn default() -> Self {
        Self {
            workspace_id: NOT_AVAILABLE.to_string(),
            item_id: NOT_AVAILABLE.to_string(),
            item_type: NOT_AVAILABLE.to_string(),
            display_name: NOT_AVAILABLE.to_string(),
        }
    }
}

fn or_sentinel(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

impl ItemIdentity {
    pub fn from_platform(platform: &PlatformMetadata) -> Self {
        Self {
            workspace_id: or_sentinel(platform.workspace_id.as_deref()),
            item_id: or_sentinel(platform.logical_id.as_deref()),
            item_type: or_sentinel(platform.item_type.as_deref()),
            display_name: or_sentinel(platform.display_name.as_deref()),
        }
    }

    /// Identity from raw `.platform` bytes. Unparseable JSON yields the
    /// all-unknown identity.
    pub fn from_platform_bytes(bytes: &[u8]) -> Self {
        let (platform, err) = PlatformMetadata::parse(Some(bytes));
        if let Some(err) = err {
            warn!(code = err.code(), "{err}; identity unavailable");
            return Self::default();
        }
        Self::from_platform(&platform)
    }

    /// Parse `WS__<workspace-id>__<item-id>__<name>__<type>.json`.
    pub fn from_export_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
        let fields: Vec<&str> = stem.split(EXPORT_NAME_SEPARATOR).collect();
        if fields.len() < 5 || fields[0] != EXPORT_NAME_PREFIX {
            return None;
        }
        Some(Self {
            workspace_id: or_sentinel(Some(fields[1])),
            item_id: or_sentinel(Some(fields[2])),
            display_name: or_sentinel(Some(fields[3])),
            item_type: or_sentinel(Some(fields[4])),
        })
    }

    /// Replace every sentinel field with the corresponding field of `other`.
    pub fn fill_missing_from(&mut self, other: &ItemIdentity) {
        let fill = |mine: &mut String, theirs: &String| {
            if mine.as_str() == NOT_AVAILABLE {
                mine.clone_from(theirs);
            }
        };
        fill(&mut self.workspace_id, &other.workspace_id);
        fill(&mut self.item_id, &other.item_id);
        fill(&mut self.item_type, &other.item_type);
        fill(&mut self.display_name, &other.display_name);
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }
}
