//! `item_mapping.txt`: which item directory came from which export file.
//!
//! One line per item, either
//! `item_001 | WorkspaceID: <ws> | ItemID: <id> | Name: <name> | Type: <type> | File: <file>`
//! when the export file name carried identity, or `item_001 -> <file>`.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::identity::ItemIdentity;

use super::{FsError, io_at};

pub const MAPPING_FILE_NAME: &str = "item_mapping.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub item_dir: String,
    pub identity: Option<ItemIdentity>,
    pub file: String,
}

impl MappingEntry {
    /// Identity is taken from `file` when it follows the `WS__...` naming.
    pub fn for_export_file(item_dir: &str, file: &str) -> Self {
        Self {
            item_dir: item_dir.to_string(),
            identity: ItemIdentity::from_export_file_name(file),
            file: file.to_string(),
        }
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if let Some((item_dir, file)) = line.split_once(" -> ") {
            return Some(Self {
                item_dir: item_dir.trim().to_string(),
                identity: None,
                file: file.trim().to_string(),
            });
        }

        let mut fields = line.split(" | ");
        let item_dir = fields.next()?.trim().to_string();
        let mut identity = ItemIdentity::default();
        let mut file = None;
        for field in fields {
            let (key, value) = field.split_once(": ")?;
            let value = value.trim().to_string();
            match key.trim() {
                "WorkspaceID" => identity.workspace_id = value,
                "ItemID" => identity.item_id = value,
                "Name" => identity.display_name = value,
                "Type" => identity.item_type = value,
                "File" => file = Some(value),
                _ => {}
            }
        }
        Some(Self {
            item_dir,
            identity: Some(identity),
            file: file?,
        })
    }
}

impl fmt::Display for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            Some(id) => write!(
                f,
                "{} | WorkspaceID: {} | ItemID: {} | Name: {} | Type: {} | File: {}",
                self.item_dir, id.workspace_id, id.item_id, id.display_name, id.item_type, self.file
            ),
            None => write!(f, "{} -> {}", self.item_dir, self.file),
        }
    }
}

pub(crate) fn append_mapping(path: &Path, entry: &MappingEntry) -> Result<(), FsError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_at(path))?;
    writeln!(file, "{entry}").map_err(io_at(path))
}

pub fn write_mapping(path: &Path, entries: &[MappingEntry]) -> Result<(), FsError> {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&entry.to_string());
        text.push('\n');
    }
    std::fs::write(path, text).map_err(io_at(path))
}

/// A missing file reads as no entries; unparseable lines are skipped.
pub fn read_mapping(path: &Path) -> Result<Vec<MappingEntry>, FsError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_at(path)(e)),
    };
    Ok(text.lines().filter_map(MappingEntry::parse_line).collect())
}
