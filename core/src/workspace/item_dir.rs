use std::path::Path;

use tracing::debug;

use crate::export::{DecodedItem, DecodedPart, MASHUP_PART, PLATFORM_PART, QUERY_METADATA_PART};
use crate::identity::ItemIdentity;
use crate::part_path::PartPath;
use crate::template::TemplateArchive;

use super::{FsError, io_at, require_dir};

/// Parts a packaged template is built from. Anything else in an item
/// directory is ignored when reading it back.
const TEMPLATE_SOURCE_PARTS: [&str; 3] = [MASHUP_PART, QUERY_METADATA_PART, PLATFORM_PART];

/// Write every part of `item` under `dest_dir`, creating subdirectories as
/// needed. Content is written byte for byte.
pub fn write_decoded_item(item: &DecodedItem, dest_dir: &Path) -> Result<(), FsError> {
    std::fs::create_dir_all(dest_dir).map_err(io_at(dest_dir))?;
    for part in item.parts() {
        let target = part.path.resolve_under(dest_dir);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
        std::fs::write(&target, &part.content).map_err(io_at(&target))?;
        debug!(path = %target.display(), bytes = part.content.len(), "wrote part");
    }
    Ok(())
}

/// Rebuild a [`DecodedItem`] from a directory written by
/// [`write_decoded_item`].
///
/// Identity comes from `.platform` first; fields it leaves unknown are filled
/// from the name of a `WS__...json` export kept in the directory.
pub fn read_decoded_item(dir: &Path) -> Result<DecodedItem, FsError> {
    require_dir(dir)?;

    let mut parts = Vec::new();
    for name in TEMPLATE_SOURCE_PARTS {
        let file = dir.join(name);
        if !file.is_file() {
            continue;
        }
        let content = std::fs::read(&file).map_err(io_at(&file))?;
        if let Ok(path) = PartPath::parse(name) {
            parts.push(DecodedPart::new(path, content));
        }
    }

    let mut identity = parts
        .iter()
        .find(|p| p.path.as_str() == PLATFORM_PART)
        .map(|p| ItemIdentity::from_platform_bytes(&p.content))
        .unwrap_or_default();
    if let Some(from_name) = kept_export_identity(dir)? {
        identity.fill_missing_from(&from_name);
    }

    Ok(DecodedItem::from_parts(parts, identity))
}

/// First (by name) `WS__*.json` export kept in `dir` whose name carries
/// identity.
pub(crate) fn kept_export_file_name(dir: &Path) -> Result<Option<String>, FsError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_at(dir))? {
        let entry = entry.map_err(io_at(dir))?;
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with("WS__") && name.ends_with(".json") {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names
        .into_iter()
        .find(|name| ItemIdentity::from_export_file_name(name).is_some()))
}

fn kept_export_identity(dir: &Path) -> Result<Option<ItemIdentity>, FsError> {
    Ok(kept_export_file_name(dir)?.and_then(|name| ItemIdentity::from_export_file_name(&name)))
}

pub fn write_template(archive: &TemplateArchive, dest_path: &Path) -> Result<(), FsError> {
    if let Some(parent) = dest_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_at(parent))?;
        }
    }
    std::fs::write(dest_path, archive.as_bytes()).map_err(io_at(dest_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(path: &str, bytes: &[u8]) -> DecodedPart {
        DecodedPart::new(PartPath::parse(path).unwrap(), bytes.to_vec())
    }

    #[test]
    fn parts_land_under_dest_dir() {
        let dir = tempfile::tempdir().unwrap();
        let item = DecodedItem::from_parts(
            [
                part("mashup.pq", b"section Section1;"),
                part("nested/deeper/notes.txt", b"\x00\x01binary"),
            ],
            ItemIdentity::default(),
        );
        write_decoded_item(&item, dir.path()).unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("mashup.pq")).unwrap(),
            b"section Section1;"
        );
        assert_eq!(
            std::fs::read(dir.path().join("nested/deeper/notes.txt")).unwrap(),
            b"\x00\x01binary"
        );
    }

    #[test]
    fn read_back_takes_identity_from_kept_export_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mashup.pq"), "m").unwrap();
        std::fs::write(
            dir.path().join(".platform"),
            r#"{"metadata": {"displayName": "From platform"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("WS__ws__it__Named__Dataflow.json"), "{}").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), "x").unwrap();

        let item = read_decoded_item(dir.path()).unwrap();
        assert!(item.is_dataflow());
        assert_eq!(item.len(), 2);
        assert_eq!(item.identity().display_name, "From platform");
        assert_eq!(item.identity().workspace_id, "ws");
        assert_eq!(item.identity().item_type, "Dataflow");
    }

    #[test]
    fn read_missing_dir_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_decoded_item(&dir.path().join("absent")).unwrap_err();
        assert_eq!(err.code(), "DF_FS_NOT_FOUND");
    }

    #[test]
    fn template_is_written_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let item = DecodedItem::from_parts([part("mashup.pq", b"m")], ItemIdentity::default());
        let built = crate::template::build(&item).unwrap();
        let dest = dir.path().join("out").join("item.pqt");
        write_template(&built.archive, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), built.archive.as_bytes());
    }
}
