//! Directory-level decode and convert passes.
//!
//! Both passes keep going when a single item fails; the failure is recorded
//! in the returned summary. Only problems with the directories themselves
//! (missing source, unreadable listing) abort a pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::export::{DecodedItem, ExportDecoder, ExportError, MASHUP_PART};
use crate::metadata::MetadataParseError;
use crate::template::{TemplateError, TemplatePackager};
use crate::validate::ValidationReport;

use super::item_dir::{kept_export_file_name, read_decoded_item, write_decoded_item, write_template};
use super::mapping::{MAPPING_FILE_NAME, MappingEntry, append_mapping, read_mapping, write_mapping};
use super::{FsError, io_at, require_dir};

const ITEM_DIR_PREFIX: &str = "item_";
const UNKNOWN_SOURCE_FILE: &str = "Unknown";

fn item_dir_name(index: usize) -> String {
    format!("{ITEM_DIR_PREFIX}{index:03}")
}

/// A per-item failure, flattened to its code and message for reporting.
#[derive(Debug)]
struct ItemFailure {
    code: &'static str,
    message: String,
}

impl From<ExportError> for ItemFailure {
    fn from(err: ExportError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<FsError> for ItemFailure {
    fn from(err: FsError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<TemplateError> for ItemFailure {
    fn from(err: TemplateError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecodeOutcome {
    Decoded {
        file: String,
        item_dir: String,
        parts: usize,
        /// Non-fatal problems with individual parts, as `CODE: message`.
        part_errors: Vec<String>,
        is_dataflow: bool,
    },
    Failed {
        file: String,
        item_dir: String,
        code: &'static str,
        error: String,
    },
}

impl DecodeOutcome {
    pub fn file(&self) -> &str {
        match self {
            DecodeOutcome::Decoded { file, .. } | DecodeOutcome::Failed { file, .. } => file,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DecodeOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecodeSummary {
    pub source: PathBuf,
    pub outcomes: Vec<DecodeOutcome>,
}

impl DecodeSummary {
    pub fn decoded(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}

/// Decode every `*.json` file directly inside `source` into numbered
/// `item_NNN` directories, in file-name order.
pub fn decode_directory(source: &Path, config: &ConvertConfig) -> Result<DecodeSummary, FsError> {
    require_dir(source)?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(source).map_err(io_at(source))? {
        let path = entry.map_err(io_at(source))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    info!(source = %source.display(), files = files.len(), "decoding export files");

    let decoder = ExportDecoder::new(config.decode);
    let mapping_path = source.join(MAPPING_FILE_NAME);
    let mut outcomes = Vec::with_capacity(files.len());

    for (index, path) in files.iter().enumerate() {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let item_dir = item_dir_name(index + 1);
        let dest = source.join(&item_dir);

        let outcome = match decode_one(&decoder, path, &file, &dest) {
            Ok(item) => {
                let entry = MappingEntry::for_export_file(&item_dir, &file);
                let recorded = append_mapping(&mapping_path, &entry).and_then(|()| {
                    if config.keep_originals {
                        Ok(())
                    } else {
                        std::fs::remove_file(path).map_err(io_at(path))
                    }
                });
                match recorded {
                    Ok(()) => {
                        info!(file = %file, item = %item_dir, parts = item.len(), "decoded export");
                        DecodeOutcome::Decoded {
                            file,
                            item_dir,
                            parts: item.len(),
                            part_errors: item
                                .part_errors()
                                .iter()
                                .map(|e| format!("{}: {e}", e.code()))
                                .collect(),
                            is_dataflow: item.is_dataflow(),
                        }
                    }
                    Err(err) => failed_decode(file, item_dir, err.into()),
                }
            }
            Err(failure) => failed_decode(file, item_dir, failure),
        };
        outcomes.push(outcome);
    }

    Ok(DecodeSummary {
        source: source.to_path_buf(),
        outcomes,
    })
}

fn decode_one(
    decoder: &ExportDecoder,
    path: &Path,
    file: &str,
    dest: &Path,
) -> Result<DecodedItem, ItemFailure> {
    let bytes = std::fs::read(path).map_err(io_at(path))?;
    let item = decoder.decode_named(&bytes, file)?;
    write_decoded_item(&item, dest)?;
    let kept = dest.join(file);
    std::fs::copy(path, &kept).map_err(io_at(&kept))?;
    Ok(item)
}

fn failed_decode(file: String, item_dir: String, failure: ItemFailure) -> DecodeOutcome {
    warn!(file = %file, code = failure.code, "decode failed: {}", failure.message);
    DecodeOutcome::Failed {
        file,
        item_dir,
        code: failure.code,
        error: failure.message,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConvertOutcome {
    Packaged {
        item: String,
        /// Final location of the `.pqt`.
        template: PathBuf,
        moved: bool,
        /// Set when the item could not be moved into the dataflows directory.
        move_error: Option<String>,
        report: ValidationReport,
        warnings: Vec<String>,
    },
    Failed {
        item: String,
        code: &'static str,
        error: String,
    },
    Skipped {
        item: String,
        reason: String,
    },
}

impl ConvertOutcome {
    pub fn item(&self) -> &str {
        match self {
            ConvertOutcome::Packaged { item, .. }
            | ConvertOutcome::Failed { item, .. }
            | ConvertOutcome::Skipped { item, .. } => item,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub dataflows_dir: PathBuf,
    pub outcomes: Vec<ConvertOutcome>,
}

impl ConvertSummary {
    pub fn packaged(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Packaged { .. }))
    }

    pub fn moved(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Packaged { moved: true, .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Skipped { .. }))
    }

    /// Packaged items whose archive did not pass validation.
    pub fn invalid(&self) -> usize {
        self.count(|o| matches!(o, ConvertOutcome::Packaged { report, .. } if !report.is_valid()))
    }

    fn count(&self, pred: impl Fn(&ConvertOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Package every dataflow item directory under `source` into a `.pqt` and
/// gather the packaged items under `<output>/<dataflows_dir_name>`.
///
/// `output` defaults to `source`, in which case items are processed in place.
pub fn convert_workspace(
    source: &Path,
    output: Option<&Path>,
    config: &ConvertConfig,
) -> Result<ConvertSummary, FsError> {
    require_dir(source)?;
    let output = output.unwrap_or(source);
    std::fs::create_dir_all(output).map_err(io_at(output))?;
    let in_place = same_dir(source, output)?;

    let mut outcomes = Vec::new();
    let mut selected = Vec::new();
    for name in item_dir_names(source)? {
        if source.join(&name).join(MASHUP_PART).is_file() {
            selected.push(name);
        } else {
            debug!(item = %name, "no mashup part");
            outcomes.push(ConvertOutcome::Skipped {
                item: name,
                reason: "not a dataflow item".to_string(),
            });
        }
    }
    info!(source = %source.display(), dataflows = selected.len(), "converting items");

    let recorded_files: HashMap<String, String> = read_mapping(&source.join(MAPPING_FILE_NAME))?
        .into_iter()
        .filter(|e| e.identity.is_none())
        .map(|e| (e.item_dir, e.file))
        .collect();

    let dataflows_dir = output.join(&config.dataflows_dir_name);
    let packager = TemplatePackager::new(config.container);
    let mut moved = Vec::new();
    let mut remaining = Vec::new();

    for name in selected {
        let work_dir = output.join(&name);
        if !in_place && !work_dir.exists() {
            if let Err(err) = copy_dir_all(&source.join(&name), &work_dir) {
                outcomes.push(failed_convert(name, err.into()));
                continue;
            }
        }

        let template_name = format!("{name}.pqt");
        let built = match package_item(&packager, &work_dir, &template_name) {
            Ok(built) => built,
            Err(failure) => {
                outcomes.push(failed_convert(name.clone(), failure));
                remaining.push(name);
                continue;
            }
        };

        let entry = mapping_entry(&work_dir, &name, &recorded_files);
        let dest = dataflows_dir.join(&name);
        let (template, move_error) = match move_dir(&work_dir, &dest) {
            Ok(()) => {
                moved.push(entry);
                (dest.join(&template_name), None)
            }
            Err(err) => {
                warn!(item = %name, code = err.code(), "move failed: {err}");
                remaining.push(name.clone());
                (work_dir.join(&template_name), Some(err.to_string()))
            }
        };
        info!(item = %name, template = %template.display(), "packaged template");

        outcomes.push(ConvertOutcome::Packaged {
            item: name,
            template,
            moved: move_error.is_none(),
            move_error,
            report: built.report,
            warnings: built
                .warnings
                .iter()
                .map(|w| format!("{}: {w}", w.code()))
                .collect(),
        });
    }

    if !moved.is_empty() {
        write_mapping(&dataflows_dir.join(MAPPING_FILE_NAME), &moved)?;
    }
    if !remaining.is_empty() {
        let entries: Vec<_> = remaining
            .iter()
            .map(|name| mapping_entry(&output.join(name), name, &recorded_files))
            .collect();
        write_mapping(&output.join(MAPPING_FILE_NAME), &entries)?;
    }

    outcomes.sort_by(|a, b| a.item().cmp(b.item()));
    Ok(ConvertSummary {
        output: output.to_path_buf(),
        dataflows_dir,
        outcomes,
    })
}

struct PackagedItem {
    report: ValidationReport,
    warnings: Vec<MetadataParseError>,
}

fn package_item(
    packager: &TemplatePackager,
    dir: &Path,
    template_name: &str,
) -> Result<PackagedItem, ItemFailure> {
    let item = read_decoded_item(dir)?;
    let built = packager.build(&item)?;
    write_template(&built.archive, &dir.join(template_name))?;
    Ok(PackagedItem {
        report: built.report,
        warnings: built.warnings,
    })
}

fn failed_convert(item: String, failure: ItemFailure) -> ConvertOutcome {
    warn!(item = %item, code = failure.code, "packaging failed: {}", failure.message);
    ConvertOutcome::Failed {
        item,
        code: failure.code,
        error: failure.message,
    }
}

/// Mapping line for an item directory: identity from a kept `WS__` export
/// when there is one, else the file recorded at decode time.
fn mapping_entry(dir: &Path, name: &str, recorded_files: &HashMap<String, String>) -> MappingEntry {
    let kept = if dir.is_dir() {
        kept_export_file_name(dir)
    } else {
        Ok(None)
    };
    entry_from_lookup(name, kept, recorded_files)
}

/// An unreadable item directory costs the item its identity, not the batch
/// its mapping file.
fn entry_from_lookup(
    name: &str,
    kept: Result<Option<String>, FsError>,
    recorded_files: &HashMap<String, String>,
) -> MappingEntry {
    match kept {
        Ok(Some(file)) => return MappingEntry::for_export_file(name, &file),
        Ok(None) => {}
        Err(err) => warn!(item = %name, code = err.code(), "mapping lookup failed: {err}"),
    }
    MappingEntry {
        item_dir: name.to_string(),
        identity: None,
        file: recorded_files
            .get(name)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_SOURCE_FILE.to_string()),
    }
}

fn item_dir_names(dir: &Path) -> Result<Vec<String>, FsError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_at(dir))? {
        let entry = entry.map_err(io_at(dir))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(ITEM_DIR_PREFIX) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn same_dir(a: &Path, b: &Path) -> Result<bool, FsError> {
    let a = std::fs::canonicalize(a).map_err(io_at(a))?;
    let b = std::fs::canonicalize(b).map_err(io_at(b))?;
    Ok(a == b)
}

fn copy_dir_all(src: &Path, dst: &Path) -> Result<(), FsError> {
    std::fs::create_dir_all(dst).map_err(io_at(dst))?;
    for entry in std::fs::read_dir(src).map_err(io_at(src))? {
        let entry = entry.map_err(io_at(src))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(io_at(&from))?;
        }
    }
    Ok(())
}

/// Replace `dst` with `src`. Falls back to copy and remove when a rename is
/// not possible (e.g. across filesystems).
fn move_dir(src: &Path, dst: &Path) -> Result<(), FsError> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(io_at(parent))?;
    }
    if dst.exists() {
        std::fs::remove_dir_all(dst).map_err(io_at(dst))?;
    }
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_dir_all(src, dst)?;
    std::fs::remove_dir_all(src).map_err(io_at(src))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_codes;

    #[test]
    fn item_dirs_are_zero_padded() {
        assert_eq!(item_dir_name(1), "item_001");
        assert_eq!(item_dir_name(42), "item_042");
        assert_eq!(item_dir_name(1234), "item_1234");
    }

    #[test]
    fn fallback_mapping_uses_recorded_file_then_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let recorded = HashMap::from([("item_001".to_string(), "export.json".to_string())]);
        let entry = mapping_entry(&dir.path().join("item_001"), "item_001", &recorded);
        assert_eq!(entry.to_string(), "item_001 -> export.json");
        let entry = mapping_entry(&dir.path().join("item_002"), "item_002", &recorded);
        assert_eq!(entry.to_string(), "item_002 -> Unknown");
    }

    #[test]
    fn unreadable_item_dir_falls_back_to_recorded_file() {
        let recorded = HashMap::from([("item_001".to_string(), "export.json".to_string())]);
        let lookup_error = || FsError::Io {
            path: PathBuf::from("item_001"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let entry = entry_from_lookup("item_001", Err(lookup_error()), &recorded);
        assert_eq!(entry.to_string(), "item_001 -> export.json");
        let entry = entry_from_lookup("item_002", Err(lookup_error()), &recorded);
        assert_eq!(entry.to_string(), "item_002 -> Unknown");
    }

    #[test]
    fn packaged_items_all_reach_the_mapping() {
        let root = tempfile::tempdir().unwrap();
        let good = root.path().join("item_001");
        std::fs::create_dir_all(&good).unwrap();
        std::fs::write(good.join(MASHUP_PART), "section Section1;").unwrap();
        std::fs::write(good.join("WS__ws__it__Sales__Dataflow.json"), "{}").unwrap();
        let odd = root.path().join("item_002");
        std::fs::create_dir_all(odd.join(MASHUP_PART).join("x")).unwrap();
        let plain = root.path().join("item_003");
        std::fs::create_dir_all(&plain).unwrap();
        std::fs::write(plain.join(MASHUP_PART), "m").unwrap();

        let summary = convert_workspace(root.path(), None, &ConvertConfig::default()).unwrap();
        assert_eq!(summary.packaged(), 2, "{:?}", summary.outcomes);
        assert_eq!(summary.skipped(), 1);
        let mapping =
            std::fs::read_to_string(summary.dataflows_dir.join(MAPPING_FILE_NAME)).unwrap();
        assert!(mapping.contains("item_001 | WorkspaceID: ws"));
        assert!(mapping.contains("item_003 -> Unknown"));
    }

    #[test]
    fn move_replaces_existing_destination() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("item_001");
        let dst = root.path().join("out").join("item_001");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("sub/a.txt"), "new").unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(dst.join("stale.txt"), "old").unwrap();

        move_dir(&src, &dst).unwrap();
        assert!(!src.exists());
        assert!(!dst.join("stale.txt").exists());
        assert_eq!(std::fs::read_to_string(dst.join("sub/a.txt")).unwrap(), "new");
    }

    #[test]
    fn failure_codes_survive_flattening() {
        let failure = ItemFailure::from(TemplateError::MissingMashup);
        assert_eq!(failure.code, error_codes::TEMPLATE_MISSING_MASHUP);
    }
}
