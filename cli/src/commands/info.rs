use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use dataflow_pqt::{ConvertConfig, DecodedItem, ExportDecoder, ItemIdentity};
use serde::Serialize;

use crate::OutputFormat;
use crate::output::json::write_json;

#[derive(Serialize)]
struct PartInfo<'a> {
    path: &'a str,
    bytes: usize,
    is_text: bool,
}

#[derive(Serialize)]
struct PartErrorInfo {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemInfo<'a> {
    file: String,
    identity: &'a ItemIdentity,
    is_dataflow: bool,
    parts: Vec<PartInfo<'a>>,
    part_errors: Vec<PartErrorInfo>,
}

impl<'a> ItemInfo<'a> {
    fn new(file: String, item: &'a DecodedItem) -> Self {
        Self {
            file,
            identity: item.identity(),
            is_dataflow: item.is_dataflow(),
            parts: item
                .parts()
                .iter()
                .map(|p| PartInfo {
                    path: p.path.as_str(),
                    bytes: p.content.len(),
                    is_text: p.is_text,
                })
                .collect(),
            part_errors: item
                .part_errors()
                .iter()
                .map(|e| PartErrorInfo {
                    code: e.code(),
                    message: e.to_string(),
                })
                .collect(),
        }
    }
}

pub fn run(path: &Path, config: &ConvertConfig, format: OutputFormat) -> Result<ExitCode> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read export: {}", path.display()))?;
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let item = ExportDecoder::new(config.decode)
        .decode_named(&bytes, &file)
        .with_context(|| format!("Failed to decode export: {}", path.display()))?;
    let info = ItemInfo::new(file, &item);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Json => write_json(&mut handle, &info)?,
        OutputFormat::Text => {
            writeln!(handle, "Export: {}", info.file)?;
            writeln!(handle, "Name: {}", info.identity.display_name)?;
            writeln!(handle, "Type: {}", info.identity.item_type)?;
            writeln!(handle, "Workspace ID: {}", info.identity.workspace_id)?;
            writeln!(handle, "Item ID: {}", info.identity.item_id)?;
            writeln!(handle, "Dataflow: {}", if info.is_dataflow { "yes" } else { "no" })?;
            writeln!(handle, "Parts: {}", info.parts.len())?;
            for part in &info.parts {
                let kind = if part.is_text { "text" } else { "binary" };
                writeln!(handle, "  - {} ({} bytes, {})", part.path, part.bytes, kind)?;
            }
            if !info.part_errors.is_empty() {
                writeln!(handle, "Part errors: {}", info.part_errors.len())?;
                for err in &info.part_errors {
                    writeln!(handle, "  - [{}] {}", err.code, err.message)?;
                }
            }
        }
    }
    handle.flush()?;

    Ok(if info.part_errors.is_empty() {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    })
}
