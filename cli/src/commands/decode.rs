use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use dataflow_pqt::ConvertConfig;
use dataflow_pqt::workspace::{DecodeSummary, decode_directory};

use crate::OutputFormat;
use crate::output::{json::write_json, text::write_decode_summary};

pub fn run(dir: &Path, config: &ConvertConfig, format: OutputFormat) -> Result<ExitCode> {
    let summary = decode_dir(dir, config)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => write_decode_summary(&mut handle, &summary)?,
        OutputFormat::Json => write_json(&mut handle, &summary)?,
    }
    handle.flush()?;

    Ok(exit_code(&summary))
}

pub(crate) fn decode_dir(dir: &Path, config: &ConvertConfig) -> Result<DecodeSummary> {
    decode_directory(dir, config)
        .with_context(|| format!("Failed to decode exports in {}", dir.display()))
}

pub(crate) fn exit_code(summary: &DecodeSummary) -> ExitCode {
    if summary.failed() > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::from(0)
    }
}
