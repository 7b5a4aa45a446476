use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use dataflow_pqt::ConvertConfig;
use dataflow_pqt::workspace::{ConvertOutcome, ConvertSummary, DecodeSummary, convert_workspace};
use serde::Serialize;

use crate::OutputFormat;
use crate::commands::decode::decode_dir;
use crate::output::json::write_json;
use crate::output::text::{write_convert_summary, write_decode_summary};

pub fn run(
    dir: &Path,
    output: Option<&Path>,
    config: &ConvertConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let summary = convert_dir(dir, output, config)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => write_convert_summary(&mut handle, &summary)?,
        OutputFormat::Json => write_json(&mut handle, &summary)?,
    }
    handle.flush()?;

    Ok(exit_code(&summary))
}

#[derive(Serialize)]
struct AllReport<'a> {
    decode: &'a DecodeSummary,
    convert: Option<&'a ConvertSummary>,
}

/// Decode then convert. Conversion is skipped when nothing decoded.
pub fn run_all(
    dir: &Path,
    output: Option<&Path>,
    config: &ConvertConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let decoded = decode_dir(dir, config)?;
    let converted = if decoded.decoded() > 0 {
        Some(convert_dir(dir, output, config)?)
    } else {
        tracing::warn!(dir = %dir.display(), "nothing decoded; skipping convert");
        None
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => {
            write_decode_summary(&mut handle, &decoded)?;
            match &converted {
                Some(summary) => {
                    writeln!(handle)?;
                    write_convert_summary(&mut handle, summary)?;
                }
                None => writeln!(handle, "Nothing decoded; convert step skipped")?,
            }
        }
        OutputFormat::Json => write_json(
            &mut handle,
            &AllReport {
                decode: &decoded,
                convert: converted.as_ref(),
            },
        )?,
    }
    handle.flush()?;

    let failed = match &converted {
        Some(summary) => decoded.failed() > 0 || has_item_failures(summary),
        None => true,
    };
    Ok(if failed {
        ExitCode::from(1)
    } else {
        ExitCode::from(0)
    })
}

fn convert_dir(dir: &Path, output: Option<&Path>, config: &ConvertConfig) -> Result<ConvertSummary> {
    convert_workspace(dir, output, config)
        .with_context(|| format!("Failed to convert items in {}", dir.display()))
}

/// Failed packaging, failed validation, or a template left outside the
/// dataflows directory.
fn has_item_failures(summary: &ConvertSummary) -> bool {
    summary.failed() > 0
        || summary.invalid() > 0
        || summary
            .outcomes
            .iter()
            .any(|o| matches!(o, ConvertOutcome::Packaged { moved: false, .. }))
}

fn exit_code(summary: &ConvertSummary) -> ExitCode {
    if has_item_failures(summary) {
        ExitCode::from(1)
    } else {
        ExitCode::from(0)
    }
}
