use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use dataflow_pqt::{ConvertConfig, validate_with_limits};

use crate::OutputFormat;
use crate::output::json::write_json;
use crate::output::text::write_validation_report;

pub fn run(path: &Path, config: &ConvertConfig, format: OutputFormat) -> Result<ExitCode> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read template: {}", path.display()))?;
    let report = validate_with_limits(&bytes, config.container);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => {
            writeln!(handle, "Template: {}", path.display())?;
            write_validation_report(&mut handle, &report)?;
        }
        OutputFormat::Json => write_json(&mut handle, &report)?,
    }
    handle.flush()?;

    Ok(if report.is_valid() {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    })
}
