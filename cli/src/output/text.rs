use anyhow::Result;
use dataflow_pqt::ValidationReport;
use dataflow_pqt::workspace::{ConvertOutcome, ConvertSummary, DecodeOutcome, DecodeSummary};
use std::io::Write;

pub fn write_decode_summary<W: Write>(w: &mut W, summary: &DecodeSummary) -> Result<()> {
    writeln!(w, "Decoding exports in {}", summary.source.display())?;
    if summary.outcomes.is_empty() {
        writeln!(w, "No export files found.")?;
        return Ok(());
    }

    for outcome in &summary.outcomes {
        match outcome {
            DecodeOutcome::Decoded {
                file,
                item_dir,
                parts,
                part_errors,
                is_dataflow,
            } => {
                let kind = if *is_dataflow { "dataflow" } else { "other" };
                writeln!(w, "  ok    {} -> {} ({} parts, {})", file, item_dir, parts, kind)?;
                for err in part_errors {
                    writeln!(w, "          warning: {}", err)?;
                }
            }
            DecodeOutcome::Failed {
                file, code, error, ..
            } => {
                writeln!(w, "  FAIL  {} [{}] {}", file, code, error)?;
            }
        }
    }

    writeln!(
        w,
        "Decoded: {}, failed: {}",
        summary.decoded(),
        summary.failed()
    )?;
    Ok(())
}

pub fn write_convert_summary<W: Write>(w: &mut W, summary: &ConvertSummary) -> Result<()> {
    writeln!(w, "Converting items into {}", summary.output.display())?;
    if summary.outcomes.is_empty() {
        writeln!(w, "No item directories found.")?;
        return Ok(());
    }

    for outcome in &summary.outcomes {
        match outcome {
            ConvertOutcome::Packaged {
                item,
                template,
                move_error,
                report,
                warnings,
                ..
            } => {
                let status = if report.is_valid() { "ok   " } else { "INVALID" };
                writeln!(w, "  {} {} -> {}", status, item, template.display())?;
                for warning in warnings {
                    writeln!(w, "          warning: {}", warning)?;
                }
                for issue in &report.issues {
                    writeln!(w, "          issue: {}", issue)?;
                }
                if let Some(err) = move_error {
                    writeln!(w, "          not moved: {}", err)?;
                }
            }
            ConvertOutcome::Failed { item, code, error } => {
                writeln!(w, "  FAIL  {} [{}] {}", item, code, error)?;
            }
            ConvertOutcome::Skipped { item, reason } => {
                writeln!(w, "  skip  {} ({})", item, reason)?;
            }
        }
    }

    writeln!(
        w,
        "Packaged: {} (moved to {}: {}), failed: {}, skipped: {}",
        summary.packaged(),
        summary.dataflows_dir.display(),
        summary.moved(),
        summary.failed(),
        summary.skipped()
    )?;
    Ok(())
}

pub fn write_validation_report<W: Write>(w: &mut W, report: &ValidationReport) -> Result<()> {
    writeln!(w, "Members: {}", report.members.join(", "))?;
    writeln!(w, "Queries: {}", report.query_count)?;
    if report.is_valid() {
        writeln!(w, "Valid.")?;
        return Ok(());
    }
    writeln!(w, "Issues: {}", report.issues.len())?;
    for issue in &report.issues {
        writeln!(w, "  - [{}] {}", issue.kind.as_str(), issue)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_pqt::{IssueKind, ValidationIssue};

    #[test]
    fn validation_text_lists_issues_with_members() {
        let report = ValidationReport {
            members: vec!["MashupDocument.pq".to_string()],
            query_count: 0,
            issues: vec![ValidationIssue {
                kind: IssueKind::MissingMember,
                member: Some("Metadata.json".to_string()),
                message: "required member is missing".to_string(),
            }],
        };
        let mut out = Vec::new();
        write_validation_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Issues: 1"));
        assert!(text.contains("[missing_member] Metadata.json: required member is missing"));
    }

    #[test]
    fn valid_report_says_so() {
        let mut out = Vec::new();
        write_validation_report(&mut out, &ValidationReport::default()).unwrap();
        assert!(String::from_utf8(out).unwrap().ends_with("Valid.\n"));
    }
}
