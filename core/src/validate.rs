//! Structural validation of a built template archive.
//!
//! Validation is diagnostic: problems are collected into a
//! [`ValidationReport`] rather than returned as errors, and the caller decides
//! what to do with an archive that failed.

use std::collections::HashSet;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;
use serde_json::Value;

use crate::config::ContainerLimits;
use crate::container::TemplateContainer;
use crate::template::{
    CONTENT_TYPES_MEMBER, MASHUP_DOCUMENT_MEMBER, MASHUP_METADATA_MEMBER, METADATA_MEMBER,
    TEMPLATE_MEMBERS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NotAnArchive,
    Unreadable,
    MissingMember,
    UnexpectedMember,
    DuplicateMember,
    NestedMember,
    EmptyMashupDocument,
    InvalidJson,
    MissingField,
    InvalidContentTypes,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAnArchive => "not_an_archive",
            Self::Unreadable => "unreadable",
            Self::MissingMember => "missing_member",
            Self::UnexpectedMember => "unexpected_member",
            Self::DuplicateMember => "duplicate_member",
            Self::NestedMember => "nested_member",
            Self::EmptyMashupDocument => "empty_mashup_document",
            Self::InvalidJson => "invalid_json",
            Self::MissingField => "missing_field",
            Self::InvalidContentTypes => "invalid_content_types",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{member}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Member names in archive order.
    pub members: Vec<String>,
    /// Number of `QueriesMetadata` entries, when readable.
    pub query_count: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, kind: IssueKind, member: Option<&str>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            kind,
            member: member.map(str::to_string),
            message: message.into(),
        });
    }
}

pub fn validate(bytes: &[u8]) -> ValidationReport {
    validate_with_limits(bytes, ContainerLimits::default())
}

pub fn validate_with_limits(bytes: &[u8], limits: ContainerLimits) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut container = match TemplateContainer::open_with_limits(bytes, limits) {
        Ok(container) => container,
        Err(err) => {
            report.push(IssueKind::NotAnArchive, None, err.to_string());
            return report;
        }
    };

    let entries = match container.entries() {
        Ok(entries) => entries,
        Err(err) => {
            report.push(IssueKind::Unreadable, None, err.to_string());
            return report;
        }
    };

    let mut seen = HashSet::new();
    for entry in &entries {
        report.members.push(entry.name.clone());
        if !seen.insert(entry.name.as_str()) {
            report.push(
                IssueKind::DuplicateMember,
                Some(&entry.name),
                "member appears more than once",
            );
        } else if entry.is_dir || entry.name.contains('/') || entry.name.contains('\\') {
            report.push(
                IssueKind::NestedMember,
                Some(&entry.name),
                "archive members must sit at the root",
            );
        } else if !TEMPLATE_MEMBERS.contains(&entry.name.as_str()) {
            report.push(IssueKind::UnexpectedMember, Some(&entry.name), "unexpected member");
        }
    }

    for required in TEMPLATE_MEMBERS {
        if !entries.iter().any(|e| e.name == required) {
            report.push(IssueKind::MissingMember, Some(required), "required member is missing");
        }
    }

    if let Some(bytes) = read_member(&mut container, MASHUP_DOCUMENT_MEMBER, &mut report) {
        if bytes.is_empty() {
            report.push(
                IssueKind::EmptyMashupDocument,
                Some(MASHUP_DOCUMENT_MEMBER),
                "mashup document is empty",
            );
        }
    }

    if let Some(bytes) = read_member(&mut container, MASHUP_METADATA_MEMBER, &mut report) {
        check_mashup_metadata(&bytes, &mut report);
    }

    if let Some(bytes) = read_member(&mut container, METADATA_MEMBER, &mut report) {
        check_metadata(&bytes, &mut report);
    }

    if let Some(bytes) = read_member(&mut container, CONTENT_TYPES_MEMBER, &mut report) {
        check_content_types(&bytes, &mut report);
    }

    report
}

/// `None` when the member is absent (already reported) or unreadable.
fn read_member(
    container: &mut TemplateContainer<'_>,
    name: &str,
    report: &mut ValidationReport,
) -> Option<Vec<u8>> {
    match container.read_file_optional_checked(name) {
        Ok(bytes) => bytes,
        Err(err) => {
            report.push(IssueKind::Unreadable, Some(name), err.to_string());
            None
        }
    }
}

fn parse_json_member(bytes: &[u8], member: &str, report: &mut ValidationReport) -> Option<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            report.push(IssueKind::InvalidJson, Some(member), err.to_string());
            None
        }
    }
}

fn check_mashup_metadata(bytes: &[u8], report: &mut ValidationReport) {
    let member = MASHUP_METADATA_MEMBER;
    let Some(value) = parse_json_member(bytes, member, report) else {
        return;
    };
    let Some(queries) = value.get("QueriesMetadata").and_then(Value::as_array) else {
        report.push(IssueKind::MissingField, Some(member), "QueriesMetadata array is missing");
        return;
    };

    report.query_count = queries.len();
    for (idx, entry) in queries.iter().enumerate() {
        for key in ["QueryId", "QueryName"] {
            if entry.get(key).is_none() {
                report.push(
                    IssueKind::MissingField,
                    Some(member),
                    format!("QueriesMetadata[{idx}] has no {key}"),
                );
            }
        }
    }
}

fn check_metadata(bytes: &[u8], report: &mut ValidationReport) {
    let Some(value) = parse_json_member(bytes, METADATA_MEMBER, report) else {
        return;
    };
    for key in ["Name", "Description", "Version"] {
        if value.get(key).is_none() {
            report.push(
                IssueKind::MissingField,
                Some(METADATA_MEMBER),
                format!("{key} is missing"),
            );
        }
    }
}

fn check_content_types(bytes: &[u8], report: &mut ValidationReport) {
    match declared_extensions(bytes) {
        Ok(extensions) => {
            for required in ["pq", "json"] {
                if !extensions.iter().any(|e| e.eq_ignore_ascii_case(required)) {
                    report.push(
                        IssueKind::InvalidContentTypes,
                        Some(CONTENT_TYPES_MEMBER),
                        format!("no Default content type for extension '{required}'"),
                    );
                }
            }
        }
        Err(reason) => {
            report.push(IssueKind::InvalidContentTypes, Some(CONTENT_TYPES_MEMBER), reason);
        }
    }
}

/// Extensions declared by `<Default Extension="..."/>` elements.
fn declared_extensions(bytes: &[u8]) -> Result<Vec<String>, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not UTF-8: {e}"))?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let mut reader = Reader::from_str(text);
    let mut extensions = Vec::new();
    let mut saw_types = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"Types" => saw_types = true,
                b"Default" => {
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| e.to_string())?;
                        if attr.key.local_name().as_ref() == b"Extension" {
                            let value = attr.unescape_value().map_err(|e| e.to_string())?;
                            extensions.push(value.into_owned());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
    }

    if !saw_types {
        return Err("missing <Types> root element".to_string());
    }
    Ok(extensions)
}
