//! Power Query Template (`.pqt`) packaging.
//!
//! A template is a ZIP archive with exactly four root members, written in a
//! fixed order with fixed timestamps so that identical input produces
//! identical bytes.

use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::config::ContainerLimits;
use crate::error_codes;
use crate::export::{DecodedItem, MASHUP_PART, PLATFORM_PART, QUERY_METADATA_PART};
use crate::metadata::{
    MashupMetadata, MetadataParseError, PlatformMetadata, QueryMetadataDoc, TemplateMetadata,
};
use crate::validate::{ValidationReport, validate_with_limits};

pub const MASHUP_DOCUMENT_MEMBER: &str = "MashupDocument.pq";
pub const MASHUP_METADATA_MEMBER: &str = "MashupMetadata.json";
pub const METADATA_MEMBER: &str = "Metadata.json";
pub const CONTENT_TYPES_MEMBER: &str = "[Content_Types].xml";

/// Archive members in the order they are written.
pub const TEMPLATE_MEMBERS: [&str; 4] = [
    MASHUP_DOCUMENT_MEMBER,
    MASHUP_METADATA_MEMBER,
    METADATA_MEMBER,
    CONTENT_TYPES_MEMBER,
];

pub const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="json" ContentType="application/json" />
  <Default Extension="pq" ContentType="application/x-ms-m" />
</Types>"#;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateError {
    #[error("item has no mashup.pq part; it is not a dataflow")]
    MissingMashup,
    #[error("failed to serialize {member}: {reason}")]
    Serialize { member: &'static str, reason: String },
    #[error("failed to write template archive: {0}")]
    Zip(String),
}

impl TemplateError {
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::MissingMashup => error_codes::TEMPLATE_MISSING_MASHUP,
            TemplateError::Serialize { .. } => error_codes::TEMPLATE_SERIALIZE,
            TemplateError::Zip(_) => error_codes::TEMPLATE_ZIP,
        }
    }
}

impl From<zip::result::ZipError> for TemplateError {
    fn from(err: zip::result::ZipError) -> Self {
        TemplateError::Zip(err.to_string())
    }
}

impl From<std::io::Error> for TemplateError {
    fn from(err: std::io::Error) -> Self {
        TemplateError::Zip(err.to_string())
    }
}

/// The serialized contents of the four members, before zipping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMembers {
    pub mashup_document: Vec<u8>,
    pub mashup_metadata_json: Vec<u8>,
    pub metadata_json: Vec<u8>,
    /// Metadata documents that were present but unreadable and were
    /// replaced by the empty object.
    pub warnings: Vec<MetadataParseError>,
}

impl TemplateMembers {
    pub fn entries(&self) -> [(&'static str, &[u8]); 4] {
        [
            (MASHUP_DOCUMENT_MEMBER, self.mashup_document.as_slice()),
            (MASHUP_METADATA_MEMBER, self.mashup_metadata_json.as_slice()),
            (METADATA_MEMBER, self.metadata_json.as_slice()),
            (CONTENT_TYPES_MEMBER, CONTENT_TYPES_XML.as_bytes()),
        ]
    }
}

/// A finished `.pqt` archive. Only [`TemplatePackager`] creates these, so
/// every instance holds all four members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateArchive {
    bytes: Vec<u8>,
}

impl TemplateArchive {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BuiltTemplate {
    pub archive: TemplateArchive,
    pub report: ValidationReport,
    pub warnings: Vec<MetadataParseError>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplatePackager {
    limits: ContainerLimits,
}

impl TemplatePackager {
    pub fn new(limits: ContainerLimits) -> Self {
        Self { limits }
    }

    /// Serialize the four members without zipping them.
    pub fn render_members(&self, item: &DecodedItem) -> Result<TemplateMembers, TemplateError> {
        let mashup = item.get(MASHUP_PART).ok_or(TemplateError::MissingMashup)?;

        let mut warnings = Vec::new();

        let (queries, err) = QueryMetadataDoc::parse(item.content(QUERY_METADATA_PART));
        warnings.extend(err);
        let mashup_metadata = MashupMetadata::from(&queries);

        let (platform, err) = PlatformMetadata::parse(item.content(PLATFORM_PART));
        warnings.extend(err);
        let metadata = TemplateMetadata::from(&platform);

        for warning in &warnings {
            warn!(code = warning.code(), "{warning}; using an empty object");
        }

        Ok(TemplateMembers {
            mashup_document: mashup.content.clone(),
            mashup_metadata_json: to_json(MASHUP_METADATA_MEMBER, &mashup_metadata)?,
            metadata_json: to_json(METADATA_MEMBER, &metadata)?,
            warnings,
        })
    }

    pub fn build(&self, item: &DecodedItem) -> Result<BuiltTemplate, TemplateError> {
        let members = self.render_members(item)?;
        let bytes = write_archive(&members)?;
        let report = validate_with_limits(&bytes, self.limits);
        if !report.is_valid() {
            warn!(issues = report.issues.len(), "template failed validation");
        }
        debug!(bytes = bytes.len(), queries = report.query_count, "built template");

        Ok(BuiltTemplate {
            archive: TemplateArchive { bytes },
            report,
            warnings: members.warnings,
        })
    }
}

fn to_json<T: serde::Serialize>(member: &'static str, value: &T) -> Result<Vec<u8>, TemplateError> {
    serde_json::to_vec_pretty(value).map_err(|e| TemplateError::Serialize {
        member,
        reason: e.to_string(),
    })
}

fn write_archive(members: &TemplateMembers) -> Result<Vec<u8>, TemplateError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    for (name, bytes) in members.entries() {
        writer.start_file(name, options)?;
        writer.write_all(bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Build with default limits.
pub fn build(item: &DecodedItem) -> Result<BuiltTemplate, TemplateError> {
    TemplatePackager::default().build(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::DecodedPart;
    use crate::identity::ItemIdentity;
    use crate::part_path::PartPath;

    fn item(parts: &[(&str, &[u8])]) -> DecodedItem {
        DecodedItem::from_parts(
            parts
                .iter()
                .map(|(path, bytes)| DecodedPart::new(PartPath::parse(path).unwrap(), bytes.to_vec())),
            ItemIdentity::default(),
        )
    }

    #[test]
    fn missing_mashup_is_rejected() {
        let err = build(&item(&[("queryMetadata.json", b"{}")])).expect_err("no mashup part");
        assert!(matches!(err, TemplateError::MissingMashup));
        assert_eq!(err.code(), "DF_TEMPLATE_MISSING_MASHUP");
    }

    #[test]
    fn mashup_is_copied_verbatim() {
        let source = b"section Section1;\r\nshared Q = \"\xC3\xA9\";\r\n";
        let members = TemplatePackager::default()
            .render_members(&item(&[("mashup.pq", source)]))
            .unwrap();
        assert_eq!(members.mashup_document, source.to_vec());
    }

    #[test]
    fn mashup_metadata_is_pretty_printed() {
        let members = TemplatePackager::default()
            .render_members(&item(&[
                ("mashup.pq", b"m"),
                (
                    "queryMetadata.json",
                    br#"{"queriesMetadata": {"Q1": {"queryId": "id-1", "queryName": "Q1"}}}"#,
                ),
            ]))
            .unwrap();
        let expected = "{\n  \"QueryGroups\": [],\n  \"QueriesMetadata\": [\n    {\n      \"QueryId\": \"id-1\",\n      \"QueryName\": \"Q1\"\n    }\n  ]\n}";
        assert_eq!(String::from_utf8(members.mashup_metadata_json).unwrap(), expected);
    }

    #[test]
    fn absent_metadata_parts_use_defaults() {
        let members = TemplatePackager::default()
            .render_members(&item(&[("mashup.pq", b"m")]))
            .unwrap();
        assert!(members.warnings.is_empty());
        let meta: serde_json::Value = serde_json::from_slice(&members.metadata_json).unwrap();
        assert_eq!(
            meta,
            serde_json::json!({"Name": "", "Description": "", "Version": "1.0.0.0"})
        );
        let mashup: serde_json::Value =
            serde_json::from_slice(&members.mashup_metadata_json).unwrap();
        assert_eq!(mashup, serde_json::json!({"QueryGroups": [], "QueriesMetadata": []}));
    }

    #[test]
    fn unreadable_metadata_becomes_warning() {
        let built = build(&item(&[
            ("mashup.pq", b"m"),
            ("queryMetadata.json", b"{broken"),
            (".platform", b"also broken"),
        ]))
        .expect("bad metadata must not fail the build");
        let parts: Vec<&str> = built.warnings.iter().map(|w| w.part.as_str()).collect();
        assert_eq!(parts, vec!["queryMetadata.json", ".platform"]);
        assert!(built.report.is_valid());
    }

    #[test]
    fn build_is_byte_reproducible() {
        let source = item(&[
            ("mashup.pq", b"section Section1;"),
            (
                "queryMetadata.json",
                br#"{"queriesMetadata": {"B": {"queryId": "2"}, "A": {"queryId": "1"}}}"#,
            ),
            (".platform", br#"{"metadata": {"displayName": "Run"}}"#),
        ]);
        let first = build(&source).unwrap();
        let second = build(&source).unwrap();
        assert_eq!(first.archive, second.archive);
        assert!(first.report.is_valid(), "{:?}", first.report.issues);
        assert_eq!(first.report.query_count, 2);
    }
}
