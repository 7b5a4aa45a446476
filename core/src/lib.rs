//! Dataflow PQT: turn Fabric Dataflow Gen2 export definitions into Power
//! Query Template (`.pqt`) archives.
//!
//! This crate provides functionality for:
//! - Decoding an export document's base64 parts into a [`DecodedItem`]
//! - Packaging a dataflow item into a deterministic four-member `.pqt`
//! - Validating a `.pqt` archive and reporting every problem found
//! - (with `std-fs`) Batch decode and convert over directories of exports
//!
//! # Quick Start
//!
//! ```no_run
//! use dataflow_pqt::{ExportDecoder, TemplatePackager};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("export.json")?;
//! let item = ExportDecoder::default().decode(&bytes)?;
//! let built = TemplatePackager::default().build(&item)?;
//! assert!(built.report.is_valid());
//! std::fs::write("export.pqt", built.archive.as_bytes())?;
//! # Ok(())
//! # }
//! ```

mod config;
mod container;
pub mod error_codes;
mod export;
mod identity;
mod metadata;
mod part_path;
mod template;
mod validate;
#[cfg(feature = "std-fs")]
pub mod workspace;

pub use config::{ContainerLimits, ConvertConfig, DecodeLimits};
pub use container::{ContainerEntry, ContainerError, TemplateContainer};
pub use export::{
    DecodedItem, DecodedPart, ExportDecoder, ExportDocument, ExportError, ExportPart,
    MASHUP_PART, PLATFORM_PART, PartError, PayloadType, QUERY_METADATA_PART, decode,
};
pub use identity::{ItemIdentity, NOT_AVAILABLE};
pub use metadata::{
    MashupMetadata, MashupQueryMetadata, MetadataParseError, PlatformMetadata, QueryMetadataDoc,
    QueryMetadataEntry, TEMPLATE_VERSION, TemplateMetadata,
};
pub use part_path::{PartPath, PartPathError};
pub use template::{
    BuiltTemplate, CONTENT_TYPES_MEMBER, CONTENT_TYPES_XML, MASHUP_DOCUMENT_MEMBER,
    MASHUP_METADATA_MEMBER, METADATA_MEMBER, TEMPLATE_MEMBERS, TemplateArchive, TemplateError,
    TemplateMembers, TemplatePackager, build,
};
pub use validate::{IssueKind, ValidationIssue, ValidationReport, validate, validate_with_limits};
#[cfg(feature = "std-fs")]
pub use workspace::{FsError, convert_workspace, decode_directory};
