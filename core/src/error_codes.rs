//! Stable machine-readable error codes.
//!
//! Codes are part of the public surface: reporting layers key on them, so an
//! existing code is never renamed or reused for a different condition.

pub const EXPORT_INVALID_JSON: &str = "DF_EXPORT_INVALID_JSON";
pub const EXPORT_MALFORMED: &str = "DF_EXPORT_MALFORMED";
pub const EXPORT_TOO_LARGE: &str = "DF_EXPORT_TOO_LARGE";
pub const EXPORT_TOO_MANY_PARTS: &str = "DF_EXPORT_TOO_MANY_PARTS";

pub const PART_MISSING_PATH: &str = "DF_PART_MISSING_PATH";
pub const PART_UNSAFE_PATH: &str = "DF_PART_UNSAFE_PATH";
pub const PART_PAYLOAD_DECODE: &str = "DF_PART_PAYLOAD_DECODE";
pub const PART_TOO_LARGE: &str = "DF_PART_TOO_LARGE";
pub const PART_DUPLICATE_PATH: &str = "DF_PART_DUPLICATE_PATH";

pub const METADATA_PARSE: &str = "DF_METADATA_PARSE";

pub const TEMPLATE_MISSING_MASHUP: &str = "DF_TEMPLATE_MISSING_MASHUP";
pub const TEMPLATE_SERIALIZE: &str = "DF_TEMPLATE_SERIALIZE";
pub const TEMPLATE_ZIP: &str = "DF_TEMPLATE_ZIP";

pub const CONTAINER_IO: &str = "DF_CONTAINER_IO";
pub const CONTAINER_NOT_ZIP: &str = "DF_CONTAINER_NOT_ZIP";
pub const CONTAINER_TOO_MANY_ENTRIES: &str = "DF_CONTAINER_TOO_MANY_ENTRIES";
pub const CONTAINER_PART_TOO_LARGE: &str = "DF_CONTAINER_PART_TOO_LARGE";
pub const CONTAINER_TOTAL_TOO_LARGE: &str = "DF_CONTAINER_TOTAL_TOO_LARGE";
pub const CONTAINER_READ: &str = "DF_CONTAINER_READ";
pub const CONTAINER_FILE_NOT_FOUND: &str = "DF_CONTAINER_FILE_NOT_FOUND";

pub const FS_NOT_FOUND: &str = "DF_FS_NOT_FOUND";
pub const FS_NOT_A_DIRECTORY: &str = "DF_FS_NOT_A_DIRECTORY";
pub const FS_IO: &str = "DF_FS_IO";
