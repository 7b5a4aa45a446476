//! Filesystem layer: decoded item directories and batch processing.
//!
//! The core decode and packaging steps are pure and in-memory. This module
//! wires them to disk the way the conversion workflow lays things out:
//! a source directory of export files becomes `item_NNN/` directories, and
//! dataflow items gain a `.pqt` and move under a dataflows directory. Every
//! write targets a path computed under the directory the caller supplied.

mod batch;
mod item_dir;
mod mapping;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error_codes;

pub use batch::{
    ConvertOutcome, ConvertSummary, DecodeOutcome, DecodeSummary, convert_workspace,
    decode_directory,
};
pub use item_dir::{read_decoded_item, write_decoded_item, write_template};
pub use mapping::{MAPPING_FILE_NAME, MappingEntry, read_mapping, write_mapping};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FsError {
    #[error("path not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    pub fn code(&self) -> &'static str {
        match self {
            FsError::NotFound { .. } => error_codes::FS_NOT_FOUND,
            FsError::NotADirectory { .. } => error_codes::FS_NOT_A_DIRECTORY,
            FsError::Io { .. } => error_codes::FS_IO,
        }
    }
}

pub(crate) fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> FsError + '_ {
    move |source| FsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn require_dir(path: &Path) -> Result<(), FsError> {
    if !path.exists() {
        return Err(FsError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Err(FsError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}
