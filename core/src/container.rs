//! Read access to a ZIP-based template archive.
//!
//! Provides a bounded view over an archive: entry counts and uncompressed
//! sizes are checked against [`ContainerLimits`] before anything is read
//! into memory.

use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::config::ContainerLimits;
use crate::error_codes;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a ZIP container")]
    NotZipContainer,
    #[error("archive has too many entries: {entries} (limit: {max_entries})")]
    TooManyEntries { entries: usize, max_entries: usize },
    #[error("member '{path}' is too large: {size} bytes (limit: {limit} bytes)")]
    PartTooLarge { path: String, size: u64, limit: u64 },
    #[error("total uncompressed size exceeds limit: would exceed {limit} bytes")]
    TotalTooLarge { limit: u64 },
    #[error("failed to read ZIP entry '{path}': {reason}")]
    ZipRead { path: String, reason: String },
    #[error("file not found in archive: {path}")]
    FileNotFound { path: String },
}

impl ContainerError {
    pub fn code(&self) -> &'static str {
        match self {
            ContainerError::Io(_) => error_codes::CONTAINER_IO,
            ContainerError::NotZipContainer => error_codes::CONTAINER_NOT_ZIP,
            ContainerError::TooManyEntries { .. } => error_codes::CONTAINER_TOO_MANY_ENTRIES,
            ContainerError::PartTooLarge { .. } => error_codes::CONTAINER_PART_TOO_LARGE,
            ContainerError::TotalTooLarge { .. } => error_codes::CONTAINER_TOTAL_TOO_LARGE,
            ContainerError::ZipRead { .. } => error_codes::CONTAINER_READ,
            ContainerError::FileNotFound { .. } => error_codes::CONTAINER_FILE_NOT_FOUND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub name: String,
    pub is_dir: bool,
    pub uncompressed_size: u64,
}

pub struct TemplateContainer<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    limits: ContainerLimits,
    total_read: u64,
}

impl<'a> TemplateContainer<'a> {
    pub fn open_with_limits(
        bytes: &'a [u8],
        limits: ContainerLimits,
    ) -> Result<Self, ContainerError> {
        let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|err| match err {
            ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => {
                ContainerError::NotZipContainer
            }
            ZipError::Io(e) => ContainerError::Io(e),
            other => ContainerError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                other.to_string(),
            )),
        })?;

        if archive.len() > limits.max_entries {
            return Err(ContainerError::TooManyEntries {
                entries: archive.len(),
                max_entries: limits.max_entries,
            });
        }

        Ok(Self {
            archive,
            limits,
            total_read: 0,
        })
    }

    /// Entries in central-directory order.
    pub fn entries(&mut self) -> Result<Vec<ContainerEntry>, ContainerError> {
        (0..self.archive.len())
            .map(|idx| -> Result<ContainerEntry, ContainerError> {
                let file = self
                    .archive
                    .by_index_raw(idx)
                    .map_err(|e| zip_read(&format!("#{idx}"), e))?;
                Ok(ContainerEntry {
                    name: file.name().to_string(),
                    is_dir: file.is_dir(),
                    uncompressed_size: file.size(),
                })
            })
            .collect()
    }

    /// Read a member, or `None` when the archive has no member by that name.
    /// Every successful read counts against the total-size budget.
    pub fn read_file_optional_checked(
        &mut self,
        name: &str,
    ) -> Result<Option<Vec<u8>>, ContainerError> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(zip_read(name, e)),
        };

        let size = file.size();
        let total = self.limits.charge(name, size, self.total_read)?;

        let mut buf = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        file.read_to_end(&mut buf).map_err(|e| zip_read(name, e))?;
        self.total_read = total;
        Ok(Some(buf))
    }

    pub fn read_file_checked(&mut self, name: &str) -> Result<Vec<u8>, ContainerError> {
        self.read_file_optional_checked(name)?
            .ok_or_else(|| ContainerError::FileNotFound {
                path: name.to_string(),
            })
    }
}

impl ContainerLimits {
    /// New running total after reading `size` more bytes of member `name`.
    fn charge(&self, name: &str, size: u64, total: u64) -> Result<u64, ContainerError> {
        if size > self.max_part_uncompressed_bytes {
            return Err(ContainerError::PartTooLarge {
                path: name.to_string(),
                size,
                limit: self.max_part_uncompressed_bytes,
            });
        }
        let total = total.saturating_add(size);
        if total > self.max_total_uncompressed_bytes {
            return Err(ContainerError::TotalTooLarge {
                limit: self.max_total_uncompressed_bytes,
            });
        }
        Ok(total)
    }
}

fn zip_read(path: &str, err: impl std::fmt::Display) -> ContainerError {
    ContainerError::ZipRead {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, bytes) in entries {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(bytes).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn rejects_non_zip_bytes() {
        let err = TemplateContainer::open_with_limits(b"definitely not a zip", ContainerLimits::default())
            .err()
            .expect("non-zip should fail");
        assert!(matches!(err, ContainerError::NotZipContainer));
        assert_eq!(err.code(), "DF_CONTAINER_NOT_ZIP");
    }

    #[test]
    fn lists_entries_and_reads_files() {
        let bytes = build_zip(&[("a.json", b"{}"), ("b.pq", b"let x = 1 in x")]);
        let mut container = TemplateContainer::open_with_limits(&bytes, ContainerLimits::default()).unwrap();
        let names: Vec<String> = container.entries().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.json", "b.pq"]);
        assert_eq!(container.read_file_checked("b.pq").unwrap(), b"let x = 1 in x");
        assert!(container.read_file_optional_checked("missing").unwrap().is_none());
        assert!(matches!(
            container.read_file_checked("missing"),
            Err(ContainerError::FileNotFound { .. })
        ));
    }

    #[test]
    fn entry_limit_is_enforced() {
        let bytes = build_zip(&[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        let limits = ContainerLimits {
            max_entries: 2,
            ..ContainerLimits::default()
        };
        let err = TemplateContainer::open_with_limits(&bytes, limits)
            .err()
            .expect("three entries over a limit of two");
        assert!(matches!(
            err,
            ContainerError::TooManyEntries {
                entries: 3,
                max_entries: 2
            }
        ));
    }

    #[test]
    fn part_and_total_limits_are_enforced() {
        let bytes = build_zip(&[("a", b"12345"), ("b", b"12345")]);
        let limits = ContainerLimits {
            max_entries: 10,
            max_part_uncompressed_bytes: 4,
            max_total_uncompressed_bytes: 100,
        };
        let mut container = TemplateContainer::open_with_limits(&bytes, limits).unwrap();
        assert!(matches!(
            container.read_file_checked("a"),
            Err(ContainerError::PartTooLarge { size: 5, .. })
        ));

        let limits = ContainerLimits {
            max_entries: 10,
            max_part_uncompressed_bytes: 100,
            max_total_uncompressed_bytes: 8,
        };
        let mut container = TemplateContainer::open_with_limits(&bytes, limits).unwrap();
        container.read_file_checked("a").unwrap();
        assert!(matches!(
            container.read_file_checked("b"),
            Err(ContainerError::TotalTooLarge { limit: 8 })
        ));
    }
}
