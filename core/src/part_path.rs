//! Relative part paths that are safe to join onto a destination root.
//!
//! Export documents name their parts with free-form strings. Before any of
//! them reaches a writer they are normalized here: separators become `/`,
//! leading slashes and `.` segments are dropped, and anything that could
//! resolve outside the item directory (`..`, a `:` in any segment, NUL) is
//! refused.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PartPathError {
    #[error("part path is empty")]
    Empty,
    #[error("part path '{0}' escapes the item root")]
    Traversal(String),
    #[error("part path '{0}' contains ':' (drive prefix or data stream)")]
    Prefixed(String),
    #[error("part path '{0}' contains a NUL byte")]
    Nul(String),
}

/// Normalized, root-relative path of one part (never starts with `/`,
/// never contains `..`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PartPath(String);

impl PartPath {
    pub fn parse(raw: &str) -> Result<Self, PartPathError> {
        if raw.contains('\0') {
            return Err(PartPathError::Nul(raw.to_string()));
        }

        let unified = raw.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in unified
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
        {
            if segment == ".." {
                return Err(PartPathError::Traversal(raw.to_string()));
            }
            // A drive prefix in any segment replaces the joined path on
            // Windows; `name:stream` addresses an NTFS data stream.
            if segment.contains(':') {
                return Err(PartPathError::Prefixed(raw.to_string()));
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(PartPathError::Empty);
        }
        Ok(PartPath(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Join onto `root` one segment at a time so the result is always a
    /// descendant of `root`.
    pub fn resolve_under(&self, root: &Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for segment in self.0.split('/') {
            out.push(segment);
        }
        out
    }
}

impl fmt::Display for PartPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PartPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(PartPath::parse("mashup.pq").unwrap().as_str(), "mashup.pq");
        assert_eq!(PartPath::parse(".platform").unwrap().as_str(), ".platform");
        assert_eq!(
            PartPath::parse("Content/sub/file.json").unwrap().as_str(),
            "Content/sub/file.json"
        );
    }

    #[test]
    fn separators_and_dot_segments_are_normalized() {
        assert_eq!(
            PartPath::parse("/Content\\.\\a//b.json").unwrap().as_str(),
            "Content/a/b.json"
        );
        assert_eq!(PartPath::parse("./mashup.pq").unwrap().as_str(), "mashup.pq");
    }

    #[test]
    fn parent_segments_are_rejected() {
        assert!(matches!(
            PartPath::parse("../../evil.txt"),
            Err(PartPathError::Traversal(_))
        ));
        assert!(matches!(
            PartPath::parse("a/../../evil.txt"),
            Err(PartPathError::Traversal(_))
        ));
        assert!(matches!(
            PartPath::parse("..\\evil.txt"),
            Err(PartPathError::Traversal(_))
        ));
    }

    #[test]
    fn absolute_paths_stay_under_root() {
        let path = PartPath::parse("/etc/passwd").unwrap();
        assert_eq!(path.as_str(), "etc/passwd");
        let root = Path::new("/tmp/item_001");
        assert!(path.resolve_under(root).starts_with(root));
    }

    #[test]
    fn drive_prefixes_and_nul_are_rejected() {
        assert!(matches!(
            PartPath::parse("C:\\Windows\\evil.dll"),
            Err(PartPathError::Prefixed(_))
        ));
        assert!(matches!(PartPath::parse("a\0b"), Err(PartPathError::Nul(_))));
    }

    #[test]
    fn colons_are_rejected_in_any_segment() {
        for raw in ["a/C:evil.txt", "sub\\D:\\x", "sub/D:\\x\\y", "notes.txt:stream"] {
            assert!(
                matches!(PartPath::parse(raw), Err(PartPathError::Prefixed(_))),
                "{raw} should be refused"
            );
        }
    }

    #[test]
    fn empty_paths_are_rejected() {
        assert_eq!(PartPath::parse(""), Err(PartPathError::Empty));
        assert_eq!(PartPath::parse("/./"), Err(PartPathError::Empty));
    }

    #[test]
    fn file_name_is_last_segment() {
        assert_eq!(PartPath::parse("a/b/c.pq").unwrap().file_name(), "c.pq");
        assert_eq!(PartPath::parse("c.pq").unwrap().file_name(), "c.pq");
    }
}
