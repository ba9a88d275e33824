//! Remote path type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::api::error::{Result, StoreError};

/// Separator between remote path segments, independent of the local platform.
pub const SEPARATOR: char = '/';

/// A validated, `/`-separated path inside the remote store.
///
/// Leading and trailing separators are trimmed. Empty, `.` and `..` segments
/// are rejected. The empty path is the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let trimmed = raw.trim_matches(SEPARATOR);

        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        for segment in trimmed.split(SEPARATOR) {
            match segment {
                "" => return Err(StoreError::invalid_path(raw, "empty path segment")),
                "." | ".." => {
                    return Err(StoreError::invalid_path(raw, "relative path segment"))
                }
                _ => {}
            }
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a local root-relative path onto this path.
    ///
    /// Fails for absolute paths, `..` components and non UTF-8 names.
    pub fn join_relative(&self, relative: &Path) -> Result<Self> {
        let mut joined = self.0.clone();

        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        StoreError::invalid_path(relative.display().to_string(), "not valid UTF-8")
                    })?;
                    if name.contains(SEPARATOR) {
                        return Err(StoreError::invalid_path(name, "separator inside file name"));
                    }
                    if !joined.is_empty() {
                        joined.push(SEPARATOR);
                    }
                    joined.push_str(name);
                }
                Component::CurDir => {}
                _ => {
                    return Err(StoreError::invalid_path(
                        relative.display().to_string(),
                        "path escapes the sync root",
                    ))
                }
            }
        }

        if joined.len() == self.0.len() {
            return Err(StoreError::invalid_path(
                relative.display().to_string(),
                "empty relative path",
            ));
        }

        Ok(Self(joined))
    }

    /// The part of this path below `prefix`.
    ///
    /// Matches on whole segments only: `siasync-old/a` is not below `siasync`.
    pub fn strip_prefix(&self, prefix: &RemotePath) -> Option<&str> {
        if prefix.is_root() {
            return if self.is_root() { None } else { Some(&self.0) };
        }

        self.0
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .filter(|rest| !rest.is_empty())
    }

    /// Convert the segments below `prefix` into a local relative path.
    pub fn relative_to(&self, prefix: &RemotePath) -> Option<PathBuf> {
        self.strip_prefix(prefix)
            .map(|rest| rest.split(SEPARATOR).collect::<PathBuf>())
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}
