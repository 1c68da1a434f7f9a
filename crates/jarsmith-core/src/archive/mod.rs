//! Archive operations module

pub mod jar;
pub mod merge;
pub mod tree;
pub mod uber;
pub mod writer;

pub use jar::{assemble_jar, JarOptions, JarSummary};
pub use merge::{
    Conflict, ConflictNotice, ConflictOutcome, ConflictResolver, MergePolicy, PolicyName,
    Resolution,
};
pub use tree::{Tree, TreeNode};
pub use uber::{assemble_uber, default_excludes, UberOptions, UberReport, DEFAULT_EXCLUDES};
pub use writer::JarWriter;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

/// Normalised forward-slash path of an archive entry.
///
/// Directory paths end in `/`. Construction rejects anything that would
/// escape the archive root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Build from a path relative to the archive root
    pub fn from_relative(relative: &Path, is_dir: bool) -> Result<Self> {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        Error::InvalidPath(format!("{:?} is not valid UTF-8", relative))
                    })?;
                    parts.push(part);
                }
                Component::CurDir => {}
                _ => {
                    return Err(Error::InvalidPath(format!(
                        "{:?} is not a relative archive path",
                        relative
                    )))
                }
            }
        }

        if parts.is_empty() {
            return Err(Error::InvalidPath("empty archive path".to_string()));
        }

        let mut path = parts.join("/");
        if is_dir {
            path.push('/');
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_dir(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The path without the directory marker, as glob patterns see it
    pub fn trimmed(&self) -> &str {
        self.0.trim_end_matches('/')
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compression applied to file entries; directories are always stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Store,
}

impl Compression {
    pub(crate) fn method(self) -> zip::CompressionMethod {
        match self {
            Compression::Deflate => zip::CompressionMethod::Deflated,
            Compression::Store => zip::CompressionMethod::Stored,
        }
    }
}
