//! Path-collision handling while flattening sources into a staging tree
//!
//! Every staged file, whether it came out of a jar or a plain directory,
//! goes through [`Stager::stage_file`]. When the destination already holds
//! a regular file the configured [`MergePolicy`] decides what happens and
//! the collision is recorded as a [`ConflictNotice`].
//!
//! Staged files and directories carry the modification time of their
//! source, or the DOS epoch when the source has none, so packaging the
//! staging tree gives the same bytes on every run.

use super::tree::Tree;
use super::ArchivePath;
use crate::utils::dos_epoch;
use crate::{Error, Result};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// A collision between an incoming file and one already staged
#[derive(Debug)]
pub struct Conflict<'a> {
    pub path: &'a ArchivePath,
    /// Library path (or directory) the incoming file comes from
    pub source: &'a Path,
    /// Source that staged the existing file, if it came from this run
    pub previous_source: Option<&'a Path>,
    /// The existing file on disk
    pub staged: &'a Path,
    pub incoming: &'a [u8],
}

/// Decision of a [`ConflictResolver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Replace the staged file with the incoming one
    Overwrite,
    /// Leave the staged file untouched
    Keep,
    /// Stage these bytes instead of either side
    Replace(Vec<u8>),
    /// Stop the build with [`Error::MergeConflict`]
    Abort,
}

/// Caller-supplied conflict handling
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> Result<Resolution>;
}

/// How colliding paths are merged across sources
#[derive(Default)]
pub enum MergePolicy {
    /// Later sources replace earlier ones
    #[default]
    LastWins,
    /// The first source to stage a path keeps it
    FirstWins,
    /// Any collision aborts the build
    ErrorOnConflict,
    Custom(Box<dyn ConflictResolver>),
}

impl MergePolicy {
    pub fn custom<R: ConflictResolver + 'static>(resolver: R) -> Self {
        MergePolicy::Custom(Box::new(resolver))
    }
}

impl fmt::Debug for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::LastWins => f.write_str("LastWins"),
            MergePolicy::FirstWins => f.write_str("FirstWins"),
            MergePolicy::ErrorOnConflict => f.write_str("ErrorOnConflict"),
            MergePolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The policies that can be named in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyName {
    #[default]
    LastWins,
    FirstWins,
    ErrorOnConflict,
}

impl From<PolicyName> for MergePolicy {
    fn from(name: PolicyName) -> Self {
        match name {
            PolicyName::LastWins => MergePolicy::LastWins,
            PolicyName::FirstWins => MergePolicy::FirstWins,
            PolicyName::ErrorOnConflict => MergePolicy::ErrorOnConflict,
        }
    }
}

/// What was done about a collision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    Overwritten,
    Kept,
    Replaced,
}

/// Non-fatal record of a collision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictNotice {
    pub path: ArchivePath,
    pub source: PathBuf,
    pub previous_source: Option<PathBuf>,
    pub outcome: ConflictOutcome,
}

/// Writes files into a staging root under a merge policy
pub(crate) struct Stager<'p> {
    root: PathBuf,
    policy: &'p mut MergePolicy,
    excludes: Vec<Pattern>,
    origins: HashMap<ArchivePath, PathBuf>,
    dir_times: HashMap<ArchivePath, SystemTime>,
    conflicts: Vec<ConflictNotice>,
}

const EXCLUDE_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl<'p> Stager<'p> {
    pub(crate) fn new(
        root: &Path,
        policy: &'p mut MergePolicy,
        excludes: &[String],
    ) -> Result<Self> {
        let excludes = excludes
            .iter()
            .map(|glob| {
                Pattern::new(glob).map_err(|e| {
                    Error::Config(format!("invalid exclude pattern {:?}: {}", glob, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            policy,
            excludes,
            origins: HashMap::new(),
            dir_times: HashMap::new(),
            conflicts: Vec::new(),
        })
    }

    fn is_excluded(&self, path: &ArchivePath) -> bool {
        self.excludes
            .iter()
            .any(|pattern| pattern.matches_with(path.trimmed(), EXCLUDE_MATCH))
    }

    fn destination(&self, path: &ArchivePath) -> PathBuf {
        self.root.join(path.trimmed())
    }

    /// Later sources replace the recorded time of a directory they share
    pub(crate) fn stage_dir(
        &mut self,
        path: &ArchivePath,
        mtime: Option<SystemTime>,
    ) -> Result<()> {
        if self.is_excluded(path) {
            debug!("Excluded directory: {}", path);
            return Ok(());
        }
        fs::create_dir_all(self.destination(path))?;
        if let Some(mtime) = mtime {
            self.dir_times.insert(path.clone(), mtime);
        }
        Ok(())
    }

    /// Stamp every staged directory with its recorded time.
    ///
    /// Must run after the last file is staged: writing a child resets the
    /// modification time of its parent.
    pub(crate) fn settle_directories(&self) -> Result<()> {
        for node in Tree::new(&self.root).include_directories(true).walk() {
            let node = node?;
            if !node.is_dir {
                continue;
            }
            let Ok(relative) = node.path.strip_prefix(&self.root) else {
                continue;
            };
            let path = ArchivePath::from_relative(relative, true)?;
            let mtime = self.dir_times.get(&path).copied().unwrap_or_else(dos_epoch);
            filetime::set_file_mtime(&node.path, filetime::FileTime::from_system_time(mtime))?;
        }
        Ok(())
    }

    /// The single write primitive for staged files
    pub(crate) fn stage_file(
        &mut self,
        path: &ArchivePath,
        content: Vec<u8>,
        mtime: Option<SystemTime>,
        source: &Path,
    ) -> Result<()> {
        if self.is_excluded(path) {
            debug!("Excluded: {} from {:?}", path, source);
            return Ok(());
        }

        let destination = self.destination(path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = content;
        if destination.is_file() {
            let previous_source = self.origins.get(path).cloned();
            let resolution = {
                let conflict = Conflict {
                    path,
                    source,
                    previous_source: previous_source.as_deref(),
                    staged: &destination,
                    incoming: &content,
                };
                match &mut *self.policy {
                    MergePolicy::LastWins => Resolution::Overwrite,
                    MergePolicy::FirstWins => Resolution::Keep,
                    MergePolicy::ErrorOnConflict => Resolution::Abort,
                    MergePolicy::Custom(resolver) => resolver.resolve(&conflict)?,
                }
            };

            let outcome = match resolution {
                Resolution::Overwrite => ConflictOutcome::Overwritten,
                Resolution::Keep => ConflictOutcome::Kept,
                Resolution::Replace(bytes) => {
                    content = bytes;
                    ConflictOutcome::Replaced
                }
                Resolution::Abort => {
                    return Err(Error::MergeConflict {
                        path: path.to_string(),
                        origin: source.to_path_buf(),
                    })
                }
            };

            warn!(
                "Conflict on {} from {:?} (previously {:?}): {:?}",
                path, source, previous_source, outcome
            );
            self.conflicts.push(ConflictNotice {
                path: path.clone(),
                source: source.to_path_buf(),
                previous_source,
                outcome,
            });

            if outcome == ConflictOutcome::Kept {
                return Ok(());
            }
        }

        fs::write(&destination, &content)?;
        let mtime = mtime.unwrap_or_else(dos_epoch);
        filetime::set_file_mtime(&destination, filetime::FileTime::from_system_time(mtime))?;
        self.origins.insert(path.clone(), source.to_path_buf());
        debug!("Staged {} from {:?}", path, source);

        Ok(())
    }

    pub(crate) fn into_conflicts(self) -> Vec<ConflictNotice> {
        self.conflicts
    }
}
