//! Deterministic directory traversal

use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A filesystem object found under a tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Full path (the root joined with the relative path)
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Walks everything strictly below a root.
///
/// Order is depth-first with parents before children and siblings sorted
/// by file name, so the same tree always yields the same sequence. Each
/// call to [`Tree::walk`] starts a fresh traversal.
#[derive(Debug, Clone)]
pub struct Tree {
    root: PathBuf,
    include_directories: bool,
    follow_symlinks: bool,
}

impl Tree {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            include_directories: false,
            follow_symlinks: false,
        }
    }

    pub fn include_directories(mut self, yes: bool) -> Self {
        self.include_directories = yes;
        self
    }

    pub fn follow_symlinks(mut self, yes: bool) -> Self {
        self.follow_symlinks = yes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn walk(&self) -> TreeIter {
        TreeIter {
            inner: WalkDir::new(&self.root)
                .min_depth(1)
                .follow_links(self.follow_symlinks)
                .sort_by_file_name()
                .into_iter(),
            include_directories: self.include_directories,
        }
    }

    /// Collect the whole traversal, stopping at the first error
    pub fn collect(&self) -> Result<Vec<TreeNode>> {
        self.walk().collect()
    }
}

impl<'a> IntoIterator for &'a Tree {
    type Item = Result<TreeNode>;
    type IntoIter = TreeIter;

    fn into_iter(self) -> TreeIter {
        self.walk()
    }
}

pub struct TreeIter {
    inner: walkdir::IntoIter,
    include_directories: bool,
}

impl Iterator for TreeIter {
    type Item = Result<TreeNode>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let file_type = entry.file_type();

            if file_type.is_symlink() {
                warn!("Skipping symlink: {:?}", entry.path());
                continue;
            }
            if file_type.is_dir() {
                if !self.include_directories {
                    continue;
                }
            } else if !file_type.is_file() {
                debug!("Skipping special file: {:?}", entry.path());
                continue;
            }

            return Some(Ok(TreeNode {
                path: entry.into_path(),
                is_dir: file_type.is_dir(),
            }));
        }
    }
}
