//! Packaging of one directory tree into one jar

use super::tree::Tree;
use super::writer::JarWriter;
use super::{ArchivePath, Compression};
use crate::manifest::{Manifest, MANIFEST_PATH};
use crate::utils::modified_time;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for jar packaging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JarOptions {
    /// Compression for file entries
    pub compression: Compression,
    /// Package symlink targets instead of skipping links
    pub follow_symlinks: bool,
}

/// What a packaging run wrote, manifest excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarSummary {
    pub output: PathBuf,
    pub files: usize,
    pub directories: usize,
}

/// Package every file and directory below `source_root` into `output`.
///
/// Entries follow the deterministic [`Tree`] order after the manifest. A
/// `META-INF/MANIFEST.MF` inside the tree is dropped in favour of the
/// generated one. Any failure aborts the run; whatever was already written
/// stays on disk as a finalised partial archive.
pub fn assemble_jar<P: AsRef<Path>, Q: AsRef<Path>>(
    source_root: P,
    output: Q,
    manifest: &Manifest,
    options: &JarOptions,
) -> Result<JarSummary> {
    let source_root = source_root.as_ref();
    let output = output.as_ref();

    if !source_root.exists() {
        return Err(Error::NotFound(format!(
            "source directory {:?}",
            source_root
        )));
    }
    if !source_root.is_dir() {
        return Err(Error::InvalidPath(format!(
            "{:?} is not a directory",
            source_root
        )));
    }

    info!("Packaging {:?} into {:?}", source_root, output);

    let mut writer = JarWriter::create(output, manifest, options.compression)?;
    // The output may live inside the tree being packaged
    let own_output = fs::canonicalize(output)?;
    let mut files = 0;
    let mut directories = 0;

    let tree = Tree::new(source_root)
        .include_directories(true)
        .follow_symlinks(options.follow_symlinks);

    for node in tree.walk() {
        let node = node?;
        let relative = node.path.strip_prefix(source_root).map_err(|_| {
            Error::InvalidPath(format!("{:?} is outside {:?}", node.path, source_root))
        })?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let path = ArchivePath::from_relative(relative, node.is_dir)?;
        if path.as_str() == MANIFEST_PATH {
            debug!("Replacing {:?} with the generated manifest", node.path);
            continue;
        }

        if !node.is_dir
            && node.path.file_name() == own_output.file_name()
            && fs::canonicalize(&node.path).ok().as_deref() == Some(&*own_output)
        {
            debug!("Skipping the jar being written: {:?}", node.path);
            continue;
        }

        let mtime = modified_time(&node.path);
        if node.is_dir {
            writer.put_entry(&path, mtime, None)?;
            directories += 1;
        } else {
            writer.put_entry(&path, mtime, Some(&node.path))?;
            files += 1;
        }
    }

    let output = writer.finish()?;
    info!(
        "Packaged {} files and {} directories into {:?}",
        files, directories, output
    );

    Ok(JarSummary {
        output,
        files,
        directories,
    })
}
