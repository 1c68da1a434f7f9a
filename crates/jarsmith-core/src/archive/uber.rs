//! Uberjar assembly
//!
//! Library jars, library directories and the local class output are
//! exploded one after another, in caller order, into a single staging
//! tree. Collisions go through the [`MergePolicy`]; the finished tree is
//! then packaged by [`assemble_jar`]. Directory times are settled from
//! their sources before packaging so rebuilds are byte-identical.
//!
//! The staging tree is a temporary directory removed on both success and
//! failure unless [`UberOptions::keep_staging`] is set.

use super::jar::{assemble_jar, JarOptions, JarSummary};
use super::merge::{ConflictNotice, MergePolicy, Stager};
use super::tree::Tree;
use super::ArchivePath;
use crate::manifest::Manifest;
use crate::utils::{is_archive_path, modified_time, system_time_from_zip};
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Manifest and signature files that do not survive flattening
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "META-INF/*.MF",
    "META-INF/*.SF",
    "META-INF/*.RSA",
    "META-INF/*.DSA",
];

pub fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

/// Options for uberjar assembly
#[derive(Debug)]
pub struct UberOptions {
    pub merge_policy: MergePolicy,
    /// Leave the staging directory on disk and report its location
    pub keep_staging: bool,
    /// Parent for the staging directory (system temp dir when `None`)
    pub staging_root: Option<PathBuf>,
    /// Glob patterns of archive paths never staged
    pub exclude: Vec<String>,
    pub jar: JarOptions,
}

impl Default for UberOptions {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            keep_staging: false,
            staging_root: None,
            exclude: default_excludes(),
            jar: JarOptions::default(),
        }
    }
}

/// Result of an uberjar build
#[derive(Debug, Clone)]
pub struct UberReport {
    pub jar: JarSummary,
    /// Collisions in the order they were met
    pub conflicts: Vec<ConflictNotice>,
    /// Location of the retained staging tree when `keep_staging` was set
    pub staging_dir: Option<PathBuf>,
}

/// Build `output` from `libraries` followed by `class_dir`.
///
/// Later sources win collisions under the default policy, so the order of
/// `libraries` is significant and is never changed.
pub fn assemble_uber<L: AsRef<Path>, C: AsRef<Path>, O: AsRef<Path>>(
    libraries: &[L],
    class_dir: C,
    output: O,
    manifest: &Manifest,
    options: UberOptions,
) -> Result<UberReport> {
    let class_dir = class_dir.as_ref();
    let output = output.as_ref();
    let UberOptions {
        mut merge_policy,
        keep_staging,
        staging_root,
        exclude,
        jar,
    } = options;

    let staging = create_staging(staging_root.as_deref())?;
    info!(
        "Assembling uberjar {:?} from {} libraries via {:?}",
        output,
        libraries.len(),
        staging.path()
    );

    let result = stage_and_package(
        staging.path(),
        libraries,
        class_dir,
        output,
        manifest,
        &mut merge_policy,
        &exclude,
        &jar,
    );
    let staging_dir = release_staging(staging, keep_staging);

    match result {
        Ok((jar, conflicts)) => {
            info!(
                "Uberjar {:?} written with {} conflicts",
                jar.output,
                conflicts.len()
            );
            Ok(UberReport {
                jar,
                conflicts,
                staging_dir,
            })
        }
        Err(e) => {
            if let Some(dir) = &staging_dir {
                warn!("Uberjar failed, staging directory kept at {:?}", dir);
            }
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn stage_and_package<L: AsRef<Path>>(
    staging_root: &Path,
    libraries: &[L],
    class_dir: &Path,
    output: &Path,
    manifest: &Manifest,
    policy: &mut MergePolicy,
    exclude: &[String],
    jar: &JarOptions,
) -> Result<(JarSummary, Vec<ConflictNotice>)> {
    let mut stager = Stager::new(staging_root, policy, exclude)?;

    for library in libraries {
        explode(&mut stager, library.as_ref(), jar.follow_symlinks)?;
    }
    if !class_dir.is_dir() {
        return Err(Error::NotFound(format!("class directory {:?}", class_dir)));
    }
    explode_directory(&mut stager, class_dir, jar.follow_symlinks)?;
    stager.settle_directories()?;

    let conflicts = stager.into_conflicts();
    let summary = assemble_jar(staging_root, output, manifest, jar)?;
    Ok((summary, conflicts))
}

fn explode(stager: &mut Stager<'_>, library: &Path, follow_symlinks: bool) -> Result<()> {
    if !library.exists() {
        return Err(Error::NotFound(format!("library path {:?}", library)));
    }

    if library.is_dir() {
        explode_directory(stager, library, follow_symlinks)
    } else if is_archive_path(library) {
        explode_archive(stager, library)
    } else {
        warn!("Skipping library that is neither a directory nor a jar: {:?}", library);
        Ok(())
    }
}

fn explode_archive(stager: &mut Stager<'_>, library: &Path) -> Result<()> {
    debug!("Exploding jar {:?}", library);

    let file = File::open(library)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::ArchiveFormat(format!("{:?}: {}", library, e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::ArchiveFormat(format!("{:?}: {}", library, e)))?;

        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!("Skipping unsafe entry {:?} in {:?}", entry.name(), library);
            continue;
        };
        let is_dir = entry.is_dir();
        let path = match ArchivePath::from_relative(&relative, is_dir) {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping entry {:?} in {:?}: {}", entry.name(), library, e);
                continue;
            }
        };

        let mtime = entry.last_modified().and_then(system_time_from_zip);
        if is_dir {
            stager.stage_dir(&path, mtime)?;
            continue;
        }

        let mut content = Vec::with_capacity(entry.size().min(64 * 1024 * 1024) as usize);
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::ArchiveFormat(format!("{:?}: {}: {}", library, path, e)))?;

        stager.stage_file(&path, content, mtime, library)?;
    }

    Ok(())
}

/// Copy a directory tree into the staging root through the merge primitive
pub(crate) fn explode_directory(
    stager: &mut Stager<'_>,
    dir: &Path,
    follow_symlinks: bool,
) -> Result<()> {
    debug!("Copying directory {:?}", dir);

    let tree = Tree::new(dir)
        .include_directories(true)
        .follow_symlinks(follow_symlinks);

    for node in tree.walk() {
        let node = node?;
        let relative = node
            .path
            .strip_prefix(dir)
            .map_err(|_| Error::InvalidPath(format!("{:?} is outside {:?}", node.path, dir)))?;
        let path = ArchivePath::from_relative(relative, node.is_dir)?;

        if node.is_dir {
            stager.stage_dir(&path, modified_time(&node.path))?;
        } else {
            let content = fs::read(&node.path)?;
            stager.stage_file(&path, content, modified_time(&node.path), dir)?;
        }
    }

    Ok(())
}

fn create_staging(staging_root: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("jarsmith-uber-");

    let dir = match staging_root {
        Some(root) => {
            fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

fn release_staging(staging: TempDir, keep: bool) -> Option<PathBuf> {
    if keep {
        let path = staging.keep();
        info!("Keeping staging directory {:?}", path);
        return Some(path);
    }

    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!("Failed to remove staging directory {:?}: {}", path, e);
    }
    None
}
