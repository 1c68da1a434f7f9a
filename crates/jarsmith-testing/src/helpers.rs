//! Helper utilities for jarsmith testing

use anyhow::Result;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Installs a test-friendly tracing subscriber once per process.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Entry names of an archive in stored order
pub fn entry_names(archive_path: &Path) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

/// All entries of an archive keyed by name; directories map to empty content
pub fn read_entries(archive_path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        entries.insert(entry.name().to_string(), content);
    }
    Ok(entries)
}

/// Names of file (non-directory) entries, manifest excluded
pub fn file_entry_names(archive_path: &Path) -> Result<Vec<String>> {
    Ok(entry_names(archive_path)?
        .into_iter()
        .filter(|name| !name.ends_with('/') && name != "META-INF/MANIFEST.MF")
        .collect())
}

/// Blake3 digest of a whole file, hex encoded
pub fn digest(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Pins the modification time of every path to `secs` after the epoch
pub fn pin_mtimes<P: AsRef<Path>>(paths: &[P], secs: u64) -> Result<()> {
    let time =
        filetime::FileTime::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(secs));
    for path in paths {
        filetime::set_file_mtime(path.as_ref(), time)?;
    }
    Ok(())
}

/// Pins the modification time of a tree root and everything below it
pub fn pin_tree_mtimes(root: &Path, secs: u64) -> Result<()> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        paths.push(entry?.into_path());
    }
    // Children first so directory times are not disturbed afterwards
    paths.reverse();
    pin_mtimes(&paths, secs)
}
