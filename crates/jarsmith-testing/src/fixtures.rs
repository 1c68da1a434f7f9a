//! Common test fixtures for jarsmith testing

use crate::TestDir;
use anyhow::{anyhow, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Timestamp stamped on every entry written by [`write_jar`]
pub const JAR_ENTRY_TIME: (u16, u8, u8, u8, u8, u8) = (2020, 1, 2, 3, 4, 6);

/// [`JAR_ENTRY_TIME`] as seconds since the Unix epoch (UTC)
pub const JAR_ENTRY_EPOCH_SECS: i64 = 1_577_934_246;

/// Writes a library jar holding `entries` in the given order.
///
/// Names ending in `/` become directory entries; everything else is a
/// deflated file entry.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let (year, month, day, hour, minute, second) = JAR_ENTRY_TIME;
    let time = DateTime::from_date_and_time(year, month, day, hour, minute, second)
        .map_err(|_| anyhow!("invalid fixture timestamp"))?;

    let mut zip = ZipWriter::new(File::create(path)?);
    for (name, content) in entries {
        if name.ends_with('/') {
            let options = FileOptions::<'static, ()>::default().last_modified_time(time);
            zip.add_directory(*name, options)?;
        } else {
            let options = FileOptions::<'static, ()>::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(time);
            zip.start_file(*name, options)?;
            zip.write_all(content)?;
        }
    }
    zip.finish()?;

    Ok(path.to_path_buf())
}

/// Writes a file with a jar extension whose bytes are not a zip container
pub fn write_corrupt_jar(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, b"PK\x03\x04 definitely not a complete archive")?;
    Ok(path.to_path_buf())
}

/// Writes a jar with one deflated `a.txt` whose compressed bytes are damaged.
///
/// The container itself stays readable; only decoding the entry fails.
pub fn write_jar_with_corrupt_entry(path: &Path) -> Result<PathBuf> {
    let content: String = (0..2000).map(|i| format!("line {} of a.txt\n", i)).collect();
    write_jar(path, &[("a.txt", content.as_bytes())])?;

    let mut bytes = fs::read(path)?;
    let u16_at = |at: usize| usize::from(u16::from_le_bytes([bytes[at], bytes[at + 1]]));
    // First local file header: fixed 30 bytes, then name and extra field
    let compressed = u32::from_le_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]) as usize;
    let data_start = 30 + u16_at(26) + u16_at(28);
    let target = data_start + compressed.max(2) / 2;
    if target >= bytes.len() {
        return Err(anyhow!("fixture jar too short to corrupt"));
    }
    bytes[target] ^= 0xFF;
    fs::write(path, bytes)?;

    Ok(path.to_path_buf())
}

/// Creates a small compiled-output tree under `classes/`
pub fn create_class_tree(test_dir: &TestDir) -> Result<PathBuf> {
    test_dir.create_file("classes/com/acme/App.class", &[0xCA, 0xFE, 0xBA, 0xBE, 0, 1])?;
    test_dir.create_file(
        "classes/com/acme/util/Strings.class",
        &[0xCA, 0xFE, 0xBA, 0xBE, 0, 2],
    )?;
    test_dir.create_file("classes/config.edn", b"{:port 8080}")?;
    test_dir.create_dir("classes/empty")?;

    Ok(test_dir.join("classes"))
}

/// Creates a resources tree under `resources/`
pub fn create_resource_tree(test_dir: &TestDir) -> Result<PathBuf> {
    test_dir.create_file("resources/config.edn", b"{:port 9090}")?;
    test_dir.create_file("resources/public/index.html", b"<html></html>")?;

    Ok(test_dir.join("resources"))
}
