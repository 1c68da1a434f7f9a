//! Jar archive writer
//!
//! Appends entries strictly in caller order. The generated manifest is
//! always the first entry. Dropping a writer without calling
//! [`JarWriter::finish`] still finalises the container, so an aborted
//! assembly leaves a readable partial archive behind.

use super::{ArchivePath, Compression};
use crate::manifest::{Manifest, MANIFEST_PATH};
use crate::utils::{modified_time, zip_time_from_system};
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime as ZipDateTime, ZipWriter};

/// Open handle on a jar being written
pub struct JarWriter {
    zip: ZipWriter<File>,
    target: PathBuf,
    compression: Compression,
    written: HashSet<String>,
}

impl JarWriter {
    /// Create `target` (and its parent directories) and write the manifest
    pub fn create<P: AsRef<Path>>(
        target: P,
        manifest: &Manifest,
        compression: Compression,
    ) -> Result<Self> {
        let target = target.as_ref();

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(target)?;
        let mut writer = Self {
            zip: ZipWriter::new(file),
            target: target.to_path_buf(),
            compression,
            written: HashSet::new(),
        };

        // Fixed timestamp keeps the manifest from perturbing reproducible output
        writer.write_file(MANIFEST_PATH, &manifest.to_bytes(), ZipDateTime::default())?;
        info!("Opened jar {:?}", target);

        Ok(writer)
    }

    /// Append one entry.
    ///
    /// Directory paths produce an empty stored entry. File paths copy the
    /// full content of `source` (an absent source writes an empty file).
    /// When `mtime` is `None` the source file's modification time is used.
    pub fn put_entry(
        &mut self,
        path: &ArchivePath,
        mtime: Option<SystemTime>,
        source: Option<&Path>,
    ) -> Result<()> {
        let mtime = mtime.or_else(|| source.and_then(modified_time));
        let time = mtime.map(zip_time_from_system).unwrap_or_default();

        if path.is_dir() {
            self.write_directory(path.as_str(), time)
        } else {
            let content = match source {
                Some(source) => fs::read(source)?,
                None => Vec::new(),
            };
            self.write_file(path.as_str(), &content, time)
        }
    }

    /// Append a file entry from in-memory content
    pub fn put_bytes(
        &mut self,
        path: &ArchivePath,
        content: &[u8],
        mtime: Option<SystemTime>,
    ) -> Result<()> {
        if path.is_dir() {
            return Err(Error::InvalidPath(format!(
                "{} is a directory path and cannot hold content",
                path
            )));
        }
        let time = mtime.map(zip_time_from_system).unwrap_or_default();
        self.write_file(path.as_str(), content, time)
    }

    /// Number of entries written so far, manifest included
    pub fn entry_count(&self) -> usize {
        self.written.len()
    }

    /// Flush the central directory and close the file
    pub fn finish(mut self) -> Result<PathBuf> {
        self.zip.finish()?;
        info!(
            "Finished jar {:?} with {} entries",
            self.target,
            self.written.len()
        );
        Ok(self.target)
    }

    fn claim(&mut self, name: &str) -> Result<()> {
        if !self.written.insert(name.to_string()) {
            return Err(Error::DuplicateEntry(name.to_string()));
        }
        Ok(())
    }

    fn write_directory(&mut self, name: &str, time: ZipDateTime) -> Result<()> {
        self.claim(name)?;
        debug!("Adding directory to jar: {}", name);

        let options = FileOptions::<'static, ()>::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(time);
        self.zip.add_directory(name, options)?;
        Ok(())
    }

    fn write_file(&mut self, name: &str, content: &[u8], time: ZipDateTime) -> Result<()> {
        self.claim(name)?;
        debug!("Adding file to jar: {} ({} bytes)", name, content.len());

        let options = FileOptions::<'static, ()>::default()
            .compression_method(self.compression.method())
            .last_modified_time(time);
        self.zip.start_file(name, options)?;
        self.zip.write_all(content)?;
        Ok(())
    }
}
