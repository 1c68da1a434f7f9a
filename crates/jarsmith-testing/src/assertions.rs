//! Common assertions for jarsmith testing

use crate::helpers::{entry_names, read_entries};
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

const MANIFEST: &str = "META-INF/MANIFEST.MF";

/// Asserts that a jar holds exactly one entry per file and directory under
/// `dir` (plus the manifest) and that file contents are byte-identical.
pub fn assert_jar_matches_dir(jar: &Path, dir: &Path) -> Result<()> {
    assert_unique_entries(jar)?;
    let entries = read_entries(jar)?;

    let mut expected = BTreeSet::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(dir)?
            .to_string_lossy()
            .replace('\\', "/");

        if entry.file_type().is_dir() {
            expected.insert(format!("{}/", relative));
        } else {
            let content = std::fs::read(entry.path())?;
            assert_eq!(
                entries.get(&relative),
                Some(&content),
                "Content mismatch for {}",
                relative
            );
            expected.insert(relative);
        }
    }

    let actual: BTreeSet<String> = entries
        .keys()
        .filter(|name| name.as_str() != MANIFEST)
        .cloned()
        .collect();
    assert_eq!(actual, expected, "Entry set mismatch");

    Ok(())
}

/// Asserts that no entry name occurs twice in an archive
pub fn assert_unique_entries(jar: &Path) -> Result<()> {
    let names = entry_names(jar)?;
    let unique: BTreeSet<_> = names.iter().collect();
    assert_eq!(
        unique.len(),
        names.len(),
        "Duplicate entries in {:?}: {:?}",
        jar,
        names
    );
    Ok(())
}
