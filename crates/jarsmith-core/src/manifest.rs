//! Jar manifest building and serialisation
//!
//! A jar carries a single `META-INF/MANIFEST.MF` record made of
//! `Name: Value` lines in one main-attributes section. This module builds
//! that record from the tool identity, the target platform version and an optional
//! entry point, and renders it in the wrapped CRLF text form readers expect.

use crate::{Error, Result};
use std::fmt;

/// Reserved archive path of the manifest record
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const CREATED_BY: &str = "Created-By";
pub const BUILD_JDK_SPEC: &str = "Build-Jdk-Spec";
pub const MAIN_CLASS: &str = "Main-Class";

/// Maximum encoded line length, continuation lines included
const LINE_WIDTH: usize = 72;
const MAX_NAME_LEN: usize = 70;

/// Ordered main attributes of a jar manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    /// Build the generated manifest.
    ///
    /// Always carries `Manifest-Version`, `Created-By` and `Build-Jdk-Spec`;
    /// `Main-Class` is present iff `main_class` is given, rendered with its
    /// `Display` form unchanged.
    pub fn build<M: fmt::Display>(
        tool_id: &str,
        platform_spec: &str,
        main_class: Option<M>,
    ) -> Result<Self> {
        let mut manifest = Self::empty();
        manifest.insert(CREATED_BY, tool_id)?;
        manifest.insert(BUILD_JDK_SPEC, platform_spec)?;
        if let Some(main_class) = main_class {
            manifest.insert(MAIN_CLASS, main_class.to_string())?;
        }
        Ok(manifest)
    }

    fn empty() -> Self {
        Self {
            attributes: vec![(MANIFEST_VERSION.to_string(), "1.0".to_string())],
        }
    }

    /// Set an attribute, replacing an existing value in place
    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        validate_name(name)?;
        let value = value.into();
        if value.contains(['\r', '\n', '\0']) {
            return Err(Error::InvalidManifest(format!(
                "value of {} contains a line break",
                name
            )));
        }

        match self
            .attributes
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name.to_string(), value)),
        }
        Ok(())
    }

    /// Look up an attribute (names compare case-insensitively)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn main_class(&self) -> Option<&str> {
        self.get(MAIN_CLASS)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Encode in manifest text form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.attributes {
            write_wrapped(&mut out, &format!("{}: {}", name, value));
        }
        out.extend_from_slice(b"\r\n");
        out
    }

    /// Parse the main section of a manifest
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::InvalidManifest(format!("not UTF-8: {}", e)))?;

        let mut lines: Vec<String> = Vec::new();
        for raw in text.split('\n') {
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            if raw.is_empty() {
                break;
            }
            match raw.strip_prefix(' ') {
                Some(rest) => match lines.last_mut() {
                    Some(last) => last.push_str(rest),
                    None => {
                        return Err(Error::InvalidManifest(
                            "continuation line without attribute".to_string(),
                        ))
                    }
                },
                None => lines.push(raw.to_string()),
            }
        }

        let mut manifest = Self {
            attributes: Vec::new(),
        };
        for line in lines {
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| Error::InvalidManifest(format!("malformed line: {}", line)))?;
            manifest.insert(name, value)?;
        }
        Ok(manifest)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidManifest(format!(
            "invalid attribute name: {:?}",
            name
        )))
    }
}

/// Write one logical line, wrapping at 72 bytes without splitting characters
fn write_wrapped(out: &mut Vec<u8>, line: &str) {
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > LINE_WIDTH {
            out.extend_from_slice(b"\r\n ");
            width = 1;
        }
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        width += len;
    }
    out.extend_from_slice(b"\r\n");
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}
