//! Configuration module

use crate::archive::merge::PolicyName;
use crate::archive::uber::default_excludes;
use crate::archive::{Compression, JarOptions, UberOptions};
use crate::manifest::Manifest;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Generated manifest attributes
    pub manifest: ManifestConfig,
    /// Entry encoding
    pub archive: ArchiveConfig,
    /// Uberjar merging
    pub uber: UberConfig,
}

/// Manifest configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestConfig {
    /// Tool identity written to `Created-By`
    pub created_by: String,
    /// Platform spec written to `Build-Jdk-Spec`
    pub build_jdk_spec: String,
    /// Entry point written to `Main-Class`
    pub main_class: Option<String>,
    /// Additional main attributes, emitted in key order
    pub attributes: BTreeMap<String, String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            created_by: concat!("jarsmith ", env!("CARGO_PKG_VERSION")).to_string(),
            build_jdk_spec: "17".to_string(),
            main_class: None,
            attributes: BTreeMap::new(),
        }
    }
}

/// Archive encoding configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Compression for file entries: deflate, store
    pub compression: Compression,
    /// Package symlink targets instead of skipping links
    pub follow_symlinks: bool,
}

/// Uberjar configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UberConfig {
    /// Collision policy: last-wins, first-wins, error-on-conflict
    pub merge_policy: PolicyName,
    /// Leave the staging directory on disk after the build
    pub keep_staging: bool,
    /// Parent directory for staging trees
    pub staging_root: Option<PathBuf>,
    /// Glob patterns of archive paths never staged
    pub exclude: Vec<String>,
}

impl Default for UberConfig {
    fn default() -> Self {
        Self {
            merge_policy: PolicyName::default(),
            keep_staging: false,
            staging_root: None,
            exclude: default_excludes(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(format!("config file {:?}", path)));
        }
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Build the manifest described by `[manifest]`
    pub fn manifest(&self) -> Result<Manifest> {
        let mut manifest = Manifest::build(
            &self.manifest.created_by,
            &self.manifest.build_jdk_spec,
            self.manifest.main_class.as_deref(),
        )?;
        for (name, value) in &self.manifest.attributes {
            manifest.insert(name, value.as_str())?;
        }
        Ok(manifest)
    }

    pub fn jar_options(&self) -> JarOptions {
        JarOptions {
            compression: self.archive.compression,
            follow_symlinks: self.archive.follow_symlinks,
        }
    }

    pub fn uber_options(&self) -> UberOptions {
        UberOptions {
            merge_policy: self.uber.merge_policy.into(),
            keep_staging: self.uber.keep_staging,
            staging_root: self.uber.staging_root.clone(),
            exclude: self.uber.exclude.clone(),
            jar: self.jar_options(),
        }
    }
}
