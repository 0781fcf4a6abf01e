//! Manifest of staged files.
//!
//! ```toml
//! [file."app.tar.gz"]
//! source = "https://example.com/app.tar.gz"
//! subdir = "app"
//! tries = 3
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::parser::enhance_toml_error;
use crate::config::parse_octal_mode;
use crate::request::{DEFAULT_SUBDIR, RetrievalRequest};

/// Root manifest structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingManifest {
    /// Staged files keyed by name
    #[serde(default)]
    pub file: BTreeMap<String, FileEntry>,
}

/// One staged file declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub source: String,
    #[serde(default)]
    pub target: Option<PathBuf>,
    #[serde(default)]
    pub subdir: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub novalidate: bool,
    #[serde(default)]
    pub curl_option: Option<String>,
    #[serde(default)]
    pub wget_option: Option<String>,
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub tries: Option<u32>,
    #[serde(default)]
    pub try_sleep: Option<u64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl FileEntry {
    /// Convert into a request named `name`.
    pub fn to_request(&self, name: &str) -> RetrievalRequest {
        RetrievalRequest {
            source: self.source.clone(),
            target: self.target.clone(),
            name: name.to_string(),
            subdir: self
                .subdir
                .clone()
                .unwrap_or_else(|| DEFAULT_SUBDIR.to_string()),
            username: self.username.clone(),
            password: self.password.clone(),
            certificate: self.certificate.clone(),
            novalidate: self.novalidate,
            curl_option: self.curl_option.clone(),
            wget_option: self.wget_option.clone(),
            environment: self.environment.clone(),
            timeout: self.timeout,
            tries: self.tries,
            try_sleep: self.try_sleep,
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: self.mode.clone(),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.source.trim().is_empty() {
            anyhow::bail!("File '{}' has an empty source", name);
        }
        if let Some(entry) = self.environment.iter().find(|e| !e.contains('=')) {
            anyhow::bail!(
                "File '{}' has an environment entry without '=': {}",
                name,
                entry
            );
        }
        if let Some(mode) = &self.mode {
            parse_octal_mode(mode).with_context(|| format!("File '{}' has an invalid mode", name))?;
        }
        if self.tries == Some(0) {
            anyhow::bail!("File '{}' must allow at least one try", name);
        }
        Ok(())
    }
}

impl StagingManifest {
    /// Requests in name order.
    pub fn requests(&self) -> Vec<RetrievalRequest> {
        self.file
            .iter()
            .map(|(name, entry)| entry.to_request(name))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, entry) in &self.file {
            entry.validate(name)?;
        }
        Ok(())
    }
}

/// Parse a manifest file
pub fn parse_manifest(path: &Path) -> Result<StagingManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

    parse_manifest_str(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

/// Parse manifest content from string
pub fn parse_manifest_str(content: &str) -> Result<StagingManifest> {
    let manifest: StagingManifest =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    manifest.validate()?;
    Ok(manifest)
}
