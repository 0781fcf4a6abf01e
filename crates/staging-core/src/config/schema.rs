//! Settings schema for staging.toml
//!
//! Process-wide settings shared by every staged file:
//! - downloader flavor
//! - base staging path
//! - owner/group/mode of created staging directories
//! - search path for external executables

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::StagingResult;
use crate::types::DownloaderFlavor;

use super::paths;

/// Root settings structure for staging.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSettings {
    /// Downloader flavor: curl, wget or powershell
    #[serde(default = "default_flavor")]
    pub flavor: String,

    /// Reject unknown flavors instead of falling back to curl
    #[serde(default)]
    pub strict_flavor: bool,

    /// Base staging path
    #[serde(default = "paths::default_staging_path")]
    pub path: PathBuf,

    /// Owner of created staging directories
    #[serde(default)]
    pub owner: Option<String>,

    /// Group of created staging directories
    #[serde(default)]
    pub group: Option<String>,

    /// Octal mode of created staging directories
    #[serde(default = "default_mode")]
    pub mode: String,

    /// PATH used when running downloader commands
    #[serde(default = "paths::default_exec_path")]
    pub exec_path: String,

    /// Local directory serving `puppet:///` sources
    #[serde(default)]
    pub fileserver_root: Option<PathBuf>,
}

fn default_flavor() -> String {
    DownloaderFlavor::default().as_str().to_string()
}

fn default_mode() -> String {
    "0755".to_string()
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            flavor: default_flavor(),
            strict_flavor: false,
            path: paths::default_staging_path(),
            owner: None,
            group: None,
            mode: default_mode(),
            exec_path: paths::default_exec_path(),
            fileserver_root: None,
        }
    }
}

impl StagingSettings {
    /// Create settings with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings rooted at the given staging path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Effective downloader flavor.
    ///
    /// Unknown names fall back to curl unless `strict_flavor` is set.
    pub fn flavor(&self) -> StagingResult<DownloaderFlavor> {
        if self.strict_flavor {
            DownloaderFlavor::parse(&self.flavor)
        } else {
            Ok(DownloaderFlavor::parse_lenient(&self.flavor))
        }
    }

    /// Directory mode as an integer.
    pub fn mode_bits(&self) -> anyhow::Result<u32> {
        parse_octal_mode(&self.mode).with_context(|| format!("Invalid mode: {}", self.mode))
    }

    /// Validate the path and mode.
    ///
    /// The flavor is checked when it is resolved, so a command-line override
    /// can stand in for an unusable configured value.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.path.as_os_str().is_empty() {
            anyhow::bail!("Staging path must not be empty");
        }
        self.mode_bits()?;
        Ok(())
    }
}

/// Parse an octal mode string such as `0755`, `755` or `0o755`.
pub fn parse_octal_mode(value: &str) -> anyhow::Result<u32> {
    let trimmed = value.trim().trim_start_matches("0o");
    let mode = u32::from_str_radix(trimmed, 8)
        .with_context(|| format!("'{}' is not an octal mode", value))?;
    if mode > 0o7777 {
        anyhow::bail!("'{}' is out of range for a file mode", value);
    }
    Ok(mode)
}
