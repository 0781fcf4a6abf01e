//! Settings store for loading and saving staging.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{StagingSettings, parser, paths};

#[derive(Debug, Clone)]
pub struct SettingsStore {
    config_path: PathBuf,
}

impl SettingsStore {
    /// Store at the default location under the user's config directory.
    pub fn from_default() -> anyhow::Result<Self> {
        Ok(Self::from_path(paths::default_settings_path()?))
    }

    pub fn from_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load settings; a missing file yields defaults.
    pub fn load(&self) -> anyhow::Result<StagingSettings> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "no settings file, using defaults");
            return Ok(StagingSettings::new());
        }
        parser::parse_settings(&self.config_path)
    }

    /// Write validated settings, refusing to replace an existing file unless
    /// `overwrite` is set.
    pub fn save(&self, settings: &StagingSettings, overwrite: bool) -> anyhow::Result<()> {
        settings.validate()?;
        if !overwrite && self.config_path.exists() {
            anyhow::bail!(
                "Settings file already exists: {}",
                self.config_path.display()
            );
        }

        let content = parser::to_toml(settings)?;
        let parent = self
            .config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        // Readers never observe a half-written file.
        let partial = parent.join(format!(".{}.partial", paths::SETTINGS_FILE));
        std::fs::write(&partial, content)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        std::fs::rename(&partial, &self.config_path).with_context(|| {
            format!("Failed to move settings into {}", self.config_path.display())
        })?;

        tracing::info!(path = %self.config_path.display(), "wrote settings");
        Ok(())
    }
}
