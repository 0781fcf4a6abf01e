//! Application context for unified dependency injection.

use std::path::Path;

use crate::config::{SettingsStore, StagingSettings};
use crate::error::StagingResult;
use crate::executor::Stager;
use crate::plan::ResolvedPlan;
use crate::request::RetrievalRequest;
use crate::resolver::StagingResolver;
use crate::types::DownloaderFlavor;

/// Unified application context.
///
/// Holds the process-wide settings and the effective downloader flavor.
/// Frontends create this once and derive resolvers and stagers from it.
#[derive(Debug, Clone)]
pub struct StagingContext {
    settings: StagingSettings,
    flavor: DownloaderFlavor,
}

impl StagingContext {
    /// Create a context, resolving the flavor from the settings.
    pub fn new(settings: StagingSettings) -> StagingResult<Self> {
        Self::with_flavor_override(settings, None)
    }

    /// Create a context; an explicit flavor wins over the configured one,
    /// which is then never parsed.
    pub fn with_flavor_override(
        settings: StagingSettings,
        flavor: Option<DownloaderFlavor>,
    ) -> StagingResult<Self> {
        let flavor = match flavor {
            Some(flavor) => flavor,
            None => settings.flavor()?,
        };
        Ok(Self { settings, flavor })
    }

    /// Load settings from `config_path`, or the default location when `None`.
    pub fn load(
        config_path: Option<&Path>,
        flavor: Option<DownloaderFlavor>,
    ) -> anyhow::Result<Self> {
        let settings = Self::store(config_path)?.load()?;
        Ok(Self::with_flavor_override(settings, flavor)?)
    }

    /// Settings store at `config_path`, or the default location when `None`.
    pub fn store(config_path: Option<&Path>) -> anyhow::Result<SettingsStore> {
        match config_path {
            Some(path) => Ok(SettingsStore::from_path(path)),
            None => SettingsStore::from_default(),
        }
    }

    /// Override the base staging path.
    pub fn with_staging_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.settings.path = path.into();
        self
    }

    pub fn settings(&self) -> &StagingSettings {
        &self.settings
    }

    pub fn flavor(&self) -> DownloaderFlavor {
        self.flavor
    }

    /// Get a StagingResolver rooted at the configured staging path.
    pub fn resolver(&self) -> StagingResolver {
        StagingResolver::new(self.settings.path.clone())
    }

    /// Get a Stager acting on the local host.
    pub fn stager(&self) -> Stager {
        Stager::on_host(self.settings.clone())
    }

    /// Resolve one request with the context's flavor.
    pub fn resolve(&self, request: &RetrievalRequest) -> StagingResult<ResolvedPlan> {
        self.resolver().resolve(request, self.flavor)
    }
}
