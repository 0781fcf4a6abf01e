//! Apply resolved plans in dependency order.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::StagingSettings;
use crate::error::{StagingError, StagingResult};
use crate::plan::{Action, ResolvedPlan};
use crate::types::Transport;

use super::{
    Capabilities, CommandOutcome, CommandSpec, CopyOutcome, HostCapabilities, Interpreter,
    Ownership,
};

/// What happened while staging one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub name: String,
    pub target_file: PathBuf,
    pub directory_created: bool,
    /// The file was copied or downloaded by this run
    pub fetched: bool,
    pub permissions_fixed: bool,
}

/// Applies plans through a set of capabilities.
///
/// Directory steps are de-duplicated per stager, so many files staged into
/// the same subdirectory ensure it once.
#[derive(Debug)]
pub struct Stager<C = HostCapabilities> {
    capabilities: C,
    settings: StagingSettings,
    ensured_dirs: HashSet<PathBuf>,
}

impl Stager<HostCapabilities> {
    /// Stager acting on the local host.
    pub fn on_host(settings: StagingSettings) -> Self {
        Self::new(HostCapabilities::new(), settings)
    }
}

impl<C: Capabilities> Stager<C> {
    pub fn new(capabilities: C, settings: StagingSettings) -> Self {
        Self {
            capabilities,
            settings,
            ensured_dirs: HashSet::new(),
        }
    }

    pub fn capabilities(&self) -> &C {
        &self.capabilities
    }

    /// Apply one plan: directory, then copy or download, then permission fix.
    ///
    /// A failed step stops the chain; a failed permission fix leaves the
    /// fetched file in place.
    pub fn apply(&mut self, plan: &ResolvedPlan) -> StagingResult<StageReport> {
        let mut report = StageReport {
            name: plan.name.clone(),
            target_file: plan.target_file.clone(),
            directory_created: false,
            fetched: false,
            permissions_fixed: false,
        };

        if plan.needs_directory && !self.ensured_dirs.contains(&plan.staging_dir) {
            self.capabilities
                .ensure_directory(&plan.staging_dir, &self.directory_ownership())?;
            self.ensured_dirs.insert(plan.staging_dir.clone());
            report.directory_created = true;
        }

        match &plan.action {
            Action::DirectCopy {
                source,
                owner,
                group,
                mode,
                ignore_source_permissions,
            } => {
                let source_path = self.copy_source(plan.transport, source)?;
                let ownership = Ownership::new(owner.clone(), group.clone(), mode.clone());
                let outcome = self.capabilities.copy_file(
                    &source_path,
                    &plan.target_file,
                    &ownership,
                    *ignore_source_permissions,
                )?;
                report.fetched = outcome == CopyOutcome::Copied;
            }
            Action::RunCommand { command, flavor } => {
                let spec = CommandSpec {
                    command: command.clone(),
                    interpreter: Interpreter::for_flavor(*flavor),
                    cwd: plan.staging_dir.clone(),
                    environment: plan.environment.clone(),
                    search_path: Some(self.settings.exec_path.clone()),
                    // zero disables the limit
                    timeout: plan
                        .timeout
                        .filter(|secs| *secs > 0)
                        .map(Duration::from_secs),
                    tries: plan.tries.unwrap_or(1),
                    try_sleep: Duration::from_secs(plan.try_sleep.unwrap_or(0)),
                    creates: plan.target_file.clone(),
                };
                let outcome = self.capabilities.run_command(&spec)?;
                report.fetched = matches!(outcome, CommandOutcome::Ran { .. });
            }
        }

        if plan.needs_permission_fix {
            let ownership =
                Ownership::new(plan.owner.clone(), plan.group.clone(), plan.mode.clone());
            self.capabilities.ensure_file(&plan.target_file, &ownership)?;
            report.permissions_fixed = !ownership.is_empty();
        }

        if report.fetched {
            tracing::info!(name = %plan.name, target = %plan.target_file.display(), "staged file");
        } else {
            tracing::debug!(name = %plan.name, "already staged");
        }

        Ok(report)
    }

    /// Apply plans in order, stopping at the first failure.
    pub fn apply_all(&mut self, plans: &[ResolvedPlan]) -> StagingResult<Vec<StageReport>> {
        plans.iter().map(|plan| self.apply(plan)).collect()
    }

    fn directory_ownership(&self) -> Ownership {
        // Directory modes only mean something on Unix hosts.
        let mode = cfg!(unix).then(|| self.settings.mode.clone());
        Ownership::new(self.settings.owner.clone(), self.settings.group.clone(), mode)
    }

    fn copy_source(&self, transport: Transport, source: &str) -> StagingResult<PathBuf> {
        match transport {
            Transport::Local | Transport::Drive => Ok(PathBuf::from(source)),
            Transport::File => file_url_path(source),
            Transport::Puppet => self.fileserver_path(source),
            _ => Err(StagingError::InvalidRequest {
                reason: format!("{} sources cannot be copied", transport.as_str()),
            }),
        }
    }

    /// Map `puppet://[server]/mount/path` under the configured fileserver root.
    fn fileserver_path(&self, source: &str) -> StagingResult<PathBuf> {
        let root = self
            .settings
            .fileserver_root
            .as_deref()
            .ok_or_else(|| StagingError::Unsupported {
                operation: "copy",
                detail: format!("no fileserver_root configured for {source}"),
            })?;
        let rest = source.trim_start_matches("puppet://");
        let relative = rest.split_once('/').map(|(_, path)| path).unwrap_or_default();
        if relative.is_empty() || Path::new(relative).components().any(is_parent) {
            return Err(StagingError::InvalidRequest {
                reason: format!("invalid fileserver path: {source}"),
            });
        }
        Ok(root.join(relative))
    }
}

fn is_parent(component: std::path::Component<'_>) -> bool {
    matches!(component, std::path::Component::ParentDir)
}

fn file_url_path(source: &str) -> StagingResult<PathBuf> {
    let rest = source.trim_start_matches("file://");
    let path = rest.strip_prefix("localhost").unwrap_or(rest);
    if !path.starts_with('/') {
        return Err(StagingError::Unsupported {
            operation: "copy",
            detail: format!("remote file URL: {source}"),
        });
    }
    Ok(PathBuf::from(path))
}
