//! Resolution of staged file declarations into plans.
//!
//! The resolver is pure: it inspects the request, picks a target path,
//! classifies the source and, for network sources, selects a downloader
//! command. Nothing touches the filesystem until a plan reaches the executor.

mod templates;

pub use templates::CredentialMode;

use std::path::{Path, PathBuf};

use crate::error::{StagingError, StagingResult};
use crate::plan::{Action, ResolvedPlan};
use crate::request::RetrievalRequest;
use crate::shell;
use crate::types::{DownloaderFlavor, Transport};

/// Resolves requests relative to a base staging path.
#[derive(Debug, Clone)]
pub struct StagingResolver {
    /// Root under which `subdir/name` targets are placed
    base_path: PathBuf,
}

impl StagingResolver {
    /// Create a new StagingResolver.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a request into a plan for the given downloader flavor.
    pub fn resolve(
        &self,
        request: &RetrievalRequest,
        flavor: DownloaderFlavor,
    ) -> StagingResult<ResolvedPlan> {
        let (target_file, staging_dir, needs_directory) = self.resolve_paths(request)?;

        let transport =
            Transport::classify(&request.source).ok_or_else(|| StagingError::UnrecognizedScheme {
                source_url: request.source.clone(),
            })?;

        let action = self.resolve_action(request, transport, flavor, &target_file)?;

        tracing::debug!(
            name = %request.name,
            transport = transport.as_str(),
            target = %target_file.display(),
            "resolved staged file"
        );

        Ok(ResolvedPlan {
            name: request.name.clone(),
            transport,
            target_file,
            needs_directory,
            staging_dir,
            needs_permission_fix: !action.is_copy() && transport.is_network(),
            action,
            environment: request.environment.clone(),
            timeout: request.timeout,
            tries: request.tries,
            try_sleep: request.try_sleep,
            owner: request.owner.clone(),
            group: request.group.clone(),
            mode: request.mode.clone(),
        })
    }

    /// Resolve a batch, failing on the first bad request before any plan is used.
    pub fn resolve_all<'a, I>(
        &self,
        requests: I,
        flavor: DownloaderFlavor,
    ) -> StagingResult<Vec<ResolvedPlan>>
    where
        I: IntoIterator<Item = &'a RetrievalRequest>,
    {
        requests
            .into_iter()
            .map(|request| self.resolve(request, flavor))
            .collect()
    }

    /// Returns (target_file, staging_dir, needs_directory).
    fn resolve_paths(&self, request: &RetrievalRequest) -> StagingResult<(PathBuf, PathBuf, bool)> {
        if let Some(target) = &request.target {
            let parent = target
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| StagingError::InvalidRequest {
                    reason: format!("target has no parent directory: {}", target.display()),
                })?;
            return Ok((target.clone(), parent.to_path_buf(), false));
        }

        if request.name.is_empty() {
            return Err(StagingError::InvalidRequest {
                reason: "name is required when no target is given".to_string(),
            });
        }

        let base = self.base_path.to_string_lossy();
        let joined = format!("{}/{}", base.trim_end_matches('/'), request.subdir);
        let staging_dir = joined.trim_end_matches('/').to_string();
        let target_file = format!("{}/{}", staging_dir, request.name);

        Ok((PathBuf::from(target_file), PathBuf::from(staging_dir), true))
    }

    fn resolve_action(
        &self,
        request: &RetrievalRequest,
        transport: Transport,
        flavor: DownloaderFlavor,
        target_file: &Path,
    ) -> StagingResult<Action> {
        let target = target_file.to_string_lossy();

        let command = match transport {
            Transport::Local | Transport::Drive | Transport::File | Transport::Puppet => {
                return Ok(Action::DirectCopy {
                    source: request.source.clone(),
                    owner: request.owner.clone(),
                    group: request.group.clone(),
                    mode: request.mode.clone(),
                    ignore_source_permissions: transport == Transport::Drive,
                });
            }
            Transport::S3 => format!("aws s3 cp {} {}", shell::quote(&request.source), target),
            Transport::Http | Transport::Https | Transport::Ftp => {
                templates::download_command(flavor, transport, request, &target).ok_or_else(
                    || StagingError::Unsupported {
                        operation: "download",
                        detail: format!("{flavor} cannot fetch {} sources", transport.as_str()),
                    },
                )?
            }
        };

        Ok(Action::RunCommand { command, flavor })
    }
}
