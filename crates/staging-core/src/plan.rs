//! Resolved plans and the managed steps they expand to.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{DownloaderFlavor, Transport};

/// How the staged file is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Non-replacing copy from a local or fileserver source.
    DirectCopy {
        source: String,
        owner: Option<String>,
        group: Option<String>,
        mode: Option<String>,
        /// Do not carry the source's permissions over (drive-letter sources)
        ignore_source_permissions: bool,
    },
    /// External download guarded by the existence of the target file.
    RunCommand {
        command: String,
        flavor: DownloaderFlavor,
    },
}

impl Action {
    pub fn is_copy(&self) -> bool {
        matches!(self, Self::DirectCopy { .. })
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            Self::RunCommand { command, .. } => Some(command),
            Self::DirectCopy { .. } => None,
        }
    }
}

/// Output of the resolver for a single declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPlan {
    pub name: String,
    pub transport: Transport,
    pub target_file: PathBuf,
    /// The staging directory must be ensured before the action runs
    pub needs_directory: bool,
    /// Working directory for the external command
    pub staging_dir: PathBuf,
    pub action: Action,
    /// The downloaded file needs owner/group/mode applied afterwards
    pub needs_permission_fix: bool,
    pub environment: Vec<String>,
    pub timeout: Option<u64>,
    pub tries: Option<u32>,
    pub try_sleep: Option<u64>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<String>,
}

/// A managed operation within a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    EnsureDirectory,
    Copy,
    Download,
    EnsureFile,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::EnsureDirectory => "ensure_directory",
            StepKind::Copy => "copy",
            StepKind::Download => "download",
            StepKind::EnsureFile => "ensure_file",
        }
    }
}

/// One step together with the step it must wait for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub kind: StepKind,
    pub path: PathBuf,
    pub depends_on: Option<StepKind>,
}

impl ResolvedPlan {
    /// Expand the plan into its ordered dependency chain.
    pub fn steps(&self) -> Vec<PlanStep> {
        let mut steps = Vec::with_capacity(3);
        let mut previous = None;

        if self.needs_directory {
            steps.push(PlanStep {
                kind: StepKind::EnsureDirectory,
                path: self.staging_dir.clone(),
                depends_on: None,
            });
            previous = Some(StepKind::EnsureDirectory);
        }

        let fetch = if self.action.is_copy() {
            StepKind::Copy
        } else {
            StepKind::Download
        };
        steps.push(PlanStep {
            kind: fetch,
            path: self.target_file.clone(),
            depends_on: previous,
        });

        if self.needs_permission_fix {
            steps.push(PlanStep {
                kind: StepKind::EnsureFile,
                path: self.target_file.clone(),
                depends_on: Some(fetch),
            });
        }

        steps
    }
}
