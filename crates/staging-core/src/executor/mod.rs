//! Execution of resolved plans.
//!
//! The resolver only describes what must happen. The executor performs it
//! through a small set of idempotent capabilities:
//! - ensure a directory with owner/group/mode
//! - copy a file without replacing an existing target
//! - run a download command guarded by the existence of its output
//! - ensure an existing file has owner/group/mode

mod host;
mod ownership;
mod stager;

pub use host::HostCapabilities;
pub use ownership::Ownership;
pub use stager::{StageReport, Stager};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StagingResult;
use crate::types::DownloaderFlavor;

/// Result of a non-replacing copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    AlreadyPresent,
}

/// Result of a guarded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command ran and succeeded on the given try.
    Ran { attempts: u32 },
    /// The `creates` path already existed.
    Skipped,
}

/// Program used to interpret a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpreter {
    Sh,
    Powershell,
}

impl Interpreter {
    pub fn for_flavor(flavor: DownloaderFlavor) -> Self {
        match flavor {
            DownloaderFlavor::Powershell => Self::Powershell,
            DownloaderFlavor::Curl | DownloaderFlavor::Wget => Self::Sh,
        }
    }

    /// Program and leading arguments; the command line follows them.
    pub fn argv(self) -> (&'static str, &'static [&'static str]) {
        const SH: &[&str] = &["-c"];
        const POWERSHELL: &[&str] = &["-NoProfile", "-NonInteractive", "-Command"];
        match self {
            Interpreter::Sh => ("sh", SH),
            Interpreter::Powershell => ("powershell", POWERSHELL),
        }
    }
}

/// A command for the guarded runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub interpreter: Interpreter,
    pub cwd: PathBuf,
    /// `KEY=VALUE` pairs added to the environment
    pub environment: Vec<String>,
    /// Replaces PATH for the command
    pub search_path: Option<String>,
    pub timeout: Option<Duration>,
    pub tries: u32,
    pub try_sleep: Duration,
    /// The command is skipped when this path exists
    pub creates: PathBuf,
}

/// Side-effecting operations a plan is handed to.
pub trait Capabilities {
    /// Create `path` and its parents, then apply ownership. Idempotent.
    fn ensure_directory(&self, path: &Path, ownership: &Ownership) -> StagingResult<()>;

    /// Copy `source` to `dest` unless `dest` already exists.
    fn copy_file(
        &self,
        source: &Path,
        dest: &Path,
        ownership: &Ownership,
        ignore_source_permissions: bool,
    ) -> StagingResult<CopyOutcome>;

    /// Run a command unless its `creates` path exists, retrying failed tries.
    fn run_command(&self, spec: &CommandSpec) -> StagingResult<CommandOutcome>;

    /// Apply ownership to an existing file.
    fn ensure_file(&self, path: &Path, ownership: &Ownership) -> StagingResult<()>;
}
