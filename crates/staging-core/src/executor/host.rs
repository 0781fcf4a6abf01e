//! Capabilities backed by the local host.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{StagingError, StagingResult};

use super::{Capabilities, CommandOutcome, CommandSpec, CopyOutcome, Ownership};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL_LINES: usize = 5;

/// Performs plan steps directly on this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCapabilities;

impl HostCapabilities {
    pub fn new() -> Self {
        Self
    }
}

impl Capabilities for HostCapabilities {
    fn ensure_directory(&self, path: &Path, ownership: &Ownership) -> StagingResult<()> {
        std::fs::create_dir_all(path)
            .map_err(|e| StagingError::io("ensure_directory", path, e))?;
        let detail = ownership.apply(path)?;
        tracing::debug!(path = %path.display(), %detail, "directory ensured");
        Ok(())
    }

    fn copy_file(
        &self,
        source: &Path,
        dest: &Path,
        ownership: &Ownership,
        ignore_source_permissions: bool,
    ) -> StagingResult<CopyOutcome> {
        if dest.exists() {
            ownership.apply(dest)?;
            return Ok(CopyOutcome::AlreadyPresent);
        }

        let partial = partial_path(dest);
        std::fs::copy(source, &partial).map_err(|e| StagingError::io("copy", source, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if ignore_source_permissions && ownership.mode.is_none() {
                std::fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o644))
                    .map_err(|e| StagingError::io("copy", &partial, e))?;
            }
        }
        #[cfg(not(unix))]
        let _ = ignore_source_permissions;

        if let Err(e) = std::fs::rename(&partial, dest) {
            let _ = std::fs::remove_file(&partial);
            return Err(StagingError::io("copy", dest, e));
        }

        ownership.apply(dest)?;
        Ok(CopyOutcome::Copied)
    }

    fn run_command(&self, spec: &CommandSpec) -> StagingResult<CommandOutcome> {
        if spec.creates.exists() {
            tracing::debug!(creates = %spec.creates.display(), "target exists, skipping command");
            return Ok(CommandOutcome::Skipped);
        }

        let tries = spec.tries.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=tries {
            match run_once(spec) {
                Ok(()) => return Ok(CommandOutcome::Ran { attempts: attempt }),
                Err(reason) => {
                    discard_partial(&spec.creates);
                    tracing::warn!(attempt, tries, %reason, "download attempt failed");
                    last_reason = reason;
                    if attempt < tries && !spec.try_sleep.is_zero() {
                        thread::sleep(spec.try_sleep);
                    }
                }
            }
        }

        Err(StagingError::Transfer {
            command: spec.command.clone(),
            attempts: tries,
            reason: last_reason,
        })
    }

    fn ensure_file(&self, path: &Path, ownership: &Ownership) -> StagingResult<()> {
        if !path.is_file() {
            return Err(StagingError::permission(path, "file does not exist"));
        }
        let detail = ownership.apply(path)?;
        tracing::debug!(path = %path.display(), %detail, "file ensured");
        Ok(())
    }
}

enum Wait {
    Exited(ExitStatus),
    TimedOut(Duration),
}

/// Run a single try. Errors are human-readable failure reasons.
fn run_once(spec: &CommandSpec) -> Result<(), String> {
    let (program, args) = spec.interpreter.argv();
    let mut command = Command::new(program);
    command
        .args(args)
        .arg(&spec.command)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    if let Some(path) = &spec.search_path {
        command.env("PATH", path);
    }
    for entry in &spec.environment {
        match entry.split_once('=') {
            Some((key, value)) => {
                command.env(key, value);
            }
            None => tracing::warn!(%entry, "ignoring environment entry without '='"),
        }
    }

    let mut child = command
        .spawn()
        .map_err(|e| format!("failed to start {program} in {}: {e}", spec.cwd.display()))?;

    // Drained on a thread so a chatty progress meter cannot fill the pipe.
    let stderr = child.stderr.take();
    let drain = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    });

    match wait(&mut child, spec.timeout)? {
        Wait::Exited(status) if status.success() => Ok(()),
        Wait::Exited(status) => {
            let stderr = drain.join().unwrap_or_default();
            Err(describe_failure(status, &stderr))
        }
        // The drain thread is left behind: a surviving grandchild may still hold the pipe.
        Wait::TimedOut(limit) => Err(format!("timed out after {}s", limit.as_secs())),
    }
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> Result<Wait, String> {
    let Some(limit) = timeout else {
        return child
            .wait()
            .map(Wait::Exited)
            .map_err(|e| format!("failed to wait for command: {e}"));
    };

    let deadline = Instant::now() + limit;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Wait::Exited(status)),
            Ok(None) => {}
            Err(e) => return Err(format!("failed to wait for command: {e}")),
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(Wait::TimedOut(limit));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn describe_failure(status: ExitStatus, stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let tail = &lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..];
    if tail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", tail.join(" | "))
    }
}

/// A failed try must not leave a file that would satisfy the creates-guard.
fn discard_partial(target: &Path) {
    if target.is_file() {
        match std::fs::remove_file(target) {
            Ok(()) => tracing::warn!(path = %target.display(), "removed partial download"),
            Err(e) => {
                tracing::warn!(
                    path = %target.display(),
                    error = %e,
                    "could not remove partial download"
                )
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.staging-partial"))
}
