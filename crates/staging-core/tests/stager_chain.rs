use std::cell::RefCell;
use std::path::{Path, PathBuf};

use staging_core::config::StagingSettings;
use staging_core::error::{StagingError, StagingResult};
use staging_core::executor::{
    Capabilities, CommandOutcome, CommandSpec, CopyOutcome, Interpreter, Ownership, Stager,
};
use staging_core::plan::ResolvedPlan;
use staging_core::request::RetrievalRequest;
use staging_core::resolver::StagingResolver;
use staging_core::types::DownloaderFlavor;

#[derive(Debug, Default)]
struct RecordingCapabilities {
    calls: RefCell<Vec<String>>,
    commands: RefCell<Vec<CommandSpec>>,
    fail_download: bool,
    fail_permissions: bool,
    target_exists: bool,
}

impl RecordingCapabilities {
    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Capabilities for RecordingCapabilities {
    fn ensure_directory(&self, path: &Path, _ownership: &Ownership) -> StagingResult<()> {
        self.calls
            .borrow_mut()
            .push(format!("dir {}", path.display()));
        Ok(())
    }

    fn copy_file(
        &self,
        source: &Path,
        dest: &Path,
        _ownership: &Ownership,
        _ignore_source_permissions: bool,
    ) -> StagingResult<CopyOutcome> {
        self.calls
            .borrow_mut()
            .push(format!("copy {} {}", source.display(), dest.display()));
        Ok(if self.target_exists {
            CopyOutcome::AlreadyPresent
        } else {
            CopyOutcome::Copied
        })
    }

    fn run_command(&self, spec: &CommandSpec) -> StagingResult<CommandOutcome> {
        self.calls
            .borrow_mut()
            .push(format!("run {}", spec.creates.display()));
        self.commands.borrow_mut().push(spec.clone());
        if self.fail_download {
            return Err(StagingError::Transfer {
                command: spec.command.clone(),
                attempts: spec.tries,
                reason: "exit status: 22".to_string(),
            });
        }
        Ok(if self.target_exists {
            CommandOutcome::Skipped
        } else {
            CommandOutcome::Ran { attempts: 1 }
        })
    }

    fn ensure_file(&self, path: &Path, ownership: &Ownership) -> StagingResult<()> {
        self.calls.borrow_mut().push(format!(
            "file {} {}",
            path.display(),
            ownership.mode.as_deref().unwrap_or("-")
        ));
        if self.fail_permissions {
            return Err(StagingError::Permission {
                path: path.to_path_buf(),
                reason: "no such user: app".to_string(),
            });
        }
        Ok(())
    }
}

fn settings() -> StagingSettings {
    let mut settings = StagingSettings::with_path("/staging");
    settings.exec_path = "/custom/bin".to_string();
    settings
}

fn resolve(request: &RetrievalRequest, flavor: DownloaderFlavor) -> ResolvedPlan {
    StagingResolver::new("/staging").resolve(request, flavor).unwrap()
}

#[test]
fn download_runs_directory_then_command_then_permissions() {
    let request = RetrievalRequest::new("https://example.com/app.tar.gz", "app.tar.gz")
        .with_subdir("app")
        .with_ownership(None, None, Some("0644".to_string()));
    let plan = resolve(&request, DownloaderFlavor::Curl);

    let mut stager = Stager::new(RecordingCapabilities::default(), settings());
    let report = stager.apply(&plan).unwrap();

    assert_eq!(
        stager.capabilities().calls(),
        vec![
            "dir /staging/app".to_string(),
            "run /staging/app/app.tar.gz".to_string(),
            "file /staging/app/app.tar.gz 0644".to_string(),
        ]
    );
    assert!(report.directory_created);
    assert!(report.fetched);
    assert!(report.permissions_fixed);
}

#[test]
fn runner_receives_pass_through_parameters() {
    let request = RetrievalRequest::new("http://example.com/a", "a")
        .with_environment(["HTTP_PROXY=http://proxy:3128"])
        .with_retry(Some(30), Some(4), Some(2));
    let plan = resolve(&request, DownloaderFlavor::Wget);

    let mut stager = Stager::new(RecordingCapabilities::default(), settings());
    stager.apply(&plan).unwrap();

    let commands = stager.capabilities().commands.borrow();
    let spec = &commands[0];
    assert_eq!(spec.command, "wget -O /staging/staging/a http://example.com/a");
    assert_eq!(spec.interpreter, Interpreter::Sh);
    assert_eq!(spec.cwd, PathBuf::from("/staging/staging"));
    assert_eq!(spec.environment, vec!["HTTP_PROXY=http://proxy:3128"]);
    assert_eq!(spec.search_path.as_deref(), Some("/custom/bin"));
    assert_eq!(spec.timeout, Some(std::time::Duration::from_secs(30)));
    assert_eq!(spec.tries, 4);
    assert_eq!(spec.try_sleep, std::time::Duration::from_secs(2));
    assert_eq!(spec.creates, PathBuf::from("/staging/staging/a"));
}

#[test]
fn zero_timeout_means_no_limit() {
    let request =
        RetrievalRequest::new("http://example.com/a", "a").with_retry(Some(0), None, None);
    let plan = resolve(&request, DownloaderFlavor::Curl);

    let mut stager = Stager::new(RecordingCapabilities::default(), settings());
    stager.apply(&plan).unwrap();

    let commands = stager.capabilities().commands.borrow();
    assert_eq!(commands[0].timeout, None);
    assert_eq!(commands[0].tries, 1);
}

#[test]
fn powershell_flavor_uses_powershell_interpreter() {
    let request = RetrievalRequest::new("https://example.com/a", "a").with_target("C:/staging/a");
    let plan = resolve(&request, DownloaderFlavor::Powershell);

    let mut stager = Stager::new(RecordingCapabilities::default(), settings());
    stager.apply(&plan).unwrap();

    let commands = stager.capabilities().commands.borrow();
    assert_eq!(commands[0].interpreter, Interpreter::Powershell);
}

#[test]
fn failed_download_stops_the_chain() {
    let plan = resolve(
        &RetrievalRequest::new("https://example.com/a", "a"),
        DownloaderFlavor::Curl,
    );
    let capabilities = RecordingCapabilities {
        fail_download: true,
        ..RecordingCapabilities::default()
    };

    let mut stager = Stager::new(capabilities, settings());
    let err = stager.apply(&plan).unwrap_err();

    assert!(matches!(err, StagingError::Transfer { .. }));
    assert!(
        !stager
            .capabilities()
            .calls()
            .iter()
            .any(|call| call.starts_with("file "))
    );
}

#[test]
fn failed_permission_fix_is_reported_after_download() {
    let plan = resolve(
        &RetrievalRequest::new("s3://bucket/a", "a"),
        DownloaderFlavor::Curl,
    );
    let capabilities = RecordingCapabilities {
        fail_permissions: true,
        ..RecordingCapabilities::default()
    };

    let mut stager = Stager::new(capabilities, settings());
    let err = stager.apply(&plan).unwrap_err();

    assert!(matches!(err, StagingError::Permission { .. }));
    let calls = stager.capabilities().calls();
    assert_eq!(calls[1], "run /staging/staging/a");
}

#[test]
fn shared_directory_is_ensured_once() {
    let resolver = StagingResolver::new("/staging");
    let requests = vec![
        RetrievalRequest::new("http://example.com/a", "a").with_subdir("shared"),
        RetrievalRequest::new("http://example.com/b", "b").with_subdir("shared"),
        RetrievalRequest::new("http://example.com/c", "c").with_subdir("other"),
    ];
    let plans = resolver
        .resolve_all(&requests, DownloaderFlavor::Curl)
        .unwrap();

    let mut stager = Stager::new(RecordingCapabilities::default(), settings());
    let reports = stager.apply_all(&plans).unwrap();

    let dirs: Vec<_> = stager
        .capabilities()
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("dir "))
        .collect();
    assert_eq!(dirs, vec!["dir /staging/shared", "dir /staging/other"]);
    assert!(reports[0].directory_created);
    assert!(!reports[1].directory_created);
}

#[test]
fn explicit_target_skips_directory_and_existing_file_is_not_fetched() {
    let plan = resolve(
        &RetrievalRequest::new("/srv/files/a", "a").with_target("/etc/app/a"),
        DownloaderFlavor::Curl,
    );
    let capabilities = RecordingCapabilities {
        target_exists: true,
        ..RecordingCapabilities::default()
    };

    let mut stager = Stager::new(capabilities, settings());
    let report = stager.apply(&plan).unwrap();

    assert_eq!(
        stager.capabilities().calls(),
        vec!["copy /srv/files/a /etc/app/a".to_string()]
    );
    assert!(!report.fetched);
    assert!(!report.directory_created);
    assert!(!report.permissions_fixed);
}
