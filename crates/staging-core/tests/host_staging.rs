#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use staging_core::config::StagingSettings;
use staging_core::error::StagingError;
use staging_core::executor::Stager;
use staging_core::manifest::parse_manifest_str;
use staging_core::plan::Action;
use staging_core::request::RetrievalRequest;
use staging_core::resolver::StagingResolver;
use staging_core::shell;
use staging_core::types::DownloaderFlavor;
use tempfile::TempDir;

fn settings_for(root: &Path) -> StagingSettings {
    StagingSettings::with_path(root.join("staging"))
}

fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o7777
}

#[test]
fn local_source_is_copied_into_subdir() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("app.tar.gz");
    fs::write(&source, b"payload").unwrap();

    let settings = settings_for(temp.path());
    let request =
        RetrievalRequest::new(source.to_string_lossy(), "app.tar.gz").with_subdir("app");
    let plan = StagingResolver::new(settings.path.clone())
        .resolve(&request, DownloaderFlavor::Curl)
        .unwrap();

    let mut stager = Stager::on_host(settings);
    let report = stager.apply(&plan).unwrap();

    let staged = temp.path().join("staging/app/app.tar.gz");
    assert_eq!(plan.target_file, staged);
    assert_eq!(fs::read(&staged).unwrap(), b"payload");
    assert!(report.directory_created);
    assert!(report.fetched);
    assert_eq!(mode_of(&temp.path().join("staging/app")), 0o755);
}

#[test]
fn existing_target_is_never_replaced() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("config.ini");
    fs::write(&source, b"new").unwrap();
    let target = temp.path().join("out/config.ini");
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"old").unwrap();

    let settings = settings_for(temp.path());
    let request =
        RetrievalRequest::new(source.to_string_lossy(), "config.ini").with_target(&target);
    let plan = StagingResolver::new(settings.path.clone())
        .resolve(&request, DownloaderFlavor::Curl)
        .unwrap();

    let report = Stager::on_host(settings).apply(&plan).unwrap();

    assert!(!report.fetched);
    assert_eq!(fs::read(&target).unwrap(), b"old");
}

#[test]
fn file_url_source_is_copied() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("data.bin");
    fs::write(&source, b"bytes").unwrap();

    let settings = settings_for(temp.path());
    let request = RetrievalRequest::new(format!("file://{}", source.display()), "data.bin");
    let plan = StagingResolver::new(settings.path.clone())
        .resolve(&request, DownloaderFlavor::Wget)
        .unwrap();
    assert!(plan.action.is_copy());

    Stager::on_host(settings).apply(&plan).unwrap();

    assert_eq!(
        fs::read(temp.path().join("staging/staging/data.bin")).unwrap(),
        b"bytes"
    );
}

#[test]
fn puppet_source_is_served_from_fileserver_root() {
    let temp = TempDir::new().unwrap();
    let files = temp.path().join("files");
    fs::create_dir_all(files.join("modules/app")).unwrap();
    fs::write(files.join("modules/app/app.conf"), b"conf").unwrap();

    let mut settings = settings_for(temp.path());
    settings.fileserver_root = Some(files);
    let request = RetrievalRequest::new("puppet:///modules/app/app.conf", "app.conf");
    let plan = StagingResolver::new(settings.path.clone())
        .resolve(&request, DownloaderFlavor::Curl)
        .unwrap();

    Stager::on_host(settings).apply(&plan).unwrap();

    assert_eq!(
        fs::read(temp.path().join("staging/staging/app.conf")).unwrap(),
        b"conf"
    );
}

#[test]
fn download_then_mode_is_applied() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("remote.bin");
    fs::write(&source, b"remote").unwrap();

    let settings = settings_for(temp.path());
    let request = RetrievalRequest::new("http://example.com/remote.bin", "remote.bin")
        .with_ownership(None, None, Some("0600".to_string()));
    let mut plan = StagingResolver::new(settings.path.clone())
        .resolve(&request, DownloaderFlavor::Curl)
        .unwrap();
    assert!(plan.needs_permission_fix);

    // Stand in for the network with a local copy.
    plan.action = Action::RunCommand {
        command: format!(
            "cp {} {}",
            shell::quote(&source.to_string_lossy()),
            shell::quote(&plan.target_file.to_string_lossy())
        ),
        flavor: DownloaderFlavor::Curl,
    };

    let mut stager = Stager::on_host(settings);
    let report = stager.apply(&plan).unwrap();

    assert!(report.fetched);
    assert!(report.permissions_fixed);
    assert_eq!(fs::read(&plan.target_file).unwrap(), b"remote");
    assert_eq!(mode_of(&plan.target_file), 0o600);

    // A second run is guarded by the existing file.
    let again = stager.apply(&plan).unwrap();
    assert!(!again.fetched);
}

#[test]
fn failing_download_leaves_no_file() {
    let temp = TempDir::new().unwrap();
    let settings = settings_for(temp.path());
    let request = RetrievalRequest::new("http://example.com/missing", "missing")
        .with_retry(None, Some(2), Some(0));
    let mut plan = StagingResolver::new(settings.path.clone())
        .resolve(&request, DownloaderFlavor::Curl)
        .unwrap();
    plan.action = Action::RunCommand {
        command: format!(
            "echo partial > {}; exit 22",
            shell::quote(&plan.target_file.to_string_lossy())
        ),
        flavor: DownloaderFlavor::Curl,
    };

    let err = Stager::on_host(settings).apply(&plan).unwrap_err();

    match err {
        StagingError::Transfer { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!plan.target_file.exists());
}

#[test]
fn manifest_entries_stage_into_shared_directory() {
    let temp = TempDir::new().unwrap();
    let sources = temp.path().join("src");
    fs::create_dir_all(&sources).unwrap();
    fs::write(sources.join("a.txt"), b"a").unwrap();
    fs::write(sources.join("b.txt"), b"b").unwrap();

    let manifest = parse_manifest_str(&format!(
        r#"
[file."a.txt"]
source = "{dir}/a.txt"
subdir = "shared"

[file."b.txt"]
source = "{dir}/b.txt"
subdir = "shared"
"#,
        dir = sources.display()
    ))
    .unwrap();

    let settings = settings_for(temp.path());
    let plans = StagingResolver::new(settings.path.clone())
        .resolve_all(&manifest.requests(), DownloaderFlavor::Curl)
        .unwrap();
    let reports = Stager::on_host(settings).apply_all(&plans).unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports.iter().filter(|r| r.directory_created).count(), 1);
    assert_eq!(
        fs::read(temp.path().join("staging/shared/b.txt")).unwrap(),
        b"b"
    );
}

/// Installs a `curl` stand-in that logs one argument per line and creates
/// the `-o` target.
fn install_fake_curl(bin: &Path) {
    fs::create_dir_all(bin).unwrap();
    let script = bin.join("curl");
    fs::write(
        &script,
        r#"#!/bin/sh
for arg in "$@"; do printf '%s\n' "$arg" >> "$ARGV_LOG"; done
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then : > "$2"; fi
  shift
done
"#,
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn rendered_curl_command_passes_each_value_as_one_argument() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    install_fake_curl(&bin);
    let log = temp.path().join("argv.log");

    let mut settings = settings_for(temp.path());
    settings.exec_path = format!("{}:/usr/bin:/bin", bin.display());

    let source = "http://example.com/my file.tar.gz?sig=a$b";
    let request = RetrievalRequest::new(source, "file.tar.gz")
        .with_credentials("deploy", "it's! $HOME `id`")
        .with_environment([format!("ARGV_LOG={}", log.display())]);
    let plan = StagingResolver::new(settings.path.clone())
        .resolve(&request, DownloaderFlavor::Curl)
        .unwrap();

    let report = Stager::on_host(settings).apply(&plan).unwrap();
    assert!(report.fetched);

    let logged = fs::read_to_string(&log).unwrap();
    let argv: Vec<&str> = logged.lines().collect();
    let user = argv.iter().position(|arg| *arg == "-u").unwrap();
    assert_eq!(argv[user + 1], "deploy:it's! $HOME `id`");
    assert_eq!(argv.last().copied(), Some(source));
    assert!(plan.target_file.exists());
}
