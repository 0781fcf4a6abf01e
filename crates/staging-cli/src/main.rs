//! Staging - stage local or remote files into a managed directory
//!
//! Usage:
//!   staging plan <source> --name app.tar.gz   # Show what would happen
//!   staging file <source> --name app.tar.gz   # Stage one file
//!   staging apply staging-manifest.toml       # Stage every file in a manifest
//!   staging init --flavor wget                # Write a settings file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use staging_core::config::StagingSettings;
use staging_core::context::StagingContext;
use staging_core::executor::StageReport;
use staging_core::manifest::parse_manifest;
use staging_core::plan::{ResolvedPlan, StepKind};
use staging_core::request::{DEFAULT_SUBDIR, RetrievalRequest};
use staging_core::types::DownloaderFlavor;

#[derive(Parser)]
#[command(name = "staging")]
#[command(about = "Stage files from local paths and URLs", long_about = None)]
struct Cli {
    /// Settings file (defaults to the user's config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Downloader flavor, overriding the settings file
    #[arg(long, global = true)]
    flavor: Option<FlavorArg>,

    /// Base staging path, overriding the settings file
    #[arg(long, global = true, value_name = "PATH")]
    path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a file declaration and print the plan without touching the host
    Plan(FileArgs),

    /// Resolve and stage a single file
    File(FileArgs),

    /// Stage every file declared in a manifest
    Apply {
        /// Manifest with [file.<name>] entries
        manifest: PathBuf,

        /// Resolve and print plans only
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a settings file from the defaults and the global overrides
    Init {
        /// Replace an existing settings file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FlavorArg {
    Curl,
    Wget,
    Powershell,
}

impl From<FlavorArg> for DownloaderFlavor {
    fn from(flavor: FlavorArg) -> Self {
        match flavor {
            FlavorArg::Curl => DownloaderFlavor::Curl,
            FlavorArg::Wget => DownloaderFlavor::Wget,
            FlavorArg::Powershell => DownloaderFlavor::Powershell,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct FileArgs {
    /// Local path or URL (http, https, ftp, s3, file, puppet)
    source: String,
    /// Logical name and default filename (defaults to the last segment of the source)
    #[arg(long)]
    name: Option<String>,
    /// Folder under the staging path
    #[arg(long, default_value = DEFAULT_SUBDIR)]
    subdir: String,
    /// Explicit destination file
    #[arg(long)]
    target: Option<PathBuf>,
    /// Username for basic authentication
    #[arg(long)]
    username: Option<String>,
    /// Password, or the certificate password when --certificate is set
    #[arg(long)]
    password: Option<String>,
    /// Client certificate (https only)
    #[arg(long)]
    certificate: Option<String>,
    /// Skip TLS validation (powershell flavor)
    #[arg(long)]
    novalidate: bool,
    /// Extra options passed to curl
    #[arg(long, allow_hyphen_values = true)]
    curl_option: Option<String>,
    /// Extra options passed to wget
    #[arg(long, allow_hyphen_values = true)]
    wget_option: Option<String>,
    /// Environment for the download command (KEY=VALUE)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    environment: Vec<String>,
    /// Seconds before one try is abandoned (0 disables)
    #[arg(long)]
    timeout: Option<u64>,
    /// Number of tries
    #[arg(long)]
    tries: Option<u32>,
    /// Seconds between tries
    #[arg(long)]
    try_sleep: Option<u64>,
    /// Owner of the staged file
    #[arg(long)]
    owner: Option<String>,
    /// Group of the staged file
    #[arg(long)]
    group: Option<String>,
    /// Octal mode of the staged file
    #[arg(long)]
    mode: Option<String>,
    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

impl FileArgs {
    fn to_request(&self) -> Result<RetrievalRequest> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => default_name(&self.source).with_context(|| {
                format!("Cannot derive a name from '{}', pass --name", self.source)
            })?,
        };

        if let Some(mode) = &self.mode {
            staging_core::config::parse_octal_mode(mode)?;
        }
        if let Some(entry) = self.environment.iter().find(|entry| !entry.contains('=')) {
            anyhow::bail!("Environment entry '{}' must be KEY=VALUE", entry);
        }

        let mut request = RetrievalRequest::new(&self.source, name)
            .with_subdir(&self.subdir)
            .with_novalidate(self.novalidate)
            .with_environment(self.environment.iter().cloned())
            .with_retry(self.timeout, self.tries, self.try_sleep)
            .with_ownership(self.owner.clone(), self.group.clone(), self.mode.clone());

        if let Some(target) = &self.target {
            request = request.with_target(target);
        }
        if let Some(username) = &self.username {
            request.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            request = request.with_password(password);
        }
        if let Some(certificate) = &self.certificate {
            request = request.with_certificate(certificate);
        }
        if let Some(option) = &self.curl_option {
            request = request.with_curl_option(option);
        }
        if let Some(option) = &self.wget_option {
            request = request.with_wget_option(option);
        }

        Ok(request)
    }
}

/// Last path segment of a source, ignoring any query string.
fn default_name(source: &str) -> Option<String> {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    path.rsplit(['/', '\\'])
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
}

fn main() -> Result<()> {
    // Logs go to stderr so plans and reports can be piped
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staging_core=info,staging=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        // Runs without loading settings so it can replace a broken file.
        Commands::Init { force } => run_init(&cli, *force),
        Commands::Plan(args) => run_plan(&load_context(&cli)?, args),
        Commands::File(args) => run_file(&load_context(&cli)?, args),
        Commands::Apply {
            manifest,
            dry_run,
            format,
        } => run_apply(&load_context(&cli)?, manifest, *dry_run, *format),
    }
}

fn load_context(cli: &Cli) -> Result<StagingContext> {
    let flavor = cli.flavor.map(DownloaderFlavor::from);
    let mut context = StagingContext::load(cli.config.as_deref(), flavor)?;
    if let Some(path) = &cli.path {
        context = context.with_staging_path(path);
    }
    tracing::debug!(
        flavor = %context.flavor(),
        path = %context.settings().path.display(),
        "loaded settings"
    );
    Ok(context)
}

fn run_init(cli: &Cli, force: bool) -> Result<()> {
    let store = StagingContext::store(cli.config.as_deref())?;
    let mut settings = StagingSettings::new();
    if let Some(flavor) = cli.flavor {
        settings.flavor = DownloaderFlavor::from(flavor).as_str().to_string();
    }
    if let Some(path) = &cli.path {
        settings.path = path.clone();
    }

    store.save(&settings, force)?;
    println!("✓ Wrote settings to {}", store.config_path().display());
    Ok(())
}

fn run_plan(context: &StagingContext, args: &FileArgs) -> Result<()> {
    let request = args.to_request()?;
    let plan = context.resolve(&request)?;
    print_plans(std::slice::from_ref(&plan), args.format)
}

fn run_file(context: &StagingContext, args: &FileArgs) -> Result<()> {
    let request = args.to_request()?;
    let plan = context.resolve(&request)?;
    let report = context
        .stager()
        .apply(&plan)
        .with_context(|| format!("Failed to stage '{}'", plan.name))?;
    print_reports(std::slice::from_ref(&report), args.format)
}

fn run_apply(
    context: &StagingContext,
    manifest_path: &std::path::Path,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let manifest = parse_manifest(manifest_path)?;
    let requests = manifest.requests();

    // Every declaration must resolve before anything touches the host.
    let plans = context
        .resolver()
        .resolve_all(&requests, context.flavor())
        .with_context(|| format!("Failed to resolve manifest: {}", manifest_path.display()))?;

    if dry_run {
        return print_plans(&plans, format);
    }

    let mut stager = context.stager();
    let mut reports = Vec::with_capacity(plans.len());
    let mut failures = 0usize;
    for plan in &plans {
        match stager.apply(plan) {
            Ok(report) => reports.push(report),
            Err(e) => {
                failures += 1;
                tracing::error!(name = %plan.name, error = %e, "failed to stage file");
            }
        }
    }

    print_reports(&reports, format)?;

    if failures > 0 {
        anyhow::bail!("{} of {} files failed to stage", failures, plans.len());
    }
    Ok(())
}

fn print_plans(plans: &[ResolvedPlan], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for plan in plans {
                println!("{} ({})", plan.name, plan.transport.as_str());
                for step in plan.steps() {
                    match step.kind {
                        StepKind::Download => println!(
                            "  {:<16} {}\n  {:<16} {}",
                            step.kind.as_str(),
                            step.path.display(),
                            "",
                            plan.action.command().unwrap_or_default()
                        ),
                        _ => println!("  {:<16} {}", step.kind.as_str(), step.path.display()),
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(plans)?);
        }
    }
    Ok(())
}

fn print_reports(reports: &[StageReport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for report in reports {
                if report.fetched {
                    println!("✓ Staged '{}' at {}", report.name, report.target_file.display());
                } else {
                    println!(
                        "• '{}' is already staged at {}",
                        report.name,
                        report.target_file.display()
                    );
                }
                if report.permissions_fixed {
                    println!("  Applied owner/group/mode");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
    }
    Ok(())
}
