use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use git_archiver::health::CheckResult;
use git_archiver::report::log_summary;
use git_archiver::sync::is_existing_clone;
use git_archiver::{
    Config, GitCli, HealthCheck, HostInfo, LogReporter, RepositoryTarget, Scheduler,
    SyncReporter, Synchronizer, VcsExecutor,
};

#[derive(Parser)]
#[command(name = "git-archiver")]
#[command(about = "Periodic git repository mirroring daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to ./configs/config.yaml, then the XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror all configured repositories until interrupted (default)
    Run,

    /// Sync every repository once and exit
    Once,

    /// List configured repositories
    List {
        /// Show the local state of each repository
        #[arg(long)]
        details: bool,
    },

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    debug!("Starting git-archiver v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(cli.config).await,
        Commands::Once => cmd_once(cli.config).await,
        Commands::List { details } => cmd_list(details, cli.config).await,
        Commands::Doctor => cmd_doctor(cli.config).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

/// Check git, then locate, load and validate the targets. Any failure is fatal.
async fn prepare(config: Option<PathBuf>) -> Result<(GitCli, Vec<RepositoryTarget>)> {
    let git = GitCli::default();
    if let Err(e) = git.check_available().await {
        error!("Git command not found! Make sure git is installed properly.");
        return Err(e).context("Cannot mirror repositories without git");
    }

    let config_path = Config::resolve_path(config)?;
    let config = Config::load(&config_path)?;
    let targets = config
        .targets()
        .with_context(|| format!("Invalid configuration in {:?}", config_path))?;

    info!(
        "Loaded configuration with {} repositories from {}",
        targets.len(),
        config_path.display()
    );
    for (i, target) in targets.iter().enumerate() {
        info!(
            "Repository {}: {} every {:?} -> {}",
            i + 1,
            target.url,
            target.interval,
            target.local_path.display()
        );
    }

    Ok((git, targets))
}

/// Mirror every repository on its own schedule until interrupted
async fn cmd_run(config: Option<PathBuf>) -> Result<()> {
    let (git, targets) = prepare(config).await?;

    let scheduler = Scheduler::new(Synchronizer::new(Arc::new(git)), Arc::new(LogReporter));
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received, stopping scheduler...");
        signal_cancel.cancel();
    });

    scheduler.run(targets, cancel).await;
    Ok(())
}

/// Sync every repository once, concurrently, then exit
async fn cmd_once(config: Option<PathBuf>) -> Result<()> {
    let (git, targets) = prepare(config).await?;

    let synchronizer = Synchronizer::new(Arc::new(git));
    let targets: Vec<_> = targets.into_iter().map(Arc::new).collect();
    let summary = synchronizer.sync_all(&targets).await;

    for result in &summary.results {
        LogReporter.report(result);
    }
    log_summary(&summary);

    if summary.has_failures() {
        anyhow::bail!(
            "{} of {} repositories failed to sync",
            summary.failed,
            summary.total_repositories
        );
    }
    Ok(())
}

/// Print the configured repositories
async fn cmd_list(details: bool, config: Option<PathBuf>) -> Result<()> {
    let config_path = Config::resolve_path(config)?;
    let config = Config::load(&config_path)?;
    let targets = config
        .targets()
        .with_context(|| format!("Invalid configuration in {:?}", config_path))?;

    println!("Loaded configuration with {} repositories", targets.len());
    for (i, target) in targets.iter().enumerate() {
        println!();
        println!("Repository {}:", i + 1);
        println!("  URL: {}", target.url);
        println!("  Update Interval: {:?}", target.interval);
        println!("  Local Path: {}", target.local_path.display());
        if details {
            let state = if is_existing_clone(&target.local_path).await {
                "cloned (next sync pulls)"
            } else {
                "missing (next sync clones)"
            };
            println!("  State: {}", state);
        }
    }

    Ok(())
}

/// Run health checks and print host information
async fn cmd_doctor(config: Option<PathBuf>) -> Result<()> {
    let config_path = Config::resolve_path(config)?;
    let health = HealthCheck::run(&GitCli::default(), &config_path).await;
    print_health_report(&health);

    println!();
    println!("Host:");
    for (label, value) in HostInfo::gather().entries() {
        println!("  {}: {}", label, value);
    }

    if !health.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 git-archiver System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    let warnings = health.warnings().len();
    if health.all_passed() {
        if warnings > 0 {
            println!("✅ All checks passed ({} warnings)", warnings);
        } else {
            println!("✅ All checks passed");
        }
    } else {
        println!(
            "❌ {} checks failed, {} warnings",
            health.errors().len(),
            warnings
        );
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT, Ctrl+C)
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => debug!("Ctrl+C received"),
                    _ = sigterm.recv() => debug!("SIGTERM received"),
                }
                return;
            }
            Err(e) => error!("Failed to listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    debug!("Ctrl+C received");
}
