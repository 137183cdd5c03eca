//! Command-line driver for the launcher library

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use launcher::install::ReleaseDescriptor;
use launcher::{
    decide_injection, strategy_for, ConsoleProgressReporter, HttpFetcher, InjectionDecision,
    InstallMode, IntoProgressCallback, Launcher, LauncherConfig, ReadinessOrchestrator,
    VersionMarker,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "launcher-cli", about = "Provision and launch the game with the injector framework")]
struct Cli {
    /// Path to a JSON config file; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose progress output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and install the injector, runtime and assets
    Provision,
    /// Launch the game
    Launch {
        /// Session identifier from the login flow
        #[arg(long)]
        session_id: String,
        /// Skip injection and launch plain
        #[arg(long)]
        no_inject: bool,
        /// Inject with plugins disabled
        #[arg(long)]
        safe_mode: bool,
        /// Refuse to launch instead of falling back to a plain launch when
        /// the installed injector does not match the latest release
        #[arg(long)]
        require_injection: bool,
    },
    /// Print the current readiness state of the installation
    Status,
}

fn load_config(path: Option<&PathBuf>) -> Result<LauncherConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("could not read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("could not parse {}", path.display()))
        }
        None => Ok(LauncherConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    match cli.command {
        Commands::Provision => {
            let config = Arc::new(config);
            let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
            let orchestrator = ReadinessOrchestrator::new(config, fetcher);
            let progress = ConsoleProgressReporter::new(cli.verbose).into_callback();
            orchestrator.ensure_ready(Some(progress), &cancel).await?;
            println!("installation ready");
        }
        Commands::Launch {
            session_id,
            no_inject,
            safe_mode,
            require_injection,
        } => {
            config.safe_mode = config.safe_mode || safe_mode;
            let config = Arc::new(config);
            let strategy = strategy_for(&config);
            let launcher = Launcher::new(config.clone(), strategy);

            if no_inject {
                let mut game = launcher.launch(&session_id).await?;
                let status = game.wait().await?;
                println!("game exited: {}", status);
                return Ok(());
            }

            let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
            let orchestrator = ReadinessOrchestrator::new(config.clone(), fetcher.clone());
            let progress = ConsoleProgressReporter::new(cli.verbose).into_callback();
            orchestrator.ensure_ready(Some(progress), &cancel).await?;

            let decision = match &config.install_mode {
                // A user-supplied build carries no marker; readiness
                // already validated it
                InstallMode::External(_) => InjectionDecision::Proceed,
                InstallMode::Managed => {
                    let remote_tag = fetcher
                        .fetch_json::<ReleaseDescriptor>(&config.release_metadata_url, &cancel)
                        .await
                        .ok()
                        .map(|d| d.tag);
                    let installed = VersionMarker::new(
                        orchestrator.layout().injector_version_marker(),
                    )
                    .read()
                    .await;
                    decide_injection(remote_tag.as_deref(), installed.as_deref(), require_injection)
                }
            };

            match decision {
                InjectionDecision::Abort => {
                    anyhow::bail!(
                        "installed injector does not match the latest release and injection is required"
                    );
                }
                InjectionDecision::Fallback => {
                    eprintln!("injector version mismatch, launching without injection");
                    let mut game = launcher.launch(&session_id).await?;
                    let status = game.wait().await?;
                    println!("game exited: {}", status);
                }
                InjectionDecision::Proceed => {
                    let (mut game, outcome) = launcher
                        .launch_with_injection(&session_id, &orchestrator.injector_dir(), &cancel)
                        .await?;
                    println!("injection outcome: {:?}", outcome);
                    let status = game.wait().await?;
                    println!("game exited: {}", status);
                }
            }
        }
        Commands::Status => {
            let config = Arc::new(config);
            let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
            let orchestrator = ReadinessOrchestrator::new(config, fetcher);
            println!("state: {}", orchestrator.state());
            println!("injector dir: {}", orchestrator.injector_dir().display());
        }
    }

    Ok(())
}
