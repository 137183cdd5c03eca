//! Game launcher provisioning and injection library
//!
//! Provisions a plugin-injector framework, its managed runtime and a
//! content-asset bundle from remote sources into a consistent on-disk
//! layout, then launches the game process and attaches the injector to it.
//! Network operations retry with exponential backoff, installs are
//! version-gated by plain-text markers, and the whole pipeline is driven by
//! a readiness state machine.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use launcher::{
//!     strategy_for, HttpFetcher, Launcher, LauncherConfig, ReadinessOrchestrator,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Arc::new(LauncherConfig::default());
//! let fetcher = Arc::new(HttpFetcher::new(config.fetch.clone())?);
//!
//! // Provision injector, runtime and assets (idempotent)
//! let orchestrator = ReadinessOrchestrator::new(config.clone(), fetcher);
//! let cancel = CancellationToken::new();
//! orchestrator.ensure_ready(None, &cancel).await?;
//!
//! // Launch the game and attach the injector
//! let launcher = Launcher::new(config.clone(), strategy_for(&config));
//! let (mut game, outcome) = launcher
//!     .launch_with_injection("session-id", &orchestrator.injector_dir(), &cancel)
//!     .await?;
//! println!("injection outcome: {:?}", outcome);
//! game.wait().await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod fetch;
pub mod install;
pub mod launch;
pub mod progress;
pub mod readiness;

// Re-export commonly used types for convenience
pub use archive::{ArchiveError, ArchiveFormat};
pub use config::{FetchConfig, InstallMode, LauncherConfig, Platform, PINNED_RUNTIME_VERSION};
pub use fetch::{FetchError, HttpFetcher};
pub use install::{InstallError, InstallLayout, VersionMarker};
pub use launch::{
    decide_injection, strategy_for, InjectionDecision, InjectionOutcome, LaunchError, Launcher,
};
pub use progress::{
    ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter, ProgressCallback,
    ProgressEvent, ProgressReporter,
};
pub use readiness::{ReadinessOrchestrator, ReadinessState};
