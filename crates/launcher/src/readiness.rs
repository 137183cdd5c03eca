//! Readiness orchestration
//!
//! The state machine that sequences the provisioners: injector (or external
//! validation), then runtime, then assets. Provisioning steps never run
//! concurrently; each mutates shared directories the next one depends on.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::{InstallMode, LauncherConfig};
use crate::fetch::HttpFetcher;
use crate::install::error::{InstallError, Result};
use crate::install::{injector, AssetInstaller, InjectorInstaller, InstallLayout, RuntimeInstaller};
use crate::progress::{emit, ProgressCallback, ProgressEvent};

/// Provisioning state, strictly forward except `Failed`.
///
/// `Failed` is reachable from any fetching state; the next `ensure_ready`
/// call restarts at `Checking`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    NotReady,
    Checking,
    FetchingInjector,
    FetchingRuntime,
    FetchingAssets,
    Ready,
    Failed { message: String },
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::NotReady => write!(f, "not ready"),
            ReadinessState::Checking => write!(f, "checking"),
            ReadinessState::FetchingInjector => write!(f, "fetching injector"),
            ReadinessState::FetchingRuntime => write!(f, "fetching runtime"),
            ReadinessState::FetchingAssets => write!(f, "fetching assets"),
            ReadinessState::Ready => write!(f, "ready"),
            ReadinessState::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

/// Drives provisioning and owns the readiness state.
///
/// Constructed with its collaborators passed in explicitly; there is no
/// global service cache, so tests build as many orchestrators as they like.
pub struct ReadinessOrchestrator {
    config: Arc<LauncherConfig>,
    layout: InstallLayout,
    injector: InjectorInstaller,
    runtime: RuntimeInstaller,
    assets: AssetInstaller,
    state: std::sync::Mutex<ReadinessState>,
    // Serializes concurrent ensure_ready calls; two simultaneous launches
    // must not race on directory deletion and recreation.
    in_flight: tokio::sync::Mutex<()>,
}

impl ReadinessOrchestrator {
    pub fn new(config: Arc<LauncherConfig>, fetcher: Arc<HttpFetcher>) -> Self {
        let layout = InstallLayout::new(&config.install_root);
        Self {
            injector: InjectorInstaller::new(fetcher.clone(), layout.clone(), config.clone()),
            runtime: RuntimeInstaller::new(fetcher.clone(), layout.clone(), config.clone()),
            assets: AssetInstaller::new(fetcher, layout.clone(), config.clone()),
            layout,
            config,
            state: std::sync::Mutex::new(ReadinessState::NotReady),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> ReadinessState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Directory the injector binary will be run from, depending on mode.
    pub fn injector_dir(&self) -> PathBuf {
        match &self.config.install_mode {
            InstallMode::Managed => self.layout.injector_dir(),
            InstallMode::External(dir) => dir.clone(),
        }
    }

    fn set_state(&self, next: ReadinessState, progress: &Option<ProgressCallback>) {
        debug!("readiness: {}", next);
        *self.state.lock().expect("state lock poisoned") = next.clone();
        emit(progress, ProgressEvent::StateChanged { state: next });
    }

    /// Provision everything needed to attempt injection.
    ///
    /// Idempotent and safe to call repeatedly; once `Ready`, returns
    /// immediately without network calls.
    pub async fn ensure_ready(
        &self,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let _in_flight = self.in_flight.lock().await;
        if self.state() == ReadinessState::Ready {
            return Ok(());
        }

        self.set_state(ReadinessState::Checking, &progress);
        let result = self.run_stages(&progress, cancel).await;
        match &result {
            Ok(()) => self.set_state(ReadinessState::Ready, &progress),
            Err(e) => {
                error!("provisioning failed: {}", e);
                self.set_state(
                    ReadinessState::Failed {
                        message: e.to_string(),
                    },
                    &progress,
                );
            }
        }
        result
    }

    async fn run_stages(
        &self,
        progress: &Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.layout
            .ensure()
            .await
            .map_err(|e| InstallError::io(self.layout.root(), e))?;

        match &self.config.install_mode {
            InstallMode::External(dir) => {
                // A user-supplied build: validated, never modified
                let missing = injector::missing_files(dir, &self.config);
                if !missing.is_empty() {
                    return Err(InstallError::ExternalInstallInvalid {
                        dir: dir.clone(),
                        missing,
                    });
                }
            }
            InstallMode::Managed => {
                self.set_state(ReadinessState::FetchingInjector, progress);
                self.injector.ensure(progress.clone(), cancel).await?;
            }
        }

        self.set_state(ReadinessState::FetchingRuntime, progress);
        self.runtime.ensure(progress.clone(), cancel).await?;

        self.set_state(ReadinessState::FetchingAssets, progress);
        self.assets.ensure(progress.clone(), cancel).await?;

        Ok(())
    }
}
