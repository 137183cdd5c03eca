//! Process launch and injection
//!
//! Platform-polymorphic launch (direct vs. through a compatibility shim),
//! runtime-root resolution with a configurable fallback chain, and the
//! augmented launch path that attaches the injector once the game presents
//! a window.

pub mod direct;
pub mod error;
pub mod inject;
pub mod shim;

pub use direct::DirectLaunch;
pub use error::{LaunchError, Result};
pub use inject::{
    InjectionFailureKind, InjectionOutcome, InjectionRequest, StartupGraceProbe, WindowProbe,
};
pub use shim::ShimLaunch;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{LauncherConfig, Platform};
use crate::install::runtime::is_runtime_at;
use crate::install::InstallLayout;

/// A started game process
pub struct GameProcess {
    child: Child,
}

impl GameProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    pub fn pid(&self) -> Result<u32> {
        self.child.id().ok_or(LaunchError::ProcessLifecycle {
            detail: "game process has no pid (already reaped)".to_string(),
        })
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }
}

/// One launch strategy per host OS, chosen once at startup.
#[async_trait]
pub trait LaunchStrategy: Send + Sync {
    fn executable_path(&self, game_dir: &Path) -> PathBuf;
    fn validate_path(&self, game_dir: &Path) -> Result<()>;
    async fn launch(
        &self,
        game_dir: &Path,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<GameProcess>;
}

/// Build the strategy for the configured platform.
pub fn strategy_for(config: &LauncherConfig) -> Box<dyn LaunchStrategy> {
    match config.platform {
        Platform::Windows => Box::new(DirectLaunch::new(config.game_executable.clone())),
        Platform::Linux => Box::new(ShimLaunch::new(
            config.shim_binary.clone(),
            config.shim_prefix(),
            config.game_executable.clone(),
        )),
    }
}

/// Fixed, version-agnostic server-selection arguments plus the session id.
pub fn session_args(session_id: &str, language: &str) -> Vec<String> {
    vec![
        "--service-region=1".to_string(),
        format!("--lang={}", language),
        format!("--session-id={}", session_id),
    ]
}

/// Decision taken before an augmented launch when the installed injector
/// version and the latest remote tag disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionDecision {
    /// Versions agree (or remote is unknown with a valid local install)
    Proceed,
    /// Mismatch and injection is optional: launch plain instead
    Fallback,
    /// Mismatch and injection is required: do not launch
    Abort,
}

/// Decide how to handle a version mismatch before an augmented launch.
///
/// `remote_tag` is `None` when the metadata endpoint was unreachable; an
/// offline launch with a previously valid install proceeds.
pub fn decide_injection(
    remote_tag: Option<&str>,
    installed: Option<&str>,
    injection_required: bool,
) -> InjectionDecision {
    match (remote_tag, installed) {
        (_, None) => {
            if injection_required {
                InjectionDecision::Abort
            } else {
                InjectionDecision::Fallback
            }
        }
        (None, Some(_)) => InjectionDecision::Proceed,
        (Some(remote), Some(local)) if remote == local => InjectionDecision::Proceed,
        (Some(_), Some(_)) => {
            if injection_required {
                InjectionDecision::Abort
            } else {
                InjectionDecision::Fallback
            }
        }
    }
}

/// Well-known sibling-application runtime locations, checked after the
/// managed and local installs. Data, not control flow: extend via
/// `LauncherConfig::runtime_search_paths`.
static KNOWN_RUNTIME_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let mut locations = Vec::new();
    if let Some(data) = dirs::data_dir() {
        locations.push(data.join("launcher-gui").join("runtime"));
        locations.push(data.join("launcher-legacy").join("runtime"));
        locations.push(data.join("companion-launcher").join("runtime"));
    }
    locations.push(system_runtime_dir());
    locations
});

fn system_runtime_dir() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\Program Files\\GameRuntime")
    } else {
        PathBuf::from("/usr/lib/game-runtime")
    }
}

/// Resolve the runtime root by walking the fallback chain in order:
/// managed install, local install directory, known sibling-application
/// locations, extra configured paths, system-wide location. Every
/// candidate is validated by the same three-condition check the installer
/// uses.
pub fn resolve_runtime_root(config: &LauncherConfig, layout: &InstallLayout) -> Result<PathBuf> {
    let mut candidates = vec![layout.runtime_dir()];
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("runtime"));
        }
    }
    candidates.extend(KNOWN_RUNTIME_LOCATIONS.iter().cloned());
    candidates.extend(config.runtime_search_paths.iter().cloned());

    let mut checked = Vec::new();
    for candidate in candidates {
        if is_runtime_at(&candidate, config) {
            debug!("using runtime at {}", candidate.display());
            return Ok(candidate);
        }
        checked.push(candidate);
    }
    Err(LaunchError::RuntimeNotFound { checked })
}

/// Launches the game, with or without injector augmentation.
///
/// Collaborators are passed in at construction; platform probing happens
/// once, in `strategy_for`, never per call.
pub struct Launcher {
    config: Arc<LauncherConfig>,
    layout: InstallLayout,
    strategy: Box<dyn LaunchStrategy>,
    probe: Arc<dyn WindowProbe>,
}

impl Launcher {
    pub fn new(config: Arc<LauncherConfig>, strategy: Box<dyn LaunchStrategy>) -> Self {
        Self {
            layout: InstallLayout::new(&config.install_root),
            config,
            strategy,
            probe: Arc::new(StartupGraceProbe::default()),
        }
    }

    /// Replace the window probe (used by tests and embedders).
    pub fn with_window_probe(mut self, probe: Arc<dyn WindowProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Plain launch without augmentation.
    pub async fn launch(&self, session_id: &str) -> Result<GameProcess> {
        self.strategy.validate_path(&self.config.game_path)?;
        let args = session_args(session_id, &self.config.language);
        self.strategy.launch(&self.config.game_path, &args, &[]).await
    }

    /// Augmented launch: start the game, wait for its window, then attach
    /// the injector. A reported injection failure does not kill the game;
    /// the process handle is returned alongside the outcome.
    pub async fn launch_with_injection(
        &self,
        session_id: &str,
        injector_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(GameProcess, InjectionOutcome)> {
        let runtime_root = resolve_runtime_root(&self.config, &self.layout)?;
        let runtime_env: Vec<(String, String)> = vec![
            ("RUNTIME_OVERRIDE".to_string(), runtime_root.display().to_string()),
            ("RUNTIME_ROOT".to_string(), runtime_root.display().to_string()),
        ];

        let args = session_args(session_id, &self.config.language);
        let mut game = self
            .strategy
            .launch(&self.config.game_path, &args, &runtime_env)
            .await?;

        inject::wait_for_ui(
            game.child_mut(),
            self.probe.as_ref(),
            inject::UI_WAIT_TIMEOUT,
            inject::UI_POLL_INTERVAL,
            cancel,
        )
        .await?;

        // Let the process finish initializing before attaching
        let configured = Duration::from_millis(self.config.injection_delay_ms);
        let settle = configured.max(inject::MIN_INJECTION_DELAY);
        info!("window up, settling {:?} before injection", settle);
        tokio::select! {
            _ = tokio::time::sleep(settle) => {}
            _ = cancel.cancelled() => return Err(LaunchError::Cancelled),
        }

        let request = InjectionRequest {
            pid: game.pid()?,
            working_dir: injector_dir.to_path_buf(),
            config_path: self.layout.plugin_config_file(),
            plugin_dir: self.layout.installed_plugins_dir(),
            dev_plugin_dir: self.layout.dev_plugins_dir(),
            asset_dir: self.layout.assets_dev_dir(),
            language: self.config.language.clone(),
            delay_initialize_ms: self.config.injection_delay_ms,
            safe_mode: self.config.safe_mode,
            runtime_root,
        };

        let injector_path = injector_dir.join(&self.config.injector_binary);
        let outcome = inject::run_injector(&injector_path, &request, cancel).await?;
        Ok((game, outcome))
    }
}
