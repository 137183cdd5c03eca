//! Injector process handling
//!
//! Waits for the game to present a UI surface, then spawns the injector
//! against its pid with the resolved paths and runtime environment,
//! capturing output line by line and classifying known failure signatures.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::launch::error::{LaunchError, Result};

/// Output substrings meaning the injector could not locate a runtime.
///
/// These get their own failure category because the remediation (fix or
/// reinstall the runtime) differs from a generic injection failure.
const RUNTIME_MISSING_SIGNATURES: &[&str] = &[
    "runtime path not found",
    "failed to locate the runtime",
    "hostfxr could not be loaded",
];

/// Longest we wait for the game to present a window
pub const UI_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Poll interval while waiting for the window
pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Longest we wait for the injector to exit
pub const INJECTOR_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
/// Minimum settling delay between window-up and injection
pub const MIN_INJECTION_DELAY: Duration = Duration::from_secs(3);

/// Everything gathered immediately before spawning the injector
#[derive(Debug, Clone)]
pub struct InjectionRequest {
    pub pid: u32,
    pub working_dir: PathBuf,
    pub config_path: PathBuf,
    pub plugin_dir: PathBuf,
    pub dev_plugin_dir: PathBuf,
    pub asset_dir: PathBuf,
    pub language: String,
    pub delay_initialize_ms: u64,
    pub safe_mode: bool,
    /// Runtime root exported to the injector child process
    pub runtime_root: PathBuf,
}

impl InjectionRequest {
    /// Fixed argument vector for the injector binary.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "inject".to_string(),
            "-v".to_string(),
            self.pid.to_string(),
            format!("--config={}", self.config_path.display()),
            format!("--plugins={}", self.plugin_dir.display()),
            format!("--dev-plugins={}", self.dev_plugin_dir.display()),
            format!("--assets={}", self.asset_dir.display()),
            format!("--lang={}", self.language),
            format!("--delay-init={}", self.delay_initialize_ms),
        ];
        if self.safe_mode {
            args.push("--no-plugins".to_string());
        }
        args
    }

    /// Environment variables pointing the injector at the runtime root.
    pub fn runtime_env(&self) -> [(&'static str, String); 2] {
        let root = self.runtime_root.display().to_string();
        [("RUNTIME_OVERRIDE", root.clone()), ("RUNTIME_ROOT", root)]
    }
}

/// How we detect that the target process has a top-level UI surface.
///
/// There is no portable window-handle query, so the probe is a seam:
/// platform launchers install a heuristic, tests install deterministic
/// probes.
pub trait WindowProbe: Send + Sync {
    fn has_ui_surface(&self, pid: u32) -> bool;
}

impl<F> WindowProbe for F
where
    F: Fn(u32) -> bool + Send + Sync,
{
    fn has_ui_surface(&self, pid: u32) -> bool {
        self(pid)
    }
}

/// Probe that treats a process surviving its first polls as windowed.
///
/// A game client that is still alive several poll intervals in has mapped
/// its window; one that crashes during startup is caught by the exit check
/// in the wait loop before this probe ever reports true.
pub struct StartupGraceProbe {
    polls_required: u32,
    polls_seen: AtomicU32,
}

impl StartupGraceProbe {
    pub fn new(polls_required: u32) -> Self {
        Self {
            polls_required,
            polls_seen: AtomicU32::new(0),
        }
    }
}

impl Default for StartupGraceProbe {
    fn default() -> Self {
        // 6 polls at 500ms = 3 seconds of survived startup
        Self::new(6)
    }
}

impl WindowProbe for StartupGraceProbe {
    fn has_ui_surface(&self, _pid: u32) -> bool {
        self.polls_seen.fetch_add(1, Ordering::Relaxed) + 1 >= self.polls_required
    }
}

/// Poll until the process presents a UI surface or exits.
///
/// Exiting before a surface appears is a fatal launch error reported
/// immediately, not after the full timeout.
pub async fn wait_for_ui(
    child: &mut Child,
    probe: &dyn WindowProbe,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(|e| LaunchError::ProcessLifecycle {
            detail: format!("could not poll game process: {}", e),
        })? {
            return Err(LaunchError::ProcessLifecycle {
                detail: format!("game process exited ({}) before presenting a window", status),
            });
        }

        let pid = child.id().unwrap_or(0);
        if probe.has_ui_surface(pid) {
            debug!("game process {} presented a ui surface", pid);
            return Ok(());
        }

        if tokio::time::Instant::now() + interval > deadline {
            return Err(LaunchError::ProcessLifecycle {
                detail: format!("game window did not appear within {:?}", timeout),
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return Err(LaunchError::Cancelled),
        }
    }
}

/// Result of running the injector. A reported failure still leaves the
/// game process running; callers decide whether to surface remediation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    Injected,
    ReportedFailure {
        kind: InjectionFailureKind,
        output: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionFailureKind {
    /// Injector exited non-zero without a recognized signature
    NonZeroExit(i32),
    /// Injector logged a known "cannot find runtime" signature
    RuntimeMissing,
}

/// Spawn the injector binary against the target pid and interpret its
/// exit code and output.
pub async fn run_injector(
    injector_path: &Path,
    request: &InjectionRequest,
    cancel: &CancellationToken,
) -> Result<InjectionOutcome> {
    info!(
        "injecting into pid {} with {}",
        request.pid,
        injector_path.display()
    );

    let mut command = Command::new(injector_path);
    command
        .args(request.args())
        .current_dir(&request.working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // The runtime variables go on the child specifically, not the parent
    for (key, value) in request.runtime_env() {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|e| LaunchError::Spawn {
        program: injector_path.to_path_buf(),
        source: e,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_task = tokio::spawn(collect_lines(stdout, "injector stdout"));
    let stderr_task = tokio::spawn(collect_lines(stderr, "injector stderr"));

    let status = tokio::select! {
        waited = tokio::time::timeout(INJECTOR_WAIT_TIMEOUT, child.wait()) => match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(LaunchError::ProcessLifecycle {
                    detail: format!("could not wait for injector: {}", e),
                })
            }
            Err(_) => {
                warn!("injector did not exit within {:?}, killing", INJECTOR_WAIT_TIMEOUT);
                let _ = child.kill().await;
                return Err(LaunchError::ProcessLifecycle {
                    detail: format!("injector did not exit within {:?}", INJECTOR_WAIT_TIMEOUT),
                });
            }
        },
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(LaunchError::Cancelled);
        }
    };

    let mut output = stdout_task.await.unwrap_or_default();
    let err_lines = stderr_task.await.unwrap_or_default();
    if !err_lines.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&err_lines);
    }

    let lowered = output.to_lowercase();
    if RUNTIME_MISSING_SIGNATURES.iter().any(|s| lowered.contains(s)) {
        return Ok(InjectionOutcome::ReportedFailure {
            kind: InjectionFailureKind::RuntimeMissing,
            output: format!(
                "injector could not use runtime at '{}': {}",
                request.runtime_root.display(),
                output
            ),
        });
    }

    match status.code() {
        Some(0) => Ok(InjectionOutcome::Injected),
        code => Ok(InjectionOutcome::ReportedFailure {
            kind: InjectionFailureKind::NonZeroExit(code.unwrap_or(-1)),
            output,
        }),
    }
}

async fn collect_lines(
    stream: Option<impl tokio::io::AsyncRead + Unpin>,
    label: &'static str,
) -> String {
    let Some(stream) = stream else {
        return String::new();
    };
    let mut lines = BufReader::new(stream).lines();
    let mut collected = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("{}: {}", label, line);
        collected.push(line);
    }
    collected.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InjectionRequest {
        InjectionRequest {
            pid: 4242,
            working_dir: PathBuf::from("/tmp"),
            config_path: PathBuf::from("/opt/l/config/dalamudConfig.json"),
            plugin_dir: PathBuf::from("/opt/l/config/installedPlugins"),
            dev_plugin_dir: PathBuf::from("/opt/l/config/devPlugins"),
            asset_dir: PathBuf::from("/opt/l/assets/dev"),
            language: "en".to_string(),
            delay_initialize_ms: 1500,
            safe_mode: false,
            runtime_root: PathBuf::from("/opt/l/runtime"),
        }
    }

    #[test]
    fn argument_vector_shape() {
        let args = request().args();
        assert_eq!(args[0], "inject");
        assert_eq!(args[1], "-v");
        assert_eq!(args[2], "4242");
        assert!(args.contains(&"--lang=en".to_string()));
        assert!(args.contains(&"--delay-init=1500".to_string()));
        assert!(!args.iter().any(|a| a == "--no-plugins"));

        let mut safe = request();
        safe.safe_mode = true;
        assert_eq!(safe.args().last().unwrap(), "--no-plugins");
    }

    #[test]
    fn runtime_env_points_at_root() {
        let env = request().runtime_env();
        assert_eq!(env[0].0, "RUNTIME_OVERRIDE");
        assert_eq!(env[1].0, "RUNTIME_ROOT");
        assert_eq!(env[0].1, "/opt/l/runtime");
    }

    #[test]
    fn startup_grace_probe_counts_polls() {
        let probe = StartupGraceProbe::new(3);
        assert!(!probe.has_ui_surface(1));
        assert!(!probe.has_ui_surface(1));
        assert!(probe.has_ui_surface(1));
        assert!(probe.has_ui_surface(1));
    }
}
