//! Configuration types for the launcher
//!
//! Plain structs with `Default` implementations; the CLI loads overrides
//! from a JSON file via serde. Paths, remote endpoints and the pinned
//! runtime version all live here so nothing in the pipeline reaches for
//! globals.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The managed runtime version the injector framework is built against.
///
/// Deliberately pinned instead of resolved from a live compatibility query:
/// pulling a newer runtime than the injector was compiled for breaks
/// injection, so upgrades happen here, with a launcher release.
pub const PINNED_RUNTIME_VERSION: &str = "9.0.11";

/// Target platform for package selection and launch strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    /// Runtime identifier used in package payload paths.
    ///
    /// The game binary is a Windows executable on every host (the Linux
    /// path runs it through a compatibility shim), so the runtime payload
    /// is always the win-x64 one.
    pub fn rid(&self) -> &'static str {
        "win-x64"
    }
}

/// Where the injector install comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallMode {
    /// This launcher owns the injector directory and keeps it updated
    Managed,
    /// A user-supplied directory: validated, never modified or deleted
    External(PathBuf),
}

/// Configuration for retrying HTTP fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Retries after the initial attempt
    pub max_retries: usize,
    /// Initial backoff delay in milliseconds (doubles each retry)
    pub initial_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl FetchConfig {
    /// Backoff delay for the given zero-based retry index
    pub fn retry_delay(&self, retry: usize) -> Duration {
        let delay = self.initial_delay_ms.saturating_mul(2_u64.saturating_pow(retry as u32));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            timeout_secs: 300,
            user_agent: "launcher/0.1.0".to_string(),
        }
    }
}

/// Top-level launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Directory tree owned exclusively by this launcher
    pub install_root: PathBuf,
    /// Game installation directory
    pub game_path: PathBuf,
    /// Name of the game executable inside `game_path`
    pub game_executable: String,
    pub install_mode: InstallMode,
    pub platform: Platform,
    /// Language code passed through to the injector
    pub language: String,
    /// Extra settling time before injection, milliseconds
    pub injection_delay_ms: u64,
    /// Launch the injector with plugins disabled
    pub safe_mode: bool,

    /// Injector framework release metadata endpoint
    pub release_metadata_url: String,
    /// Name of the release asset holding the injector archive
    pub release_asset_name: String,
    /// Injector binary file name
    pub injector_binary: String,
    /// Libraries that must sit next to the injector binary
    pub injector_required_libs: Vec<String>,

    /// Content asset manifest endpoint
    pub asset_manifest_url: String,

    /// Primary package registry base URL
    pub registry_primary: String,
    /// Mirror used when the primary is unreachable
    pub registry_mirror: String,
    /// Reachability probe timeout in milliseconds
    pub registry_probe_timeout_ms: u64,

    /// Pinned managed runtime version (see [`PINNED_RUNTIME_VERSION`])
    pub runtime_version: String,
    pub runtime_core_package: String,
    pub runtime_desktop_package: String,
    /// Shared-directory names under `runtime/shared/`
    pub runtime_core_shared: String,
    pub runtime_desktop_shared: String,
    /// Loader file relocated into `runtime/host/fxr/<version>/`
    pub runtime_loader_file: String,
    /// File whose presence marks a complete core runtime payload
    pub runtime_core_sentinel: String,
    /// File whose presence marks a complete desktop runtime payload
    pub runtime_desktop_sentinel: String,
    /// Additional well-known runtime install locations to search at launch
    pub runtime_search_paths: Vec<PathBuf>,

    /// Compatibility shim binary (non-Windows hosts)
    pub shim_binary: PathBuf,

    pub fetch: FetchConfig,
}

impl LauncherConfig {
    /// Shim prefix environment directory
    pub fn shim_prefix(&self) -> PathBuf {
        self.install_root.join("prefix")
    }

    pub fn registry_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_probe_timeout_ms)
    }

    /// `major.minor` slice of the runtime version, used in managed-library
    /// payload paths (`lib/net<major.minor>/`).
    pub fn runtime_major_minor(&self) -> String {
        let mut parts = self.runtime_version.splitn(3, '.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => format!("{}.{}", major, minor),
            _ => self.runtime_version.clone(),
        }
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let install_root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("launcher");

        Self {
            install_root,
            game_path: PathBuf::new(),
            game_executable: "game.exe".to_string(),
            install_mode: InstallMode::Managed,
            platform: Platform::current(),
            language: "en".to_string(),
            injection_delay_ms: 0,
            safe_mode: false,

            release_metadata_url: "https://releases.example.com/injector/latest".to_string(),
            release_asset_name: "injector-release.7z".to_string(),
            injector_binary: "injector.exe".to_string(),
            injector_required_libs: vec!["hooks.dll".to_string(), "bootstrap.dll".to_string()],

            asset_manifest_url: "https://releases.example.com/assets/manifest.json".to_string(),

            registry_primary: "https://packages.example.com/v3/flatcontainer".to_string(),
            registry_mirror: "https://packages-mirror.example.com/v3/flatcontainer".to_string(),
            registry_probe_timeout_ms: 5000,

            runtime_version: PINNED_RUNTIME_VERSION.to_string(),
            runtime_core_package: "runtime.core.win-x64".to_string(),
            runtime_desktop_package: "runtime.desktop.win-x64".to_string(),
            runtime_core_shared: "Runtime.Core".to_string(),
            runtime_desktop_shared: "Runtime.Desktop".to_string(),
            runtime_loader_file: "hostfxr.dll".to_string(),
            runtime_core_sentinel: "coreclr.dll".to_string(),
            runtime_desktop_sentinel: "wpfcore.dll".to_string(),
            runtime_search_paths: Vec::new(),

            shim_binary: PathBuf::from("wine"),

            fetch: FetchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles_and_caps() {
        let config = FetchConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 500,
            ..FetchConfig::default()
        };
        assert_eq!(config.retry_delay(0), Duration::from_millis(100));
        assert_eq!(config.retry_delay(1), Duration::from_millis(200));
        assert_eq!(config.retry_delay(2), Duration::from_millis(400));
        assert_eq!(config.retry_delay(3), Duration::from_millis(500));
        assert_eq!(config.retry_delay(10), Duration::from_millis(500));
    }

    #[test]
    fn major_minor_derivation() {
        let mut config = LauncherConfig::default();
        config.runtime_version = "9.0.11".to_string();
        assert_eq!(config.runtime_major_minor(), "9.0");
        config.runtime_version = "10".to_string();
        assert_eq!(config.runtime_major_minor(), "10");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = LauncherConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: LauncherConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.runtime_version, config.runtime_version);
        assert_eq!(back.install_mode, InstallMode::Managed);
    }
}
