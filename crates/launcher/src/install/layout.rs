//! Installation directory layout
//!
//! A directory tree owned exclusively by the launcher, with four fixed
//! subareas: `injector/`, `runtime/`, `assets/`, `config/`. Every subarea is
//! created idempotently; absence of one never corrupts the others.

use std::path::{Path, PathBuf};
use tokio::fs;

/// Path map over the installation root
#[derive(Debug, Clone)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn injector_dir(&self) -> PathBuf {
        self.root.join("injector")
    }

    pub fn injector_version_marker(&self) -> PathBuf {
        self.injector_dir().join("version")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join("runtime")
    }

    /// Canonical loader location: `runtime/host/fxr/<version>/`
    pub fn runtime_host_fxr_dir(&self, version: &str) -> PathBuf {
        self.runtime_dir().join("host").join("fxr").join(version)
    }

    /// `runtime/shared/<name>/<version>/`
    pub fn runtime_shared_dir(&self, name: &str, version: &str) -> PathBuf {
        self.runtime_dir().join("shared").join(name).join(version)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_version_dir(&self, version: u32) -> PathBuf {
        self.assets_dir().join(version.to_string())
    }

    /// Stable alias directory mirroring the current asset version
    pub fn assets_dev_dir(&self) -> PathBuf {
        self.assets_dir().join("dev")
    }

    pub fn asset_version_marker(&self) -> PathBuf {
        self.assets_dir().join("version")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn installed_plugins_dir(&self) -> PathBuf {
        self.config_dir().join("installedPlugins")
    }

    pub fn dev_plugins_dir(&self) -> PathBuf {
        self.config_dir().join("devPlugins")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.config_dir().join("logs")
    }

    /// Plugin-state config file; written by the injector framework, but the
    /// path is produced here.
    pub fn plugin_config_file(&self) -> PathBuf {
        self.config_dir().join("dalamudConfig.json")
    }

    /// Scratch area for in-flight downloads
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    /// Create every subarea that must exist before provisioning runs.
    pub async fn ensure(&self) -> std::io::Result<()> {
        for dir in [
            self.root.clone(),
            self.injector_dir(),
            self.runtime_dir(),
            self.assets_dir(),
            self.config_dir(),
            self.installed_plugins_dir(),
            self.dev_plugins_dir(),
            self.logs_dir(),
            self.downloads_dir(),
        ] {
            fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = InstallLayout::new(dir.path());
        layout.ensure().await.unwrap();
        layout.ensure().await.unwrap();

        assert!(layout.injector_dir().is_dir());
        assert!(layout.installed_plugins_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
    }

    #[test]
    fn paths_are_rooted() {
        let layout = InstallLayout::new("/opt/launcher");
        assert_eq!(
            layout.runtime_host_fxr_dir("9.0.11"),
            PathBuf::from("/opt/launcher/runtime/host/fxr/9.0.11")
        );
        assert_eq!(
            layout.runtime_shared_dir("Runtime.Core", "9.0.11"),
            PathBuf::from("/opt/launcher/runtime/shared/Runtime.Core/9.0.11")
        );
        assert_eq!(layout.asset_version_dir(7), PathBuf::from("/opt/launcher/assets/7"));
    }
}
