//! Managed runtime installer
//!
//! Fetches two packages (core and desktop runtime) from a package registry,
//! extracts their native and managed payloads into the shared runtime tree,
//! relocates the loader into its canonical host path, and prunes superseded
//! versions. The registry base URL is picked per provisioning pass by a
//! reachability probe with a mirror fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::LauncherConfig;
use crate::fetch::HttpFetcher;
use crate::install::error::{InstallError, Result};
use crate::install::files::{prune_versions, remove_dir_best_effort, remove_file_best_effort};
use crate::install::layout::InstallLayout;
use crate::progress::ProgressCallback;

pub struct RuntimeInstaller {
    fetcher: Arc<HttpFetcher>,
    layout: InstallLayout,
    config: Arc<LauncherConfig>,
}

/// Paths that must all exist for a runtime root to count as installed.
///
/// All three or nothing: a loader from one version paired with binaries
/// from another is exactly the state this check exists to reject.
pub fn runtime_missing(root: &Path, config: &LauncherConfig) -> Vec<PathBuf> {
    let version = &config.runtime_version;
    let required = [
        root.join("host")
            .join("fxr")
            .join(version)
            .join(&config.runtime_loader_file),
        root.join("shared")
            .join(&config.runtime_core_shared)
            .join(version)
            .join(&config.runtime_core_sentinel),
        root.join("shared")
            .join(&config.runtime_desktop_shared)
            .join(version)
            .join(&config.runtime_desktop_sentinel),
    ];
    required.into_iter().filter(|p| !p.is_file()).collect()
}

/// Whether `root` holds a complete runtime for the configured version.
pub fn is_runtime_at(root: &Path, config: &LauncherConfig) -> bool {
    runtime_missing(root, config).is_empty()
}

impl RuntimeInstaller {
    pub fn new(fetcher: Arc<HttpFetcher>, layout: InstallLayout, config: Arc<LauncherConfig>) -> Self {
        Self {
            fetcher,
            layout,
            config,
        }
    }

    pub fn is_installed(&self) -> bool {
        is_runtime_at(&self.layout.runtime_dir(), &self.config)
    }

    /// Install the pinned runtime version if it is not already valid.
    pub async fn ensure(
        &self,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let version = self.config.runtime_version.clone();
        if self.is_installed() {
            debug!("runtime {} already installed", version);
            return Ok(());
        }

        let base = self.resolve_registry_base().await;
        self.clear_runtime_root().await?;

        let packages = [
            (
                self.config.runtime_core_package.clone(),
                self.config.runtime_core_shared.clone(),
            ),
            (
                self.config.runtime_desktop_package.clone(),
                self.config.runtime_desktop_shared.clone(),
            ),
        ];

        for (package, shared_name) in &packages {
            self.install_package(&base, package, shared_name, &version, progress.clone(), cancel)
                .await?;
        }

        self.relocate_loader(&version).await?;

        let missing = runtime_missing(&self.layout.runtime_dir(), &self.config);
        if !missing.is_empty() {
            return Err(InstallError::IntegrityMismatch {
                dir: self.layout.runtime_dir(),
                missing: missing.iter().map(|p| p.display().to_string()).collect(),
            });
        }

        self.prune(&version).await;
        info!("runtime {} installed", version);
        Ok(())
    }

    /// Pick the registry base for this whole provisioning pass.
    async fn resolve_registry_base(&self) -> String {
        let timeout = self.config.registry_probe_timeout();
        if self
            .fetcher
            .probe_reachable(&self.config.registry_primary, timeout)
            .await
        {
            self.config.registry_primary.clone()
        } else {
            info!(
                "registry {} unreachable, using mirror {}",
                self.config.registry_primary, self.config.registry_mirror
            );
            self.config.registry_mirror.clone()
        }
    }

    async fn install_package(
        &self,
        base: &str,
        package: &str,
        shared_name: &str,
        version: &str,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = package_url(base, package, version);
        let downloads = self.layout.downloads_dir();
        fs::create_dir_all(&downloads)
            .await
            .map_err(|e| InstallError::io(&downloads, e))?;
        let temp = downloads.join(format!("{}.{}.nupkg", package, version));
        let dest = self.layout.runtime_shared_dir(shared_name, version);

        let mapper = archive::strip_prefixes(vec![
            format!("runtimes/{}/native/", self.config.platform.rid()),
            format!("lib/net{}/", self.config.runtime_major_minor()),
        ]);

        let result = match self.fetcher.fetch(&url, &temp, progress.clone(), cancel).await {
            Ok(_) => archive::install_from(&temp, &dest, mapper, progress)
                .await
                .map_err(Into::into),
            Err(e) => Err(e.into()),
        };
        remove_file_best_effort(&temp).await;
        result
    }

    /// Move the loader that ships inside the core package into the host
    /// path consumers expect. This is required post-processing, not an
    /// extraction quirk.
    async fn relocate_loader(&self, version: &str) -> Result<()> {
        let loader = &self.config.runtime_loader_file;
        let source = self
            .layout
            .runtime_shared_dir(&self.config.runtime_core_shared, version)
            .join(loader);
        let host_dir = self.layout.runtime_host_fxr_dir(version);

        fs::create_dir_all(&host_dir)
            .await
            .map_err(|e| InstallError::io(&host_dir, e))?;
        let target = host_dir.join(loader);
        fs::rename(&source, &target)
            .await
            .map_err(|e| InstallError::io(&source, e))?;
        debug!("relocated {} to {}", loader, target.display());
        Ok(())
    }

    /// Delete the runtime root before a reinstall.
    ///
    /// If the whole-tree delete fails partway (locked files), fall back to
    /// removing `host/` and `shared/`. Those are the two version-sensitive
    /// subtrees; clearing both keeps loader and binaries version-paired.
    async fn clear_runtime_root(&self) -> Result<()> {
        let root = self.layout.runtime_dir();
        match fs::remove_dir_all(&root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("could not fully remove {}: {}", root.display(), e);
                remove_dir_best_effort(&root.join("host")).await;
                remove_dir_best_effort(&root.join("shared")).await;
            }
        }
        fs::create_dir_all(&root)
            .await
            .map_err(|e| InstallError::io(&root, e))?;
        Ok(())
    }

    /// Remove version directories other than the current one from all three
    /// shared locations. Best-effort hygiene.
    async fn prune(&self, version: &str) {
        let root = self.layout.runtime_dir();
        let roots = [
            root.join("host").join("fxr"),
            root.join("shared").join(&self.config.runtime_core_shared),
            root.join("shared").join(&self.config.runtime_desktop_shared),
        ];
        for parent in &roots {
            prune_versions(parent, &[version]).await;
        }
    }
}

/// Content-addressed package URL in the registry's flat-container scheme.
fn package_url(base: &str, package: &str, version: &str) -> String {
    let package = package.to_lowercase();
    format!(
        "{}/{}/{}/{}.{}.nupkg",
        base.trim_end_matches('/'),
        package,
        version,
        package,
        version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_url_shape() {
        assert_eq!(
            package_url("https://reg.example/v3/flat/", "Runtime.Core.Win-x64", "9.0.11"),
            "https://reg.example/v3/flat/runtime.core.win-x64/9.0.11/runtime.core.win-x64.9.0.11.nupkg"
        );
    }

    #[test]
    fn missing_list_has_no_partial_credit() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig::default();
        let root = dir.path();

        assert_eq!(runtime_missing(root, &config).len(), 3);

        // Create two of three: still not installed
        let version = &config.runtime_version;
        let loader = root.join("host/fxr").join(version).join(&config.runtime_loader_file);
        std::fs::create_dir_all(loader.parent().unwrap()).unwrap();
        std::fs::write(&loader, b"x").unwrap();
        let core = root
            .join("shared")
            .join(&config.runtime_core_shared)
            .join(version)
            .join(&config.runtime_core_sentinel);
        std::fs::create_dir_all(core.parent().unwrap()).unwrap();
        std::fs::write(&core, b"x").unwrap();

        assert_eq!(runtime_missing(root, &config).len(), 1);
        assert!(!is_runtime_at(root, &config));

        let desktop = root
            .join("shared")
            .join(&config.runtime_desktop_shared)
            .join(version)
            .join(&config.runtime_desktop_sentinel);
        std::fs::create_dir_all(desktop.parent().unwrap()).unwrap();
        std::fs::write(&desktop, b"x").unwrap();

        assert!(is_runtime_at(root, &config));

        // Deleting any one required file flips the check back
        std::fs::remove_file(&loader).unwrap();
        assert!(!is_runtime_at(root, &config));
    }
}
