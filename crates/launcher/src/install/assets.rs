//! Content-asset bundle installer
//!
//! Gated on an integer manifest version. Unlike the injector and runtime
//! paths, per-file downloads here are best-effort: a partial asset set is
//! tolerable, a partial runtime is not.

use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive;
use crate::config::LauncherConfig;
use crate::fetch::{FetchError, HttpFetcher};
use crate::install::error::{InstallError, Result};
use crate::install::files::{prune_versions, remove_dir_best_effort, remove_file_best_effort, replace_dir_with_copy};
use crate::install::layout::InstallLayout;
use crate::install::marker::VersionMarker;
use crate::install::remote::AssetManifest;
use crate::progress::{emit, ProgressCallback, ProgressEvent};

pub struct AssetInstaller {
    fetcher: Arc<HttpFetcher>,
    layout: InstallLayout,
    config: Arc<LauncherConfig>,
}

impl AssetInstaller {
    pub fn new(fetcher: Arc<HttpFetcher>, layout: InstallLayout, config: Arc<LauncherConfig>) -> Self {
        Self {
            fetcher,
            layout,
            config,
        }
    }

    fn marker(&self) -> VersionMarker {
        VersionMarker::new(self.layout.asset_version_marker())
    }

    pub async fn installed_version(&self) -> Option<u32> {
        self.marker().read_int().await
    }

    /// Bring the asset bundle up to the manifest version.
    pub async fn ensure(
        &self,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let manifest: AssetManifest = self
            .fetcher
            .fetch_json(&self.config.asset_manifest_url, cancel)
            .await?;

        if let Some(local) = self.installed_version().await {
            if local >= manifest.version && self.layout.asset_version_dir(local).is_dir() {
                debug!("assets v{} already cover manifest v{}", local, manifest.version);
                return Ok(());
            }
        }

        let version_dir = self.layout.asset_version_dir(manifest.version);
        let marker = self.marker();
        marker
            .clear()
            .await
            .map_err(|e| InstallError::io(marker.path(), e))?;
        remove_dir_best_effort(&version_dir).await;
        fs::create_dir_all(&version_dir)
            .await
            .map_err(|e| InstallError::io(&version_dir, e))?;

        if let Some(package_url) = &manifest.package_url {
            self.install_package(package_url, &version_dir, progress.clone(), cancel)
                .await?;
        } else if let Some(files) = &manifest.assets {
            // Individual download failures are logged and skipped;
            // cancellation aborts the pass before the marker is written
            for file in files {
                let dest = version_dir.join(&file.file_name);
                match self
                    .fetcher
                    .fetch(&file.url, &dest, progress.clone(), cancel)
                    .await
                {
                    Ok(_) => {}
                    Err(e @ FetchError::Cancelled { .. }) => return Err(e.into()),
                    Err(e) => {
                        warn!("asset file {} failed: {}", file.file_name, e);
                        emit(
                            &progress,
                            ProgressEvent::Warning {
                                message: format!("asset file {} skipped: {}", file.file_name, e),
                            },
                        );
                    }
                }
            }
        } else {
            warn!("asset manifest v{} lists nothing to download", manifest.version);
        }

        marker
            .write(&manifest.version.to_string())
            .await
            .map_err(|e| InstallError::io(marker.path(), e))?;

        let dev_dir = self.layout.assets_dev_dir();
        replace_dir_with_copy(&version_dir, &dev_dir)
            .await
            .map_err(|e| InstallError::io(&dev_dir, e))?;

        let keep = manifest.version.to_string();
        prune_versions(&self.layout.assets_dir(), &[keep.as_str(), "dev"]).await;

        info!("assets v{} installed into {}", manifest.version, version_dir.display());
        Ok(())
    }

    async fn install_package(
        &self,
        package_url: &str,
        version_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let file_name = archive_file_name(package_url);
        let downloads = self.layout.downloads_dir();
        fs::create_dir_all(&downloads)
            .await
            .map_err(|e| InstallError::io(&downloads, e))?;
        let temp = downloads.join(file_name);

        let result = match self
            .fetcher
            .fetch(package_url, &temp, progress.clone(), cancel)
            .await
        {
            Ok(_) => archive::install_from(&temp, version_dir, archive::all_files(), progress)
                .await
                .map_err(Into::into),
            Err(e) => Err(e.into()),
        };
        remove_file_best_effort(&temp).await;
        result
    }
}

/// File name for the packaged asset download, taken from the URL path.
fn archive_file_name(package_url: &str) -> String {
    url::Url::parse(package_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "assets.zip".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_url() {
        assert_eq!(archive_file_name("https://x.example/path/assets-7.zip"), "assets-7.zip");
        assert_eq!(archive_file_name("https://x.example"), "assets.zip");
        assert_eq!(archive_file_name("not a url"), "assets.zip");
    }
}
