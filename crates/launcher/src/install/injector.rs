//! Injector framework installer
//!
//! Version-gated against the remote release descriptor: when the installed
//! files validate and the local marker matches the latest tag, this is a
//! no-op beyond the metadata fetch. Otherwise the install directory is
//! rebuilt from the downloaded release archive.

use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive;
use crate::config::LauncherConfig;
use crate::fetch::HttpFetcher;
use crate::install::error::{InstallError, Result};
use crate::install::files::remove_file_best_effort;
use crate::install::layout::InstallLayout;
use crate::install::marker::VersionMarker;
use crate::install::remote::ReleaseDescriptor;
use crate::progress::ProgressCallback;

pub struct InjectorInstaller {
    fetcher: Arc<HttpFetcher>,
    layout: InstallLayout,
    config: Arc<LauncherConfig>,
}

/// Required file names that are absent from an injector directory.
///
/// An install only counts when the injector binary and every required
/// library are all present; one missing file invalidates the whole install.
pub fn missing_files(dir: &Path, config: &LauncherConfig) -> Vec<String> {
    if !dir.is_dir() {
        let mut all = vec![config.injector_binary.clone()];
        all.extend(config.injector_required_libs.iter().cloned());
        return all;
    }
    std::iter::once(&config.injector_binary)
        .chain(config.injector_required_libs.iter())
        .filter(|name| !dir.join(name.as_str()).is_file())
        .cloned()
        .collect()
}

impl InjectorInstaller {
    pub fn new(fetcher: Arc<HttpFetcher>, layout: InstallLayout, config: Arc<LauncherConfig>) -> Self {
        Self {
            fetcher,
            layout,
            config,
        }
    }

    fn marker(&self) -> VersionMarker {
        VersionMarker::new(self.layout.injector_version_marker())
    }

    /// Files present and version marker recorded. Marker absence means not
    /// installed even when the files look fine: a crash mid-install must
    /// never pass as success.
    pub async fn is_installed(&self) -> bool {
        missing_files(&self.layout.injector_dir(), &self.config).is_empty()
            && self.marker().read().await.is_some()
    }

    pub async fn installed_version(&self) -> Option<String> {
        self.marker().read().await
    }

    /// Bring the injector install up to the latest remote release.
    pub async fn ensure(
        &self,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let descriptor: ReleaseDescriptor = self
            .fetcher
            .fetch_json(&self.config.release_metadata_url, cancel)
            .await?;

        if self.is_installed().await {
            if let Some(installed) = self.installed_version().await {
                if installed == descriptor.tag {
                    debug!("injector {} is current, skipping", installed);
                    return Ok(());
                }
                info!("injector {} superseded by {}", installed, descriptor.tag);
            }
        }

        self.reinstall(&descriptor, progress, cancel).await
    }

    async fn reinstall(
        &self,
        descriptor: &ReleaseDescriptor,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let asset = descriptor
            .asset(&self.config.release_asset_name)
            .ok_or_else(|| InstallError::DescriptorAssetMissing {
                tag: descriptor.tag.clone(),
                name: self.config.release_asset_name.clone(),
            })?;

        let downloads = self.layout.downloads_dir();
        fs::create_dir_all(&downloads)
            .await
            .map_err(|e| InstallError::io(&downloads, e))?;
        let temp = downloads.join(&asset.name);

        let result = match self
            .fetcher
            .fetch(&asset.url, &temp, progress.clone(), cancel)
            .await
        {
            Ok(_) => self.install_archive(&temp, &descriptor.tag, progress).await,
            Err(e) => Err(e.into()),
        };
        // Temp file goes away on success and failure alike
        remove_file_best_effort(&temp).await;
        result
    }

    async fn install_archive(
        &self,
        archive_path: &Path,
        tag: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let dir = self.layout.injector_dir();
        let marker = self.marker();

        // Marker first: from here on the install reads as absent
        marker
            .clear()
            .await
            .map_err(|e| InstallError::io(marker.path(), e))?;

        // A locked file here should not abort the install; extraction
        // overwrites whatever survives the delete
        crate::install::files::remove_dir_best_effort(&dir).await;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| InstallError::io(&dir, e))?;

        archive::install_from(archive_path, &dir, archive::all_files(), progress).await?;

        let missing = missing_files(&dir, &self.config);
        if !missing.is_empty() {
            return Err(InstallError::IntegrityMismatch { dir, missing });
        }

        marker
            .write(tag)
            .await
            .map_err(|e| InstallError::io(marker.path(), e))?;
        info!("injector {} installed into {}", tag, dir.display());
        Ok(())
    }
}
