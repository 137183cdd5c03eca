//! Version markers
//!
//! A marker is a small plain-text file recording the last successfully
//! installed version of a component. Absence means "not installed" even if
//! files are present, and markers are deleted before any destructive
//! reinstall so a crash mid-install can never masquerade as success.

use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct VersionMarker {
    path: PathBuf,
}

impl VersionMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Installed version tag, or `None` when missing or empty.
    pub async fn read(&self) -> Option<String> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Err(_) => None,
        }
    }

    /// Installed version as an integer (asset bundles use numeric versions).
    pub async fn read_int(&self) -> Option<u32> {
        self.read().await.and_then(|v| v.parse().ok())
    }

    pub async fn write(&self, version: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, version).await
    }

    /// Remove the marker. Must run before the install directory is touched.
    pub async fn clear(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_marker_reads_none() {
        let dir = tempdir().unwrap();
        let marker = VersionMarker::new(dir.path().join("version"));
        assert_eq!(marker.read().await, None);
        assert_eq!(marker.read_int().await, None);
    }

    #[tokio::test]
    async fn write_read_clear_round_trip() {
        let dir = tempdir().unwrap();
        let marker = VersionMarker::new(dir.path().join("version"));

        marker.write("v1.2.3").await.unwrap();
        assert_eq!(marker.read().await.as_deref(), Some("v1.2.3"));

        marker.clear().await.unwrap();
        assert_eq!(marker.read().await, None);
        // Clearing twice is fine
        marker.clear().await.unwrap();
    }

    #[tokio::test]
    async fn whitespace_and_integers() {
        let dir = tempdir().unwrap();
        let marker = VersionMarker::new(dir.path().join("version"));

        marker.write("42\n").await.unwrap();
        assert_eq!(marker.read_int().await, Some(42));

        marker.write("   ").await.unwrap();
        assert_eq!(marker.read().await, None);
    }
}
