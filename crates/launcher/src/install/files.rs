//! File system helpers shared by the provisioners
//!
//! Cleanup-only operations here swallow their own errors: pruning stale
//! versions and deleting temp files are hygiene, not correctness.

use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Delete a directory tree, logging instead of failing.
pub async fn remove_dir_best_effort(path: &Path) {
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {}", path.display(), e),
    }
}

/// Delete a file, logging instead of failing.
pub async fn remove_file_best_effort(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {}", path.display(), e),
    }
}

/// Remove every version-named subdirectory of `parent` except `keep`.
///
/// Best-effort: a locked stale version is logged and left behind.
pub async fn prune_versions(parent: &Path, keep: &[&str]) {
    let mut entries = match fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(_) => return,
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if keep.iter().any(|k| *k == name) {
            continue;
        }
        if entry.path().is_dir() {
            warn!("pruning stale version {}", entry.path().display());
            remove_dir_best_effort(&entry.path()).await;
        }
    }
}

/// Recursively copy `src` into `dst`, replacing `dst` if it exists.
pub async fn replace_dir_with_copy(src: &Path, dst: &Path) -> std::io::Result<()> {
    remove_dir_best_effort(dst).await;
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || copy_dir_recursive(&src, &dst))
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
