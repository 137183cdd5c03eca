//! Archive installer
//!
//! One extraction primitive over the two archive families the provisioners
//! use: zip-family packages (runtime packages, single-archive asset bundles)
//! and LZMA-family archives (the injector release). Callers pass an entry
//! mapper that both selects entries and decides where each one lands
//! relative to the target directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::progress::{emit, ProgressCallback, ProgressEvent};

/// Entries are reported with forward slashes; `None` skips the entry
pub type EntryMapper = Arc<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>;

/// Report extraction progress every this many entries
const PROGRESS_ENTRY_INTERVAL: usize = 16;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("could not open archive '{path}': {message}")]
    Open { path: PathBuf, message: String },

    #[error("failed to extract entry '{name}': {message}")]
    Entry { name: String, message: String },

    #[error("unsupported archive format: '{path}'")]
    UnsupportedFormat { path: PathBuf },

    #[error("file operation failed on '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Archive families supported by the installer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
}

impl ArchiveFormat {
    /// Select the format by file extension; `.nupkg` is a zip in disguise.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("zip") | Some("nupkg") => Ok(ArchiveFormat::Zip),
            Some("7z") => Ok(ArchiveFormat::SevenZip),
            _ => Err(ArchiveError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Keep every non-directory entry at its archived path
pub fn all_files() -> EntryMapper {
    Arc::new(|name| Some(PathBuf::from(name)))
}

/// Keep entries under any of the given prefixes, stripping the prefix.
///
/// Prefixes must end with `/`. An entry matching `runtimes/win-x64/native/`
/// lands directly in the target directory, not under the prefix.
pub fn strip_prefixes(prefixes: Vec<String>) -> EntryMapper {
    Arc::new(move |name| {
        prefixes
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty())
            .map(PathBuf::from)
    })
}

/// Extract the entries selected by `mapper` from `archive` into `target`.
///
/// Parent directories are created as needed and existing files are
/// overwritten. Any open or per-entry failure is fatal: a partially
/// extracted runtime is worse than a visible error, so nothing is skipped
/// silently.
pub async fn install_from(
    archive: &Path,
    target: &Path,
    mapper: EntryMapper,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let format = ArchiveFormat::from_path(archive)?;
    let archive = archive.to_path_buf();
    let target = target.to_path_buf();

    tokio::task::spawn_blocking(move || match format {
        ArchiveFormat::Zip => extract_zip(&archive, &target, &mapper, &progress),
        ArchiveFormat::SevenZip => extract_seven_zip(&archive, &target, &mapper, &progress),
    })
    .await
    .map_err(|e| ArchiveError::Entry {
        name: "<extraction task>".to_string(),
        message: e.to_string(),
    })?
}

fn extract_zip(
    archive: &Path,
    target: &Path,
    mapper: &EntryMapper,
    progress: &Option<ProgressCallback>,
) -> Result<()> {
    let file = File::open(archive).map_err(|e| ArchiveError::Open {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::Open {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;

    let archive_name = archive.display().to_string();
    let mut extracted = 0usize;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| ArchiveError::Entry {
            name: format!("#{}", index),
            message: e.to_string(),
        })?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().replace('\\', "/");
        let Some(relative) = mapper(&name) else {
            continue;
        };

        let dest = checked_join(target, &relative, &name)?;
        write_entry(&name, &mut entry, &dest)?;
        extracted += 1;
        if extracted % PROGRESS_ENTRY_INTERVAL == 0 {
            emit(
                progress,
                ProgressEvent::ExtractProgress {
                    archive: archive_name.clone(),
                    entries_extracted: extracted,
                },
            );
        }
    }

    emit(
        progress,
        ProgressEvent::ExtractComplete {
            archive: archive_name,
            entries_extracted: extracted,
        },
    );
    debug!("extracted {} entries from {}", extracted, archive.display());
    Ok(())
}

fn extract_seven_zip(
    archive: &Path,
    target: &Path,
    mapper: &EntryMapper,
    progress: &Option<ProgressCallback>,
) -> Result<()> {
    let file = File::open(archive).map_err(|e| ArchiveError::Open {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;

    let archive_name = archive.display().to_string();
    let mut extracted = 0usize;
    // The extract callback cannot return our error type, so failures are
    // parked here and extraction is stopped by returning Ok(false).
    let mut failure: Option<ArchiveError> = None;

    let result = sevenz_rust2::decompress_with_extract_fn(
        file,
        target,
        |entry, reader, _dest| {
            if entry.is_directory() {
                return Ok(true);
            }
            let name = entry.name().replace('\\', "/");
            let Some(relative) = mapper(&name) else {
                return Ok(true);
            };

            let dest = match checked_join(target, &relative, &name) {
                Ok(dest) => dest,
                Err(e) => {
                    failure = Some(e);
                    return Ok(false);
                }
            };
            match write_entry(&name, reader, &dest) {
                Ok(()) => {
                    extracted += 1;
                    if extracted % PROGRESS_ENTRY_INTERVAL == 0 {
                        emit(
                            progress,
                            ProgressEvent::ExtractProgress {
                                archive: archive_name.clone(),
                                entries_extracted: extracted,
                            },
                        );
                    }
                    Ok(true)
                }
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        },
    );

    if let Some(e) = failure {
        return Err(e);
    }
    result.map_err(|e| ArchiveError::Open {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;

    emit(
        progress,
        ProgressEvent::ExtractComplete {
            archive: archive_name,
            entries_extracted: extracted,
        },
    );
    debug!("extracted {} entries from {}", extracted, archive.display());
    Ok(())
}

/// Join a mapped entry path onto the target directory.
///
/// Entry names come from a remote-supplied archive; anything that could
/// climb out of the target (`..`, absolute paths) is rejected.
fn checked_join(target: &Path, relative: &Path, name: &str) -> Result<PathBuf> {
    use std::path::Component;
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Err(ArchiveError::Entry {
            name: name.to_string(),
            message: "entry path escapes the target directory".to_string(),
        });
    }
    Ok(target.join(relative))
}

fn write_entry(name: &str, reader: &mut dyn std::io::Read, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ArchiveError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let mut out = File::create(dest).map_err(|e| ArchiveError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;
    std::io::copy(reader, &mut out).map_err(|e| ArchiveError::Entry {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_all_files_recreating_directories() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        build_zip(
            &archive,
            &[("a.txt", b"one"), ("sub/deep/b.txt", b"two")],
        );

        let target = dir.path().join("out");
        install_from(&archive, &target, all_files(), None).await.unwrap();

        assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"one");
        assert_eq!(std::fs::read(target.join("sub/deep/b.txt")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn prefix_mapper_extracts_only_matching_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.nupkg");
        build_zip(
            &archive,
            &[
                ("runtimes/win-x64/native/loader.dll", b"native"),
                ("lib/net9.0/managed.dll", b"managed"),
                ("tools/skipme.exe", b"nope"),
                ("README.md", b"nope"),
            ],
        );

        let target = dir.path().join("out");
        let mapper = strip_prefixes(vec![
            "runtimes/win-x64/native/".to_string(),
            "lib/net9.0/".to_string(),
        ]);
        install_from(&archive, &target, mapper, None).await.unwrap();

        assert!(target.join("loader.dll").exists());
        assert!(target.join("managed.dll").exists());
        assert!(!target.join("skipme.exe").exists());
        assert!(!target.join("tools").exists());
        assert!(!target.join("README.md").exists());
    }

    #[tokio::test]
    async fn overwrites_existing_files() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        build_zip(&archive, &[("a.txt", b"fresh")]);

        let target = dir.path().join("out");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("a.txt"), b"stale").unwrap();

        install_from(&archive, &target, all_files(), None).await.unwrap();
        assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn entry_escaping_the_target_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(&archive, &[("../escaped.txt", b"nope"), ("ok.txt", b"fine")]);

        let target = dir.path().join("out/inner");
        let err = install_from(&archive, &target, all_files(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Entry { .. }));
        assert!(!dir.path().join("out/escaped.txt").exists());
    }

    #[tokio::test]
    async fn absolute_entry_path_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(&archive, &[("/tmp/escaped.txt", b"nope")]);

        let err = install_from(&archive, dir.path(), all_files(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Entry { .. }));
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bundle.rar");
        std::fs::write(&archive, b"not an archive").unwrap();

        let err = install_from(&archive, dir.path(), all_files(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn corrupt_archive_is_fatal() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = install_from(&archive, dir.path(), all_files(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Open { .. }));
    }

    #[test]
    fn format_detection() {
        assert_eq!(
            ArchiveFormat::from_path(Path::new("x/latest.7z")).unwrap(),
            ArchiveFormat::SevenZip
        );
        assert_eq!(
            ArchiveFormat::from_path(Path::new("pkg.1.0.0.nupkg")).unwrap(),
            ArchiveFormat::Zip
        );
    }
}
