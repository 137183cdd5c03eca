//! Retrying HTTP fetcher
//!
//! Centralized HTTP client with streaming downloads, exponential backoff and
//! partial-file cleanup between attempts. Every remote call in the
//! provisioning pipeline goes through this type, including the small JSON
//! metadata fetches.

use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::fetch::error::{FetchError, Result};
use crate::progress::{emit, ProgressCallback, ProgressEvent};

/// HTTP client with retrying download support
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FetchError::Transport {
                url: "<client setup>".to_string(),
                source: e,
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Download `url` to `dest`, retrying with exponential backoff.
    ///
    /// One initial attempt plus `max_retries` retries. Before each retry the
    /// partial file from the previous attempt is deleted, then the loop
    /// sleeps `initial_delay * 2^(retry-1)`. On success the destination file
    /// is complete; on exhaustion it is absent and the last error is
    /// returned wrapped with the attempt count. Callers must never treat a
    /// leftover partial file as resumable.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let part_path = partial_path(dest);
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                remove_quietly(&part_path).await;
                emit(
                    &progress,
                    ProgressEvent::RetryAttempt {
                        url: url.to_string(),
                        attempt,
                        max_attempts: self.config.max_retries,
                    },
                );
                let delay = self.config.retry_delay(attempt - 1);
                debug!("retry {} for {} after {:?}", attempt, url, delay);
                tokio::time::sleep(delay).await;
            }

            match self
                .fetch_once(url, dest, &part_path, progress.clone(), cancel)
                .await
            {
                Ok(bytes) => return Ok(bytes),
                Err(e) if !e.is_recoverable() => {
                    remove_quietly(&part_path).await;
                    return Err(e);
                }
                Err(e) => {
                    debug!("attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = Some(e);
                }
            }
        }

        remove_quietly(&part_path).await;
        remove_quietly(dest).await;
        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.config.max_retries + 1,
            last: Box::new(last_error.expect("at least one attempt ran")),
        })
    }

    /// Single streaming download attempt: write to a `.part` file, then
    /// atomically rename over the destination.
    async fn fetch_once(
        &self,
        url: &str,
        dest: &Path,
        part_path: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(|e| FetchError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total_size = response.content_length();
        emit(
            &progress,
            ProgressEvent::DownloadStarted {
                url: url.to_string(),
                total_size,
            },
        );

        let mut file = fs::File::create(part_path).await.map_err(|e| FetchError::Io {
            path: part_path.to_path_buf(),
            source: e,
        })?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_report = std::time::Instant::now();

        while let Some(chunk_result) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled {
                    url: url.to_string(),
                });
            }

            let chunk = chunk_result.map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: e,
            })?;

            file.write_all(&chunk).await.map_err(|e| FetchError::Io {
                path: part_path.to_path_buf(),
                source: e,
            })?;
            downloaded += chunk.len() as u64;

            // Report at most every 100ms to bound callback overhead
            let now = std::time::Instant::now();
            if now.duration_since(last_report).as_millis() >= 100 {
                emit(
                    &progress,
                    ProgressEvent::DownloadProgress {
                        url: url.to_string(),
                        downloaded,
                        total: total_size,
                    },
                );
                last_report = now;
            }
        }

        file.flush().await.map_err(|e| FetchError::Io {
            path: part_path.to_path_buf(),
            source: e,
        })?;
        file.sync_all().await.map_err(|e| FetchError::Io {
            path: part_path.to_path_buf(),
            source: e,
        })?;
        drop(file);

        fs::rename(part_path, dest).await.map_err(|e| FetchError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;

        emit(
            &progress,
            ProgressEvent::DownloadComplete {
                url: url.to_string(),
                final_size: downloaded,
            },
        );
        debug!("downloaded {} ({} bytes)", url, downloaded);
        Ok(downloaded)
    }

    /// GET a JSON document with the same backoff policy as file downloads.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.retry_delay(attempt - 1);
                debug!("retry {} for {} after {:?}", attempt, url, delay);
                tokio::time::sleep(delay).await;
            }
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled {
                    url: url.to_string(),
                });
            }

            match self.fetch_json_once(url, cancel).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    debug!("attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.config.max_retries + 1,
            last: Box::new(last_error.expect("at least one attempt ran")),
        })
    }

    async fn fetch_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Transport {
                    url: url.to_string(),
                    source: e,
                })?;

            if !response.status().is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }

            response.json::<T>().await.map_err(|e| FetchError::InvalidPayload {
                url: url.to_string(),
                source: e,
            })
        };

        // Cancellation interrupts an in-flight request, not just the gaps
        // between attempts
        tokio::select! {
            result = request => result,
            _ = cancel.cancelled() => Err(FetchError::Cancelled {
                url: url.to_string(),
            }),
        }
    }

    /// Probe whether a base URL answers at all within `timeout`.
    ///
    /// Used to pick between the primary package registry and its mirror.
    /// Any response, including an error status, counts as reachable.
    pub async fn probe_reachable(&self, url: &str, timeout: Duration) -> bool {
        let request = self.client.head(url).timeout(timeout).send();
        match request.await {
            Ok(_) => true,
            Err(e) => {
                debug!("probe of {} failed: {}", url, e);
                false
            }
        }
    }
}

/// Path of the in-flight partial file for a destination
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {}", path.display(), e),
    }
}
