//! Progress tracking and reporting for provisioning operations

use std::sync::Arc;

use crate::readiness::ReadinessState;

/// Progress callback for provisioning and download operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while provisioning the installation
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    DownloadStarted {
        url: String,
        total_size: Option<u64>,
    },
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
    },
    RetryAttempt {
        url: String,
        attempt: usize,
        max_attempts: usize,
    },
    ExtractProgress {
        archive: String,
        entries_extracted: usize,
    },
    ExtractComplete {
        archive: String,
        entries_extracted: usize,
    },
    StateChanged {
        state: ReadinessState,
    },
    Warning {
        message: String,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_download_started(&self, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64) {}
    fn on_retry_attempt(&self, _url: &str, _attempt: usize, _max_attempts: usize) {}
    fn on_extract_progress(&self, _archive: &str, _entries_extracted: usize) {}
    fn on_extract_complete(&self, _archive: &str, _entries_extracted: usize) {}
    fn on_state_changed(&self, _state: &ReadinessState) {}
    fn on_warning(&self, _message: &str) {}
}

/// Extension trait to convert a ProgressReporter into a ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::DownloadStarted { url, total_size } => {
                self.on_download_started(&url, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total } => {
                self.on_download_progress(&url, downloaded, total);
            }
            ProgressEvent::DownloadComplete { url, final_size } => {
                self.on_download_complete(&url, final_size);
            }
            ProgressEvent::RetryAttempt { url, attempt, max_attempts } => {
                self.on_retry_attempt(&url, attempt, max_attempts);
            }
            ProgressEvent::ExtractProgress { archive, entries_extracted } => {
                self.on_extract_progress(&archive, entries_extracted);
            }
            ProgressEvent::ExtractComplete { archive, entries_extracted } => {
                self.on_extract_complete(&archive, entries_extracted);
            }
            ProgressEvent::StateChanged { state } => {
                self.on_state_changed(&state);
            }
            ProgressEvent::Warning { message } => {
                self.on_warning(&message);
            }
        })
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        match total_size {
            Some(size) => println!("downloading {} ({} bytes)", url, size),
            None => println!("downloading {}", url),
        }
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>) {
        if self.verbose {
            match total {
                Some(total) => {
                    let percent = (downloaded as f64 / total as f64) * 100.0;
                    println!("{}: {:.1}% ({}/{} bytes)", url, percent, downloaded, total);
                }
                None => println!("{}: {} bytes", url, downloaded),
            }
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        println!("downloaded {} ({} bytes)", url, final_size);
    }

    fn on_retry_attempt(&self, url: &str, attempt: usize, max_attempts: usize) {
        println!("retry {}/{} for {}", attempt, max_attempts, url);
    }

    fn on_extract_progress(&self, archive: &str, entries_extracted: usize) {
        if self.verbose {
            println!("{}: {} entries extracted", archive, entries_extracted);
        }
    }

    fn on_extract_complete(&self, archive: &str, entries_extracted: usize) {
        println!("extracted {} ({} entries)", archive, entries_extracted);
    }

    fn on_state_changed(&self, state: &ReadinessState) {
        println!("state: {}", state);
    }

    fn on_warning(&self, message: &str) {
        eprintln!("warning: {}", message);
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Emit an event through an optional callback
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
