//! Unit tests for the retrying HTTP fetcher

use super::*;
use crate::config::FetchConfig;
use crate::progress::{ProgressCallback, ProgressEvent};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper struct to capture progress events during testing
#[derive(Default)]
struct ProgressCapture {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressCapture {
    fn new() -> Self {
        Self::default()
    }

    fn callback(&self) -> ProgressCallback {
        let events = self.events.clone();
        Arc::new(move |event| {
            events.lock().unwrap().push(event);
        })
    }

    fn retry_attempts(&self) -> Vec<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::RetryAttempt { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect()
    }

    fn count_complete(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::DownloadComplete { .. }))
            .count()
    }
}

fn fast_config() -> FetchConfig {
    FetchConfig {
        max_retries: 3,
        initial_delay_ms: 10,
        max_delay_ms: 1000,
        timeout_secs: 5,
        user_agent: "launcher-tests/0.1".to_string(),
    }
}

#[tokio::test]
async fn successful_download_lands_complete_on_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload-bytes".to_vec()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");
    let fetcher = HttpFetcher::new(fast_config()).unwrap();
    let capture = ProgressCapture::new();

    let bytes = fetcher
        .fetch(
            &format!("{}/file.bin", server.uri()),
            &dest,
            Some(capture.callback()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(bytes, 13);
    assert_eq!(std::fs::read(&dest).unwrap(), b"payload-bytes");
    assert!(!http::partial_path(&dest).exists());
    assert_eq!(capture.count_complete(), 1);
}

#[tokio::test]
async fn failing_transport_runs_initial_attempt_plus_retries() {
    let server = MockServer::start().await;
    // 1 initial attempt + 3 retries = exactly 4 requests
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("broken.bin");
    let fetcher = HttpFetcher::new(fast_config()).unwrap();
    let capture = ProgressCapture::new();

    let started = Instant::now();
    let err = fetcher
        .fetch(
            &format!("{}/broken", server.uri()),
            &dest,
            Some(capture.callback()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match err {
        FetchError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last, FetchError::Status { status: 500, .. }));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }

    // Backoff delays are 10ms, 20ms, 40ms: strictly doubling
    assert!(elapsed >= Duration::from_millis(70), "elapsed {:?}", elapsed);
    assert_eq!(capture.retry_attempts(), vec![1, 2, 3]);

    // No partial file survives exhaustion
    assert!(!dest.exists());
    assert!(!http::partial_path(&dest).exists());
}

#[tokio::test]
async fn non_success_status_is_retried_like_transport_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"recovered".to_vec()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("flaky.bin");
    let fetcher = HttpFetcher::new(fast_config()).unwrap();

    let bytes = fetcher
        .fetch(
            &format!("{}/flaky", server.uri()),
            &dest,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(bytes, 9);
    assert_eq!(std::fs::read(&dest).unwrap(), b"recovered");
}

#[tokio::test]
async fn cancelled_fetch_fails_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64 * 1024]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("big.bin");
    let fetcher = HttpFetcher::new(fast_config()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fetcher
        .fetch(&format!("{}/big", server.uri()), &dest, None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled { .. }));
    assert!(!dest.exists());
}

#[tokio::test]
async fn fetch_json_applies_the_same_backoff() {
    #[derive(serde::Deserialize)]
    struct Payload {
        value: u32,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 7})))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(fast_config()).unwrap();
    let payload: Payload = fetcher
        .fetch_json(&format!("{}/meta", server.uri()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(payload.value, 7);
}

#[tokio::test]
async fn fetch_json_exhaustion_reports_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(fast_config()).unwrap();
    let err = fetcher
        .fetch_json::<serde_json::Value>(&format!("{}/meta", server.uri()), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::RetriesExhausted { attempts: 4, .. }));
}

#[tokio::test]
async fn fetch_json_is_interrupted_by_cancellation_mid_flight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"value": 7}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(fast_config()).unwrap();
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = fetcher
        .fetch_json::<serde_json::Value>(&format!("{}/meta", server.uri()), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Cancelled { .. }));
    // Interrupted while the request was in flight, not after the response
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn probe_distinguishes_reachable_from_unreachable() {
    let server = MockServer::start().await;
    let fetcher = HttpFetcher::new(fast_config()).unwrap();

    // Any response counts as reachable, even a 404
    assert!(
        fetcher
            .probe_reachable(&format!("{}/anything", server.uri()), Duration::from_millis(500))
            .await
    );
    // Nothing listens on port 9 (discard)
    assert!(
        !fetcher
            .probe_reachable("http://127.0.0.1:9/", Duration::from_millis(300))
            .await
    );
}
