//! Integration tests: local HTTP image server, the curl-backed collaborator,
//! and the pipeline's artifact lifecycle.

mod common;

use async_trait::async_trait;
use futures::TryStreamExt;
use imgfilter_core::artifact::ArtifactStore;
use imgfilter_core::config::{FetchConfig, FilterConfig};
use imgfilter_core::{
    validate_image_url, CurlImageFilter, FetchError, FilterError, ImageFilter, Pipeline,
    PipelineError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use url::Url;

fn curl_filter(dir: &Path, fetch: FetchConfig) -> CurlImageFilter {
    let store = ArtifactStore::open(dir).unwrap();
    CurlImageFilter::new(store, fetch, FilterConfig::default())
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

/// Polls `cond` until it holds; artifact deletion runs on the blocking pool.
async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..300 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn curl_filter_writes_greyscale_jpeg_artifact() {
    let server = common::image_server::start();
    let dir = tempdir().unwrap();
    let filter = curl_filter(dir.path(), FetchConfig::default());

    let url = Url::parse(&server.url("/image.png")).unwrap();
    let path = filter.fetch_and_filter(&url).await.expect("fetch_and_filter");

    assert!(path.starts_with(dir.path()));
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (256, 256));
    assert_eq!(img.color(), image::ColorType::L8);
}

#[tokio::test]
async fn http_error_status_leaves_no_artifact() {
    let server = common::image_server::start();
    let dir = tempdir().unwrap();
    let filter = curl_filter(dir.path(), FetchConfig::default());

    let url = Url::parse(&server.url("/missing.png")).unwrap();
    let err = filter.fetch_and_filter(&url).await.unwrap_err();
    assert!(
        matches!(err, FilterError::Fetch(FetchError::Http { code: 404, .. })),
        "{err}"
    );
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = common::image_server::start();
    let dir = tempdir().unwrap();
    let fetch = FetchConfig {
        max_bytes: 1024,
        ..FetchConfig::default()
    };
    let filter = curl_filter(dir.path(), fetch);

    let url = Url::parse(&server.url("/big")).unwrap();
    let err = filter.fetch_and_filter(&url).await.unwrap_err();
    assert!(
        matches!(err, FilterError::Fetch(FetchError::TooLarge { limit: 1024 })),
        "{err}"
    );
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = common::image_server::start();
    let dir = tempdir().unwrap();
    let filter = curl_filter(dir.path(), FetchConfig::default());

    let url = Url::parse(&server.url("/garbage")).unwrap();
    let err = filter.fetch_and_filter(&url).await.unwrap_err();
    assert!(matches!(err, FilterError::Decode(_)), "{err}");
    assert!(dir_is_empty(dir.path()));
}

#[tokio::test]
async fn unreachable_host_is_a_curl_error() {
    let dir = tempdir().unwrap();
    let fetch = FetchConfig {
        connect_timeout_secs: 2,
        ..FetchConfig::default()
    };
    let filter = curl_filter(dir.path(), fetch);

    // Port 1 on loopback refuses connections.
    let url = Url::parse("http://127.0.0.1:1/cat.jpg").unwrap();
    let err = filter.fetch_and_filter(&url).await.unwrap_err();
    assert!(matches!(err, FilterError::Fetch(FetchError::Curl(_))), "{err}");
}

#[tokio::test]
async fn pipeline_streams_artifact_then_deletes_it() {
    let server = common::image_server::start();
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(Arc::new(curl_filter(dir.path(), FetchConfig::default())));

    let request = validate_image_url(Some(&server.url("/image.png"))).unwrap();
    let served = pipeline.run(request).await.expect("pipeline run");
    let path = served.path().to_path_buf();
    let on_disk = std::fs::read(&path).unwrap();

    assert_eq!(served.content_type(), "image/jpeg");
    assert_eq!(served.content_length(), on_disk.len() as u64);

    let body: Vec<u8> = served.into_stream().try_concat().await.unwrap();
    assert_eq!(body, on_disk);
    assert!(eventually(|| !path.exists()).await, "artifact not deleted");
}

#[tokio::test]
async fn same_request_twice_yields_independent_artifacts() {
    let server = common::image_server::start();
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(Arc::new(curl_filter(dir.path(), FetchConfig::default())));

    let url = server.url("/image.png");
    let first = pipeline
        .run(validate_image_url(Some(&url)).unwrap())
        .await
        .unwrap();
    let second = pipeline
        .run(validate_image_url(Some(&url)).unwrap())
        .await
        .unwrap();
    let (p1, p2) = (first.path().to_path_buf(), second.path().to_path_buf());
    assert_ne!(p1, p2);

    let _ = first.into_stream().try_concat().await.unwrap();
    assert!(eventually(|| !p1.exists()).await);
    assert!(p2.exists(), "first cleanup must not touch the second artifact");

    let body: Vec<u8> = second.into_stream().try_concat().await.unwrap();
    assert!(!body.is_empty());
    assert!(eventually(|| !p2.exists()).await);
}

#[tokio::test]
async fn rejected_urls_never_reach_the_image_server() {
    let server = common::image_server::start();
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(Arc::new(curl_filter(dir.path(), FetchConfig::default())));

    let valid = server.url("/image.png");
    let schemeless = valid.trim_start_matches("http://").to_string();
    let ftp = valid.replacen("http://", "ftp://", 1);
    for raw in [None, Some(""), Some("not a url"), Some(schemeless.as_str()), Some(ftp.as_str())] {
        assert!(validate_image_url(raw).is_err(), "{raw:?}");
    }
    assert_eq!(server.hits(), 0);

    // The same server is reachable once a request validates.
    let served = pipeline
        .run(validate_image_url(Some(&valid)).unwrap())
        .await
        .unwrap();
    assert_eq!(server.hits(), 1);
    let _ = served.into_stream().try_concat().await.unwrap();
}

/// Collaborator double: returns a scripted result and records deletions.
struct Scripted {
    result: Mutex<Option<Result<PathBuf, FilterError>>>,
    calls: AtomicUsize,
    deleted: Mutex<Vec<PathBuf>>,
}

impl Scripted {
    fn new(result: Result<PathBuf, FilterError>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(result)),
            calls: AtomicUsize::new(0),
            deleted: Mutex::new(Vec::new()),
        })
    }

    fn deletions(&self) -> Vec<PathBuf> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFilter for Scripted {
    async fn fetch_and_filter(&self, _url: &Url) -> Result<PathBuf, FilterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .lock()
            .unwrap()
            .take()
            .expect("collaborator called more than once")
    }

    fn delete_local_files(&self, paths: &[PathBuf]) {
        self.deleted.lock().unwrap().extend_from_slice(paths);
        imgfilter_core::artifact::delete_local_files(paths);
    }
}

fn any_request() -> imgfilter_core::ImageRequest {
    validate_image_url(Some("http://images.example.com/cat.jpg")).unwrap()
}

#[tokio::test]
async fn fetch_failure_attempts_no_cleanup() {
    let collab = Scripted::new(Err(FilterError::Fetch(FetchError::Empty {
        url: "http://images.example.com/cat.jpg".to_string(),
    })));
    let pipeline = Pipeline::new(collab.clone());

    let err = pipeline.run(any_request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::FilterFailed(_)));
    assert_eq!(collab.calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(collab.deletions().is_empty());
}

#[tokio::test]
async fn send_failure_still_cleans_up_once() {
    let dir = tempdir().unwrap();
    let vanished = dir.path().join("filtered.vanished.jpg");
    let collab = Scripted::new(Ok(vanished.clone()));
    let pipeline = Pipeline::new(collab.clone());

    let err = pipeline.run(any_request()).await.unwrap_err();
    assert!(matches!(err, PipelineError::SendFailed(_)), "{err}");

    assert!(eventually(|| collab.deletions().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(collab.deletions(), vec![vanished]);
}

#[tokio::test]
async fn abandoned_response_cleans_up_once() {
    let dir = tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let path = store.persist(b"\xFF\xD8\xFF\xE0 pretend jpeg").unwrap();
    let collab = Scripted::new(Ok(path.clone()));
    let pipeline = Pipeline::new(collab.clone());

    let served = pipeline.run(any_request()).await.unwrap();
    assert_eq!(served.content_type(), "image/jpeg");
    // Client went away before any byte was sent.
    drop(served);

    assert!(eventually(|| !path.exists()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(collab.deletions(), vec![path]);
}
