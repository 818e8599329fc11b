//! Common test utilities for API tests with a scripted engine.
//!
//! The fixture builds the real router over a [`MockInvoker`], so requests
//! run the full upload, pipeline and delivery path without ffmpeg.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use reframe_core::{
    config::StorageConfig, job::SequentialIdGenerator, testing::MockInvoker, Config,
    PipelineOrchestrator,
};
use reframe_server::{create_router, AppState};

/// Re-export fixtures for test convenience
pub use reframe_core::testing::fixtures;

const BOUNDARY: &str = "reframe-test-boundary";

/// A multipart part.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        bytes: &'a [u8],
    },
}

/// Test fixture wrapping the router, the mock engine and the storage root.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new().await;
///     let response = fixture
///         .post_multipart("/api/v1/convert", &[Part::file("clip.mp4", b"data")])
///         .await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    /// Scripted engine; configure per test before sending requests.
    pub invoker: MockInvoker,
    pub storage: StorageConfig,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `error.kind` of a JSON error body.
    pub fn error_kind(&self) -> String {
        self.json()["error"]["kind"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }
}

impl<'a> Part<'a> {
    pub fn file(file_name: &'a str, bytes: &'a [u8]) -> Self {
        Part::File {
            name: "file",
            file_name,
            bytes,
        }
    }
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.server.port = 0;
        config.storage = StorageConfig::rooted_at(temp_dir.path());

        let invoker = MockInvoker::new();
        let orchestrator = PipelineOrchestrator::new(&config, Arc::new(invoker.clone()))
            .with_id_generator(Arc::new(SequentialIdGenerator::new("job")));
        orchestrator
            .prepare()
            .await
            .expect("Failed to create storage dirs");

        let storage = config.storage.clone();
        let state = Arc::new(AppState::new(config, orchestrator));

        Self {
            router: create_router(state),
            invoker,
            storage,
            temp_dir,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(&self, uri: &str, parts: &[Part<'_>]) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    /// Files remaining in the upload and output directories.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        [&self.storage.upload_dir, &self.storage.output_dir]
            .iter()
            .flat_map(|dir| {
                std::fs::read_dir(dir)
                    .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
                    .unwrap_or_else(|_| Vec::new())
            })
            .collect()
    }

    pub fn assert_no_leftovers(&self) {
        let leftovers = self.leftovers();
        assert!(leftovers.is_empty(), "leaked artifacts: {leftovers:?}");
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
