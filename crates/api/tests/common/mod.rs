#![allow(dead_code)]

use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use docrelay_api::config::ServerConfig;
use docrelay_api::router::build_app_router;
use docrelay_api::state::AppState;

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "docrelay-test-boundary-7MA4YWxkTrZu0gW";

/// A scratch deployment: `scripts/` and `uploads/` under one temp dir,
/// with state built the same way `main.rs` builds it.
pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub state: AppState,
}

impl TestApp {
    /// Fresh router over the shared state (routers are consumed by `oneshot`).
    pub fn router(&self) -> Router {
        build_app_router(self.state.clone())
    }

    pub fn uploads(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    /// Names of everything currently in the uploads directory.
    pub fn staged_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.uploads())
            .expect("read uploads")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Build a test `ServerConfig` rooted at `dir`.
///
/// Processors are bash scripts with the `.sh` extension; everything else
/// keeps production defaults.
pub fn test_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        uploads_dir: dir.join("uploads"),
        scripts_dir: dir.join("scripts"),
        script_extension: "sh".to_string(),
        script_interpreter: Some("bash".to_string()),
        script_output_flag: Some("--output".to_string()),
        output_extension: "xlsx".to_string(),
        max_upload_bytes: 10 * 1024 * 1024,
        max_capture_bytes: 1024 * 1024,
        script_timeout_secs: None,
        cleanup_interval_mins: 5,
        cleanup_max_age_mins: 5,
    }
}

/// Build an app whose scripts directory holds `scripts` (`(name, body)`).
pub async fn build_test_app(scripts: &[(&str, &str)]) -> TestApp {
    build_test_app_with(scripts, |_| {}).await
}

/// Like [`build_test_app`], letting the caller adjust the config first.
pub async fn build_test_app_with(
    scripts: &[(&str, &str)],
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let scripts_dir = dir.path().join("scripts");
    std::fs::create_dir(&scripts_dir).expect("mkdir scripts");
    for (name, body) in scripts {
        std::fs::write(scripts_dir.join(name), format!("#!/bin/bash\n{body}"))
            .expect("write script");
    }

    let mut config = test_config(dir.path());
    configure(&mut config);
    let state = AppState::from_config(config)
        .await
        .expect("build state");
    TestApp { dir, state }
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

/// Encode `parts` as a `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                field,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Shorthand for a PDF `file` part.
pub fn pdf<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part::File {
        field: "file",
        filename,
        content_type: "application/pdf",
        data,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    app.oneshot(request).await.expect("oneshot")
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("build request");
    app.oneshot(request).await.expect("oneshot")
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).expect("JSON body")
}
