//! Upload behavior against a live local endpoint: request shape, status
//! handling, and the automatic send path.

mod common;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use common::{harness, wait_for_notice, ScriptedBackend, ScriptedTabs};
use std::sync::{Arc, Mutex};
use tabrec::config::{SendMode, Settings};
use tabrec::proto::Notice;
use tabrec::session::{CapturedRecording, SessionError};
use tabrec::upload::Uploader;

#[derive(Debug, Clone, Default)]
struct SeenUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
    duration_ms: Option<String>,
}

#[derive(Clone, Default)]
struct Endpoint {
    uploads: Arc<Mutex<Vec<SeenUpload>>>,
    status: Arc<Mutex<StatusCode>>,
}

impl Endpoint {
    fn new(status: StatusCode) -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            status: Arc::new(Mutex::new(status)),
        }
    }

    fn uploads(&self) -> Vec<SeenUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

async fn receive(State(endpoint): State<Endpoint>, mut multipart: Multipart) -> StatusCode {
    let mut seen = SeenUpload::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("file") => {
                seen.file_name = field.file_name().map(|n| n.to_string());
                seen.content_type = field.content_type().map(|c| c.to_string());
                seen.bytes = field.bytes().await.unwrap().to_vec();
            }
            Some("durationMs") => {
                seen.duration_ms = Some(field.text().await.unwrap());
            }
            _ => {}
        }
    }
    endpoint.uploads.lock().unwrap().push(seen);
    *endpoint.status.lock().unwrap()
}

/// Serve the endpoint on an ephemeral port, returning its upload URL.
async fn spawn_endpoint(endpoint: Endpoint) -> String {
    let app = Router::new().route("/up", post(receive)).with_state(endpoint);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/up")
}

fn recording() -> CapturedRecording {
    CapturedRecording {
        bytes: b"fake-webm-bytes".to_vec(),
        mime_type: "audio/webm".to_string(),
        duration_ms: 2500,
    }
}

#[tokio::test]
async fn upload_posts_the_multipart_fields() {
    let endpoint = Endpoint::new(StatusCode::OK);
    let url = spawn_endpoint(endpoint.clone()).await;

    Uploader::new().upload(&url, &recording()).await.unwrap();

    let uploads = endpoint.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].file_name.as_deref(), Some("tab-recording.webm"));
    assert_eq!(uploads[0].content_type.as_deref(), Some("audio/webm"));
    assert_eq!(uploads[0].bytes, b"fake-webm-bytes".to_vec());
    assert_eq!(uploads[0].duration_ms.as_deref(), Some("2500"));
}

#[tokio::test]
async fn non_2xx_status_is_upload_failed() {
    let endpoint = Endpoint::new(StatusCode::NOT_FOUND);
    let url = spawn_endpoint(endpoint).await;

    let err = Uploader::new().upload(&url, &recording()).await.unwrap_err();
    match err {
        SessionError::UploadFailed(reason) => assert!(reason.contains("404")),
        other => panic!("expected UploadFailed, got {other}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_upload_failed() {
    let err = Uploader::new()
        .upload("http://127.0.0.1:1/up", &recording())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UploadFailed(_)));
}

#[tokio::test]
async fn auto_mode_uploads_once_and_notifies() {
    let endpoint = Endpoint::new(StatusCode::OK);
    let url = spawn_endpoint(endpoint.clone()).await;

    let h = harness(
        ScriptedTabs::default(),
        ScriptedBackend::default(),
        Settings {
            api_url: url,
            send_mode: SendMode::Auto,
        },
    );
    let mut notices = h.notices_tx.subscribe();

    h.coordinator.start().await.unwrap();
    h.coordinator.stop().await.unwrap();
    assert_eq!(wait_for_notice(&mut notices).await, Notice::UploadComplete);

    let uploads = endpoint.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].bytes, b"scripted-bytes".to_vec());
    assert_eq!(uploads[0].file_name.as_deref(), Some("tab-recording.webm"));
    assert!(uploads[0].duration_ms.is_some());

    // The media stays available for review and manual re-send.
    let recording = h.coordinator.get_recording().await.unwrap();
    assert_eq!(recording.bytes, b"scripted-bytes".to_vec());
}

#[tokio::test]
async fn manual_mode_does_not_upload() {
    let endpoint = Endpoint::new(StatusCode::OK);
    let url = spawn_endpoint(endpoint.clone()).await;

    let h = harness(
        ScriptedTabs::default(),
        ScriptedBackend::default(),
        Settings {
            api_url: url,
            send_mode: SendMode::Manual,
        },
    );
    let mut notices = h.notices_tx.subscribe();

    h.coordinator.start().await.unwrap();
    h.coordinator.stop().await.unwrap();
    assert_eq!(wait_for_notice(&mut notices).await, Notice::RecordingReady);
    assert!(endpoint.uploads().is_empty());

    // An explicit send uploads exactly once.
    h.coordinator.send().await.unwrap();
    assert_eq!(endpoint.uploads().len(), 1);
}

#[tokio::test]
async fn failed_auto_upload_still_notifies_and_keeps_the_media() {
    let endpoint = Endpoint::new(StatusCode::INTERNAL_SERVER_ERROR);
    let url = spawn_endpoint(endpoint.clone()).await;

    let h = harness(
        ScriptedTabs::default(),
        ScriptedBackend::default(),
        Settings {
            api_url: url,
            send_mode: SendMode::Auto,
        },
    );
    let mut notices = h.notices_tx.subscribe();

    h.coordinator.start().await.unwrap();
    h.coordinator.stop().await.unwrap();
    assert_eq!(wait_for_notice(&mut notices).await, Notice::UploadComplete);

    // Upload failure never drops the captured media: a manual retry works.
    let err = h.coordinator.send().await.unwrap_err();
    assert!(matches!(err, SessionError::UploadFailed(_)));
    assert!(h.coordinator.get_state().await.has_recording);
    assert_eq!(endpoint.uploads().len(), 2);
}
