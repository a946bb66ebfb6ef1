//! Forwarding of a captured recording to the configured HTTP endpoint.

use crate::session::{CapturedRecording, SessionError};
use reqwest::multipart::{Form, Part};
use tracing::debug;

/// Fixed filename for the multipart `file` field.
pub const UPLOAD_FILE_NAME: &str = "tab-recording.webm";

pub struct Uploader {
    client: reqwest::Client,
}

impl Uploader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// `POST api_url` with multipart fields `file` and `durationMs`. Any 2xx
    /// status is success; everything else (including transport failure) is
    /// `UploadFailed`. The recording itself is never touched, so a failed
    /// upload can be retried.
    pub async fn upload(
        &self,
        api_url: &str,
        recording: &CapturedRecording,
    ) -> Result<(), SessionError> {
        let part = Part::bytes(recording.bytes.clone())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(&recording.mime_type)
            .map_err(|e| SessionError::UploadFailed(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("durationMs", recording.duration_ms.to_string());

        let response = self
            .client
            .post(api_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SessionError::UploadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::UploadFailed(status.as_u16().to_string()));
        }

        debug!("Upload accepted with status {}", status);
        Ok(())
    }
}

impl Default for Uploader {
    fn default() -> Self {
        Self::new()
    }
}
