use thiserror::Error;

/// Everything a session command can fail with. Failures never cross the
/// message boundary as panics — they are rendered into command replies or
/// push notices as human-readable messages.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Recording already in progress.")]
    AlreadyInProgress,

    #[error("No active tab available.")]
    NoActiveTab,

    #[error("Tab capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Recorder failure: {0}")]
    RecorderFailure(String),

    #[error("No recording in progress.")]
    NoActiveSession,

    #[error("No recording available.")]
    NoRecording,

    #[error("API URL is not configured.")]
    ConfigMissing,

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Settings unavailable: {0}")]
    SettingsUnavailable(String),
}
