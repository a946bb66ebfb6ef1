//! Cross-context message protocol.
//!
//! The three execution contexts (control surface, session coordinator,
//! capture worker) share no memory; everything crosses one of these typed
//! channels. Commands and events within a channel are delivered in send
//! order, but there is no ordering between channels — the control surface
//! re-queries full state instead of trusting notice order.

use crate::platform::CaptureHandle;
use serde::{Deserialize, Serialize};

/// Coordinator → capture worker. Fire-and-forget events.
#[derive(Debug)]
pub enum CaptureCommand {
    Start { handle: CaptureHandle },
    Stop,
}

/// Capture worker → coordinator. Exactly one terminal event per capture.
#[derive(Debug)]
pub enum CaptureEvent {
    Ready {
        bytes: Vec<u8>,
        mime_type: String,
        duration_ms: u64,
    },
    Failed {
        message: String,
    },
}

/// Coordinator → control surface push notices, broadcast to every listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notice {
    RecordingReady,
    UploadComplete,
    CaptureFailed { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_serialize_with_a_type_tag() {
        let json = serde_json::to_string(&Notice::RecordingReady).unwrap();
        assert_eq!(json, r#"{"type":"recording-ready"}"#);

        let json = serde_json::to_string(&Notice::CaptureFailed {
            message: "denied".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"capture-failed","message":"denied"}"#);
    }

    #[test]
    fn notices_round_trip() {
        let parsed: Notice = serde_json::from_str(r#"{"type":"upload-complete"}"#).unwrap();
        assert_eq!(parsed, Notice::UploadComplete);
    }
}
