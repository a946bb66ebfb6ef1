//! Encoding format negotiation.
//!
//! Platform codec support varies, so the mime type is not a fixed choice:
//! an ordered preference list is probed against the backend and the first
//! supported combination wins, with the backend's unqualified default as
//! the fallback.

use crate::platform::CaptureBackend;

/// Container/codec combinations probed in order.
pub const PREFERRED_MIME_TYPES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/ogg;codecs=opus",
    "audio/wav",
];

pub fn negotiate(backend: &dyn CaptureBackend, preferred: &[String]) -> String {
    for candidate in preferred {
        if backend.supports_mime(candidate) {
            return candidate.clone();
        }
    }

    backend.default_mime().to_string()
}
