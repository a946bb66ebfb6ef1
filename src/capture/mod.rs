//! Capture worker: owns the live media pipeline for one recording at a time.

pub mod mime;
pub mod worker;

pub use worker::spawn;
