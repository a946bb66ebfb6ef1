//! API route modules.

pub mod events;
pub mod session;
