//! Helpers shared across transports.

pub mod base64_bytes;
pub mod serve;

pub use serve::{bind, serve_until_cancelled};
