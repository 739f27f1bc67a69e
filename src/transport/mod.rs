//! Inbound transports feeding the monitor loop.
//!
//! The HTTP transport lives in `crate::server` behind the `server` feature.

pub mod stdin;

pub use stdin::{decode_line, spawn_line_reader};
