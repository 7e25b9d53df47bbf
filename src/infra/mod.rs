//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod render;
pub mod source;
pub mod telemetry;
