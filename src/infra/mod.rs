//! Infrastructure adapters and runtime bootstrap.

pub mod cache;
pub mod content;
pub mod error;
pub mod http;
pub mod materializer;
pub mod telemetry;
