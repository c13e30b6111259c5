//! Infrastructure adapters and runtime bootstrap.

pub mod contentstack;
pub mod error;
pub mod http;
pub mod personalize;
pub mod telemetry;
pub mod upstream;
