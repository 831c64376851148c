//! Shared message model and error helpers used across all gemexp crates.

pub mod error;
pub mod types;

pub use error::FromMessage;
