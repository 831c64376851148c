//! Host-facing seams.
//!
//! The chat host delivers inbound messages to the plugin and gets replies
//! back through a [`ReplySink`]. Transports (a real chat adapter, the console
//! runner, tests) implement the sink.

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{MemorySink, ReplySink},
};
