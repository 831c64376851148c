//! Gemini image-editing chat plugin.
//!
//! A user issues the command, then sends a description and one or more
//! images (directly or inside quoted replies) within the collection window.
//! The request goes to Gemini and the generated text and images come back as
//! a single reply, or as a forwarded bundle when there are several images.

pub mod error;
pub mod extract;
pub mod partition;
pub mod plugin;
pub mod reply;
pub mod session;
pub mod store;

pub use {
    error::{Error, Result},
    plugin::{GeminiExpPlugin, TRANSLATE_SYSTEM_PROMPT},
    session::{CommandOutcome, FollowUp},
    store::{PendingRequest, PendingRequestStore},
};
