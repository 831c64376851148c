//! Model access: multimodal image generation and plain text chat.

pub mod error;
pub mod model;
pub mod providers;

pub use {
    error::{Error, Result},
    model::{GenerationResult, ImageGenerator, TextProvider},
    providers::gemini::{GeminiApi, GeminiImageGenerator, GeminiTextProvider},
};
