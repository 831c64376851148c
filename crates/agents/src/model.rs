use std::path::PathBuf;

use {async_trait::async_trait, gemexp_media::InputImage};

use crate::error::Result;

/// Output of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    /// Text parts concatenated in order. May be empty.
    pub text: String,
    /// Generated images, saved as PNG, in the order the model returned them.
    pub image_paths: Vec<PathBuf>,
}

/// Multimodal generation: text plus images in, text plus images out.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    async fn generate(&self, text: &str, images: &[InputImage]) -> Result<GenerationResult>;
}

/// Plain text chat, used for instruction translation.
#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn text_chat(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String>;
}
