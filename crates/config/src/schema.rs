//! Config schema for the Gemini image-editing plugin.

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_TRANSLATE_MODEL: &str = "gemini-2.0-flash";

/// What happens when the command is issued while a window is already open.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RearmPolicy {
    /// Discard the open record and start a fresh window.
    #[default]
    Reset,
    /// Keep the open record and tell the user it is still waiting.
    Reject,
}

/// Root configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GemExpConfig {
    /// Gemini API key. Every request is refused while this is empty.
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: Secret<String>,

    /// Generation endpoint.
    pub base_url: String,

    /// Model used for image generation.
    pub model: String,

    /// Translate the instruction to English before generation.
    pub translate: bool,

    /// Model used by the built-in translation provider.
    pub translate_model: String,

    /// Account shown as the author of forwarded bundles.
    pub bot_id: String,

    /// Display name shown on forwarded bundles.
    pub bot_name: String,

    /// Command keyword that opens a collection window.
    pub command: String,

    /// Alternative command keywords.
    pub aliases: Vec<String>,

    /// Collection window length in seconds.
    pub timeout_secs: u64,

    pub rearm: RearmPolicy,

    /// Deepest reply nesting searched for images.
    pub max_reply_depth: usize,

    /// Input images larger than this (either side, px) are scaled down.
    pub max_image_dimension: u32,

    /// Overall HTTP timeout for outbound calls. `None` leaves it to the transport.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// User-visible strings.
    pub messages: Messages,
}

impl std::fmt::Debug for GemExpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GemExpConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("translate", &self.translate)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for GemExpConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            translate: false,
            translate_model: DEFAULT_TRANSLATE_MODEL.into(),
            bot_id: "114514".into(),
            bot_name: "Gemini Assistant".into(),
            command: "gemexp".into(),
            aliases: vec!["edit".into(), "ps".into()],
            timeout_secs: 60,
            rearm: RearmPolicy::default(),
            max_reply_depth: 8,
            max_image_dimension: 1568,
            request_timeout_secs: None,
            messages: Messages::default(),
        }
    }
}

impl GemExpConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }

    /// The command keyword followed by its aliases.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.command.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// User-visible reply templates.
///
/// Placeholders such as `{name}`, `{timeout}`, `{text}`, `{error}`, `{index}`
/// and `{total}` are filled in where the template is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub missing_api_key: String,
    pub prompt: String,
    pub already_waiting: String,
    pub timeout: String,
    pub need_text: String,
    pub need_image: String,
    pub image_failed: String,
    pub translate_failed: String,
    pub processing: String,
    pub failed: String,
    pub image_label: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            missing_api_key: "Please ask an administrator to configure the Gemini API key.".into(),
            prompt: "OK {name}, please send your description and image(s) within {timeout} seconds."
                .into(),
            already_waiting: "Still waiting for your description and image(s).".into(),
            timeout: "Timed out waiting for input, please send the command again.".into(),
            need_text: "Please describe the edit you want.".into(),
            need_image: "Please send the image you want to edit.".into(),
            image_failed: "Could not process the image, please try again later or try another \
                           image. Error: {error}"
                .into(),
            translate_failed: "Failed to translate the text, please try again later.".into(),
            processing: "Processing your request: {text} Please wait...".into(),
            failed: "Processing failed: {error}".into(),
            image_label: "image {index}/{total}\n\n".into(),
        }
    }
}

/// Fill `{key}` placeholders in `template`.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}
