use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    gemexp_media::{InputImage, ResultImageStore},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::{debug, info, trace, warn},
};

use crate::{
    error::{Error, Result},
    model::{GenerationResult, ImageGenerator, TextProvider},
};

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<Part>>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(image: &InputImage) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.media_type.clone(),
                data: BASE64.encode(&image.data),
            }),
        }
    }
}

/// First candidate's parts, failing when any level is missing or empty.
fn first_candidate_parts(resp: GenerateContentResponse) -> Result<Vec<Part>> {
    let candidate = resp
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or(Error::EmptyCandidates)?;
    if let Some(reason) = &candidate.finish_reason {
        debug!(finish_reason = %reason, "gemini candidate finished");
    }
    let content = candidate.content.ok_or(Error::MissingContent)?;
    match content.parts {
        Some(parts) if !parts.is_empty() => Ok(parts),
        _ => Err(Error::EmptyParts),
    }
}

// ── Shared client ───────────────────────────────────────────────────────────

/// Authenticated access to the Gemini REST API.
#[derive(Clone)]
pub struct GeminiApi {
    api_key: Secret<String>,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiApi")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiApi {
    pub fn new(
        api_key: Secret<String>,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::external("failed to build HTTP client", e))?;
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        trace!(body = %serde_json::to_string(body).unwrap_or_default(), "gemini request body");

        let http_resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::external("gemini request failed", e))?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "gemini API error");
            return Err(Error::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let raw = http_resp
            .text()
            .await
            .map_err(|e| Error::external("failed to read gemini response", e))?;
        trace!(response = %raw, "gemini raw response");
        Ok(serde_json::from_str(&raw)?)
    }
}

// ── Image generation ────────────────────────────────────────────────────────

/// Gemini model asked for both text and image output.
pub struct GeminiImageGenerator {
    api: GeminiApi,
    model: String,
    store: Arc<ResultImageStore>,
}

impl GeminiImageGenerator {
    pub fn new(api: GeminiApi, model: impl Into<String>, store: Arc<ResultImageStore>) -> Self {
        Self {
            api,
            model: model.into(),
            store,
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, text: &str, images: &[InputImage]) -> Result<GenerationResult> {
        let mut parts = Vec::with_capacity(images.len() + 1);
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        parts.extend(images.iter().map(Part::image));

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            }),
        };

        info!(
            model = %self.model,
            text_len = text.len(),
            images = images.len(),
            "gemini generate request"
        );

        let resp = self.api.generate_content(&self.model, &body).await?;
        let mut result = GenerationResult::default();

        for part in first_candidate_parts(resp)? {
            // A part is either text or inline data; text wins.
            if let Some(fragment) = part.text {
                result.text.push_str(&fragment);
            } else if let Some(inline) = part.inline_data {
                let data = BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                    Error::invalid_response(format!("invalid inline image data: {e}"))
                })?;
                debug!(mime_type = %inline.mime_type, bytes = data.len(), "gemini inline image");
                let path = self.store.save_png(data).await?;
                result.image_paths.push(path);
            }
        }

        info!(
            model = %self.model,
            text_len = result.text.len(),
            images = result.image_paths.len(),
            "gemini generate response"
        );
        Ok(result)
    }
}

// ── Text chat ───────────────────────────────────────────────────────────────

/// Gemini model used for plain text turns.
pub struct GeminiTextProvider {
    api: GeminiApi,
    model: String,
}

impl GeminiTextProvider {
    pub fn new(api: GeminiApi, model: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
        }
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    async fn text_chat(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part::text(prompt)],
            }],
            system_instruction: system_prompt.map(|sys| Content {
                role: None,
                parts: vec![Part::text(sys)],
            }),
            generation_config: None,
        };

        debug!(model = %self.model, has_system = system_prompt.is_some(), "gemini text request");
        let resp = self.api.generate_content(&self.model, &body).await?;

        let text: String = first_candidate_parts(resp)?
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if text.trim().is_empty() {
            return Err(Error::invalid_response("model returned no text"));
        }
        Ok(text.trim().to_string())
    }
}
