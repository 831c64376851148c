//! End-to-end conversations against the plugin facade.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD as BASE64},
    gemexp_agents::{GenerationResult, ImageGenerator},
    gemexp_channels::MemorySink,
    gemexp_common::types::{
        InboundMessage, MessageChain, MessageComponent as C, OutboundComponent, OutboundReply,
    },
    gemexp_config::GemExpConfig,
    gemexp_media::{ImageSource, InputImage},
    gemexp_plugin::{GeminiExpPlugin, PendingRequestStore},
    image::{DynamicImage, ImageFormat, Rgb, RgbImage},
    secrecy::Secret,
    serde_json::json,
};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([50, 60, 70])));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn config() -> GemExpConfig {
    GemExpConfig {
        api_key: Secret::new("test-key".into()),
        ..Default::default()
    }
}

fn command() -> InboundMessage {
    InboundMessage::new("u1", MessageChain::new(vec![C::plain("/gemexp")]))
        .with_sender_name("Alice")
}

fn text(t: &str) -> InboundMessage {
    InboundMessage::new("u1", MessageChain::new(vec![C::plain(t)]))
}

struct StaticImages;

#[async_trait]
impl ImageSource for StaticImages {
    async fn fetch(&self, _source: &str) -> gemexp_media::Result<Vec<u8>> {
        Ok(png(8, 8))
    }
}

/// Records every call and whether the caller's record still existed then.
#[derive(Default)]
struct RecordingGenerator {
    pending: OnceLock<Arc<PendingRequestStore>>,
    calls: Mutex<Vec<(String, usize, bool)>>,
}

#[async_trait]
impl ImageGenerator for RecordingGenerator {
    fn model(&self) -> &str {
        "recording"
    }

    async fn generate(
        &self,
        text: &str,
        images: &[InputImage],
    ) -> gemexp_agents::Result<GenerationResult> {
        let still_pending = self.pending.get().is_some_and(|s| s.contains("u1"));
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), images.len(), still_pending));
        Ok(GenerationResult {
            text: "Here you go.".into(),
            image_paths: Vec::new(),
        })
    }
}

fn recording_plugin() -> (GeminiExpPlugin, Arc<RecordingGenerator>) {
    let generator = Arc::new(RecordingGenerator::default());
    let plugin = GeminiExpPlugin::new(config(), Arc::new(StaticImages), generator.clone());
    assert!(generator.pending.set(Arc::clone(plugin.pending())).is_ok());
    (plugin, generator)
}

#[tokio::test(start_paused = true)]
async fn window_times_out_after_sixty_seconds() {
    let (plugin, generator) = recording_plugin();
    let sink = MemorySink::new();

    plugin.handle(&command(), &sink).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    plugin.handle(&text("a cat"), &sink).await.unwrap();

    let texts = sink.texts().await;
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[1], config().messages.timeout);
    assert!(plugin.pending().is_empty());
    assert!(generator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn single_image_request_is_generated_once() {
    let (plugin, generator) = recording_plugin();
    let sink = MemorySink::new();

    plugin.handle(&command(), &sink).await.unwrap();
    let msg = InboundMessage::new(
        "u1",
        MessageChain::new(vec![
            C::plain("make it red"),
            C::image_url("https://img.example/cat.png"),
        ]),
    );
    plugin.handle(&msg, &sink).await.unwrap();

    let calls = generator.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("make it red".to_string(), 1, false)]);
    assert!(plugin.pending().is_empty());
    assert_eq!(sink.replies().await.last().unwrap(), &OutboundReply::Chain {
        components: vec![OutboundComponent::Text {
            text: "Here you go.".into()
        }],
    });
}

#[tokio::test]
async fn silent_users_get_no_reply() {
    let (plugin, _) = recording_plugin();
    let sink = MemorySink::new();
    for msg in [text("hello"), text("edit this"), text("/other")] {
        plugin.handle_message(&msg, &sink).await.unwrap();
    }
    assert!(sink.replies().await.is_empty());
    assert!(plugin.pending().is_empty());
}

#[tokio::test]
async fn image_in_quoted_reply_counts() {
    let (plugin, generator) = recording_plugin();
    let sink = MemorySink::new();

    plugin.handle(&command(), &sink).await.unwrap();
    let quoted = MessageChain::new(vec![C::image_url("https://img.example/old.png")]);
    let msg = InboundMessage::new(
        "u1",
        MessageChain::new(vec![C::reply(quoted), C::plain("edit add a hat")]),
    );
    // The window is open, so this is input and the leading keyword is stripped.
    plugin.handle(&msg, &sink).await.unwrap();

    let calls = generator.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("add a hat".to_string(), 1, false)]);
}

// ── Full stack against a mock Gemini endpoint ───────────────────────────────

async fn gemini_plugin(server: &mockito::Server, image_dir: &tempfile::TempDir) -> GeminiExpPlugin {
    let path = image_dir.path().join("input.png");
    tokio::fs::write(&path, png(16, 16)).await.unwrap();
    GeminiExpPlugin::from_config(GemExpConfig {
        base_url: server.url(),
        ..config()
    })
    .unwrap()
}

fn input_message(image_dir: &tempfile::TempDir) -> InboundMessage {
    let path = image_dir.path().join("input.png");
    InboundMessage::new(
        "u1",
        MessageChain::new(vec![C::plain("make it red"), C::Image {
            url: None,
            file: Some(format!("file://{}", path.display())),
        }]),
    )
}

#[tokio::test]
async fn three_images_become_a_labelled_bundle() {
    let mut server = mockito::Server::new_async().await;
    let image = BASE64.encode(png(4, 4));
    let mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash-exp:generateContent")
        .match_header("x-goog-api-key", "test-key")
        .with_status(200)
        .with_body(
            json!({"candidates": [{"content": {"parts": [
                {"text": "Red version.\n\nBlue version.\n\nGreen version."},
                {"inlineData": {"mimeType": "image/png", "data": image}},
                {"inlineData": {"mimeType": "image/png", "data": image}},
                {"inlineData": {"mimeType": "image/png", "data": image}}
            ]}}]})
            .to_string(),
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let plugin = gemini_plugin(&server, &dir).await;
    let sink = MemorySink::new();
    plugin.handle(&command(), &sink).await.unwrap();
    plugin.handle(&input_message(&dir), &sink).await.unwrap();
    mock.assert_async().await;

    let replies = sink.replies().await;
    let Some(OutboundReply::Forward { nodes }) = replies.last() else {
        panic!("expected forward bundle, got {replies:?}");
    };
    assert_eq!(nodes.len(), 3);

    let texts: Vec<&str> = nodes
        .iter()
        .map(|n| match &n.content[0] {
            OutboundComponent::Text { text } => text.as_str(),
            other => panic!("expected text, got {other:?}"),
        })
        .collect();
    assert_eq!(texts, vec![
        "Red version.",
        "image 2/3\n\nBlue version.",
        "image 3/3\n\nGreen version.",
    ]);

    let mut paths = Vec::new();
    for node in nodes {
        assert_eq!(node.uin, "114514");
        assert_eq!(node.name, "Gemini Assistant");
        let OutboundComponent::ImageFile { path } = &node.content[1] else {
            panic!("expected image file");
        };
        assert!(path.exists());
        paths.push(path.clone());
    }
    paths.dedup();
    assert_eq!(paths.len(), 3);

    plugin.terminate();
    assert!(paths.iter().all(|p| !p.exists()));
}

#[tokio::test]
async fn text_only_response_is_a_single_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash-exp:generateContent")
        .with_status(200)
        .with_body(
            json!({"candidates": [{"content": {"parts": [{"text": "I cannot draw that."}]}}]})
                .to_string(),
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let plugin = gemini_plugin(&server, &dir).await;
    let sink = MemorySink::new();
    plugin.handle(&command(), &sink).await.unwrap();
    plugin.handle(&input_message(&dir), &sink).await.unwrap();

    assert_eq!(sink.replies().await.last().unwrap(), &OutboundReply::Chain {
        components: vec![OutboundComponent::Text {
            text: "I cannot draw that.".into()
        }],
    });
    plugin.terminate();
}

#[tokio::test]
async fn api_error_is_reported_to_the_user() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1beta/models/gemini-2.0-flash-exp:generateContent")
        .with_status(500)
        .with_body("backend exploded")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let plugin = gemini_plugin(&server, &dir).await;
    let sink = MemorySink::new();
    plugin.handle(&command(), &sink).await.unwrap();
    plugin.handle(&input_message(&dir), &sink).await.unwrap();

    let last = sink.texts().await.pop().unwrap();
    assert!(last.contains("HTTP 500"), "{last}");
    assert!(last.contains("backend exploded"), "{last}");
    plugin.terminate();
}
