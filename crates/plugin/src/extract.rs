//! Finding and loading images in an inbound message chain.

use std::sync::Arc;

use {
    gemexp_common::types::{MessageChain, MessageComponent},
    gemexp_media::{Error as MediaError, ImageSource, InputImage, image_ops},
    tracing::debug,
};

/// Walks a message chain, including quoted replies, and loads every image.
pub struct ImageExtractor {
    source: Arc<dyn ImageSource>,
    max_reply_depth: usize,
    max_dimension: u32,
}

impl ImageExtractor {
    pub fn new(source: Arc<dyn ImageSource>, max_reply_depth: usize, max_dimension: u32) -> Self {
        Self {
            source,
            max_reply_depth,
            max_dimension,
        }
    }

    /// Fetch and decode every image in `chain`, in encounter order.
    ///
    /// Any failure fails the whole call; nothing is returned partially.
    pub async fn extract(&self, chain: &MessageChain) -> Result<Vec<InputImage>, MediaError> {
        let mut sources = Vec::new();
        collect_sources(chain, 0, self.max_reply_depth, &mut sources);

        let mut images = Vec::with_capacity(sources.len());
        for source in sources {
            let data = self.source.fetch(source).await?;
            let max_dimension = self.max_dimension;
            let image =
                tokio::task::spawn_blocking(move || image_ops::prepare_input(&data, max_dimension))
                    .await
                    .map_err(|e| MediaError::external("image decode task failed", e))??;
            debug!(
                source,
                width = image.width,
                height = image.height,
                resized = image.was_resized,
                "image extracted"
            );
            images.push(image);
        }
        Ok(images)
    }
}

/// Image references in `chain`, recursing into replies up to `max_depth` levels.
pub fn collect_sources<'a>(
    chain: &'a MessageChain,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<&'a str>,
) {
    for component in chain {
        match component {
            MessageComponent::Image { url, file } => {
                let source = url
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .or_else(|| file.as_deref().filter(|s| !s.trim().is_empty()));
                match source {
                    Some(source) => out.push(source),
                    None => debug!("image component without a source, skipping"),
                }
            },
            MessageComponent::Reply { chain, .. } => {
                if depth >= max_depth {
                    debug!(depth, max_depth, "reply nested too deep, skipping");
                    continue;
                }
                collect_sources(chain, depth + 1, max_depth, out);
            },
            MessageComponent::Plain { .. }
            | MessageComponent::At { .. }
            | MessageComponent::Other { .. } => {},
        }
    }
}
