//! Turning a generation result into the reply the host should send.

use {
    gemexp_agents::GenerationResult,
    gemexp_common::types::{ForwardNode, OutboundComponent, OutboundReply},
};

use crate::partition::{label_segments, partition};

/// Identity and label used for forwarded bundles.
#[derive(Debug, Clone)]
pub struct ReplyFormatter {
    pub bot_id: String,
    pub bot_name: String,
    pub label_template: String,
}

impl ReplyFormatter {
    pub fn new(
        bot_id: impl Into<String>,
        bot_name: impl Into<String>,
        label_template: impl Into<String>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            bot_name: bot_name.into(),
            label_template: label_template.into(),
        }
    }

    /// A single chain for fewer than two images, a forwarded bundle otherwise.
    pub fn format(&self, result: GenerationResult) -> OutboundReply {
        if result.image_paths.len() < 2 {
            return single_chain(result);
        }

        let count = result.image_paths.len();
        let segments = label_segments(partition(&result.text, count), &self.label_template);
        let nodes = segments
            .into_iter()
            .zip(result.image_paths)
            .map(|(segment, path)| {
                let mut content = Vec::with_capacity(2);
                if !segment.is_empty() {
                    content.push(OutboundComponent::Text { text: segment });
                }
                content.push(OutboundComponent::ImageFile { path });
                ForwardNode {
                    uin: self.bot_id.clone(),
                    name: self.bot_name.clone(),
                    content,
                }
            })
            .collect();
        OutboundReply::Forward { nodes }
    }
}

fn single_chain(result: GenerationResult) -> OutboundReply {
    let mut components = Vec::with_capacity(1 + result.image_paths.len());
    // An empty text is dropped only when an image carries the reply.
    if !result.text.is_empty() || result.image_paths.is_empty() {
        components.push(OutboundComponent::Text { text: result.text });
    }
    components.extend(
        result
            .image_paths
            .into_iter()
            .map(|path| OutboundComponent::ImageFile { path }),
    );
    OutboundReply::Chain { components }
}
