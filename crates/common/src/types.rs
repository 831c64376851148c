//! Host-side message model.
//!
//! Inbound types mirror what a chat framework hands to a plugin: an ordered
//! chain of components where a reply component embeds the full chain of the
//! message being replied to. Outbound types describe what the plugin asks the
//! host to send back.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A single part of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageComponent {
    Plain {
        text: String,
    },
    /// Image attachment. The host fills in whichever source it has.
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
    /// Quoted message, carrying the quoted message's own chain.
    Reply {
        #[serde(default)]
        sender_id: Option<String>,
        #[serde(default)]
        sender_nickname: Option<String>,
        #[serde(default)]
        chain: MessageChain,
    },
    At {
        target: String,
    },
    /// Anything the core does not understand (faces, files, records, ...).
    Other {
        kind: String,
    },
}

impl MessageComponent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image {
            url: Some(url.into()),
            file: None,
        }
    }

    pub fn reply(chain: MessageChain) -> Self {
        Self::Reply {
            sender_id: None,
            sender_nickname: None,
            chain,
        }
    }
}

/// Ordered sequence of message components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageChain(pub Vec<MessageComponent>);

impl MessageChain {
    pub fn new(components: Vec<MessageComponent>) -> Self {
        Self(components)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageComponent> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Join the plain-text components of this chain (not of nested replies)
    /// with single spaces, the way hosts build their `message_str`.
    pub fn plain_text(&self) -> String {
        self.0
            .iter()
            .filter_map(|c| match c {
                MessageComponent::Plain { text } => Some(text.trim()),
                _ => None,
            })
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<'a> IntoIterator for &'a MessageChain {
    type IntoIter = std::slice::Iter<'a, MessageComponent>;
    type Item = &'a MessageComponent;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An inbound message event as seen by the plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Plain-text rendering of `chain`.
    pub text: String,
    pub chain: MessageChain,
}

impl InboundMessage {
    /// Build a message whose text is derived from the chain.
    pub fn new(sender_id: impl Into<String>, chain: MessageChain) -> Self {
        let text = chain.plain_text();
        Self {
            sender_id: sender_id.into(),
            sender_name: None,
            text,
            chain,
        }
    }

    #[must_use]
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Display name, falling back to the sender id.
    pub fn display_name(&self) -> &str {
        self.sender_name.as_deref().unwrap_or(&self.sender_id)
    }
}

/// A part of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundComponent {
    Text { text: String },
    ImageFile { path: PathBuf },
}

/// One sub-message of a forwarded bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardNode {
    /// Account shown as the author of the node.
    pub uin: String,
    pub name: String,
    pub content: Vec<OutboundComponent>,
}

/// What the plugin asks the host to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundReply {
    Plain { text: String },
    Chain { components: Vec<OutboundComponent> },
    Forward { nodes: Vec<ForwardNode> },
}

impl OutboundReply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    /// Text of a `Plain` reply, if this is one.
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Self::Plain { text } => Some(text),
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_skips_non_text_and_nested_replies() {
        let chain = MessageChain::new(vec![
            MessageComponent::plain("make it "),
            MessageComponent::image_url("https://example.com/a.png"),
            MessageComponent::reply(MessageChain::new(vec![MessageComponent::plain("quoted")])),
            MessageComponent::plain("red"),
        ]);
        assert_eq!(chain.plain_text(), "make it red");
    }

    #[test]
    fn plain_fragments_split_by_an_image_keep_a_word_gap() {
        let msg = InboundMessage::new(
            "u1",
            MessageChain::new(vec![
                MessageComponent::plain("make it"),
                MessageComponent::image_url("a.png"),
                MessageComponent::plain("red"),
                MessageComponent::plain("  "),
            ]),
        );
        assert_eq!(msg.text, "make it red");
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let msg = InboundMessage::new("42", MessageChain::default());
        assert_eq!(msg.display_name(), "42");
        assert_eq!(msg.with_sender_name("Alice").display_name(), "Alice");
    }

    #[test]
    fn chain_deserializes_from_tagged_json() {
        let json = r#"[
            {"type": "plain", "text": "hi"},
            {"type": "image", "url": "https://example.com/x.jpg"},
            {"type": "reply", "chain": [{"type": "image", "file": "/tmp/y.png"}]}
        ]"#;
        let chain: MessageChain = serde_json::from_str(json).unwrap();
        assert_eq!(chain.0.len(), 3);
        match &chain.0[2] {
            MessageComponent::Reply { chain, sender_id, .. } => {
                assert!(sender_id.is_none());
                assert_eq!(chain.0[0], MessageComponent::Image {
                    url: None,
                    file: Some("/tmp/y.png".into()),
                });
            },
            other => panic!("expected reply, got {other:?}"),
        }
    }
}
