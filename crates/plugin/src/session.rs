//! Per-user collection state machine.
//!
//! A user is idle until they issue the command, then awaiting input until a
//! follow-up completes the request, the deadline lapses, or they abandon it.

use std::{sync::Arc, time::Duration};

use {
    gemexp_common::types::InboundMessage,
    gemexp_config::{GemExpConfig, RearmPolicy},
    gemexp_media::{Error as MediaError, InputImage},
    tokio::time::Instant,
    tracing::{debug, info, warn},
};

use crate::{
    extract::ImageExtractor,
    store::{PendingRequest, PendingRequestStore},
};

/// Knobs the state machine reads from config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub timeout: Duration,
    pub rearm: RearmPolicy,
    /// Command keywords, lowercase.
    pub keywords: Vec<String>,
}

impl SessionSettings {
    pub fn from_config(config: &GemExpConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            rearm: config.rearm,
            keywords: config.keywords().map(str::to_lowercase).collect(),
        }
    }
}

/// Result of the initiating command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A new window opened.
    Started,
    /// An existing record was replaced by a fresh window.
    Restarted,
    /// An open window was kept; nothing changed.
    AlreadyWaiting,
}

/// Text and images ready for generation. The record is already gone.
#[derive(Debug, Clone)]
pub struct ReadyRequest {
    pub user_id: String,
    pub text: String,
    pub images: Vec<InputImage>,
}

/// Result of a follow-up message.
#[derive(Debug)]
pub enum FollowUp {
    /// The sender has no open window.
    Ignored,
    /// The window had lapsed; the record was removed.
    Expired,
    /// The message was a command, not input.
    Skipped,
    /// Loading an image failed. The record keeps its previous images.
    ImageFailed(MediaError),
    NeedText,
    NeedImage,
    Ready(ReadyRequest),
}

pub struct CollectionStateMachine {
    store: Arc<PendingRequestStore>,
    extractor: ImageExtractor,
    settings: SessionSettings,
}

impl CollectionStateMachine {
    pub fn new(
        store: Arc<PendingRequestStore>,
        extractor: ImageExtractor,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Open a collection window for `user_id`.
    pub fn start(&self, user_id: &str) -> CommandOutcome {
        let now = Instant::now();
        let existing = self.store.update(user_id, |r| r.is_expired_at(now));

        if existing == Some(false) && self.settings.rearm == RearmPolicy::Reject {
            debug!(user_id, "window already open, keeping it");
            return CommandOutcome::AlreadyWaiting;
        }

        self.store
            .put(PendingRequest::new(user_id, self.settings.timeout));
        info!(
            user_id,
            timeout_secs = self.settings.timeout.as_secs(),
            restarted = existing.is_some(),
            "collection window opened"
        );
        if existing.is_some() {
            CommandOutcome::Restarted
        } else {
            CommandOutcome::Started
        }
    }

    /// Feed a follow-up message into the sender's open window.
    pub async fn follow_up(&self, msg: &InboundMessage) -> FollowUp {
        let user_id = msg.sender_id.as_str();
        let now = Instant::now();

        let Some((expired, needs_text)) = self
            .store
            .update(user_id, |r| (r.is_expired_at(now), r.text.is_empty()))
        else {
            return FollowUp::Ignored;
        };

        if expired {
            self.store.delete(user_id);
            info!(user_id, "collection window expired");
            return FollowUp::Expired;
        }

        let text = msg.text.trim();
        if self.is_command_text(text) {
            debug!(user_id, text, "skipping command message");
            return FollowUp::Skipped;
        }

        if needs_text {
            let cleaned = self.strip_leading_keyword(text);
            if !cleaned.is_empty() {
                self.store.update(user_id, |r| r.text = cleaned);
            }
        }

        let images = match self.extractor.extract(&msg.chain).await {
            Ok(images) => images,
            Err(e) => {
                warn!(user_id, error = %e, "image extraction failed");
                return FollowUp::ImageFailed(e);
            },
        };
        info!(user_id, count = images.len(), "images extracted from message");

        let Some((has_text, has_images)) = self.store.update(user_id, |r| {
            r.images.extend(images);
            (!r.text.is_empty(), !r.images.is_empty())
        }) else {
            // Removed while we were fetching.
            return FollowUp::Ignored;
        };

        if !has_text {
            info!(user_id, "no description yet");
            return FollowUp::NeedText;
        }
        if !has_images {
            info!(user_id, "no image yet");
            return FollowUp::NeedImage;
        }

        match self.store.delete(user_id) {
            Some(record) => {
                info!(
                    user_id,
                    text_len = record.text.len(),
                    images = record.images.len(),
                    "collection complete"
                );
                FollowUp::Ready(ReadyRequest {
                    user_id: record.user_id,
                    text: record.text,
                    images: record.images,
                })
            },
            None => FollowUp::Ignored,
        }
    }

    /// True for slash commands and bare command keywords.
    pub fn is_command_text(&self, text: &str) -> bool {
        let text = text.trim();
        text.starts_with('/') || self.is_keyword(text)
    }

    /// True if `text` invokes the command: a keyword, optionally slash
    /// prefixed, as the first word.
    pub fn is_invocation(&self, text: &str) -> bool {
        let text = text.trim();
        let text = text.strip_prefix('/').unwrap_or(text);
        text.split_whitespace()
            .next()
            .is_some_and(|word| self.is_keyword(word))
    }

    /// Stricter [`is_invocation`](Self::is_invocation) for users with an open
    /// window: a bare keyword or a slash-prefixed invocation. `edit make it
    /// red` is input, `/edit` and `edit` are commands.
    pub fn is_explicit_invocation(&self, text: &str) -> bool {
        let text = text.trim();
        if text.starts_with('/') {
            self.is_invocation(text)
        } else {
            self.is_keyword(text)
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.settings.keywords.iter().any(|k| *k == word)
    }

    /// Drop a command keyword at the start of `text`, then trim.
    pub fn strip_leading_keyword(&self, text: &str) -> String {
        let text = text.trim();
        for keyword in &self.settings.keywords {
            let Some(prefix) = text.get(..keyword.len()) else {
                continue;
            };
            if !prefix.eq_ignore_ascii_case(keyword) {
                continue;
            }
            let rest = &text[keyword.len()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest.trim().to_string();
            }
        }
        text.to_string()
    }
}
