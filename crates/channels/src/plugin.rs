use std::sync::atomic::{AtomicBool, Ordering};

use {
    async_trait::async_trait,
    gemexp_common::types::OutboundReply,
    tokio::sync::Mutex,
    tracing::trace,
};

use crate::error::{Error, Result};

/// Delivers replies to the conversation an inbound message came from.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, reply: OutboundReply) -> Result<()>;

    /// Convenience for plain-text notices.
    async fn send_text(&self, text: &str) -> Result<()> {
        self.send(OutboundReply::plain(text)).await
    }
}

/// Sink that keeps every reply in memory, in delivery order.
///
/// A closed sink rejects further replies with [`Error::Unavailable`].
#[derive(Debug, Default)]
pub struct MemorySink {
    replies: Mutex<Vec<OutboundReply>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replies(&self) -> Vec<OutboundReply> {
        self.replies.lock().await.clone()
    }

    /// Plain-text replies only, in order.
    pub async fn texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .await
            .iter()
            .filter_map(|r| r.as_plain().map(str::to_string))
            .collect()
    }

    pub async fn take(&self) -> Vec<OutboundReply> {
        std::mem::take(&mut *self.replies.lock().await)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReplySink for MemorySink {
    async fn send(&self, reply: OutboundReply) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::unavailable("sink closed"));
        }
        trace!(?reply, "recording reply");
        self.replies.lock().await.push(reply);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, gemexp_common::types::OutboundComponent};

    #[tokio::test]
    async fn records_replies_in_order() {
        let sink = MemorySink::new();
        sink.send_text("first").await.unwrap();
        sink.send(OutboundReply::Chain {
            components: vec![OutboundComponent::Text { text: "x".into() }],
        })
        .await
        .unwrap();
        sink.send_text("third").await.unwrap();

        assert_eq!(sink.replies().await.len(), 3);
        assert_eq!(sink.texts().await, vec!["first", "third"]);
        assert_eq!(sink.take().await.len(), 3);
        assert!(sink.replies().await.is_empty());
    }

    #[tokio::test]
    async fn closed_sink_rejects_replies() {
        let sink = MemorySink::new();
        sink.close();
        let err = sink.send_text("late").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }
}
