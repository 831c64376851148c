use std::error::Error as StdError;

/// Crate-wide result type for reply delivery.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors raised by reply sinks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport is gone (closed connection, shut down host).
    #[error("reply transport unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from the transport.
    #[error("sending reply failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
