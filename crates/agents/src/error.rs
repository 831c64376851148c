use std::error::Error as StdError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The API answered with a non-success status.
    #[error("Gemini API error HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("response contains no candidates")]
    EmptyCandidates,

    #[error("response candidate has no content")]
    MissingContent,

    #[error("response content has no parts")]
    EmptyParts,

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error(transparent)]
    Media(#[from] gemexp_media::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
