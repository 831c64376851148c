#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Gemini API key is not configured")]
    MissingApiKey,

    #[error(transparent)]
    Media(#[from] gemexp_media::Error),

    #[error("translation failed: {0}")]
    Translation(#[source] gemexp_agents::Error),

    #[error(transparent)]
    Generation(#[from] gemexp_agents::Error),

    #[error(transparent)]
    Channel(#[from] gemexp_channels::Error),
}

impl Error {
    #[must_use]
    pub fn translation(source: gemexp_agents::Error) -> Self {
        Self::Translation(source)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
