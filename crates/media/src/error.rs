use std::error::Error as StdError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{message}")]
    InvalidInput { message: String },

    /// Remote server answered with a non-success status.
    #[error("fetching {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
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
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

impl gemexp_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::InvalidInput { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

gemexp_common::impl_context!();
