use std::io;
use thiserror::Error;

/// Errors surfaced by listing interpretation and path encoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The requested entry was not present in the listing
    #[error("No such entry: {0}")]
    NotFound(String),
    /// An encoding label that is not known
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),
    /// A local encoding other than UTF-8
    #[error("Unsupported local charset: {0}")]
    LocalCharset(String),
    /// A virtual path without its leading separator
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::NotFound(_) => io::ErrorKind::NotFound,
            _ => io::ErrorKind::InvalidInput,
        };

        io::Error::new(kind, err)
    }
}
