#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input line does not match the RAW capture schema.
    #[error("malformed capture line: {0}")]
    MalformedCaptureLine(String),

    /// A bit string contained characters other than '0' or '1'.
    #[error("invalid bit string: {0}")]
    InvalidBits(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
