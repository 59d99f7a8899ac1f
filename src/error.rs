//! Unified error type for the page reader layer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors a reader, backend or decoder can surface.
///
/// Navigation past either end of a comic is never an error; those calls
/// return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Unsupported comic format")]
    Unsupported,
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("Archive is encrypted")]
    Encrypted,
    #[error("Corrupt archive: {0}")]
    Corrupt(String),
    #[error("Out of memory while decoding page")]
    OutOfMemory,
    #[error("Decode failed: {0}")]
    DecodeFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Payload-free tag for [`ReaderError`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unsupported,
    NotFound,
    Encrypted,
    Corrupt,
    OutOfMemory,
    DecodeFailed,
    Config,
    Io,
}

impl ReaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReaderError::Unsupported => ErrorKind::Unsupported,
            ReaderError::NotFound(_) => ErrorKind::NotFound,
            ReaderError::Encrypted => ErrorKind::Encrypted,
            ReaderError::Corrupt(_) => ErrorKind::Corrupt,
            ReaderError::OutOfMemory => ErrorKind::OutOfMemory,
            ReaderError::DecodeFailed(_) => ErrorKind::DecodeFailed,
            ReaderError::Config(_) => ErrorKind::Config,
            ReaderError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<zip::result::ZipError> for ReaderError {
    fn from(e: zip::result::ZipError) -> Self {
        ReaderError::Corrupt(format!("Zip error: {}", e))
    }
}

impl From<image::ImageError> for ReaderError {
    fn from(e: image::ImageError) -> Self {
        use image::error::LimitErrorKind;

        match &e {
            image::ImageError::Limits(limit)
                if matches!(limit.kind(), LimitErrorKind::InsufficientMemory) =>
            {
                ReaderError::OutOfMemory
            }
            _ => ReaderError::DecodeFailed(e.to_string()),
        }
    }
}

impl From<toml::de::Error> for ReaderError {
    fn from(e: toml::de::Error) -> Self {
        ReaderError::Config(e.to_string())
    }
}
