//! Error types for the classifier crate.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for training, persistence and inference operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or processing error
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid configuration (epoch count, class count, image shape, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset directory name that does not decode to a label
    #[error("Naming error: {0}")]
    Naming(String),

    /// One half of an artifact pair is missing
    #[error("Artifact pair mismatch: missing {0:?}")]
    PairMismatch(PathBuf),

    /// Corrupt or unparsable artifact content
    #[error("Artifact format error: {0}")]
    Format(String),

    /// Preprocessed input does not match the architecture's expected shape
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Format(err.to_string())
    }
}

/// Specialized Result type for classifier operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("epochs must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: epochs must be at least 1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = Error::ShapeMismatch {
            expected: 2352,
            actual: 784,
        };
        assert!(err.to_string().contains("2352"));
    }
}
