//! Error types for the content engine.

/// The single validated error the engine surfaces: a seek that would land
/// before the start of the stream. Everything else degrades to a fallback.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SeekError {
    #[error("seek before start of stream (offset {offset}, whence {whence})")]
    NegativePosition { offset: i64, whence: &'static str },
}

impl From<SeekError> for std::io::Error {
    fn from(err: SeekError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
    }
}

/// Errors raised while loading the YAML server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("directive marker must be a single ASCII character, got {0:?}")]
    BadMarker(String),
}
