//! Crate-wide error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Agent pipeline error: {0}")]
    Agent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MediError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_detail() {
        let err = MediError::Provider("upstream timed out".into());
        assert_eq!(err.to_string(), "Provider error: upstream timed out");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MediError = io.into();
        assert!(matches!(err, MediError::Io(_)));
    }
}
