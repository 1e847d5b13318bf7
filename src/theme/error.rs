//! Theme engine error types

use thiserror::Error;

/// Template loading and rendering errors
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Template or override directory not found
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Template parse or rendering error
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Template file is not valid UTF-8
    #[error("Template is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
