use thiserror::Error;

/// Fatal errors: these abort the run and are surfaced directly to the caller.
///
/// Recoverable-per-package and soft failures are never represented as an
/// `Err` — they become [`crate::Diagnostic`] values instead, per the three
/// error strata in the design doc.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("module root not found or unreadable: {0}")]
    ModuleRoot(String),

    #[error("failed to type-check required package {package}: {message}")]
    TypeCheck { package: String, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid framework pattern: {0}")]
    Pattern(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("regex compile error: {0}")]
    Regex(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
