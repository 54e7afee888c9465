/**
 * Error taxonomy
 *
 * One tagged enum for every failure the core can report, so callers branch
 * on the kind instead of parsing messages.
 */
use crate::models::Variant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Manifest/model fetch failure, non-2xx status, timeout or an unreadable manifest body
    #[error("network error: {0}")]
    Network(String),

    /// Size or checksum mismatch on a downloaded archive
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Malformed archive or failure writing its entries
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("{source_code} -> {target_code} {variant} model not installed")]
    ModelNotFound {
        source_code: String,
        target_code: String,
        variant: Variant,
    },

    #[error("no offline model available for language: {0}")]
    UnsupportedLanguage(String),

    #[error("engine init failed: {0}")]
    EngineInit(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("engine not ready")]
    EngineNotReady,

    #[error("download cancelled")]
    Cancelled,

    #[error("invalid model id: {0}")]
    InvalidModelId(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl Error {
    /// Errors raised while procuring a model (fetch, verify, extract, cancel).
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Integrity(_) | Error::Extraction(_) | Error::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
