/**
 * Language Detection
 */
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Detected language code
    pub lang: String,
    /// Confidence in percent
    pub confidence: i32,
    pub is_reliable: bool,
}

/// Stateless with respect to the engine session; may run alongside it
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str, hint: Option<&str>) -> Result<Detection>;
}
