/**
 * Model data types
 *
 * Languages, variants and the two views of a model bundle: what the
 * manifest offers (`DownloadableModel`) and what is on disk
 * (`InstalledModel`).
 */
pub mod languages;
pub mod pair_resolver;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use languages::{is_supported, lang_name, supported_langs, AUTO_DETECT};
pub use pair_resolver::{resolve_pairs, resolve_pairs_with_orphans, ModelPair, PairMember};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lang {
    pub code: String,
    pub name: String,
}

impl Lang {
    /// Build a `Lang` whose display name comes from the language table
    pub fn from_code(code: &str) -> Self {
        Self {
            code: code.to_string(),
            name: languages::lang_name(code).to_string(),
        }
    }
}

/// Model size/quality class. Each variant is its own install namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Lite,
    Full,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Lite, Variant::Full];

    /// Directory name under `models/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Lite => "lite",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lite" => Ok(Self::Lite),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown model variant: {} (expected lite or full)", other)),
        }
    }
}

/// Split `"<src>-<tgt>"` into its two language codes
pub fn split_pair_id(id: &str) -> Option<(&str, &str)> {
    let (source, target) = id.split_once('-')?;
    if source.is_empty() || target.is_empty() || target.contains('-') {
        return None;
    }
    Some((source, target))
}

/// Id of the model translating in the opposite direction
pub fn reverse_pair_id(id: &str) -> Option<String> {
    split_pair_id(id).map(|(source, target)| format!("{}-{}", target, source))
}

/// Model bundle offered by the remote manifest. Identified by `(id, variant)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadableModel {
    pub id: String,
    pub source_lang: Lang,
    pub target_lang: Lang,
    pub download_url: String,
    pub size: u64,
    #[serde(default)]
    pub checksum: String,
    pub variant: Variant,
}

impl DownloadableModel {
    pub fn display_name(&self) -> String {
        format!("{} to {}", self.source_lang.name, self.target_lang.name)
    }
}

/// A bundle found on disk by scanning `models/{variant}/{id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModel {
    pub id: String,
    pub variant: Variant,
    pub path: PathBuf,
}

impl InstalledModel {
    pub fn source_lang(&self) -> Option<Lang> {
        split_pair_id(&self.id).map(|(source, _)| Lang::from_code(source))
    }

    pub fn target_lang(&self) -> Option<Lang> {
        split_pair_id(&self.id).map(|(_, target)| Lang::from_code(target))
    }
}

impl PairMember for DownloadableModel {
    fn pair_id(&self) -> &str {
        &self.id
    }

    fn variant(&self) -> Variant {
        self.variant
    }
}

impl PairMember for InstalledModel {
    fn pair_id(&self) -> &str {
        &self.id
    }

    fn variant(&self) -> Variant {
        self.variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pair_id() {
        assert_eq!(split_pair_id("en-es"), Some(("en", "es")));
        assert_eq!(split_pair_id("en"), None);
        assert_eq!(split_pair_id("en-"), None);
        assert_eq!(split_pair_id("en-es-x"), None);
        assert_eq!(reverse_pair_id("de-en").as_deref(), Some("en-de"));
    }

    #[test]
    fn test_variant_parse_and_display() {
        assert_eq!("Full".parse::<Variant>().unwrap(), Variant::Full);
        assert!("medium".parse::<Variant>().is_err());
        assert_eq!(Variant::Lite.to_string(), "lite");
    }

    #[test]
    fn test_downloadable_model_json_shape() {
        let model = DownloadableModel {
            id: "en-es".to_string(),
            source_lang: Lang::from_code("en"),
            target_lang: Lang::from_code("es"),
            download_url: "https://example.com/main/lite/en-es.zip".to_string(),
            size: 42,
            checksum: String::new(),
            variant: Variant::Lite,
        };
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["downloadUrl"], "https://example.com/main/lite/en-es.zip");
        assert_eq!(json["sourceLang"]["name"], "English");
        assert_eq!(json["variant"], "lite");
        assert_eq!(model.display_name(), "English to Spanish");
    }
}
