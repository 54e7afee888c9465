//! Languages with offline model support.

use super::Lang;

/// Pseudo-code asking for source language detection
pub const AUTO_DETECT: &str = "auto";

const SUPPORTED_LANGS: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("bg", "Bulgarian"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("et", "Estonian"),
    ("fi", "Finnish"),
    ("hu", "Hungarian"),
    ("is", "Icelandic"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("uk", "Ukrainian"),
];

/// Display name for a code, falling back to the code itself
pub fn lang_name(code: &str) -> &str {
    if code == AUTO_DETECT {
        return "Detect Language";
    }
    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// Whether an offline model can exist for this code. `auto` is not a language.
pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGS.iter().any(|(c, _)| *c == code)
}

pub fn supported_langs() -> Vec<Lang> {
    SUPPORTED_LANGS
        .iter()
        .map(|(code, name)| Lang {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_name() {
        assert_eq!(lang_name("de"), "German");
        assert_eq!(lang_name("auto"), "Detect Language");
        assert_eq!(lang_name("xx"), "xx");
    }

    #[test]
    fn test_is_supported() {
        assert!(is_supported("uk"));
        assert!(!is_supported("auto"));
        assert!(!is_supported("un"));
        assert_eq!(supported_langs().len(), 26);
    }
}
