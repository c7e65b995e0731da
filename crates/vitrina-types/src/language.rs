//! User interface languages
//!
//! Every user stores a language preference; all outbound text is rendered
//! in the recipient's language, never the sender's.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported interface languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Russian
    Ru,
    /// Uzbek
    Uz,
    /// English
    En,
}

impl Language {
    /// All supported languages, in menu order
    pub const ALL: [Language; 3] = [Language::Ru, Language::Uz, Language::En];

    /// Two-letter language code used in storage and catalogs
    pub fn code(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::Uz => "uz",
            Language::En => "en",
        }
    }

    /// Parse a stored two-letter code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ru" => Some(Language::Ru),
            "uz" => Some(Language::Uz),
            "en" => Some(Language::En),
            _ => None,
        }
    }

    /// Name of the language in the language itself (selection buttons)
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::Ru => "Русский",
            Language::Uz => "O'zbekcha",
            Language::En => "English",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::Uz
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(Language::from_code("xx"), None);
    }
}
