//! Vitrina Localization - catalog lookup with language fallback
//!
//! Catalogs are embedded JSON, parsed once at startup; the [`Localizer`]
//! is read-only afterwards and is injected into every component that
//! renders text. Lookup never fails: a missing key falls back to the
//! default language and finally to the key itself.
//!
//! All outbound text is rendered in the *recipient's* stored language,
//! never the sender's.

use std::collections::HashMap;

use thiserror::Error;
use vitrina_types::Language;

const CATALOG_RU: &str = include_str!("../locales/ru.json");
const CATALOG_UZ: &str = include_str!("../locales/uz.json");
const CATALOG_EN: &str = include_str!("../locales/en.json");

/// Errors while loading catalogs at startup
#[derive(Debug, Error)]
pub enum I18nError {
    #[error("Catalog for {language} failed to parse: {message}")]
    BadCatalog { language: Language, message: String },
}

/// Read-only localization provider
pub struct Localizer {
    catalogs: HashMap<Language, HashMap<String, String>>,
    default_language: Language,
}

impl Localizer {
    /// Parse the embedded catalogs
    pub fn new(default_language: Language) -> Result<Self, I18nError> {
        let mut catalogs = HashMap::new();
        for (language, raw) in [
            (Language::Ru, CATALOG_RU),
            (Language::Uz, CATALOG_UZ),
            (Language::En, CATALOG_EN),
        ] {
            let catalog: HashMap<String, String> =
                serde_json::from_str(raw).map_err(|e| I18nError::BadCatalog {
                    language,
                    message: e.to_string(),
                })?;
            catalogs.insert(language, catalog);
        }

        Ok(Self { catalogs, default_language })
    }

    /// Look up `key` in `language`, falling back to the default language
    /// and finally to the key itself.
    pub fn text(&self, key: &str, language: Language) -> String {
        if let Some(text) = self.catalogs.get(&language).and_then(|c| c.get(key)) {
            return text.clone();
        }
        if let Some(text) = self
            .catalogs
            .get(&self.default_language)
            .and_then(|c| c.get(key))
        {
            return text.clone();
        }
        key.to_string()
    }

    /// Look up `key` and substitute `{name}` placeholders.
    ///
    /// Unknown placeholders are left as-is; substitution never fails.
    pub fn text_with(&self, key: &str, language: Language, params: &[(&str, String)]) -> String {
        let mut text = self.text(key, language);
        for (name, value) in params {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }

    /// The configured fallback language
    pub fn default_language(&self) -> Language {
        self.default_language
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localizer() -> Localizer {
        Localizer::new(Language::Ru).unwrap()
    }

    #[test]
    fn all_catalogs_parse() {
        localizer();
    }

    #[test]
    fn looks_up_in_requested_language() {
        let l = localizer();
        assert_eq!(l.text("main_menu", Language::En), "Main menu");
        assert_eq!(l.text("main_menu", Language::Ru), "Главное меню");
    }

    #[test]
    fn missing_key_falls_back_to_key() {
        let l = localizer();
        assert_eq!(l.text("no_such_key", Language::En), "no_such_key");
    }

    #[test]
    fn placeholders_are_substituted() {
        let l = localizer();
        let text = l.text_with(
            "give_confirm_prompt",
            Language::En,
            &[
                ("admin", "boss".to_string()),
                ("product", "Widget".to_string()),
                ("quantity", "5".to_string()),
            ],
        );
        assert!(text.contains("boss"));
        assert!(text.contains("Widget"));
        assert!(text.contains('5'));
    }

    #[test]
    fn unknown_placeholder_is_left_alone() {
        let l = localizer();
        let text = l.text_with("main_menu", Language::En, &[("nope", "x".to_string())]);
        assert_eq!(text, "Main menu");
    }

    #[test]
    fn every_en_key_exists_in_ru_and_uz() {
        let en: HashMap<String, String> = serde_json::from_str(CATALOG_EN).unwrap();
        let ru: HashMap<String, String> = serde_json::from_str(CATALOG_RU).unwrap();
        let uz: HashMap<String, String> = serde_json::from_str(CATALOG_UZ).unwrap();
        for key in en.keys() {
            assert!(ru.contains_key(key), "ru missing {key}");
            assert!(uz.contains_key(key), "uz missing {key}");
        }
    }
}
