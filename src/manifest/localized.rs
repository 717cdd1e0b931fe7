use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Language tag used for strings whose language is unknown.
pub const UNDEFINED_LANGUAGE: &str = "und";

/// A string with translations keyed by BCP-47 language tag.
///
/// Serializes as a bare string when the only translation is `und`, as an
/// object otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedString {
    translations: BTreeMap<String, String>,
}

impl LocalizedString {
    /// A single translation in an undefined language.
    pub fn new(value: impl Into<String>) -> Self {
        Self::from_translations([(UNDEFINED_LANGUAGE.to_string(), value.into())])
    }

    /// Build from `(language, text)` pairs. An empty language becomes `und`.
    pub fn from_translations<I, K>(translations: I) -> Self
    where
        I: IntoIterator<Item = (K, String)>,
        K: Into<String>,
    {
        let mut out = Self::default();
        for (lang, text) in translations {
            let lang: String = lang.into();
            out.set(Some(&lang), text);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn translations(&self) -> &BTreeMap<String, String> {
        &self.translations
    }

    /// Set the text for `language` (`None` or empty means `und`).
    pub fn set(&mut self, language: Option<&str>, text: impl Into<String>) {
        let lang = match language {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => UNDEFINED_LANGUAGE.to_string(),
        };
        self.translations.insert(lang, text.into());
    }

    /// Text for `language`, falling back to `und`, then `en`, then any.
    pub fn get(&self, language: Option<&str>) -> Option<&str> {
        language
            .and_then(|l| self.translations.get(l))
            .or_else(|| self.translations.get(UNDEFINED_LANGUAGE))
            .or_else(|| self.translations.get("en"))
            .or_else(|| self.translations.values().next())
            .map(String::as_str)
    }

    /// The default translation, or an empty string.
    pub fn string(&self) -> &str {
        self.get(None).unwrap_or_default()
    }

    fn is_bare(&self) -> bool {
        self.translations.len() == 1 && self.translations.contains_key(UNDEFINED_LANGUAGE)
    }
}

impl fmt::Display for LocalizedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.string())
    }
}

impl From<&str> for LocalizedString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LocalizedString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for LocalizedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_bare() {
            return serializer.serialize_str(self.string());
        }
        let mut map = serializer.serialize_map(Some(self.translations.len()))?;
        for (lang, text) in &self.translations {
            map.serialize_entry(lang, text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for LocalizedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LocalizedVisitor;

        impl<'de> Visitor<'de> for LocalizedVisitor {
            type Value = LocalizedString;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or a map of language tags to strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(LocalizedString::new(v))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = LocalizedString::default();
                while let Some((lang, text)) = access.next_entry::<String, String>()? {
                    out.set(Some(&lang), text);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_any(LocalizedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fallback_order() {
        let s = LocalizedString::from_translations([
            ("fr", "Bonjour".to_string()),
            ("en", "Hello".to_string()),
        ]);
        assert_eq!(s.get(Some("fr")), Some("Bonjour"));
        assert_eq!(s.get(Some("de")), Some("Hello"));

        let s = LocalizedString::from_translations([
            ("en", "Hello".to_string()),
            ("", "Hi".to_string()),
        ]);
        assert_eq!(s.get(Some("de")), Some("Hi"));

        let s = LocalizedString::from_translations([("ja", "こんにちは".to_string())]);
        assert_eq!(s.string(), "こんにちは");
        assert_eq!(LocalizedString::default().string(), "");
    }

    #[test]
    fn test_json_shapes() {
        let bare = LocalizedString::new("Moby-Dick");
        assert_eq!(serde_json::to_value(&bare).unwrap(), serde_json::json!("Moby-Dick"));

        let single_en = LocalizedString::from_translations([("en", "Moby-Dick".to_string())]);
        assert_eq!(
            serde_json::to_value(&single_en).unwrap(),
            serde_json::json!({"en": "Moby-Dick"})
        );

        let parsed: LocalizedString =
            serde_json::from_value(serde_json::json!({"": "a", "fr": "b"})).unwrap();
        assert_eq!(parsed.get(Some("und")), Some("a"));
        assert_eq!(parsed.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_und_collapses_to_bare_string(text in ".*") {
            let s = LocalizedString::new(text.clone());
            let json = serde_json::to_value(&s).unwrap();
            prop_assert_eq!(&json, &serde_json::Value::String(text));
            let back: LocalizedString = serde_json::from_value(json).unwrap();
            prop_assert_eq!(back, s);
        }
    }
}
