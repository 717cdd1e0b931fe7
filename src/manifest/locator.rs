use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::one_or_many;

/// Where a locator points inside its resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locations {
    pub fragments: Vec<String>,
    /// Progression in the resource, in `[0, 1]`.
    pub progression: Option<f64>,
    /// Index in the publication, starting at 1.
    pub position: Option<u32>,
    /// Progression in the publication, in `[0, 1]`.
    pub total_progression: Option<f64>,
    /// Extension keys such as `cssSelector`, `partialCfi` or `domRange`.
    pub other: Map<String, Value>,
}

impl Locations {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
            && self.progression.is_none()
            && self.position.is_none()
            && self.total_progression.is_none()
            && self.other.is_empty()
    }

    pub fn css_selector(&self) -> Option<&str> {
        self.other.get("cssSelector")?.as_str()
    }

    pub fn set_css_selector(&mut self, selector: impl Into<String>) {
        self.other
            .insert("cssSelector".to_string(), Value::String(selector.into()));
    }

    pub fn from_json(mut obj: Map<String, Value>) -> Self {
        let mut fragments = obj
            .remove("fragments")
            .map(|v| one_or_many::strings::from_value(&v))
            .unwrap_or_default();
        if let Some(v) = obj.remove("fragment")
            && fragments.is_empty()
        {
            fragments = one_or_many::strings::from_value(&v);
        }
        let unit = |v: Option<Value>| v.and_then(|v| v.as_f64()).filter(|p| (0.0..=1.0).contains(p));

        Self {
            fragments,
            progression: unit(obj.remove("progression")),
            position: obj
                .remove("position")
                .and_then(|v| v.as_f64())
                .filter(|p| *p >= 1.0)
                .map(|p| p as u32),
            total_progression: unit(obj.remove("totalProgression")),
            other: obj,
        }
    }
}

impl Serialize for Locations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.other {
            map.serialize_entry(key, value)?;
        }
        if !self.fragments.is_empty() {
            map.serialize_entry("fragments", &self.fragments)?;
        }
        if let Some(p) = self.progression {
            map.serialize_entry("progression", &p)?;
        }
        if let Some(p) = self.position {
            map.serialize_entry("position", &p)?;
        }
        if let Some(p) = self.total_progression {
            map.serialize_entry("totalProgression", &p)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Locations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Locations::from_json(Map::deserialize(deserializer)?))
    }
}

/// Text context around a locator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl Text {
    pub fn is_empty(&self) -> bool {
        [&self.before, &self.highlight, &self.after]
            .iter()
            .all(|t| t.as_deref().is_none_or(str::is_empty))
    }
}

/// A precise location in a publication resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Locations::is_empty")]
    pub locations: Locations,
    #[serde(default, skip_serializing_if = "Text::is_empty")]
    pub text: Text,
}

impl Locator {
    pub fn new(href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: media_type.into(),
            ..Default::default()
        }
    }

    /// Copy with the given locations.
    pub fn with_locations(&self, locations: Locations) -> Self {
        Self {
            locations,
            ..self.clone()
        }
    }

    pub fn with_text(&self, text: Text) -> Self {
        Self {
            text,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal() {
        let l: Locator =
            serde_json::from_value(json!({"href": "http://locator", "type": "text/html"})).unwrap();
        assert_eq!(l, Locator::new("http://locator", "text/html"));
        assert_eq!(
            serde_json::to_value(&l).unwrap(),
            json!({"href": "http://locator", "type": "text/html"})
        );
    }

    #[test]
    fn test_missing_type_is_error() {
        assert!(serde_json::from_value::<Locator>(json!({"href": "a"})).is_err());
    }

    #[test]
    fn test_locations() {
        let l: Locations = serde_json::from_value(json!({
            "fragment": "p=4",
            "progression": 0.74,
            "position": 42,
            "totalProgression": 1.5,
            "cssSelector": "#c"
        }))
        .unwrap();
        assert_eq!(l.fragments, ["p=4"]);
        assert_eq!(l.progression, Some(0.74));
        assert_eq!(l.position, Some(42));
        assert_eq!(l.total_progression, None);
        assert_eq!(l.css_selector(), Some("#c"));

        let out = serde_json::to_value(&l).unwrap();
        assert_eq!(out["fragments"], json!(["p=4"]));
        assert!(out.get("fragment").is_none());
    }

    #[test]
    fn test_invalid_position_dropped() {
        let l: Locations = serde_json::from_value(json!({"position": 0, "progression": -1})).unwrap();
        assert!(l.is_empty());
    }

    #[test]
    fn test_text_emitted_only_when_set() {
        let mut l = Locator::new("/a.xhtml", "application/xhtml+xml");
        l.text.before = Some(String::new());
        assert!(serde_json::to_value(&l).unwrap().get("text").is_none());

        l.text.highlight = Some("Call me Ishmael".into());
        assert_eq!(
            serde_json::to_value(&l).unwrap()["text"],
            json!({"before": "", "highlight": "Call me Ishmael"})
        );
    }
}
