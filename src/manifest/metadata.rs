use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::contributor::{self, Collection, Contributor};
use super::{A11y, LocalizedString, Presentation, Subject, one_or_many};

/// `otherMetadata` key holding accessibility metadata inferred by the
/// streamer when it is kept apart from the declared one.
pub const INFERRED_ACCESSIBILITY_KEY: &str =
    "https://readium.org/webpub-manifest#inferredAccessibility";

/// Keys for the contributor roles, in output order.
pub const ROLE_KEYS: [&str; 13] = [
    "author",
    "translator",
    "editor",
    "artist",
    "illustrator",
    "letterer",
    "penciler",
    "colorist",
    "inker",
    "narrator",
    "contributor",
    "publisher",
    "imprint",
];

const KNOWN_KEYS: &[&str] = &[
    "identifier",
    "@type",
    "conformsTo",
    "title",
    "subtitle",
    "sortAs",
    "accessibility",
    "modified",
    "published",
    "language",
    "subject",
    "readingProgression",
    "description",
    "duration",
    "numberOfPages",
    "belongsTo",
    "belongs_to",
    "presentation",
];

/// Direction in which the reading order is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingProgression {
    #[default]
    Auto,
    Ltr,
    Rtl,
    Ttb,
    Btt,
}

impl ReadingProgression {
    fn parse(s: &str) -> Self {
        match s {
            "ltr" => Self::Ltr,
            "rtl" => Self::Rtl,
            "ttb" => Self::Ttb,
            "btt" => Self::Btt,
            _ => Self::Auto,
        }
    }

    /// `Some(true)` for ltr/rtl, `Some(false)` for ttb/btt.
    pub fn is_horizontal(self) -> Option<bool> {
        match self {
            Self::Ltr | Self::Rtl => Some(true),
            Self::Ttb | Self::Btt => Some(false),
            Self::Auto => None,
        }
    }
}

/// Publication-level metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub identifier: Option<String>,
    /// Schema.org type, e.g. `http://schema.org/Book`.
    pub type_: Option<String>,
    pub conforms_to: Vec<String>,
    pub title: LocalizedString,
    pub subtitle: Option<LocalizedString>,
    pub sort_as: Option<LocalizedString>,
    pub accessibility: Option<A11y>,
    pub modified: Option<DateTime<Utc>>,
    pub published: Option<DateTime<Utc>>,
    pub languages: Vec<String>,
    pub subjects: Vec<Subject>,
    pub authors: Vec<Contributor>,
    pub translators: Vec<Contributor>,
    pub editors: Vec<Contributor>,
    pub artists: Vec<Contributor>,
    pub illustrators: Vec<Contributor>,
    pub letterers: Vec<Contributor>,
    pub pencilers: Vec<Contributor>,
    pub colorists: Vec<Contributor>,
    pub inkers: Vec<Contributor>,
    pub narrators: Vec<Contributor>,
    pub contributors: Vec<Contributor>,
    pub publishers: Vec<Contributor>,
    pub imprints: Vec<Contributor>,
    pub reading_progression: ReadingProgression,
    pub description: Option<String>,
    /// Total duration in seconds.
    pub duration: Option<f64>,
    pub number_of_pages: Option<u32>,
    /// Collections keyed by kind (`collection`, `series`, ...).
    pub belongs_to: BTreeMap<String, Vec<Collection>>,
    pub presentation: Option<Presentation>,
    /// Every other key, written back flattened into the metadata object.
    pub other_metadata: Map<String, Value>,
}

impl Metadata {
    pub fn title(&self) -> &str {
        self.title.string()
    }

    pub fn belongs_to_collections(&self) -> &[Collection] {
        self.belongs_to.get("collection").map_or(&[], Vec::as_slice)
    }

    pub fn belongs_to_series(&self) -> &[Collection] {
        self.belongs_to.get("series").map_or(&[], Vec::as_slice)
    }

    pub fn conforms_to(&self, profile: &str) -> bool {
        self.conforms_to.iter().any(|p| p == profile)
    }

    /// Contributor lists paired with their JSON keys.
    pub fn roles(&self) -> [(&'static str, &Vec<Contributor>); 13] {
        [
            (ROLE_KEYS[0], &self.authors),
            (ROLE_KEYS[1], &self.translators),
            (ROLE_KEYS[2], &self.editors),
            (ROLE_KEYS[3], &self.artists),
            (ROLE_KEYS[4], &self.illustrators),
            (ROLE_KEYS[5], &self.letterers),
            (ROLE_KEYS[6], &self.pencilers),
            (ROLE_KEYS[7], &self.colorists),
            (ROLE_KEYS[8], &self.inkers),
            (ROLE_KEYS[9], &self.narrators),
            (ROLE_KEYS[10], &self.contributors),
            (ROLE_KEYS[11], &self.publishers),
            (ROLE_KEYS[12], &self.imprints),
        ]
    }

    /// Mutable contributor list for a role key.
    pub fn role_mut(&mut self, key: &str) -> Option<&mut Vec<Contributor>> {
        Some(match key {
            "author" => &mut self.authors,
            "translator" => &mut self.translators,
            "editor" => &mut self.editors,
            "artist" => &mut self.artists,
            "illustrator" => &mut self.illustrators,
            "letterer" => &mut self.letterers,
            "penciler" => &mut self.pencilers,
            "colorist" => &mut self.colorists,
            "inker" => &mut self.inkers,
            "narrator" => &mut self.narrators,
            "contributor" => &mut self.contributors,
            "publisher" => &mut self.publishers,
            "imprint" => &mut self.imprints,
            _ => return None,
        })
    }

    /// Reading progression with `auto` resolved from the language.
    ///
    /// A single Arabic, Persian, Hebrew or traditional Chinese language
    /// reads right to left; everything else left to right.
    pub fn effective_reading_progression(&self) -> ReadingProgression {
        if self.reading_progression != ReadingProgression::Auto {
            return self.reading_progression;
        }
        let [language] = self.languages.as_slice() else {
            return ReadingProgression::Ltr;
        };
        let language = language.to_ascii_lowercase();
        if language == "zh-hant" || language == "zh-tw" {
            return ReadingProgression::Rtl;
        }
        match language.split('-').next() {
            Some("ar" | "fa" | "he") => ReadingProgression::Rtl,
            _ => ReadingProgression::Ltr,
        }
    }

    /// Accessibility metadata stored apart by the streamer, if any.
    pub fn inferred_accessibility(&self) -> Option<A11y> {
        let value = self.other_metadata.get(INFERRED_ACCESSIBILITY_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn set_other_metadata(&mut self, key: &str, value: impl Serialize) -> serde_json::Result<()> {
        self.other_metadata
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Parse the JSON `metadata` object. `title` is required.
    pub fn from_json(mut obj: Map<String, Value>) -> Result<Self, String> {
        let title = obj
            .get("title")
            .cloned()
            .ok_or_else(|| "metadata has no 'title'".to_string())?;
        let title: LocalizedString = serde_json::from_value(title).map_err(|e| e.to_string())?;

        let localized = |key: &str| -> Result<Option<LocalizedString>, String> {
            obj.get(key)
                .map(|v| serde_json::from_value(v.clone()).map_err(|e| format!("'{key}': {e}")))
                .transpose()
        };
        let str_of = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        let mut metadata = Metadata {
            identifier: str_of("identifier"),
            type_: str_of("@type"),
            conforms_to: obj
                .get("conformsTo")
                .map(one_or_many::strings::from_value)
                .unwrap_or_default(),
            title,
            subtitle: localized("subtitle")?,
            sort_as: localized("sortAs")?,
            accessibility: match obj.get("accessibility") {
                Some(v @ Value::Object(_)) => Some(
                    serde_json::from_value(v.clone())
                        .map_err(|e| format!("'accessibility': {e}"))?,
                ),
                _ => None,
            },
            modified: obj.get("modified").and_then(Value::as_str).and_then(parse_date),
            published: obj.get("published").and_then(Value::as_str).and_then(parse_date),
            languages: obj
                .get("language")
                .map(one_or_many::strings::from_value)
                .unwrap_or_default(),
            subjects: parse_subjects(obj.get("subject"))?,
            reading_progression: obj
                .get("readingProgression")
                .and_then(Value::as_str)
                .map(ReadingProgression::parse)
                .unwrap_or_default(),
            description: str_of("description"),
            duration: obj
                .get("duration")
                .and_then(Value::as_f64)
                .filter(|d| *d >= 0.0),
            number_of_pages: obj
                .get("numberOfPages")
                .and_then(Value::as_f64)
                .filter(|n| *n >= 0.0)
                .map(|n| n as u32),
            presentation: obj
                .get("presentation")
                .and_then(|v| serde_json::from_value(v.clone()).ok()),
            ..Default::default()
        };

        for key in ROLE_KEYS {
            if let Some(value) = obj.remove(key) {
                let list = contributor::contributors::from_value(value)
                    .map_err(|e| format!("'{key}': {e}"))?;
                if let Some(slot) = metadata.role_mut(key) {
                    *slot = list;
                }
            }
        }

        let belongs_to = match obj.remove("belongsTo") {
            Some(v) => Some(v),
            None => obj.remove("belongs_to"),
        };
        if let Some(Value::Object(kinds)) = belongs_to {
            for (kind, value) in kinds {
                if value.is_null() {
                    continue;
                }
                let list = contributor::contributors::from_value(value)
                    .map_err(|e| format!("'belongsTo.{kind}': {e}"))?;
                metadata.belongs_to.insert(kind, list);
            }
        }

        for key in KNOWN_KEYS {
            obj.remove(*key);
        }
        metadata.other_metadata = obj;
        Ok(metadata)
    }
}

fn parse_subjects(value: Option<&Value>) -> Result<Vec<Subject>, String> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    };
    items
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| format!("'subject': {e}")))
        .collect()
}

/// Parse an RFC 3339 timestamp, or a bare `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
/// date (taken as midnight UTC). Date-times without an offset are UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    let date = match s.len() {
        4 => NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1),
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok(),
    }?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

struct Roles<'a>(&'a [Contributor]);

impl Serialize for Roles<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        contributor::contributors::serialize(self.0, serializer)
    }
}

struct Strings<'a>(&'a [String]);

impl Serialize for Strings<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        one_or_many::strings::serialize(self.0, serializer)
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.other_metadata {
            map.serialize_entry(key, value)?;
        }
        if let Some(identifier) = &self.identifier {
            map.serialize_entry("identifier", identifier)?;
        }
        if let Some(type_) = &self.type_ {
            map.serialize_entry("@type", type_)?;
        }
        if !self.conforms_to.is_empty() {
            map.serialize_entry("conformsTo", &Strings(&self.conforms_to))?;
        }
        map.serialize_entry("title", &self.title)?;
        if let Some(subtitle) = &self.subtitle {
            map.serialize_entry("subtitle", subtitle)?;
        }
        if let Some(sort_as) = &self.sort_as {
            map.serialize_entry("sortAs", sort_as)?;
        }
        if let Some(a11y) = &self.accessibility {
            map.serialize_entry("accessibility", a11y)?;
        }
        if let Some(modified) = &self.modified {
            map.serialize_entry("modified", &format_date(modified))?;
        }
        if let Some(published) = &self.published {
            map.serialize_entry("published", &format_date(published))?;
        }
        if !self.languages.is_empty() {
            map.serialize_entry("language", &Strings(&self.languages))?;
        }
        if !self.subjects.is_empty() {
            map.serialize_entry("subject", &self.subjects)?;
        }
        for (key, list) in self.roles() {
            if !list.is_empty() {
                map.serialize_entry(key, &Roles(list))?;
            }
        }
        if self.reading_progression != ReadingProgression::Auto {
            map.serialize_entry("readingProgression", &self.reading_progression)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        if let Some(duration) = self.duration {
            map.serialize_entry("duration", &duration)?;
        }
        if let Some(pages) = self.number_of_pages {
            map.serialize_entry("numberOfPages", &pages)?;
        }
        if !self.belongs_to.is_empty() {
            let belongs_to: BTreeMap<&String, Roles> = self
                .belongs_to
                .iter()
                .map(|(k, v)| (k, Roles(v)))
                .collect();
            map.serialize_entry("belongsTo", &belongs_to)?;
        }
        if let Some(presentation) = &self.presentation {
            map.serialize_entry("presentation", presentation)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let obj = Map::deserialize(deserializer)?;
        Metadata::from_json(obj).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal() {
        let m: Metadata = serde_json::from_value(json!({"title": "Title"})).unwrap();
        assert_eq!(m.title(), "Title");
        assert_eq!(serde_json::to_value(&m).unwrap(), json!({"title": "Title"}));
    }

    #[test]
    fn test_missing_title_is_error() {
        assert!(serde_json::from_value::<Metadata>(json!({"identifier": "x"})).is_err());
    }

    #[test]
    fn test_full_parse() {
        let m: Metadata = serde_json::from_value(json!({
            "identifier": "1234",
            "@type": "epub",
            "conformsTo": ["https://readium.org/webpub-manifest/profiles/epub"],
            "title": {"en": "Title", "fr": "Titre"},
            "modified": "2001-01-01T12:36:27.000Z",
            "published": "2001-01",
            "language": ["en", "fr"],
            "subject": ["Science", {"name": "Fiction", "code": "F"}],
            "author": "Author",
            "translator": ["T1", "T2"],
            "readingProgression": "rtl",
            "description": "Desc",
            "duration": 4.24,
            "numberOfPages": 240,
            "belongs_to": {"series": {"name": "Series A", "position": 2}},
            "presentation": {"layout": "fixed"},
            "other-key": "other value"
        }))
        .unwrap();

        assert_eq!(m.identifier.as_deref(), Some("1234"));
        assert_eq!(m.title.get(Some("fr")), Some("Titre"));
        assert_eq!(m.published.unwrap().to_rfc3339(), "2001-01-01T00:00:00+00:00");
        assert_eq!(m.subjects.len(), 2);
        assert_eq!(m.authors[0].name(), "Author");
        assert_eq!(m.translators.len(), 2);
        assert_eq!(m.reading_progression, ReadingProgression::Rtl);
        assert_eq!(m.number_of_pages, Some(240));
        assert_eq!(m.belongs_to_series()[0].position, Some(2.0));
        assert_eq!(m.other_metadata.get("other-key"), Some(&json!("other value")));

        let out = serde_json::to_value(&m).unwrap();
        assert_eq!(out["other-key"], "other value");
        assert_eq!(out["modified"], "2001-01-01T12:36:27Z");
        assert_eq!(out["author"], "Author");
        assert_eq!(out["belongsTo"]["series"]["name"], "Series A");
        assert!(out.get("belongs_to").is_none());
    }

    #[test]
    fn test_auto_progression_is_omitted() {
        let m = Metadata {
            title: LocalizedString::new("t"),
            reading_progression: ReadingProgression::Auto,
            ..Default::default()
        };
        assert!(serde_json::to_value(&m).unwrap().get("readingProgression").is_none());
    }

    #[test]
    fn test_effective_reading_progression() {
        let with = |langs: &[&str], rp| Metadata {
            languages: langs.iter().map(|s| s.to_string()).collect(),
            reading_progression: rp,
            ..Default::default()
        };
        use ReadingProgression::*;
        assert_eq!(with(&[], Auto).effective_reading_progression(), Ltr);
        assert_eq!(with(&["fa"], Auto).effective_reading_progression(), Rtl);
        assert_eq!(with(&["ar-EG"], Auto).effective_reading_progression(), Rtl);
        assert_eq!(with(&["zh-Hant"], Auto).effective_reading_progression(), Rtl);
        assert_eq!(with(&["zh-CN"], Auto).effective_reading_progression(), Ltr);
        assert_eq!(with(&["ar", "en"], Auto).effective_reading_progression(), Ltr);
        assert_eq!(with(&["he"], Ttb).effective_reading_progression(), Ttb);
    }

    #[test]
    fn test_parse_date_forms() {
        assert_eq!(parse_date("2012").unwrap().to_rfc3339(), "2012-01-01T00:00:00+00:00");
        assert_eq!(parse_date("2012-05-07").unwrap().to_rfc3339(), "2012-05-07T00:00:00+00:00");
        assert_eq!(
            parse_date("2012-05-07T10:00:00+02:00").unwrap().to_rfc3339(),
            "2012-05-07T08:00:00+00:00"
        );
        assert!(parse_date("soon").is_none());
    }

    #[test]
    fn test_inferred_accessibility_roundtrip() {
        let mut m = Metadata::default();
        let a11y = A11y {
            features: vec!["tableOfContents".into()],
            ..Default::default()
        };
        m.set_other_metadata(INFERRED_ACCESSIBILITY_KEY, &a11y).unwrap();
        assert_eq!(m.inferred_accessibility(), Some(a11y));
    }
}
