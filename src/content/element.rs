//! Semantic content elements and their JSON form.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::manifest::{Link, Locator};

pub const LANGUAGE: &str = "language";
pub const ACCESSIBILITY_LABEL: &str = "accessibilityLabel";

/// Arbitrary key-value metadata attached to an element or a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn language(&self) -> Option<&str> {
        self.get(LANGUAGE)
    }

    pub fn accessibility_label(&self) -> Option<&str> {
        self.get(ACCESSIBILITY_LABEL)
    }

    fn serialize_into<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        if let Some(language) = self.language().filter(|l| !l.is_empty()) {
            map.serialize_entry(LANGUAGE, language)?;
        }
        if let Some(label) = self.accessibility_label().filter(|l| !l.is_empty()) {
            map.serialize_entry(ACCESSIBILITY_LABEL, label)?;
        }
        Ok(())
    }
}

/// Purpose of a text element in its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRole {
    Body,
    /// Section title; level 1 is the most important.
    Heading(u8),
    Footnote,
    Quote {
        reference_url: Option<String>,
        reference_title: Option<String>,
    },
}

impl TextRole {
    pub fn name(&self) -> String {
        match self {
            TextRole::Body => "body".into(),
            TextRole::Heading(level) => format!("heading-{level}"),
            TextRole::Footnote => "footnote".into(),
            TextRole::Quote { .. } => "quote".into(),
        }
    }
}

/// A run of text sharing the same attributes, e.g. language.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub locator: Locator,
    pub text: String,
    pub attributes: Attributes,
}

impl Serialize for TextSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("locator", &self.locator)?;
        map.serialize_entry("text", &self.text)?;
        self.attributes.serialize_into(&mut map)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub locator: Locator,
    pub role: TextRole,
    pub segments: Vec<TextSegment>,
    pub attributes: Attributes,
}

/// A bitmap image. The caption is not extracted from the document yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageElement {
    pub locator: Locator,
    pub embedded_link: Link,
    pub caption: Option<String>,
    pub attributes: Attributes,
}

/// An audio or video clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AvElement {
    pub locator: Locator,
    pub embedded_link: Link,
    pub attributes: Attributes,
}

/// A semantic unit of content, with a locator targeting it.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
    Audio(AvElement),
    Video(AvElement),
}

impl Element {
    pub fn locator(&self) -> &Locator {
        match self {
            Element::Text(e) => &e.locator,
            Element::Image(e) => &e.locator,
            Element::Audio(e) | Element::Video(e) => &e.locator,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            Element::Text(e) => &e.attributes,
            Element::Image(e) => &e.attributes,
            Element::Audio(e) | Element::Video(e) => &e.attributes,
        }
    }

    /// Resource embedded by an image, audio or video element.
    pub fn embedded_link(&self) -> Option<&Link> {
        match self {
            Element::Text(_) => None,
            Element::Image(e) => Some(&e.embedded_link),
            Element::Audio(e) | Element::Video(e) => Some(&e.embedded_link),
        }
    }

    /// Human-readable text of the element. Embedded elements fall back to
    /// their caption or accessibility label.
    pub fn text(&self) -> String {
        match self {
            Element::Text(e) => e.segments.iter().map(|s| s.text.as_str()).collect(),
            Element::Image(e) => e
                .caption
                .clone()
                .filter(|c| !c.is_empty())
                .or_else(|| e.attributes.accessibility_label().map(str::to_string))
                .unwrap_or_default(),
            Element::Audio(e) | Element::Video(e) => e
                .attributes
                .accessibility_label()
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Element::Text(_) => "Text",
            Element::Image(_) => "Image",
            Element::Audio(_) => "Audio",
            Element::Video(_) => "Video",
        }
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("@type", self.type_name())?;
        map.serialize_entry("locator", self.locator())?;
        self.attributes().serialize_into(&mut map)?;
        match self {
            Element::Text(e) => {
                map.serialize_entry("role", &e.role.name())?;
                map.serialize_entry("text", &e.segments)?;
            }
            _ => {
                map.serialize_entry("text", &self.text())?;
                if let Some(link) = self.embedded_link() {
                    let mut link = link.clone();
                    link.map_hrefs(&|href| href.trim_start_matches('/').to_string());
                    map.serialize_entry("link", &link)?;
                }
            }
        }
        map.end()
    }
}
