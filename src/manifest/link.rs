use std::collections::HashMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use super::Properties;
use super::one_or_many;
use crate::mediatype::MediaType;
use crate::util::{href_without_suffix, resolve_href};

/// Characters escaped when an href is turned into a URL. Reserved URI
/// delimiters stay as they are.
const HREF_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Template values additionally escape `+`, which servers read as a space.
const TEMPLATE_VALUE_ENCODE: &AsciiSet = &HREF_ENCODE.add(b'+');

/// A reference to a resource, as found in `links`, `readingOrder`,
/// `resources`, `toc` and subcollections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// URI or URI template of the linked resource.
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Whether `href` is a URI template.
    #[serde(default, skip_serializing_if = "one_or_many::is_false")]
    pub templated: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Relations to the containing collection. Treated as a set.
    #[serde(
        rename = "rel",
        default,
        with = "one_or_many::strings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub rels: Vec<String>,

    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Bitrate in kbps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<f64>,

    /// Duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(
        rename = "language",
        default,
        with = "one_or_many::strings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub languages: Vec<String>,

    #[serde(rename = "alternate", default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Link>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.add_rel(rel);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Parsed media type, when `type` is present and well formed.
    pub fn media_type(&self) -> Option<MediaType> {
        self.media_type.as_deref().and_then(MediaType::parse)
    }

    fn media_type_is(&self, f: impl Fn(&MediaType) -> bool) -> bool {
        self.media_type().is_some_and(|mt| f(&mt))
    }

    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.iter().any(|r| r == rel)
    }

    pub fn add_rel(&mut self, rel: impl Into<String>) {
        let rel = rel.into();
        if !self.has_rel(&rel) {
            self.rels.push(rel);
        }
    }

    /// The href without its `#fragment` and `?query`.
    pub fn href_path(&self) -> &str {
        href_without_suffix(&self.href)
    }

    /// Parameter names of a templated href, in order of first appearance.
    pub fn template_parameters(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (_, expression) in template_expressions(&self.href) {
            for name in variable_names(expression) {
                if !out.iter().any(|o| o == name) {
                    out.push(name.to_string());
                }
            }
        }
        out
    }

    /// Replace every `{...}` expression in the href with `parameters`.
    ///
    /// `{a,b}` expands to comma separated values and `{?a,b}` to a form
    /// style query. Missing parameters expand to an empty value.
    pub fn expand_template(&self, parameters: &HashMap<String, String>) -> Link {
        let value = |name: &str| {
            parameters
                .get(name)
                .map(|v| utf8_percent_encode(v, TEMPLATE_VALUE_ENCODE).to_string())
                .unwrap_or_default()
        };

        let mut href = String::with_capacity(self.href.len());
        let mut rest = self.href.as_str();
        for (range, names) in template_expressions(&self.href) {
            let consumed = self.href.len() - rest.len();
            href.push_str(&rest[..range.start - consumed]);
            rest = &self.href[range.end..];

            if let Some(names) = names.strip_prefix('?') {
                href.push('?');
                let pairs: Vec<String> = names
                    .split(',')
                    .map(|name| format!("{name}={}", value(name)))
                    .collect();
                href.push_str(&pairs.join("&"));
            } else {
                let values: Vec<String> = variable_names(names).map(value).collect();
                href.push_str(&values.join(","));
            }
        }
        href.push_str(rest);

        Link {
            href: utf8_percent_encode(&href, HREF_ENCODE).to_string(),
            templated: false,
            ..self.clone()
        }
    }

    /// Absolute, percent-encoded URL of the resource relative to `base`.
    pub fn to_url(&self, base: &str) -> String {
        let href = self.href.trim_start_matches('/');
        if href.is_empty() {
            return String::new();
        }
        let base = if base.is_empty() { "/" } else { base };
        let resolved = resolve_href(href, base);
        utf8_percent_encode(&resolved, HREF_ENCODE).to_string()
    }

    /// Rewrite this href and every nested href (alternates, children).
    pub fn map_hrefs(&mut self, f: &impl Fn(&str) -> String) {
        self.href = f(&self.href);
        for link in self.alternates.iter_mut().chain(self.children.iter_mut()) {
            link.map_hrefs(f);
        }
    }

    /// Clear `templated` on links whose href has no template expression.
    pub(crate) fn enforce_templated(&mut self) {
        if self.templated && !self.href.contains('{') {
            self.templated = false;
        }
        for link in self.alternates.iter_mut().chain(self.children.iter_mut()) {
            link.enforce_templated();
        }
    }
}

/// RFC 6570 operators that may prefix the variable list of an expression.
const TEMPLATE_OPERATORS: &[char] = &['+', '#', '.', '/', ';', '?', '&'];

fn variable_names(expression: &str) -> impl Iterator<Item = &str> {
    expression
        .trim_start_matches(TEMPLATE_OPERATORS)
        .split(',')
        .filter(|name| !name.is_empty())
}

/// Byte ranges of `{...}` expressions and their inner text.
fn template_expressions(href: &str) -> Vec<(std::ops::Range<usize>, &str)> {
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(open) = href[from..].find('{').map(|i| i + from) {
        let Some(close) = href[open..].find('}').map(|i| i + open) else {
            break;
        };
        let inner = &href[open + 1..close];
        if !inner.trim_start_matches('?').is_empty() {
            out.push((open..close + 1, inner));
        }
        from = close + 1;
    }
    out
}

/// Lookups over a sequence of links.
pub trait LinkListExt {
    fn index_of_first_with_href(&self, href: &str) -> Option<usize>;
    fn first_with_href(&self, href: &str) -> Option<&Link>;
    fn first_with_rel(&self, rel: &str) -> Option<&Link>;
    fn filter_by_rel(&self, rel: &str) -> Vec<&Link>;
    fn first_with_media_type(&self, media_type: &str) -> Option<&Link>;
    fn filter_by_media_type(&self, media_types: &[&str]) -> Vec<&Link>;
    fn all_are_audio(&self) -> bool;
    fn all_are_bitmap(&self) -> bool;
    fn all_are_video(&self) -> bool;
    /// Every link is a bitmap or a video.
    fn all_are_visual(&self) -> bool;
    fn all_are_html(&self) -> bool;
    fn all_match_media_type(&self, media_types: &[&str]) -> bool;
}

impl LinkListExt for [Link] {
    /// A link also matches through one of its direct alternates.
    fn index_of_first_with_href(&self, href: &str) -> Option<usize> {
        self.iter()
            .position(|l| l.href == href || l.alternates.iter().any(|a| a.href == href))
    }

    /// Returns the matching alternate itself when the match is an alternate.
    fn first_with_href(&self, href: &str) -> Option<&Link> {
        self.iter().find_map(|l| {
            if l.href == href {
                Some(l)
            } else {
                l.alternates.iter().find(|a| a.href == href)
            }
        })
    }

    fn first_with_rel(&self, rel: &str) -> Option<&Link> {
        self.iter().find(|l| l.has_rel(rel))
    }

    fn filter_by_rel(&self, rel: &str) -> Vec<&Link> {
        self.iter().filter(|l| l.has_rel(rel)).collect()
    }

    fn first_with_media_type(&self, media_type: &str) -> Option<&Link> {
        self.iter()
            .find(|l| l.media_type_is(|mt| mt.matches_any(&[media_type])))
    }

    fn filter_by_media_type(&self, media_types: &[&str]) -> Vec<&Link> {
        self.iter()
            .filter(|l| l.media_type_is(|mt| mt.matches_any(media_types)))
            .collect()
    }

    fn all_are_audio(&self) -> bool {
        self.iter().all(|l| l.media_type_is(MediaType::is_audio))
    }

    fn all_are_bitmap(&self) -> bool {
        self.iter().all(|l| l.media_type_is(MediaType::is_bitmap))
    }

    fn all_are_video(&self) -> bool {
        self.iter().all(|l| l.media_type_is(MediaType::is_video))
    }

    fn all_are_visual(&self) -> bool {
        self.iter()
            .all(|l| l.media_type_is(|mt| mt.is_bitmap() || mt.is_video()))
    }

    fn all_are_html(&self) -> bool {
        self.iter().all(|l| l.media_type_is(MediaType::is_html))
    }

    fn all_match_media_type(&self, media_types: &[&str]) -> bool {
        self.iter()
            .all(|l| l.media_type_is(|mt| mt.matches_any(media_types)))
    }
}
