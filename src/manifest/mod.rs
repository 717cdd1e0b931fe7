//! The Readium Web Publication Manifest model and its JSON form.
//!
//! Polymorphic JSON shapes (a string or an object, a value or an array) are
//! handled by hand-written serde impls so that parsing stays lenient and
//! output stays minimal.

pub mod a11y;
mod collection;
mod contributor;
mod encryption;
mod link;
mod localized;
mod locator;
mod metadata;
pub(crate) mod one_or_many;
pub mod presentation;
pub mod profile;
mod properties;
mod subject;

pub use a11y::{A11y, Certification};
pub use collection::{PublicationCollection, Subcollections, collections_from_json};
pub use contributor::{Collection, Contributor, contributors};
pub use encryption::{Encryption, LCP_SCHEME};
pub use link::{Link, LinkListExt};
pub use localized::{LocalizedString, UNDEFINED_LANGUAGE};
pub use locator::{Locations, Locator, Text};
pub use metadata::{INFERRED_ACCESSIBILITY_KEY, Metadata, ROLE_KEYS, ReadingProgression, parse_date};
pub use presentation::{Layout, Presentation};
pub use properties::Properties;
pub use subject::Subject;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::mediatype;
use crate::util::{href_directory, href_without_suffix, is_absolute_url, resolve_href};

/// Default JSON-LD context of a manifest.
pub const WEBPUB_CONTEXT: &str = "https://readium.org/webpub-manifest/context.jsonld";

/// A publication's manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub context: Vec<String>,
    pub metadata: Metadata,
    pub links: Vec<Link>,
    pub reading_order: Vec<Link>,
    pub resources: Vec<Link>,
    pub toc: Vec<Link>,
    pub subcollections: Subcollections,
}

impl Manifest {
    /// Parse a manifest from its JSON value.
    ///
    /// When `packaged` is false and a `self` link exists, relative hrefs are
    /// resolved against the self link's directory. When `packaged` is true
    /// the `self` relation becomes `alternate`, since the manifest no longer
    /// lives at that URL.
    pub fn from_json(value: Value, packaged: bool) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(Error::InvalidManifest("manifest is not a JSON object".into()));
        };
        let invalid = |what: &str, e: String| Error::InvalidManifest(format!("{what}: {e}"));
        let links_of = |v: Option<Value>, what: &str| -> Result<Vec<Link>> {
            match v {
                Some(v @ Value::Array(_)) => {
                    serde_json::from_value(v).map_err(|e| invalid(what, e.to_string()))
                }
                _ => Ok(Vec::new()),
            }
        };

        let mut links = links_of(obj.remove("links"), "links")?;

        let mut base = "/".to_string();
        if !packaged
            && let Some(this) = links.first_with_rel("self")
            && is_absolute_url(&this.href)
        {
            base = href_directory(&this.href);
        }

        let context = obj
            .remove("@context")
            .map(|v| one_or_many::strings::from_value(&v))
            .unwrap_or_default();

        let metadata = match obj.remove("metadata") {
            Some(Value::Object(m)) => Metadata::from_json(m).map_err(|e| invalid("metadata", e))?,
            _ => return Err(Error::InvalidManifest("'metadata' is required".into())),
        };

        if packaged {
            for link in links.iter_mut().filter(|l| l.has_rel("self")) {
                link.rels.retain(|r| r != "self");
                link.rels.insert(0, "alternate".to_string());
            }
        }

        let reading_order = match obj.remove("readingOrder").or_else(|| obj.remove("spine")) {
            Some(v @ Value::Array(_)) => links_of(Some(v), "readingOrder")?,
            _ => {
                return Err(Error::InvalidManifest(
                    "manifest has no valid 'readingOrder' or 'spine'".into(),
                ));
            }
        };
        let resources = links_of(obj.remove("resources"), "resources")?;
        let toc = links_of(obj.remove("toc"), "toc")?;

        let typed = |list: Vec<Link>| -> Vec<Link> {
            list.into_iter().filter(|l| l.media_type.is_some()).collect()
        };

        let mut manifest = Manifest {
            context,
            metadata,
            links,
            reading_order: typed(reading_order),
            resources: typed(resources),
            toc,
            subcollections: collections_from_json(obj).map_err(|e| invalid("subcollection", e))?,
        };
        manifest.map_hrefs(|href| resolve_href(href, &base));
        manifest.for_each_link_mut(Link::enforce_templated);
        Ok(manifest)
    }

    /// Whether the manifest conforms to the profile `uri`.
    ///
    /// Audiobook, Divina and PDF are recognized from the reading order's
    /// media types. EPUB must also be declared, as must any other profile.
    pub fn conforms_to(&self, uri: &str) -> bool {
        if self.reading_order.is_empty() {
            return false;
        }
        match uri {
            profile::AUDIOBOOK => self.reading_order.all_are_audio(),
            profile::DIVINA => self.reading_order.all_are_bitmap(),
            profile::EPUB => {
                self.metadata.conforms_to(profile::EPUB) && self.reading_order.all_are_html()
            }
            profile::PDF => self.reading_order.all_match_media_type(&[mediatype::PDF]),
            other => self.metadata.conforms_to(other),
        }
    }

    /// First link with `href` in the reading order, resources, then links,
    /// descending into alternates and children. Retried without the
    /// fragment and query when nothing matches.
    pub fn link_with_href(&self, href: &str) -> Option<&Link> {
        fn deep<'a>(links: &'a [Link], href: &str) -> Option<&'a Link> {
            links.iter().find_map(|l| {
                if l.href == href {
                    Some(l)
                } else {
                    deep(&l.alternates, href).or_else(|| deep(&l.children, href))
                }
            })
        }
        let find = |href: &str| {
            deep(&self.reading_order, href)
                .or_else(|| deep(&self.resources, href))
                .or_else(|| deep(&self.links, href))
        };
        find(href).or_else(|| find(href_without_suffix(href)))
    }

    /// First link with `rel` in resources, then reading order, then links.
    pub fn link_with_rel(&self, rel: &str) -> Option<&Link> {
        self.resources
            .first_with_rel(rel)
            .or_else(|| self.reading_order.first_with_rel(rel))
            .or_else(|| self.links.first_with_rel(rel))
    }

    pub fn links_with_rel(&self, rel: &str) -> Vec<&Link> {
        let mut out = self.resources.filter_by_rel(rel);
        out.extend(self.reading_order.filter_by_rel(rel));
        out.extend(self.links.filter_by_rel(rel));
        out
    }

    /// Locator pointing at `link` (fragment included), or `None` when the
    /// target resource is unknown or untyped.
    pub fn locator_from_link(&self, link: &Link) -> Option<Locator> {
        let (href, fragment) = match link.href.split_once('#') {
            Some((href, fragment)) => (href, Some(fragment)),
            None => (link.href.as_str(), None),
        };
        let resource = self.link_with_href(href)?;
        let media_type = resource.media_type.clone()?;

        let mut locator = Locator::new(href, media_type);
        locator.title = resource.title.clone().or_else(|| link.title.clone());
        match fragment.filter(|f| !f.is_empty()) {
            Some(fragment) => locator.locations.fragments = vec![fragment.to_string()],
            None => locator.locations.progression = Some(0.0),
        }
        Some(locator)
    }

    /// Apply `f` to every link of the manifest, nested ones included.
    fn for_each_link_mut(&mut self, f: impl Fn(&mut Link)) {
        fn walk(link: &mut Link, f: &impl Fn(&mut Link)) {
            f(link);
            for child in link.alternates.iter_mut().chain(link.children.iter_mut()) {
                walk(child, f);
            }
        }
        let collections = self.subcollections.values_mut().flatten();
        let top = self
            .links
            .iter_mut()
            .chain(self.reading_order.iter_mut())
            .chain(self.resources.iter_mut())
            .chain(self.toc.iter_mut());
        for link in top {
            walk(link, &f);
        }
        for collection in collections {
            for link in collection.links_mut() {
                walk(link, &f);
            }
        }
    }

    /// Rewrite every href of the manifest: links, reading order, resources,
    /// table of contents, subcollections and metadata links.
    pub fn map_hrefs(&mut self, f: impl Fn(&str) -> String) {
        self.for_each_link_mut(|link| link.href = f(&link.href));
        let metadata = &mut self.metadata;
        for key in ROLE_KEYS {
            if let Some(list) = metadata.role_mut(key) {
                for link in list.iter_mut().flat_map(|c| c.links.iter_mut()) {
                    link.map_hrefs(&f);
                }
            }
        }
        for link in metadata.subjects.iter_mut().flat_map(|s| s.links.iter_mut()) {
            link.map_hrefs(&f);
        }
    }

    /// Copy of the manifest whose local hrefs are relative to the
    /// publication root, as served to reading systems.
    pub fn with_relative_hrefs(&self) -> Manifest {
        let mut manifest = self.clone();
        manifest.map_hrefs(|href| href.strip_prefix('/').unwrap_or(href).to_string());
        manifest
    }

    /// JSON value of the manifest, with `self_link` appended to `links`.
    pub fn to_value(&self, self_link: Option<&Link>) -> Result<Value> {
        Ok(serde_json::to_value(ManifestJson {
            manifest: self,
            self_link,
        })?)
    }

    /// Compact JSON text of the manifest.
    pub fn to_json(&self, self_link: Option<&Link>) -> Result<String> {
        Ok(serde_json::to_string(&ManifestJson {
            manifest: self,
            self_link,
        })?)
    }

    /// JSON text indented with `indent` for every level.
    pub fn to_json_pretty(&self, self_link: Option<&Link>, indent: &str) -> Result<String> {
        to_json_indented(
            &ManifestJson {
                manifest: self,
                self_link,
            },
            indent,
        )
    }
}

/// Serialize `value` with a custom indentation string.
pub fn to_json_indented(value: &impl Serialize, indent: &str) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|e| Error::Decode(e.to_string()))
}

struct ManifestJson<'a> {
    manifest: &'a Manifest,
    self_link: Option<&'a Link>,
}

impl Serialize for ManifestJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let m = self.manifest;
        let mut map = serializer.serialize_map(None)?;
        match m.context.as_slice() {
            [] => map.serialize_entry("@context", WEBPUB_CONTEXT)?,
            [single] => map.serialize_entry("@context", single)?,
            many => map.serialize_entry("@context", many)?,
        }
        map.serialize_entry("metadata", &m.metadata)?;
        match self.self_link {
            Some(this) => {
                let links: Vec<&Link> = m.links.iter().chain(std::iter::once(this)).collect();
                map.serialize_entry("links", &links)?;
            }
            None => map.serialize_entry("links", &m.links)?,
        }
        map.serialize_entry("readingOrder", &m.reading_order)?;
        if !m.resources.is_empty() {
            map.serialize_entry("resources", &m.resources)?;
        }
        if !m.toc.is_empty() {
            map.serialize_entry("toc", &m.toc)?;
        }
        for (role, collections) in &m.subcollections {
            map.serialize_entry(role, &collection::Role(collections))?;
        }
        map.end()
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ManifestJson {
            manifest: self,
            self_link: None,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Manifest::from_json(value, false).map_err(serde::de::Error::custom)
    }
}
