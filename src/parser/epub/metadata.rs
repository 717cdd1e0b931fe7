//! Package metadata: `dc:*` elements, `<meta>` with refinements, and
//! `<link>`, mapped onto the manifest [`Metadata`].

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::manifest::a11y::profile as a11y_profile;
use crate::manifest::presentation::{Orientation, Overflow, Spread};
use crate::manifest::{
    A11y, Certification, Contributor, Layout, LocalizedString, Metadata, Presentation,
    ReadingProgression, Subject, parse_date, profile,
};
use crate::util::resolve_href;
use crate::xml::{NS_DC, NS_OPF, NS_XML, XmlElement};

use super::clock::parse_clock_value;
use super::vocab::{
    A11Y, DCTERMS, DefaultVocab, LINK, MEDIA, META, PrefixMap, RENDITION, SCHEMA, parse_properties,
    resolve_property,
};

/// A metadata expression and the expressions refining it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaItem {
    pub property: String,
    pub value: String,
    pub lang: Option<String>,
    pub scheme: Option<String>,
    pub refines: Option<String>,
    pub id: Option<String>,
    pub children: BTreeMap<String, Vec<MetaItem>>,
}

/// A `<link>` from the package metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpubLink {
    pub href: String,
    pub rels: Vec<String>,
    pub media_type: Option<String>,
    pub refines: Option<String>,
    pub properties: Vec<String>,
}

/// Metadata expressions grouped by property.
#[derive(Debug, Default)]
pub struct EpubMetadata {
    /// Expressions about the publication.
    pub global: HashMap<String, Vec<MetaItem>>,
    /// Expressions refining manifest items, by item id.
    pub refine: HashMap<String, HashMap<String, Vec<MetaItem>>>,
    pub links: Vec<EpubLink>,
}

impl EpubMetadata {
    pub fn first_value(&self, property: &str) -> Option<&str> {
        first_value(&self.global, property)
    }

    /// Id of the EPUB 2 cover image item.
    pub fn cover_id(&self) -> Option<&str> {
        self.first_value("cover")
    }

    /// Duration declared for a manifest item, in seconds.
    pub fn item_duration(&self, id: &str) -> Option<f64> {
        let items = self.refine.get(id)?;
        first_value(items, &format!("{MEDIA}duration")).and_then(parse_clock_value)
    }
}

fn first_value<'a>(items: &'a HashMap<String, Vec<MetaItem>>, property: &str) -> Option<&'a str> {
    items
        .get(property)
        .and_then(|v| v.first())
        .map(|m| m.value.as_str())
}

pub struct MetadataParser<'a> {
    prefixes: &'a PrefixMap,
    package_language: Option<String>,
    meta_language: Option<String>,
}

impl<'a> MetadataParser<'a> {
    pub fn new(prefixes: &'a PrefixMap) -> Self {
        Self {
            prefixes,
            package_language: None,
            meta_language: None,
        }
    }

    pub fn parse(mut self, package: &XmlElement, path: &str) -> Result<EpubMetadata> {
        let metadata = package
            .child(NS_OPF, "metadata")
            .ok_or_else(|| Error::MissingElement("package metadata".into()))?;

        self.package_language = package
            .attr_ns(NS_XML, "lang")
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        self.meta_language = metadata
            .child(NS_DC, "language")
            .map(|l| l.text().trim().to_string())
            .filter(|l| !l.is_empty());

        let mut metas = Vec::new();
        let mut links = Vec::new();
        for element in metadata.elements() {
            if element.ns.as_deref() == Some(NS_DC) {
                metas.extend(self.dc_element(element));
            } else if element.is(NS_OPF, "meta") {
                metas.extend(self.meta_element(element));
            } else if element.is(NS_OPF, "link") {
                links.extend(self.link_element(element, path));
            }
        }

        let mut out = EpubMetadata {
            links,
            ..Default::default()
        };
        for meta in resolve_hierarchy(metas) {
            match meta.refines.clone() {
                None => out.global.entry(meta.property.clone()).or_default().push(meta),
                Some(target) => out
                    .refine
                    .entry(target)
                    .or_default()
                    .entry(meta.property.clone())
                    .or_default()
                    .push(meta),
            }
        }
        Ok(out)
    }

    /// `xml:lang` of the element, else of the package, else the first
    /// `dc:language`.
    fn language(&self, element: &XmlElement) -> Option<String> {
        element
            .attr_ns(NS_XML, "lang")
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .or_else(|| self.package_language.clone())
            .or_else(|| self.meta_language.clone())
    }

    fn item(&self, element: &XmlElement, property: String, value: String) -> MetaItem {
        MetaItem {
            property,
            value,
            lang: self.language(element),
            id: element.attr("id").map(str::to_string),
            ..Default::default()
        }
    }

    fn link_element(&self, element: &XmlElement, path: &str) -> Option<EpubLink> {
        let href = element.attr("href").map(str::trim).filter(|h| !h.is_empty())?;
        let resolve = |raw: Option<&str>| -> Vec<String> {
            parse_properties(raw.unwrap_or_default())
                .into_iter()
                .map(|p| resolve_property(p, self.prefixes, DefaultVocab::Link))
                .collect()
        };
        Some(EpubLink {
            href: resolve_href(href, path),
            rels: resolve(element.attr("rel")),
            media_type: element.attr("media-type").map(str::to_string),
            refines: element
                .attr("refines")
                .map(|r| r.trim_start_matches('#').to_string()),
            properties: resolve(element.attr("properties")),
        })
    }

    fn meta_element(&self, element: &XmlElement) -> Option<MetaItem> {
        match element.attr("property").map(str::trim) {
            Some(property) if !property.is_empty() => {
                let value = element.text().trim().to_string();
                if value.is_empty() {
                    return None;
                }
                let mut item = self.item(
                    element,
                    resolve_property(property, self.prefixes, DefaultVocab::Meta),
                    value,
                );
                item.refines = element
                    .attr("refines")
                    .map(|r| r.trim().trim_start_matches('#').to_string())
                    .filter(|r| !r.is_empty());
                item.scheme = element
                    .attr("scheme")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| resolve_property(s, self.prefixes, DefaultVocab::None));
                Some(item)
            }
            _ => {
                // EPUB 2 `<meta name content>`.
                let name = element.attr("name").map(str::trim).filter(|n| !n.is_empty())?;
                let content = element
                    .attr("content")
                    .map(str::trim)
                    .filter(|c| !c.is_empty())?;
                Some(self.item(
                    element,
                    resolve_property(name, self.prefixes, DefaultVocab::None),
                    content.to_string(),
                ))
            }
        }
    }

    fn dc_element(&self, element: &XmlElement) -> Option<MetaItem> {
        let value = element.text().trim().to_string();
        if value.is_empty() {
            return None;
        }
        let property = format!("{DCTERMS}{}", element.local);
        match element.local.as_str() {
            "creator" | "contributor" | "publisher" => {
                let mut item = self.item(element, property, value);
                for name in ["file-as", "role"] {
                    if let Some(v) = element.attr_ns(NS_OPF, name).filter(|v| !v.is_empty()) {
                        let property = format!("{META}{name}");
                        let legacy = MetaItem {
                            property: property.clone(),
                            value: v.to_string(),
                            lang: item.lang.clone(),
                            ..Default::default()
                        };
                        item.children.insert(property, vec![legacy]);
                    }
                }
                Some(item)
            }
            "date" if element.attr_ns(NS_OPF, "event") == Some("modification") => {
                Some(self.item(element, format!("{DCTERMS}modified"), value))
            }
            _ => Some(self.item(element, property, value)),
        }
    }
}

/// Attach refining expressions to the expressions they refine.
///
/// Expressions refining something that is not a metadata expression (a
/// manifest item, or nothing) stay at the top level.
fn resolve_hierarchy(items: Vec<MetaItem>) -> Vec<MetaItem> {
    let ids: HashSet<&str> = items.iter().filter_map(|m| m.id.as_deref()).collect();
    let mut by_refines: HashMap<&str, Vec<&MetaItem>> = HashMap::new();
    for item in &items {
        if let Some(target) = item.refines.as_deref() {
            by_refines.entry(target).or_default().push(item);
        }
    }

    items
        .iter()
        .filter(|m| m.refines.as_deref().is_none_or(|r| !ids.contains(r)))
        .map(|m| attach_children(m, &by_refines, &mut HashSet::new()))
        .collect()
}

fn attach_children<'a>(
    item: &'a MetaItem,
    by_refines: &HashMap<&str, Vec<&'a MetaItem>>,
    chain: &mut HashSet<&'a str>,
) -> MetaItem {
    let mut out = item.clone();
    let Some(id) = item.id.as_deref() else {
        return out;
    };
    chain.insert(id);
    for &child in by_refines.get(id).into_iter().flatten() {
        if child.id.as_deref().is_some_and(|cid| chain.contains(cid)) {
            continue;
        }
        let child = attach_children(child, by_refines, chain);
        out.children.entry(child.property.clone()).or_default().push(child);
    }
    out
}

impl MetaItem {
    fn child_value(&self, property: &str) -> Option<&str> {
        self.children
            .get(property)
            .and_then(|c| c.first())
            .map(|c| c.value.as_str())
    }

    /// The value with its `alternate-script` translations.
    fn localized(&self) -> LocalizedString {
        let mut out = LocalizedString::default();
        out.set(self.lang.as_deref(), self.value.clone());
        for alt in self.children.get(&format!("{META}alternate-script")).into_iter().flatten() {
            out.set(alt.lang.as_deref(), alt.value.clone());
        }
        out
    }

    fn file_as(&self) -> Option<LocalizedString> {
        let child = self.children.get(&format!("{META}file-as"))?.first()?;
        let mut out = LocalizedString::default();
        out.set(child.lang.as_deref(), child.value.clone());
        Some(out)
    }

    fn role(&self) -> Option<&str> {
        self.child_value(&format!("{META}role"))
    }

    /// JSON form kept in `otherMetadata`: the bare value, or an object with
    /// the refinements and `@value`.
    fn to_value(&self) -> Value {
        if self.children.is_empty() {
            return Value::String(self.value.clone());
        }
        let mut map = Map::new();
        for children in self.children.values() {
            for child in children {
                map.insert(child.property.clone(), child.to_value());
            }
        }
        map.insert("@value".into(), Value::String(self.value.clone()));
        Value::Object(map)
    }

    fn to_contributor(&self) -> Contributor {
        Contributor {
            name: self.localized(),
            sort_as: self.file_as(),
            identifier: self
                .child_value(&format!("{DCTERMS}identifier"))
                .map(str::to_string),
            roles: Vec::new(),
            position: self
                .child_value(&format!("{META}group-position"))
                .and_then(|p| p.trim().parse().ok()),
            links: Vec::new(),
        }
    }
}

/// Contributor list key for a MARC relator code.
fn role_key(code: &str) -> Option<&'static str> {
    Some(match code {
        "aut" => "author",
        "trl" => "translator",
        "edt" => "editor",
        "pbl" => "publisher",
        "art" => "artist",
        "ill" => "illustrator",
        "clr" => "colorist",
        "nrt" => "narrator",
        _ => return None,
    })
}

/// Properties mapped onto dedicated metadata fields rather than kept in
/// `otherMetadata`.
fn is_mapped(property: &str) -> bool {
    const DC: &[&str] = &[
        "identifier",
        "language",
        "title",
        "date",
        "modified",
        "description",
        "creator",
        "publisher",
        "contributor",
        "subject",
        "conformsTo",
    ];
    const SCHEMA_A11Y: &[&str] = &[
        "accessMode",
        "accessModeSufficient",
        "accessibilityFeature",
        "accessibilityHazard",
        "accessibilitySummary",
    ];
    if let Some(name) = property.strip_prefix(DCTERMS) {
        return DC.contains(&name);
    }
    if let Some(name) = property.strip_prefix(SCHEMA) {
        return SCHEMA_A11Y.contains(&name);
    }
    if let Some(name) = property.strip_prefix(MEDIA) {
        return matches!(name, "narrator" | "duration");
    }
    if let Some(name) = property.strip_prefix(RENDITION) {
        return matches!(name, "flow" | "spread" | "orientation" | "layout");
    }
    if let Some(name) = property.strip_prefix(A11Y) {
        return name == "certifiedBy";
    }
    property == format!("{META}belongs-to-collection")
        || matches!(
            property,
            "cover" | "calibre:series" | "calibre:series_index" | "calibre:title_sort"
        )
}

/// What the package metadata needs from the rest of the package.
pub struct MetadataContext<'a> {
    pub version: f64,
    pub fallback_title: &'a str,
    pub unique_identifier: Option<&'a str>,
    pub reading_progression: ReadingProgression,
    pub display_options: &'a HashMap<String, String>,
}

/// Build the publication metadata.
pub fn build_metadata(meta: &EpubMetadata, ctx: &MetadataContext) -> Metadata {
    let items = &meta.global;
    let all = |property: &str| items.get(property).map(Vec::as_slice).unwrap_or_default();

    let mut metadata = Metadata {
        identifier: identifier(all(&format!("{DCTERMS}identifier")), ctx.unique_identifier),
        conforms_to: vec![profile::EPUB.to_string()],
        modified: meta
            .first_value(&format!("{DCTERMS}modified"))
            .and_then(parse_date),
        published: meta.first_value(&format!("{DCTERMS}date")).and_then(parse_date),
        languages: all(&format!("{DCTERMS}language"))
            .iter()
            .map(|m| m.value.clone())
            .collect(),
        description: meta
            .first_value(&format!("{DCTERMS}description"))
            .map(str::to_string),
        duration: meta
            .first_value(&format!("{MEDIA}duration"))
            .and_then(parse_clock_value),
        subjects: subjects(all(&format!("{DCTERMS}subject"))),
        reading_progression: ctx.reading_progression,
        presentation: Some(presentation(meta, ctx)),
        accessibility: accessibility(meta),
        ..Default::default()
    };

    let titles = all(&format!("{DCTERMS}title"));
    set_titles(&mut metadata, titles, meta, ctx.fallback_title);
    set_contributors(&mut metadata, items);
    set_collections(&mut metadata, meta);

    let mut keys: Vec<&String> = items.keys().filter(|k| !is_mapped(k)).collect();
    keys.sort();
    for key in keys {
        let values: Vec<Value> = items[key].iter().map(MetaItem::to_value).collect();
        let value = match <[Value; 1]>::try_from(values) {
            Ok([single]) => single,
            Err(values) => Value::Array(values),
        };
        metadata.other_metadata.insert(key.clone(), value);
    }

    metadata
}

/// The `unique-identifier` target, else the first identifier.
fn identifier(identifiers: &[MetaItem], unique_id: Option<&str>) -> Option<String> {
    identifiers
        .iter()
        .find(|m| unique_id.is_some() && m.id.as_deref() == unique_id)
        .or_else(|| identifiers.first())
        .map(|m| m.value.clone())
}

fn set_titles(metadata: &mut Metadata, titles: &[MetaItem], meta: &EpubMetadata, fallback: &str) {
    let title_type = format!("{META}title-type");
    let main = titles
        .iter()
        .find(|t| t.child_value(&title_type) == Some("main"))
        .or_else(|| titles.first());

    metadata.title = main.map(MetaItem::localized).unwrap_or_default();
    if metadata.title.string().is_empty() {
        metadata.title = LocalizedString::new(fallback);
    }

    let display_seq = format!("{META}display-seq");
    metadata.subtitle = titles
        .iter()
        .filter(|t| t.child_value(&title_type) == Some("subtitle"))
        .min_by_key(|t| {
            t.child_value(&display_seq)
                .and_then(|s| s.trim().parse::<i64>().ok())
                .unwrap_or(0)
        })
        .map(MetaItem::localized);

    metadata.sort_as = main.and_then(MetaItem::file_as).or_else(|| {
        meta.first_value("calibre:title_sort")
            .map(LocalizedString::new)
    });
}

fn set_contributors(metadata: &mut Metadata, items: &HashMap<String, Vec<MetaItem>>) {
    let sources = [
        (format!("{DCTERMS}creator"), Some("aut")),
        (format!("{DCTERMS}contributor"), None),
        (format!("{DCTERMS}publisher"), Some("pbl")),
        (format!("{MEDIA}narrator"), Some("nrt")),
    ];
    for (property, default_role) in sources {
        for item in items.get(&property).into_iter().flatten() {
            let mut contributor = item.to_contributor();
            let role = item.role().map(str::trim).filter(|r| !r.is_empty());
            let key = role.and_then(role_key).or_else(|| default_role.and_then(role_key));
            let key = match key {
                Some(key) => key,
                None => {
                    if let Some(role) = role {
                        contributor.roles.push(role.to_string());
                    }
                    "contributor"
                }
            };
            if let Some(list) = metadata.role_mut(key) {
                list.push(contributor);
            }
        }
    }
}

fn set_collections(metadata: &mut Metadata, meta: &EpubMetadata) {
    let collection_type = format!("{META}collection-type");
    let mut series = Vec::new();
    let mut collections = Vec::new();
    for item in meta
        .global
        .get(&format!("{META}belongs-to-collection"))
        .into_iter()
        .flatten()
    {
        if item.child_value(&collection_type) == Some("series") {
            series.push(item.to_contributor());
        } else {
            collections.push(item.to_contributor());
        }
    }

    if series.is_empty()
        && let Some(calibre) = meta.global.get("calibre:series").and_then(|s| s.first())
    {
        let mut name = LocalizedString::default();
        name.set(calibre.lang.as_deref(), calibre.value.clone());
        series.push(Contributor {
            name,
            position: meta
                .first_value("calibre:series_index")
                .and_then(|p| p.trim().parse().ok()),
            ..Default::default()
        });
    }

    if !collections.is_empty() {
        metadata.belongs_to.insert("collection".into(), collections);
    }
    if !series.is_empty() {
        metadata.belongs_to.insert("series".into(), series);
    }
}

fn subjects(items: &[MetaItem]) -> Vec<Subject> {
    let authority = format!("{META}authority");
    let term = format!("{META}term");
    let subjects: Vec<Subject> = items
        .iter()
        .map(|item| Subject {
            name: item.localized(),
            sort_as: item.file_as(),
            scheme: item.child_value(&authority).map(str::to_string),
            code: item.child_value(&term).map(str::to_string),
            links: Vec::new(),
        })
        .collect();

    // A lone plain subject is often a list in disguise.
    if let [single] = subjects.as_slice()
        && single.name.len() == 1
        && single.code.is_none()
        && single.scheme.is_none()
        && single.sort_as.is_none()
        && let Some((lang, text)) = single.name.translations().iter().next()
    {
        return text
            .split([',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Subject {
                name: LocalizedString::from_translations([(lang.clone(), s.to_string())]),
                ..Default::default()
            })
            .collect();
    }
    subjects
}

fn presentation(meta: &EpubMetadata, ctx: &MetadataContext) -> Presentation {
    let value = |name: &str| meta.first_value(&format!("{RENDITION}{name}"));

    let (overflow, continuous) = match value("flow") {
        Some("paginated") => (Overflow::Paginated, false),
        Some("scrolled-continuous") => (Overflow::Scrolled, true),
        Some("scrolled-doc") => (Overflow::Scrolled, false),
        _ => (Overflow::Auto, false),
    };

    let fixed = match value("layout") {
        Some(layout) => layout == "pre-paginated",
        None if ctx.version < 3.0 => {
            ctx.display_options.get("fixed-layout").map(String::as_str) == Some("true")
        }
        None => false,
    };

    Presentation {
        overflow: Some(overflow),
        continuous: Some(continuous),
        layout: Some(if fixed { Layout::Fixed } else { Layout::Reflowable }),
        orientation: Some(match value("orientation") {
            Some("landscape") => Orientation::Landscape,
            Some("portrait") => Orientation::Portrait,
            _ => Orientation::Auto,
        }),
        spread: Some(match value("spread") {
            Some("none") => Spread::None,
            Some("landscape") => Spread::Landscape,
            Some("portrait" | "both") => Spread::Both,
            _ => Spread::Auto,
        }),
        ..Default::default()
    }
}

/// Accessibility metadata from the schema.org and EPUB a11y properties.
fn accessibility(meta: &EpubMetadata) -> Option<A11y> {
    let values = |property: String| -> Vec<String> {
        meta.global
            .get(&property)
            .into_iter()
            .flatten()
            .map(|m| m.value.clone())
            .collect()
    };

    let mut a11y = A11y {
        conforms_to: values(format!("{DCTERMS}conformsTo"))
            .into_iter()
            .map(|v| conformance_profile(&v))
            .collect(),
        summary: meta
            .first_value(&format!("{SCHEMA}accessibilitySummary"))
            .map(str::to_string),
        access_modes: values(format!("{SCHEMA}accessMode")),
        access_modes_sufficient: values(format!("{SCHEMA}accessModeSufficient"))
            .iter()
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|modes| !modes.is_empty())
            .collect(),
        features: values(format!("{SCHEMA}accessibilityFeature")),
        hazards: values(format!("{SCHEMA}accessibilityHazard")),
        ..Default::default()
    };

    // Conformance may also be declared with a link.
    for link in &meta.links {
        if link.refines.is_none() && link.rels.iter().any(|r| r == &format!("{DCTERMS}conformsTo")) {
            a11y.conforms_to.push(conformance_profile(&link.href));
        }
    }

    if let Some(certifier) = meta
        .global
        .get(&format!("{A11Y}certifiedBy"))
        .and_then(|c| c.first())
    {
        let refinement = |name: &str| {
            certifier
                .child_value(&format!("{A11Y}{name}"))
                .map(str::to_string)
                .or_else(|| meta.first_value(&format!("{A11Y}{name}")).map(str::to_string))
        };
        a11y.certification = Some(Certification {
            certified_by: Some(certifier.value.clone()),
            credential: refinement("certifierCredential"),
            report: refinement("certifierReport"),
        });
    }

    a11y.conforms_to.dedup();
    (!a11y.is_empty()).then_some(a11y)
}

/// Known conformance statements as profile URIs; anything else verbatim.
fn conformance_profile(value: &str) -> String {
    let value = value.trim();
    let wcag = |level: &str| match level {
        "a" => Some(a11y_profile::EPUB_A11Y_10_WCAG_20_A),
        "aa" => Some(a11y_profile::EPUB_A11Y_10_WCAG_20_AA),
        "aaa" => Some(a11y_profile::EPUB_A11Y_10_WCAG_20_AAA),
        _ => None,
    };
    value
        .strip_prefix("http://www.idpf.org/epub/a11y/accessibility-20170105.html#wcag-")
        .or_else(|| value.strip_prefix("https://www.idpf.org/epub/a11y/accessibility-20170105.html#wcag-"))
        .and_then(|level| wcag(&level.to_ascii_lowercase()))
        .map_or_else(|| value.to_string(), str::to_string)
}

/// Publication links from the package `<link>` elements.
pub fn publication_links(meta: &EpubMetadata) -> Vec<crate::manifest::Link> {
    let record = format!("{LINK}record");
    meta.links
        .iter()
        .filter(|l| l.refines.is_none())
        .map(|l| {
            let mut link = crate::manifest::Link::new(l.href.clone());
            link.media_type = l.media_type.clone();
            for rel in &l.rels {
                link.add_rel(rel.strip_prefix(LINK).unwrap_or(rel));
            }
            if l.rels.contains(&record) {
                let contains: Vec<&str> = ["onix", "xmp"]
                    .into_iter()
                    .filter(|p| l.properties.iter().any(|lp| *lp == format!("{LINK}{p}")))
                    .collect();
                if !contains.is_empty() {
                    link.properties.set("contains", contains);
                }
            }
            link
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::epub::vocab::package_prefixes;

    fn parse(metadata: &str, prefix: &str) -> EpubMetadata {
        let xml = format!(
            r#"<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/"
                  xmlns:opf="http://www.idpf.org/2007/opf" version="3.0" prefix="{prefix}">
                 <metadata>{metadata}</metadata>
               </package>"#
        );
        let root = XmlElement::parse(&xml).unwrap();
        let prefixes = package_prefixes(root.attr("prefix"));
        MetadataParser::new(&prefixes).parse(&root, "/OPS/package.opf").unwrap()
    }

    fn build(meta: &EpubMetadata, version: f64) -> Metadata {
        build_metadata(
            meta,
            &MetadataContext {
                version,
                fallback_title: "fallback",
                unique_identifier: Some("uid"),
                reading_progression: ReadingProgression::Auto,
                display_options: &HashMap::new(),
            },
        )
    }

    #[test]
    fn test_titles() {
        let meta = parse(
            r##"<dc:title id="t1" xml:lang="en">A subtitle</dc:title>
               <meta refines="#t1" property="title-type">subtitle</meta>
               <dc:title id="t2" xml:lang="en">Main</dc:title>
               <meta refines="#t2" property="title-type">main</meta>
               <meta refines="#t2" property="file-as">Main, The</meta>
               <meta refines="#t2" property="alternate-script" xml:lang="fr">Principal</meta>"##,
            "",
        );
        let metadata = build(&meta, 3.0);
        assert_eq!(metadata.title.get(Some("en")), Some("Main"));
        assert_eq!(metadata.title.get(Some("fr")), Some("Principal"));
        assert_eq!(metadata.subtitle.unwrap().get(Some("en")), Some("A subtitle"));
        assert_eq!(metadata.sort_as.unwrap().string(), "Main, The");
    }

    #[test]
    fn test_fallback_title() {
        let metadata = build(&parse("", ""), 3.0);
        assert_eq!(metadata.title(), "fallback");
    }

    #[test]
    fn test_identifier_prefers_unique_identifier() {
        let meta = parse(
            r#"<dc:identifier id="isbn">urn:isbn:1</dc:identifier>
               <dc:identifier id="uid">urn:uuid:2</dc:identifier>"#,
            "",
        );
        assert_eq!(build(&meta, 3.0).identifier.as_deref(), Some("urn:uuid:2"));
    }

    #[test]
    fn test_contributors_by_role() {
        let meta = parse(
            r##"<dc:creator opf:role="aut" opf:file-as="Melville, Herman">Herman Melville</dc:creator>
               <dc:creator id="c2">Someone</dc:creator>
               <meta refines="#c2" property="role" scheme="marc:relators">ill</meta>
               <dc:contributor opf:role="bkp">Producer</dc:contributor>
               <dc:contributor opf:role="trl">Translator</dc:contributor>
               <dc:publisher>House</dc:publisher>
               <meta property="media:narrator">Voice</meta>"##,
            "",
        );
        let metadata = build(&meta, 3.0);
        assert_eq!(metadata.authors.len(), 1);
        assert_eq!(metadata.authors[0].name(), "Herman Melville");
        assert_eq!(metadata.authors[0].sort_as.as_ref().unwrap().string(), "Melville, Herman");
        assert_eq!(metadata.illustrators[0].name(), "Someone");
        assert_eq!(metadata.translators[0].name(), "Translator");
        assert_eq!(metadata.contributors[0].roles, ["bkp"]);
        assert_eq!(metadata.publishers[0].name(), "House");
        assert_eq!(metadata.narrators[0].name(), "Voice");
    }

    #[test]
    fn test_collections() {
        let meta = parse(
            r##"<meta property="belongs-to-collection" id="c1">Series A</meta>
               <meta refines="#c1" property="collection-type">series</meta>
               <meta refines="#c1" property="group-position">2</meta>
               <meta property="belongs-to-collection">Collection B</meta>"##,
            "",
        );
        let metadata = build(&meta, 3.0);
        assert_eq!(metadata.belongs_to_series()[0].name(), "Series A");
        assert_eq!(metadata.belongs_to_series()[0].position, Some(2.0));
        assert_eq!(metadata.belongs_to_collections()[0].name(), "Collection B");
    }

    #[test]
    fn test_calibre_series() {
        let meta = parse(
            r#"<meta name="calibre:series" content="Calibre Series"/>
               <meta name="calibre:series_index" content="3.5"/>"#,
            "",
        );
        let metadata = build(&meta, 2.0);
        assert_eq!(metadata.belongs_to_series()[0].name(), "Calibre Series");
        assert_eq!(metadata.belongs_to_series()[0].position, Some(3.5));
        assert!(metadata.other_metadata.is_empty());
    }

    #[test]
    fn test_single_subject_is_split() {
        let meta = parse(r#"<dc:subject>Fiction, Sea stories; Whaling</dc:subject>"#, "");
        let names: Vec<String> = build(&meta, 3.0)
            .subjects
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, ["Fiction", "Sea stories", "Whaling"]);
    }

    #[test]
    fn test_subject_with_authority() {
        let meta = parse(
            r##"<dc:subject id="s">FICTION / Classics</dc:subject>
               <meta refines="#s" property="authority">BISAC</meta>
               <meta refines="#s" property="term">FIC004000</meta>"##,
            "",
        );
        let subjects = build(&meta, 3.0).subjects;
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].scheme.as_deref(), Some("BISAC"));
        assert_eq!(subjects[0].code.as_deref(), Some("FIC004000"));
    }

    #[test]
    fn test_dates_and_duration() {
        let meta = parse(
            r#"<dc:date>2011-01-01</dc:date>
               <meta property="dcterms:modified">2012-04-02T12:47:00Z</meta>
               <meta property="media:duration">0:32:29</meta>"#,
            "",
        );
        let metadata = build(&meta, 3.0);
        assert_eq!(metadata.published.unwrap().to_rfc3339(), "2011-01-01T00:00:00+00:00");
        assert_eq!(metadata.modified.unwrap().to_rfc3339(), "2012-04-02T12:47:00+00:00");
        assert_eq!(metadata.duration, Some(1949.0));
    }

    #[test]
    fn test_presentation() {
        let meta = parse(
            r#"<meta property="rendition:layout">pre-paginated</meta>
               <meta property="rendition:flow">scrolled-continuous</meta>
               <meta property="rendition:spread">portrait</meta>"#,
            "",
        );
        let presentation = build(&meta, 3.0).presentation.unwrap();
        assert_eq!(presentation.layout, Some(Layout::Fixed));
        assert_eq!(presentation.overflow, Some(Overflow::Scrolled));
        assert_eq!(presentation.continuous, Some(true));
        assert_eq!(presentation.spread, Some(Spread::Both));
        assert_eq!(presentation.orientation, Some(Orientation::Auto));
    }

    #[test]
    fn test_epub2_display_options_fix_layout() {
        let options = HashMap::from([("fixed-layout".to_string(), "true".to_string())]);
        let metadata = build_metadata(
            &parse("", ""),
            &MetadataContext {
                version: 2.0,
                fallback_title: "t",
                unique_identifier: None,
                reading_progression: ReadingProgression::Auto,
                display_options: &options,
            },
        );
        assert_eq!(metadata.presentation.unwrap().layout, Some(Layout::Fixed));
    }

    #[test]
    fn test_accessibility() {
        let meta = parse(
            r##"<meta property="schema:accessMode">textual</meta>
               <meta property="schema:accessModeSufficient">textual,visual</meta>
               <meta property="schema:accessibilityFeature">tableOfContents</meta>
               <meta property="schema:accessibilitySummary">Accessible.</meta>
               <meta property="dcterms:conformsTo">http://www.idpf.org/epub/a11y/accessibility-20170105.html#wcag-aa</meta>
               <meta property="a11y:certifiedBy" id="cert">Org</meta>
               <meta property="a11y:certifierCredential" refines="#cert">Badge</meta>"##,
            "",
        );
        let a11y = build(&meta, 3.0).accessibility.unwrap();
        assert_eq!(a11y.conforms_to, [a11y_profile::EPUB_A11Y_10_WCAG_20_AA]);
        assert_eq!(a11y.access_modes, ["textual"]);
        assert_eq!(a11y.access_modes_sufficient, [vec!["textual".to_string(), "visual".to_string()]]);
        assert_eq!(a11y.summary.as_deref(), Some("Accessible."));
        let cert = a11y.certification.unwrap();
        assert_eq!(cert.certified_by.as_deref(), Some("Org"));
        assert_eq!(cert.credential.as_deref(), Some("Badge"));
    }

    #[test]
    fn test_other_metadata_keeps_refinements() {
        let meta = parse(
            r##"<dc:rights>Public domain</dc:rights>
               <dc:source id="src">Print</dc:source>
               <meta refines="#src" property="source-of">pagination</meta>"##,
            "",
        );
        let metadata = build(&meta, 3.0);
        assert_eq!(
            metadata.other_metadata[&format!("{DCTERMS}rights")],
            Value::String("Public domain".into())
        );
        let source = metadata.other_metadata[&format!("{DCTERMS}source")]
            .as_object()
            .unwrap();
        assert_eq!(source["@value"], "Print");
        assert_eq!(source[&format!("{META}source-of")], "pagination");
    }

    #[test]
    fn test_item_refinements_and_links() {
        let meta = parse(
            r##"<meta refines="#chapter1" property="media:duration">00:00:10</meta>
               <link rel="record" href="meta/onix.xml" media-type="application/xml" properties="onix"/>"##,
            "",
        );
        assert_eq!(meta.item_duration("chapter1"), Some(10.0));
        let links = publication_links(&meta);
        assert_eq!(links[0].href, "/OPS/meta/onix.xml");
        assert_eq!(links[0].rels, ["record"]);
        assert_eq!(links[0].properties.contains(), ["onix"]);
    }

    #[test]
    fn test_refinement_cycle_terminates() {
        let meta = parse(
            r##"<dc:title id="a">Title</dc:title>
               <meta id="b" refines="#a" property="file-as">B</meta>
               <meta id="c" refines="#b" property="display-seq">1</meta>
               <meta id="d" refines="#d" property="display-seq">2</meta>"##,
            "",
        );
        let title = &meta.global[&format!("{DCTERMS}title")][0];
        assert_eq!(title.children[&format!("{META}file-as")][0].children.len(), 1);
    }
}
