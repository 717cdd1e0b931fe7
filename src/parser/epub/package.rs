//! The OPF package document: manifest items, spine and guide.

use crate::error::{Error, Result};
use crate::manifest::ReadingProgression;
use crate::util::resolve_href;
use crate::xml::{NS_OPF, XmlElement};

use super::metadata::{EpubMetadata, MetadataParser};
use super::vocab::{DefaultVocab, PrefixMap, package_prefixes, parse_properties, resolve_property};

/// A parsed package document. Hrefs are resolved against the package path.
#[derive(Debug)]
pub struct PackageDocument {
    pub path: String,
    pub version: f64,
    pub unique_identifier: Option<String>,
    pub metadata: EpubMetadata,
    pub items: Vec<Item>,
    pub spine: Spine,
    pub guide: Vec<GuideReference>,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub href: String,
    pub media_type: Option<String>,
    pub fallback: Option<String>,
    pub media_overlay: Option<String>,
    /// Properties resolved to IRIs.
    pub properties: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Spine {
    pub itemrefs: Vec<ItemRef>,
    pub direction: ReadingProgression,
    /// Id of the NCX item.
    pub toc: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ItemRef {
    pub idref: String,
    pub linear: bool,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GuideReference {
    pub href: String,
    pub title: Option<String>,
    pub kind: Option<String>,
}

impl PackageDocument {
    /// Parse the package document rooted at `root`, found at `path`.
    pub fn parse(root: &XmlElement, path: &str) -> Result<Self> {
        if !root.is(NS_OPF, "package") {
            return Err(Error::InvalidEpub(format!("{path} is not a package document")));
        }
        let prefixes = package_prefixes(root.attr("prefix"));

        let version = match root.attr("version").map(str::trim) {
            Some(v) if !v.is_empty() => v
                .parse::<f64>()
                .map_err(|_| Error::InvalidEpub(format!("invalid package version {v:?}")))?,
            _ => 1.2,
        };

        let metadata = MetadataParser::new(&prefixes).parse(root, path)?;

        let manifest = root
            .child(NS_OPF, "manifest")
            .ok_or_else(|| Error::MissingElement("package manifest".into()))?;
        let spine = root
            .child(NS_OPF, "spine")
            .ok_or_else(|| Error::MissingElement("package spine".into()))?;

        let items = manifest
            .children_named(NS_OPF, "item")
            .filter_map(|e| Item::parse(e, path, &prefixes))
            .collect();

        let guide = root
            .child(NS_OPF, "guide")
            .map(|g| {
                g.children_named(NS_OPF, "reference")
                    .filter_map(|e| GuideReference::parse(e, path))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            path: path.to_string(),
            version,
            unique_identifier: root.attr("unique-identifier").map(str::to_string),
            metadata,
            items,
            spine: Spine::parse(spine, &prefixes),
            guide,
        })
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl Item {
    fn parse(element: &XmlElement, path: &str, prefixes: &PrefixMap) -> Option<Self> {
        let href = non_empty(element.attr("href"))?;
        Some(Self {
            id: element.attr("id").unwrap_or_default().to_string(),
            href: resolve_href(&href, path),
            media_type: non_empty(element.attr("media-type")),
            fallback: non_empty(element.attr("fallback")),
            media_overlay: non_empty(element.attr("media-overlay")),
            properties: parse_properties(element.attr("properties").unwrap_or_default())
                .into_iter()
                .map(|p| resolve_property(p, prefixes, DefaultVocab::Item))
                .collect(),
        })
    }

    pub fn has_property(&self, iri: &str) -> bool {
        self.properties.iter().any(|p| p == iri)
    }
}

impl Spine {
    fn parse(element: &XmlElement, prefixes: &PrefixMap) -> Self {
        let itemrefs = element
            .children_named(NS_OPF, "itemref")
            .filter_map(|e| {
                let idref = non_empty(e.attr("idref"))?;
                Some(ItemRef {
                    idref,
                    linear: e.attr("linear").map(str::trim) != Some("no"),
                    properties: parse_properties(e.attr("properties").unwrap_or_default())
                        .into_iter()
                        .map(|p| resolve_property(p, prefixes, DefaultVocab::Itemref))
                        .collect(),
                })
            })
            .collect();

        let direction = match element.attr("page-progression-direction").map(str::trim) {
            Some("ltr") => ReadingProgression::Ltr,
            Some("rtl") => ReadingProgression::Rtl,
            _ => ReadingProgression::Auto,
        };

        Self {
            itemrefs,
            direction,
            toc: non_empty(element.attr("toc")),
        }
    }
}

impl GuideReference {
    fn parse(element: &XmlElement, path: &str) -> Option<Self> {
        let href = non_empty(element.attr("href"))?;
        Some(Self {
            href: resolve_href(&href, path),
            title: non_empty(element.attr("title")),
            kind: non_empty(element.attr("type")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::epub::vocab::{ITEM, RENDITION};

    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">urn:isbn:123</dc:identifier>
    <dc:title>Title</dc:title>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="text/c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="../images/a%20b.png" media-type="image/png" fallback="c1"/>
    <item id="broken" media-type="image/png"/>
  </manifest>
  <spine toc="ncx" page-progression-direction="rtl">
    <itemref idref="c1" properties="rendition:page-spread-left"/>
    <itemref idref="nav" linear="no"/>
    <itemref/>
  </spine>
  <guide>
    <reference type="toc" title="Contents" href="nav.xhtml"/>
  </guide>
</package>"#;

    #[test]
    fn test_parse_package() {
        let root = XmlElement::parse(OPF).unwrap();
        let package = PackageDocument::parse(&root, "/OPS/package.opf").unwrap();
        assert_eq!(package.version, 3.0);
        assert_eq!(package.unique_identifier.as_deref(), Some("uid"));

        assert_eq!(package.items.len(), 3);
        let nav = package.item("nav").unwrap();
        assert_eq!(nav.href, "/OPS/nav.xhtml");
        assert!(nav.has_property(&format!("{ITEM}nav")));
        let img = package.item("img").unwrap();
        assert_eq!(img.href, "/images/a b.png");
        assert_eq!(img.fallback.as_deref(), Some("c1"));

        assert_eq!(package.spine.itemrefs.len(), 2);
        assert_eq!(package.spine.direction, ReadingProgression::Rtl);
        assert_eq!(package.spine.toc.as_deref(), Some("ncx"));
        assert!(package.spine.itemrefs[0].linear);
        assert!(!package.spine.itemrefs[1].linear);
        assert_eq!(
            package.spine.itemrefs[0].properties,
            [format!("{RENDITION}page-spread-left")]
        );

        assert_eq!(package.guide[0].href, "/OPS/nav.xhtml");
        assert_eq!(package.guide[0].kind.as_deref(), Some("toc"));
    }

    #[test]
    fn test_missing_spine_is_fatal() {
        let root = XmlElement::parse(
            r#"<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
                 <metadata/><manifest/>
               </package>"#,
        )
        .unwrap();
        assert!(PackageDocument::parse(&root, "/content.opf").is_err());
    }

    #[test]
    fn test_default_version() {
        let root = XmlElement::parse(
            r#"<package xmlns="http://www.idpf.org/2007/opf"><metadata/><manifest/><spine/></package>"#,
        )
        .unwrap();
        assert_eq!(PackageDocument::parse(&root, "/content.opf").unwrap().version, 1.2);
    }
}
