//! Navigation documents: EPUB 3 Nav, EPUB 2 NCX and the OPF guide.

use std::collections::BTreeMap;

use crate::manifest::Link;
use crate::util::resolve_href;
use crate::xml::{NS_NCX, NS_OPS, NS_XHTML, XmlElement};

use super::package::GuideReference;
use super::vocab::{DefaultVocab, TYPE, content_prefixes, parse_properties, resolve_property};

/// Navigation trees keyed by kind: `toc`, `page-list`, `landmarks`, `lot`,
/// `loi`, `loa`, `lov`.
pub type Navigation = BTreeMap<String, Vec<Link>>;

const NAV_KINDS: [&str; 7] = ["toc", "page-list", "landmarks", "lot", "loi", "loa", "lov"];

/// Parse an XHTML Nav document found at `path`.
pub fn parse_nav_doc(root: &XmlElement, path: &str) -> Navigation {
    let prefixes = content_prefixes(root.attr_ns(NS_OPS, "prefix"));
    let mut out = Navigation::new();
    for nav in root.find_all(NS_XHTML, "nav") {
        let types: Vec<String> = parse_properties(nav.attr_ns(NS_OPS, "type").unwrap_or_default())
            .into_iter()
            .map(|t| resolve_property(t, &prefixes, DefaultVocab::Type))
            .collect();
        let Some(kind) = types
            .iter()
            .filter_map(|t| t.strip_prefix(TYPE))
            .find(|t| NAV_KINDS.contains(t))
        else {
            continue;
        };
        let links = nav
            .child(NS_XHTML, "ol")
            .map(|ol| nav_list(ol, path))
            .unwrap_or_default();
        if !links.is_empty() {
            out.entry(kind.to_string()).or_insert(links);
        }
    }
    out
}

fn nav_list(ol: &XmlElement, path: &str) -> Vec<Link> {
    ol.children_named(NS_XHTML, "li")
        .filter_map(|li| nav_item(li, path))
        .collect()
}

fn nav_item(li: &XmlElement, path: &str) -> Option<Link> {
    let mut title = String::new();
    let mut href = "#".to_string();
    let mut children = Vec::new();

    for element in li.elements() {
        if element.ns.as_deref() != Some(NS_XHTML) {
            continue;
        }
        match element.local.as_str() {
            "a" | "span" if title.is_empty() && href == "#" => {
                title = element.text_normalized();
                if element.local == "a"
                    && let Some(raw) = element.attr("href").map(str::trim).filter(|h| !h.is_empty())
                {
                    href = resolve_href(raw, path);
                }
            }
            "ol" => children = nav_list(element, path),
            _ => {}
        }
    }

    navigation_link(href, title, children)
}

/// Entries without children need both a target and a title.
fn navigation_link(href: String, title: String, children: Vec<Link>) -> Option<Link> {
    if children.is_empty() && (href == "#" || title.is_empty()) {
        return None;
    }
    let mut link = Link::new(href);
    if !title.is_empty() {
        link.title = Some(title);
    }
    link.children = children;
    Some(link)
}

/// Parse an NCX document found at `path`.
pub fn parse_ncx(root: &XmlElement, path: &str) -> Navigation {
    let mut out = Navigation::new();

    let toc: Vec<Link> = root
        .child(NS_NCX, "navMap")
        .map(|map| nav_points(map, path))
        .unwrap_or_default();
    if !toc.is_empty() {
        out.insert("toc".into(), toc);
    }

    let pages: Vec<Link> = root
        .child(NS_NCX, "pageList")
        .map(|list| {
            list.children_named(NS_NCX, "pageTarget")
                .filter_map(|target| ncx_point(target, path, Vec::new()))
                .collect()
        })
        .unwrap_or_default();
    if !pages.is_empty() {
        out.insert("page-list".into(), pages);
    }

    out
}

fn nav_points(parent: &XmlElement, path: &str) -> Vec<Link> {
    parent
        .children_named(NS_NCX, "navPoint")
        .filter_map(|point| ncx_point(point, path, nav_points(point, path)))
        .collect()
}

fn ncx_point(point: &XmlElement, path: &str, children: Vec<Link>) -> Option<Link> {
    let title = point
        .child(NS_NCX, "navLabel")
        .and_then(|label| label.child(NS_NCX, "text"))
        .map(XmlElement::text_normalized)
        .unwrap_or_default();
    let href = point
        .child(NS_NCX, "content")
        .and_then(|c| c.attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map_or_else(|| "#".to_string(), |src| resolve_href(src, path));
    navigation_link(href, title, children)
}

/// Landmarks from the EPUB 2 guide.
pub fn guide_landmarks(guide: &[GuideReference]) -> Vec<Link> {
    guide
        .iter()
        .map(|reference| {
            let mut link = Link::new(reference.href.clone());
            link.title = reference.title.clone();
            if let Some(kind) = &reference.kind {
                link.add_rel(kind.clone());
            }
            link
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAV: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="text/cover.xhtml">Cover</a></li>
      <li><span>Part <em>One</em></span>
        <ol>
          <li><a href="text/c1.xhtml#s1">  Chapter
              1 </a></li>
        </ol>
      </li>
      <li><a>Dangling</a></li>
      <li><a href="text/c2.xhtml"></a></li>
    </ol>
  </nav>
  <section>
    <nav epub:type="page-list" hidden="">
      <ol><li><a href="text/c1.xhtml#p1">1</a></li></ol>
    </nav>
  </section>
  <nav epub:type="landmarks">
    <ol><li><a epub:type="bodymatter" href="text/c1.xhtml">Start</a></li></ol>
  </nav>
  <nav epub:type="other"><ol><li><a href="x.xhtml">X</a></li></ol></nav>
</body>
</html>"##;

    #[test]
    fn test_nav_doc() {
        let root = XmlElement::parse(NAV).unwrap();
        let nav = parse_nav_doc(&root, "/OPS/nav.xhtml");
        assert_eq!(
            nav.keys().map(String::as_str).collect::<Vec<_>>(),
            ["landmarks", "page-list", "toc"]
        );

        let toc = &nav["toc"];
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].href, "/OPS/text/cover.xhtml");
        assert_eq!(toc[0].title.as_deref(), Some("Cover"));
        assert_eq!(toc[1].href, "#");
        assert_eq!(toc[1].title.as_deref(), Some("Part One"));
        assert_eq!(toc[1].children[0].href, "/OPS/text/c1.xhtml#s1");
        assert_eq!(toc[1].children[0].title.as_deref(), Some("Chapter 1"));

        assert_eq!(nav["page-list"][0].href, "/OPS/text/c1.xhtml#p1");
    }

    #[test]
    fn test_ncx() {
        let root = XmlElement::parse(
            r#"<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
              <navMap>
                <navPoint id="n1" playOrder="1">
                  <navLabel><text>ETYMOLOGY.</text></navLabel>
                  <content src="chapter_001.xhtml"/>
                  <navPoint id="n2">
                    <navLabel><text>Nested</text></navLabel>
                    <content src="chapter_001.xhtml#n"/>
                  </navPoint>
                </navPoint>
                <navPoint id="n3"><navLabel><text>No target</text></navLabel></navPoint>
              </navMap>
              <pageList>
                <pageTarget type="normal" value="1"><navLabel><text>1</text></navLabel><content src="p.xhtml#1"/></pageTarget>
              </pageList>
            </ncx>"#,
        )
        .unwrap();
        let nav = parse_ncx(&root, "/OEBPS/toc.ncx");
        let toc = &nav["toc"];
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].title.as_deref(), Some("ETYMOLOGY."));
        assert_eq!(toc[0].href, "/OEBPS/chapter_001.xhtml");
        assert_eq!(toc[0].children[0].href, "/OEBPS/chapter_001.xhtml#n");
        assert_eq!(nav["page-list"][0].title.as_deref(), Some("1"));
    }

    #[test]
    fn test_guide_landmarks() {
        let landmarks = guide_landmarks(&[GuideReference {
            href: "/OPS/cover.xhtml".into(),
            title: Some("Cover".into()),
            kind: Some("cover".into()),
        }]);
        assert_eq!(landmarks[0].rels, ["cover"]);
        assert_eq!(landmarks[0].title.as_deref(), Some("Cover"));
    }
}
