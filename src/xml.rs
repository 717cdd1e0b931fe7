//! A small namespace-aware element tree over `quick-xml`.
//!
//! Package documents, navigation files and `encryption.xml` are small, and
//! several of them need random access (refinements point backwards and
//! forwards by id), so they are loaded as a tree rather than streamed.

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding, resolve_entity, strip_bom};

pub const NS_CONTAINER: &str = "urn:oasis:names:tc:opendocument:xmlns:container";
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const NS_ENC: &str = "http://www.w3.org/2001/04/xmlenc#";
pub const NS_COMP: &str = "http://www.idpf.org/2016/encryption#compression";
pub const NS_NCX: &str = "http://www.daisy.org/z3986/2005/ncx/";
pub const NS_OPF: &str = "http://www.idpf.org/2007/opf";
pub const NS_OPS: &str = "http://www.idpf.org/2007/ops";
pub const NS_SMIL: &str = "http://www.w3.org/ns/SMIL";
pub const NS_XHTML: &str = "http://www.w3.org/1999/xhtml";
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttr {
    pub ns: Option<String>,
    pub local: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub ns: Option<String>,
    pub local: String,
    pub attrs: Vec<XmlAttr>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Parse raw bytes (BOM and legacy encodings handled) and return the root.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = strip_bom(bytes);
        let text = decode_text(bytes, extract_xml_encoding(bytes));
        Self::parse(&text)
    }

    /// Parse a document and return its root element.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = NsReader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        loop {
            let (ns, event) = {
                let (resolved, event) = reader.read_resolved_event()?;
                (namespace(&resolved), event)
            };
            match event {
                Event::Start(e) => {
                    stack.push(Self::open(&reader, ns, &e)?);
                }
                Event::Empty(e) => {
                    let element = Self::open(&reader, ns, &e)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::Decode("unbalanced end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => return Ok(element),
                    }
                }
                Event::Text(t) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(&t.xml10_content()?);
                    }
                }
                Event::CData(t) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(&t.decode()?);
                    }
                }
                Event::GeneralRef(r) => {
                    let resolved = match r.resolve_char_ref()? {
                        Some(c) => Some(c.to_string()),
                        None => resolve_entity(&r.decode()?),
                    };
                    if let (Some(parent), Some(text)) = (stack.last_mut(), resolved) {
                        parent.push_text(&text);
                    }
                }
                Event::Eof => {
                    return Err(Error::MissingElement("document element".into()));
                }
                _ => {}
            }
        }
    }

    fn open(reader: &NsReader<&[u8]>, ns: Option<String>, e: &BytesStart) -> Result<Self> {
        let mut attrs = Vec::new();
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let (resolved, local) = reader.resolver().resolve_attribute(attr.key);
            let value = attr.decode_and_unescape_value(reader.decoder())?;
            attrs.push(XmlAttr {
                ns: namespace(&resolved),
                local: String::from_utf8_lossy(local.as_ref()).into_owned(),
                value: value.into_owned(),
            });
        }
        Ok(Self {
            ns,
            local: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            attrs,
            children: Vec::new(),
        })
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Whether this element has the given namespace and local name.
    pub fn is(&self, ns: &str, local: &str) -> bool {
        self.local == local && self.ns.as_deref() == Some(ns)
    }

    /// Value of an attribute that has no namespace.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.ns.is_none() && a.local == local)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespaced attribute.
    pub fn attr_ns(&self, ns: &str, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.ns.as_deref() == Some(ns) && a.local == local)
            .map(|a| a.value.as_str())
    }

    /// Child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        ns: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.is(ns, local))
    }

    /// First child element with the given name.
    pub fn child(&self, ns: &str, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(ns, local))
    }

    /// First descendant (depth-first, self excluded) with the given name.
    pub fn find(&self, ns: &str, local: &str) -> Option<&XmlElement> {
        let mut stack: Vec<&XmlElement> = self.elements().collect();
        stack.reverse();
        while let Some(e) = stack.pop() {
            if e.is(ns, local) {
                return Some(e);
            }
            stack.extend(e.elements().collect::<Vec<_>>().into_iter().rev());
        }
        None
    }

    /// All descendants with the given name, in document order.
    pub fn find_all<'a>(&'a self, ns: &str, local: &str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        let mut stack: Vec<&XmlElement> = self.elements().collect();
        stack.reverse();
        while let Some(e) = stack.pop() {
            if e.is(ns, local) {
                out.push(e);
            }
            stack.extend(e.elements().collect::<Vec<_>>().into_iter().rev());
        }
        out
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&XmlNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(e) => stack.extend(e.children.iter().rev()),
            }
        }
        out
    }

    /// Descendant text with runs of whitespace collapsed and ends trimmed.
    pub fn text_normalized(&self) -> String {
        self.text().split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn namespace(resolved: &ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_resolve() {
        let doc = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <metadata><dc:title xml:lang="en">Moby&#45;Dick &amp; co</dc:title></metadata>
</package>"#;
        let root = XmlElement::parse(doc).unwrap();
        assert!(root.is(NS_OPF, "package"));
        let title = root.find(NS_DC, "title").unwrap();
        assert_eq!(title.text(), "Moby-Dick & co");
        assert_eq!(title.attr_ns(NS_XML, "lang"), Some("en"));
        assert_eq!(title.attr("lang"), None);
    }

    #[test]
    fn test_prefixed_attributes_resolve() {
        let doc = r#"<package xmlns="http://www.idpf.org/2007/opf" xmlns:opf="http://www.idpf.org/2007/opf">
  <creator opf:role="aut" id="c1">Herman Melville</creator>
</package>"#;
        let root = XmlElement::parse(doc).unwrap();
        let creator = root.find(NS_OPF, "creator").unwrap();
        assert_eq!(creator.attr_ns(NS_OPF, "role"), Some("aut"));
        // Unprefixed attributes have no namespace.
        assert_eq!(creator.attr("id"), Some("c1"));
        assert_eq!(creator.attr_ns(NS_OPF, "id"), None);
    }

    #[test]
    fn test_find_all_in_document_order() {
        let doc = r#"<a xmlns="urn:x"><b id="1"><b id="2"/></b><c><b id="3"/></c></a>"#;
        let root = XmlElement::parse(doc).unwrap();
        let ids: Vec<_> = root
            .find_all("urn:x", "b")
            .iter()
            .filter_map(|b| b.attr("id"))
            .collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(root.children_named("urn:x", "b").count(), 1);
        assert!(root.find("urn:y", "b").is_none());
    }

    #[test]
    fn test_text_normalized() {
        let root = XmlElement::parse("<p>  Call \n me <i>Ishmael</i>.  </p>").unwrap();
        assert_eq!(root.text_normalized(), "Call me Ishmael.");
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("").is_err());
    }
}
