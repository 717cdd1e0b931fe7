//! Property vocabularies of the EPUB package and content documents.
//!
//! Properties are compared as full IRIs: `rendition:layout` and
//! `http://www.idpf.org/vocab/rendition/#layout` are the same property.

use std::collections::HashMap;

pub const META: &str = "http://idpf.org/epub/vocab/package/meta/#";
pub const LINK: &str = "http://idpf.org/epub/vocab/package/link/#";
pub const ITEM: &str = "http://idpf.org/epub/vocab/package/item/#";
pub const ITEMREF: &str = "http://idpf.org/epub/vocab/package/itemref/#";
pub const MEDIA: &str = "http://www.idpf.org/epub/vocab/overlays/#";
pub const RENDITION: &str = "http://www.idpf.org/vocab/rendition/#";
pub const TYPE: &str = "http://idpf.org/epub/vocab/structure/#";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const A11Y: &str = "http://www.idpf.org/epub/vocab/package/a11y/#";
pub const MARC: &str = "http://id.loc.gov/vocabulary/";
pub const ONIX: &str = "http://www.editeur.org/ONIX/book/codelists/current.html#";
pub const SCHEMA: &str = "http://schema.org/";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const MSV: &str = "http://www.idpf.org/epub/vocab/structure/magazine/#";
pub const PRISM: &str = "http://www.prismstandard.org/specifications/3.0/PRISM_CV_Spec_3.0.htm#";

/// Vocabulary of unprefixed properties in a given context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultVocab {
    Meta,
    Link,
    Item,
    Itemref,
    Type,
    /// EPUB 2 `<meta name>`: unprefixed names stay as they are.
    None,
}

impl DefaultVocab {
    fn iri(self) -> &'static str {
        match self {
            DefaultVocab::Meta => META,
            DefaultVocab::Link => LINK,
            DefaultVocab::Item => ITEM,
            DefaultVocab::Itemref => ITEMREF,
            DefaultVocab::Type => TYPE,
            DefaultVocab::None => "",
        }
    }
}

pub type PrefixMap = HashMap<String, String>;

/// Reserved prefixes of the package document, overridden by its `prefix`
/// attribute.
pub fn package_prefixes(declared: Option<&str>) -> PrefixMap {
    let mut map: PrefixMap = [
        ("dcterms", DCTERMS),
        ("media", MEDIA),
        ("rendition", RENDITION),
        ("a11y", A11Y),
        ("marc", MARC),
        ("onix", ONIX),
        ("schema", SCHEMA),
        ("xsd", XSD),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    map.extend(parse_prefixes(declared.unwrap_or_default()));
    map
}

/// Reserved prefixes of content documents. The document's own `epub:prefix`
/// takes precedence.
pub fn content_prefixes(declared: Option<&str>) -> PrefixMap {
    let mut map = parse_prefixes(declared.unwrap_or_default());
    for (k, v) in [("msv", MSV), ("prism", PRISM)] {
        map.entry(k.to_string()).or_insert_with(|| v.to_string());
    }
    map
}

/// Parse a `prefix` attribute: whitespace-separated `name: iri` pairs.
pub fn parse_prefixes(raw: &str) -> PrefixMap {
    let mut map = PrefixMap::new();
    let mut tokens = raw.split_whitespace();
    while let Some(token) = tokens.next() {
        let (name, iri) = match token.split_once(':') {
            // `name:` followed by the IRI as the next token.
            Some((name, "")) => match tokens.next() {
                Some(iri) => (name, iri),
                None => break,
            },
            // `name:iri` without a space.
            Some((name, iri)) => (name, iri),
            None => continue,
        };
        if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            map.insert(name.to_string(), iri.to_string());
        }
    }
    map
}

/// Whitespace-separated property list.
pub fn parse_properties(raw: &str) -> Vec<&str> {
    raw.split_whitespace().collect()
}

/// Expand a property to its IRI.
///
/// Unprefixed properties belong to `default_vocab`; prefixed ones to the
/// mapped vocabulary. Unknown prefixes are returned unchanged.
pub fn resolve_property(property: &str, prefixes: &PrefixMap, default_vocab: DefaultVocab) -> String {
    let parts: Vec<&str> = property.splitn(2, ':').filter(|p| !p.is_empty()).collect();
    match parts.as_slice() {
        [name] => format!("{}{name}", default_vocab.iri()),
        [prefix, name] => match prefixes.get(*prefix) {
            Some(iri) if iri.ends_with('#') || iri.ends_with('/') => format!("{iri}{name}"),
            Some(iri) => format!("{iri}#{name}"),
            None => property.to_string(),
        },
        _ => property.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixes() {
        let map = parse_prefixes(
            "foaf: http://xmlns.com/foaf/spec/\n dbp: http://dbpedia.org/ontology/ ibooks:http://vocabulary.itunes.apple.com/rdf/ibooks/vocabulary-extensions-1.0/",
        );
        assert_eq!(map["foaf"], "http://xmlns.com/foaf/spec/");
        assert_eq!(map["dbp"], "http://dbpedia.org/ontology/");
        assert_eq!(
            map["ibooks"],
            "http://vocabulary.itunes.apple.com/rdf/ibooks/vocabulary-extensions-1.0/"
        );
    }

    #[test]
    fn test_resolve_property() {
        let prefixes = package_prefixes(Some("foo: http://example.com/foo"));
        assert_eq!(
            resolve_property("rendition:layout", &prefixes, DefaultVocab::Meta),
            "http://www.idpf.org/vocab/rendition/#layout"
        );
        assert_eq!(
            resolve_property("nav", &prefixes, DefaultVocab::Item),
            "http://idpf.org/epub/vocab/package/item/#nav"
        );
        assert_eq!(
            resolve_property("foo:bar", &prefixes, DefaultVocab::Meta),
            "http://example.com/foo#bar"
        );
        assert_eq!(
            resolve_property("calibre:series", &prefixes, DefaultVocab::None),
            "calibre:series"
        );
        assert_eq!(resolve_property("cover", &prefixes, DefaultVocab::None), "cover");
    }

    #[test]
    fn test_declared_prefix_overrides_reserved_one() {
        let prefixes = package_prefixes(Some("media: http://example.com/media/"));
        assert_eq!(
            resolve_property("media:duration", &prefixes, DefaultVocab::Meta),
            "http://example.com/media/duration"
        );
        let content = content_prefixes(Some("msv: http://example.com/msv/"));
        assert_eq!(content["msv"], "http://example.com/msv/");
        assert_eq!(content["prism"], PRISM);
    }
}
