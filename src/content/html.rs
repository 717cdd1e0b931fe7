//! Content iteration over a single HTML or XHTML resource.

use log::debug;

use super::element::{
    ACCESSIBILITY_LABEL, Attributes, AvElement, Element, ImageElement, LANGUAGE, TextElement,
    TextRole, TextSegment,
};
use super::selector::css_selector;
use super::{ContentIterator, ResourceIteratorFactory};
use crate::dom::{Document, NodeId, Selector};
use crate::error::{Error, Result};
use crate::fetcher::Resource;
use crate::manifest::{Link, Locations, Locator, Text};
use crate::util::resolve_href;

/// Default size of the `before` excerpt of emitted locators, in characters.
pub const DEFAULT_BEFORE_MAX_LENGTH: usize = 50;

const OPS_NAMESPACE: &str = "http://www.idpf.org/2007/ops";

/// Phrasing elements; any other element is a block and closes the current
/// text element.
const INLINE_TAGS: &[&str] = &[
    "object", "base", "font", "tt", "i", "b", "u", "big", "small", "em", "strong", "dfn", "code",
    "samp", "kbd", "var", "cite", "abbr", "time", "acronym", "mark", "ruby", "rt", "rp", "rtc", "a",
    "img", "audio", "video", "br", "wbr", "map", "q", "sub", "sup", "bdo", "iframe", "embed",
    "span", "input", "select", "textarea", "label", "button", "optgroup", "option", "legend",
    "datalist", "keygen", "output", "progress", "meter", "area", "param", "source", "track",
    "summary", "command", "basefont", "bgsound", "menuitem", "data", "bdi", "s", "strike", "nobr",
    "rb",
];

fn is_inline(name: &str) -> bool {
    INLINE_TAGS.contains(&name)
}

/// Elements of a resource, and where iteration starts among them.
#[derive(Debug, Clone, Default)]
pub struct ParsedElements {
    pub elements: Vec<Element>,
    pub start_index: usize,
}

/// Iterates the semantic elements of an HTML resource.
///
/// The resource is read and parsed on the first call to
/// [`ContentIterator::next`] or [`ContentIterator::previous`]. The base
/// locator selects the starting point: its `cssSelector` anchors the cursor
/// before the matching element, and a progression of `1.0` places it after
/// the last element.
pub struct HtmlResourceIterator {
    resource: Box<dyn Resource>,
    locator: Locator,
    before_max_length: usize,
    current_index: Option<usize>,
    parsed: Option<ParsedElements>,
}

impl HtmlResourceIterator {
    pub fn new(resource: Box<dyn Resource>, locator: Locator) -> Self {
        Self {
            resource,
            locator,
            before_max_length: DEFAULT_BEFORE_MAX_LENGTH,
            current_index: None,
            parsed: None,
        }
    }

    pub fn with_before_max_length(mut self, length: usize) -> Self {
        self.before_max_length = length;
        self
    }

    /// Factory accepting HTML and XHTML resources.
    pub fn factory() -> ResourceIteratorFactory {
        Box::new(|resource, locator| {
            if !resource.link().media_type().is_some_and(|mt| mt.is_html()) {
                return None;
            }
            let iterator: Box<dyn ContentIterator> =
                Box::new(HtmlResourceIterator::new(resource, locator.clone()));
            Some(iterator)
        })
    }

    pub fn elements(&mut self) -> Result<&ParsedElements> {
        let parsed = match self.parsed.take() {
            Some(parsed) => parsed,
            None => self.parse()?,
        };
        Ok(self.parsed.insert(parsed))
    }

    fn parse(&self) -> Result<ParsedElements> {
        let html = self.resource.read_as_string()?;
        let dom = Document::parse(&html);
        let body = dom
            .find_by_tag("body")
            .ok_or_else(|| Error::MissingElement(format!("body in {}", self.resource.link().href)))?;

        let start_element = match self.locator.locations.css_selector() {
            Some(css) => dom.select_first(&Selector::parse(css)?),
            None => None,
        };

        let mut converter = Converter::new(&dom, &self.locator, start_element, self.before_max_length);
        traverse(&dom, body, &mut converter);
        let parsed = converter.finish();
        debug!(
            "Parsed {} content elements from {}",
            parsed.elements.len(),
            self.resource.link().href
        );
        Ok(parsed)
    }

    fn step(&mut self, forward: bool) -> Result<Option<Element>> {
        let current = self.current_index;
        let parsed = self.elements()?;
        let index = match (current, forward) {
            (Some(i), true) => i.checked_add(1),
            (Some(i), false) => i.checked_sub(1),
            (None, true) => Some(parsed.start_index),
            (None, false) => parsed.start_index.checked_sub(1),
        };
        let Some((index, element)) = index.and_then(|i| parsed.elements.get(i).map(|e| (i, e.clone())))
        else {
            return Ok(None);
        };
        self.current_index = Some(index);
        Ok(Some(element))
    }
}

impl ContentIterator for HtmlResourceIterator {
    fn next(&mut self) -> Result<Option<Element>> {
        self.step(true)
    }

    fn previous(&mut self) -> Result<Option<Element>> {
        self.step(false)
    }
}

/// Depth-first walk calling `head` when entering a node and `tail` when
/// leaving it, with an explicit cursor instead of recursion.
fn traverse(dom: &Document, root: NodeId, converter: &mut Converter<'_>) {
    let next_sibling = |id: NodeId| dom.get(id).map_or(NodeId::NONE, |n| n.next_sibling);
    let mut node = root;
    let mut depth = 0usize;
    loop {
        converter.head(node);
        let first_child = dom.get(node).map_or(NodeId::NONE, |n| n.first_child);
        if first_child.is_some() {
            node = first_child;
            depth += 1;
            continue;
        }
        while next_sibling(node).is_none() && depth > 0 {
            converter.tail(node);
            node = dom.parent(node).unwrap_or(root);
            depth -= 1;
        }
        converter.tail(node);
        if node == root || depth == 0 {
            break;
        }
        node = next_sibling(node);
    }
}

/// Collapse whitespace runs to a single space, dropping zero-width spaces
/// and soft hyphens.
fn append_normalized_whitespace(acc: &mut String, text: &str, strip_leading: bool) {
    let mut last_was_white = false;
    let mut reached_non_white = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if (strip_leading && !reached_non_white) || last_was_white {
                continue;
            }
            acc.push(' ');
            last_was_white = true;
        } else if c != '\u{200B}' && c != '\u{00AD}' {
            acc.push(c);
            last_was_white = false;
            reached_non_white = true;
        }
    }
}

/// Last `n` characters of `s`.
fn last_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let start = s.char_indices().nth(count - n).map_or(s.len(), |(i, _)| i);
    &s[start..]
}

/// Move the outer whitespace of `text` to `before` and `after`.
fn trim_text(text: &str, before: Option<&str>) -> Text {
    let highlight = text.trim();
    let leading_len = text.len() - text.trim_start().len();
    let leading = &text[..leading_len];
    let trailing = &text[leading_len + highlight.len()..];
    let non_empty = |s: String| (!s.is_empty()).then_some(s);
    Text {
        before: non_empty(format!("{}{leading}", before.unwrap_or_default())),
        highlight: non_empty(highlight.to_string()),
        after: non_empty(trailing.to_string()),
    }
}

struct Breadcrumb {
    node: NodeId,
    css_selector: String,
}

/// Turns the DOM walk into a list of [`Element`]s.
struct Converter<'a> {
    dom: &'a Document,
    base: &'a Locator,
    start_element: Option<NodeId>,
    before_max_length: usize,

    elements: Vec<Element>,
    start_index: Option<usize>,

    /// Segments of the current text element.
    segments: Vec<TextSegment>,
    /// Context preceding the current text element.
    element_before: Option<String>,
    /// Normalized text of the current segment.
    text: String,
    /// Raw text since the beginning of the resource.
    whole_raw_text: String,
    /// Raw text of the current element.
    element_raw_text: String,
    /// Raw text of the current segment.
    raw_text: String,
    language: Option<String>,

    /// Block ancestors of the current node, innermost last.
    breadcrumbs: Vec<Breadcrumb>,
}

impl<'a> Converter<'a> {
    fn new(
        dom: &'a Document,
        base: &'a Locator,
        start_element: Option<NodeId>,
        before_max_length: usize,
    ) -> Self {
        Self {
            dom,
            base,
            start_element,
            before_max_length,
            elements: Vec::new(),
            start_index: None,
            segments: Vec::new(),
            element_before: None,
            text: String::new(),
            whole_raw_text: String::new(),
            element_raw_text: String::new(),
            raw_text: String::new(),
            language: None,
            breadcrumbs: Vec::new(),
        }
    }

    fn finish(self) -> ParsedElements {
        let start_index = if self.base.locations.progression == Some(1.0) {
            self.elements.len()
        } else {
            self.start_index.unwrap_or(0)
        };
        ParsedElements {
            elements: self.elements,
            start_index,
        }
    }

    /// Locator in the base resource, without locations.
    fn locator(&self) -> Locator {
        let mut locator = Locator::new(self.base.href.clone(), self.base.media_type.clone());
        locator.title = self.base.title.clone();
        locator
    }

    fn current_css_selector(&self) -> Option<&str> {
        self.breadcrumbs
            .last()
            .map(|b| b.css_selector.as_str())
            .filter(|s| !s.is_empty())
    }

    fn head(&mut self, id: NodeId) {
        let dom = self.dom;
        let Some(name) = dom.element_name(id) else {
            return;
        };
        let is_block = !is_inline(name);
        let mut selector = None;
        if is_block {
            let css = css_selector(dom, id);
            self.flush_text();
            self.breadcrumbs.push(Breadcrumb {
                node: id,
                css_selector: css.clone(),
            });
            selector = Some(css);
        }

        match name {
            "br" => self.flush_text(),
            "img" | "audio" | "video" => {
                self.flush_text();
                let css = selector.unwrap_or_else(|| css_selector(dom, id));
                let mut locations = Locations::default();
                locations.set_css_selector(css);
                let mut locator = self.locator().with_locations(locations);
                locator.text = self.base.text.clone();
                if let Some(element) = self.embedded_element(id, name, locator) {
                    self.elements.push(element);
                }
            }
            _ => {}
        }

        if is_block {
            self.flush_text();
        }
    }

    fn tail(&mut self, id: NodeId) {
        let dom = self.dom;
        if let Some(text) = dom.text(id) {
            if text.chars().all(char::is_whitespace) {
                return;
            }
            let language = dom.language(id);
            if language != self.language.as_deref() {
                self.flush_segment();
                self.language = language.map(str::to_string);
            }
            self.raw_text.push_str(text);
            let strip_leading = self.text.ends_with(' ');
            append_normalized_whitespace(&mut self.text, text, strip_leading);
        } else if dom.element_name(id).is_some_and(|name| !is_inline(name)) {
            debug_assert_eq!(self.breadcrumbs.last().map(|b| b.node), Some(id));
            self.flush_text();
            self.breadcrumbs.pop();
        }
    }

    fn src_link(&self, id: NodeId) -> Option<Link> {
        let src = self.dom.attr(id, "src").filter(|s| !s.is_empty())?;
        Some(Link::new(resolve_href(src, &self.base.href)))
    }

    fn embedded_element(&self, id: NodeId, name: &str, locator: Locator) -> Option<Element> {
        let dom = self.dom;
        if name == "img" {
            let embedded_link = self.src_link(id)?;
            let label = dom
                .attr(id, "alt")
                .filter(|a| !a.is_empty())
                .or_else(|| dom.attr(id, "title").filter(|t| !t.is_empty()));
            let mut attributes = Attributes::new();
            if let Some(label) = label {
                attributes = attributes.with(ACCESSIBILITY_LABEL, label);
            }
            return Some(Element::Image(ImageElement {
                locator,
                embedded_link,
                caption: None,
                attributes,
            }));
        }

        let embedded_link = self.src_link(id).or_else(|| {
            let mut sources = dom
                .element_children(id)
                .filter(|&c| dom.element_name(c) == Some("source"))
                .filter_map(|source| {
                    let mut link = self.src_link(source)?;
                    link.media_type = dom
                        .attr(source, "type")
                        .filter(|t| !t.is_empty())
                        .map(str::to_string);
                    Some(link)
                });
            let mut primary = sources.next()?;
            primary.alternates = sources.collect();
            Some(primary)
        })?;
        let element = AvElement {
            locator,
            embedded_link,
            attributes: Attributes::new(),
        };
        Some(if name == "audio" {
            Element::Audio(element)
        } else {
            Element::Video(element)
        })
    }

    fn role(&self) -> TextRole {
        let dom = self.dom;
        let Some(crumb) = self.breadcrumbs.last() else {
            return TextRole::Body;
        };
        let node = crumb.node;
        let is_footnote = dom.attrs(node).iter().any(|a| {
            let local = a.name.local.as_ref();
            (local == "epub:type" || (local == "type" && &*a.name.ns == OPS_NAMESPACE))
                && a.value.split_whitespace().any(|t| t == "footnote")
        });
        if is_footnote {
            return TextRole::Footnote;
        }
        match dom.element_name(node).unwrap_or_default() {
            "h1" => TextRole::Heading(1),
            "h2" => TextRole::Heading(2),
            "h3" => TextRole::Heading(3),
            "h4" => TextRole::Heading(4),
            "h5" => TextRole::Heading(5),
            "h6" => TextRole::Heading(6),
            "blockquote" | "q" => TextRole::Quote {
                reference_url: dom.attr(node, "cite").map(str::to_string),
                reference_title: dom.attr(node, "title").map(str::to_string),
            },
            _ => TextRole::Body,
        }
    }

    fn flush_text(&mut self) {
        self.flush_segment();

        if self.start_index.is_none()
            && self.start_element.is_some()
            && self.breadcrumbs.last().map(|b| b.node) == self.start_element
        {
            self.start_index = Some(self.elements.len());
        }

        let Some(last) = self.segments.last_mut() else {
            return;
        };
        // Only the whitespace between segments is meaningful.
        let trimmed_len = last.text.trim_end().len();
        last.text.truncate(trimmed_len);

        let before = self.element_before.take();
        let mut locator = self.locator();
        if let Some(css) = self.current_css_selector() {
            locator.locations.set_css_selector(css);
        }
        locator.text = trim_text(&self.element_raw_text, before.as_deref());

        let element = Element::Text(TextElement {
            locator,
            role: self.role(),
            segments: std::mem::take(&mut self.segments),
            attributes: Attributes::new(),
        });
        self.elements.push(element);
        self.element_raw_text.clear();
    }

    fn flush_segment(&mut self) {
        let mut text = std::mem::take(&mut self.text);
        if !text.trim().is_empty() {
            if self.segments.is_empty() {
                let suffix = text.chars().last().filter(|c| c.is_whitespace());
                text = text.trim().to_string();
                text.extend(suffix);
            }

            let before = (!self.whole_raw_text.is_empty())
                .then(|| last_chars(&self.whole_raw_text, self.before_max_length));
            let mut locator = self.locator();
            if let Some(css) = self.current_css_selector() {
                locator.locations.set_css_selector(css);
            }
            locator.text = trim_text(&self.raw_text, before);

            if self.segments.is_empty() {
                self.element_before = before.map(str::to_string);
            }

            let mut attributes = Attributes::new();
            if let Some(language) = &self.language {
                attributes = attributes.with(LANGUAGE, language.clone());
            }
            self.segments.push(TextSegment {
                locator,
                text,
                attributes,
            });
        }

        if !self.raw_text.is_empty() {
            self.whole_raw_text.push_str(&self.raw_text);
            self.element_raw_text.push_str(&self.raw_text);
            self.raw_text.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::BytesResource;
    use crate::mediatype;

    fn iterator_with(html: &str, locator: Locator) -> HtmlResourceIterator {
        let link = Link::new("/dir/chapter.xhtml").with_type(mediatype::XHTML);
        let resource = BytesResource::new(link, html.as_bytes().to_vec());
        HtmlResourceIterator::new(Box::new(resource), locator)
    }

    fn iterator(html: &str) -> HtmlResourceIterator {
        iterator_with(html, Locator::new("/dir/chapter.xhtml", mediatype::XHTML))
    }

    fn collect(it: &mut HtmlResourceIterator) -> Vec<Element> {
        let mut out = Vec::new();
        while let Some(element) = it.next().unwrap() {
            out.push(element);
        }
        out
    }

    const CHAPTER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="en">
<head><title>Chapter</title></head>
<body>
  <h1>A title</h1>
  <p id="intro">First   paragraph<br/>after break.</p>
  <figure><img src="../images/fig.png" alt="A figure"/></figure>
  <p>Some <em>emphasis</em> and <span lang="fr">du français</span>.</p>
  <aside epub:type="footnote"><p>Note.</p></aside>
  <blockquote cite="https://example.com/source" title="Source"><p>Quoted.</p></blockquote>
</body>
</html>"#;

    fn text_of(element: &Element) -> String {
        element.text()
    }

    #[test]
    fn test_elements() {
        let mut it = iterator(CHAPTER);
        let elements = collect(&mut it);
        let texts: Vec<_> = elements.iter().map(text_of).collect();
        assert_eq!(
            texts,
            [
                "A title",
                "First paragraph",
                "after break.",
                "A figure",
                "Some emphasis and du français.",
                "Note.",
                "Quoted.",
            ]
        );

        let Element::Text(heading) = &elements[0] else {
            panic!("expected text");
        };
        assert_eq!(heading.role, TextRole::Heading(1));
        assert_eq!(heading.locator.locations.css_selector(), Some("body > h1"));
        assert_eq!(heading.locator.text.highlight.as_deref(), Some("A title"));

        let Element::Text(paragraph) = &elements[1] else {
            panic!("expected text");
        };
        assert_eq!(paragraph.locator.locations.css_selector(), Some("#intro"));
        assert_eq!(paragraph.role, TextRole::Body);
    }

    #[test]
    fn test_image() {
        let elements = collect(&mut iterator(CHAPTER));
        let Element::Image(image) = &elements[3] else {
            panic!("expected image");
        };
        assert_eq!(image.embedded_link.href, "/images/fig.png");
        assert_eq!(image.attributes.accessibility_label(), Some("A figure"));
        assert_eq!(image.caption, None);
        assert_eq!(
            image.locator.locations.css_selector(),
            Some("body > figure > img")
        );
    }

    #[test]
    fn test_language_segments() {
        let elements = collect(&mut iterator(CHAPTER));
        let Element::Text(element) = &elements[4] else {
            panic!("expected text");
        };
        let segments: Vec<_> = element
            .segments
            .iter()
            .map(|s| (s.text.as_str(), s.attributes.language()))
            .collect();
        assert_eq!(
            segments,
            [
                ("Some emphasis and ", Some("en")),
                ("du français", Some("fr")),
                (".", Some("en")),
            ]
        );
        assert_eq!(
            element.segments[1].locator.text.highlight.as_deref(),
            Some("du français")
        );
        assert!(
            element.segments[1]
                .locator
                .text
                .before
                .as_deref()
                .unwrap()
                .ends_with("Some emphasis and ")
        );
    }

    #[test]
    fn test_roles() {
        let elements = collect(&mut iterator(CHAPTER));
        let roles: Vec<_> = elements
            .iter()
            .filter_map(|e| match e {
                Element::Text(t) => Some(t.role.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(roles[0], TextRole::Heading(1));
        // Roles come from the innermost block: the paragraphs inside the
        // footnote and the blockquote are plain body text.
        assert_eq!(roles[4], TextRole::Body);
        assert_eq!(roles[5], TextRole::Body);
    }

    #[test]
    fn test_footnote_and_quote_blocks() {
        let html = r#"<html><body>
            <aside epub:type="footnote">A note.</aside>
            <blockquote cite="https://example.com" title="Example">A quote.</blockquote>
        </body></html>"#;
        let elements = collect(&mut iterator(html));
        let roles: Vec<_> = elements
            .iter()
            .map(|e| match e {
                Element::Text(t) => t.role.clone(),
                _ => panic!("expected text"),
            })
            .collect();
        assert_eq!(
            roles,
            [
                TextRole::Footnote,
                TextRole::Quote {
                    reference_url: Some("https://example.com".into()),
                    reference_title: Some("Example".into()),
                },
            ]
        );
    }

    #[test]
    fn test_before_window() {
        let html = "<html><body><p>0123456789</p><p>abcdef</p></body></html>";
        let mut it = iterator(html).with_before_max_length(4);
        let elements = collect(&mut it);
        let Element::Text(second) = &elements[1] else {
            panic!("expected text");
        };
        assert_eq!(second.locator.text.before.as_deref(), Some("6789"));
        assert_eq!(second.locator.text.highlight.as_deref(), Some("abcdef"));
        let Element::Text(first) = &elements[0] else {
            panic!("expected text");
        };
        assert_eq!(first.locator.text.before, None);
    }

    #[test]
    fn test_whitespace_normalization() {
        let html = "<html><body><p>\n  soft\u{00AD}ware  zero\u{200B}width\n\t</p></body></html>";
        let elements = collect(&mut iterator(html));
        assert_eq!(elements[0].text(), "software zerowidth");
        let Element::Text(element) = &elements[0] else {
            panic!("expected text");
        };
        assert_eq!(element.locator.text.before.as_deref(), Some("\n  "));
        assert_eq!(element.locator.text.after.as_deref(), Some("\n\t"));
    }

    #[test]
    fn test_audio_and_video_sources() {
        let html = r#"<html><body>
            <audio src="sound.mp3"></audio>
            <video><source src="clip.webm" type="video/webm"/><source src="clip.mp4"/></video>
            <video></video>
        </body></html>"#;
        let elements = collect(&mut iterator(html));
        assert_eq!(elements.len(), 2);
        let Element::Audio(audio) = &elements[0] else {
            panic!("expected audio");
        };
        assert_eq!(audio.embedded_link.href, "/dir/sound.mp3");
        let Element::Video(video) = &elements[1] else {
            panic!("expected video");
        };
        assert_eq!(video.embedded_link.href, "/dir/clip.webm");
        assert_eq!(video.embedded_link.media_type.as_deref(), Some("video/webm"));
        assert_eq!(video.embedded_link.alternates.len(), 1);
        assert_eq!(video.embedded_link.alternates[0].href, "/dir/clip.mp4");
        assert_eq!(video.embedded_link.alternates[0].media_type, None);
    }

    #[test]
    fn test_start_from_css_selector() {
        let mut locations = Locations::default();
        locations.set_css_selector("#intro");
        let locator = Locator::new("/dir/chapter.xhtml", mediatype::XHTML).with_locations(locations);
        let mut it = iterator_with(CHAPTER, locator);
        assert_eq!(it.next().unwrap().unwrap().text(), "First paragraph");

        let mut locations = Locations::default();
        locations.set_css_selector("#intro");
        let locator = Locator::new("/dir/chapter.xhtml", mediatype::XHTML).with_locations(locations);
        let mut it = iterator_with(CHAPTER, locator);
        assert_eq!(it.previous().unwrap().unwrap().text(), "A title");
        assert_eq!(it.previous().unwrap(), None);
    }

    #[test]
    fn test_start_at_end() {
        let locator = Locator::new("/dir/chapter.xhtml", mediatype::XHTML).with_locations(Locations {
            progression: Some(1.0),
            ..Default::default()
        });
        let mut it = iterator_with(CHAPTER, locator);
        assert_eq!(it.next().unwrap(), None);
        assert_eq!(it.previous().unwrap().unwrap().text(), "Quoted.");
    }

    #[test]
    fn test_backward_is_reverse_of_forward() {
        let forward = collect(&mut iterator(CHAPTER));

        let locator = Locator::new("/dir/chapter.xhtml", mediatype::XHTML).with_locations(Locations {
            progression: Some(1.0),
            ..Default::default()
        });
        let mut it = iterator_with(CHAPTER, locator);
        let mut backward = Vec::new();
        while let Some(element) = it.previous().unwrap() {
            backward.push(element);
        }
        backward.reverse();
        assert_eq!(backward, forward);
    }

    #[test]
    fn test_cursor_moves_both_ways() {
        let mut it = iterator(CHAPTER);
        let first = it.next().unwrap().unwrap();
        let second = it.next().unwrap().unwrap();
        assert_eq!(it.previous().unwrap(), Some(first));
        assert_eq!(it.next().unwrap(), Some(second));
    }

    #[test]
    fn test_invalid_start_selector() {
        let mut locations = Locations::default();
        locations.set_css_selector("p >");
        let locator = Locator::new("/dir/chapter.xhtml", mediatype::XHTML).with_locations(locations);
        let mut it = iterator_with(CHAPTER, locator);
        assert!(matches!(it.next(), Err(Error::InvalidSelector(_))));
    }

    #[test]
    fn test_factory_accepts_html_only() {
        let factory = HtmlResourceIterator::factory();
        let locator = Locator::new("/a.css", mediatype::CSS);
        let css = BytesResource::new(Link::new("/a.css").with_type(mediatype::CSS), Vec::new());
        assert!(factory(Box::new(css), &locator).is_none());
        let html = BytesResource::new(Link::new("/a.html").with_type(mediatype::HTML), Vec::new());
        assert!(factory(Box::new(html), &locator).is_some());
    }

    #[test]
    fn test_trim_text() {
        let text = trim_text("  hello \n", Some("ctx"));
        assert_eq!(text.before.as_deref(), Some("ctx  "));
        assert_eq!(text.highlight.as_deref(), Some("hello"));
        assert_eq!(text.after.as_deref(), Some(" \n"));
        assert_eq!(last_chars("héllo", 3), "llo");
        assert_eq!(last_chars("hé", 3), "hé");
    }
}
