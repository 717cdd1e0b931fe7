//! Unique CSS selectors for elements of a [`Document`].

use crate::dom::{Document, NodeId};

fn escape_char(out: &mut String, c: char) {
    out.push_str(&format!("\\{:x} ", c as u32));
}

/// Escape `input` for use as a CSS identifier.
///
/// Only `[A-Za-z0-9_-]` is kept as is. A leading digit, or a leading hyphen
/// followed by a digit or another hyphen, is escaped too.
pub fn escape_identifier(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut first = true;
    while let Some(c) = chars.next() {
        let leading = first
            && (c.is_ascii_digit()
                || (c == '-' && chars.peek().is_some_and(|n| *n == '-' || n.is_ascii_digit())));
        first = false;
        if leading || !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            escape_char(&mut out, c);
        } else {
            out.push(c);
        }
    }
    out
}

/// Selector for `id` alone: `tag.class1.class2`.
fn compound(dom: &Document, id: NodeId) -> String {
    let mut selector = escape_identifier(dom.element_name(id).unwrap_or_default());
    for class in dom.element_classes(id) {
        selector.push('.');
        selector.push_str(&escape_identifier(class));
    }
    selector
}

/// Whether `other` is selected by the compound selector of `id`.
fn same_compound(dom: &Document, id: NodeId, other: NodeId) -> bool {
    dom.element_name(id) == dom.element_name(other)
        && dom
            .element_classes(id)
            .iter()
            .all(|c| dom.element_classes(other).contains(c))
}

/// A selector that matches `id` and nothing else in `dom`.
///
/// Elements with an `id` attribute are selected by it. Otherwise the
/// selector chains `tag.class` steps with `>` up to the nearest ancestor
/// with an id, or the child of `<html>`; `:nth-child(n)` is added to a step
/// when a sibling would also match it. Returns an empty string for
/// non-elements.
pub fn css_selector(dom: &Document, id: NodeId) -> String {
    let mut steps = Vec::new();
    let mut current = id;
    loop {
        if !dom.is_element(current) {
            break;
        }
        if let Some(element_id) = dom.element_id(current).filter(|i| !i.is_empty()) {
            steps.push(format!("#{}", escape_identifier(element_id)));
            break;
        }

        let mut step = compound(dom, current);
        let parent = dom.parent(current).filter(|&p| dom.is_element(p));
        let Some(parent) = parent else {
            steps.push(step);
            break;
        };
        if dom.element_name(parent) == Some("html") {
            steps.push(step);
            break;
        }

        let siblings: Vec<_> = dom.element_children(parent).collect();
        let matching = siblings
            .iter()
            .filter(|&&s| same_compound(dom, current, s))
            .count();
        if matching > 1 {
            let index = siblings.iter().position(|&s| s == current).unwrap_or(0) + 1;
            step.push_str(&format!(":nth-child({index})"));
        }
        steps.push(step);
        current = parent;
    }
    steps.reverse();
    steps.join(" > ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Selector;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="en">
  <head><title>Section IV</title></head>
  <body>
    <section id="pgepubid00498">
      <div class="center"><span epub:type="pagebreak" title="171" id="Page_171">171</span></div>
      <h3>INTRODUCTORY</h3>

      <p>The difficulties of classification are very apparent here.</p>
      <p><span>The child's natural literature.</span> The world has lost certain secrets.</p>
      <p>Without discussing the limits of the culture-epoch theory.</p>
    </section>
  </body>
</html>"#;

    fn selector_of(dom: &Document, query: &str) -> String {
        let node = dom.select_first(&Selector::parse(query).unwrap()).unwrap();
        css_selector(dom, node)
    }

    #[test]
    fn test_css_selector() {
        let dom = Document::parse(DOC);
        for query in [
            "body",
            "#pgepubid00498",
            "#Page_171",
            "#pgepubid00498 > h3",
            "#pgepubid00498 > div.center",
            "#pgepubid00498 > p:nth-child(3)",
            "#pgepubid00498 > p:nth-child(5)",
            "#pgepubid00498 > p:nth-child(4) > span",
        ] {
            assert_eq!(selector_of(&dom, query), query);
        }
    }

    #[test]
    fn test_selector_selects_the_element() {
        let dom = Document::parse(
            r#"<html><body><div><p class="a">1</p><p class="a b">2</p></div><div><p>3</p></div></body></html>"#,
        );
        for node in dom.elements() {
            let css = css_selector(&dom, node);
            if dom.element_name(node) == Some("html") {
                continue;
            }
            let selected = dom.select(&Selector::parse(&css).unwrap());
            assert_eq!(selected, [node], "{css}");
        }
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("plain-id_1"), "plain-id_1");
        assert_eq!(escape_identifier("1st"), "\\31 st");
        assert_eq!(escape_identifier("-1"), "\\2d 1");
        assert_eq!(escape_identifier("--x"), "\\2d -x");
        assert_eq!(escape_identifier("-x"), "-x");
        assert_eq!(escape_identifier("a.b"), "a\\2e b");
        assert_eq!(escape_identifier("é"), "\\e9 ");
        assert_eq!(escape_identifier(""), "");
    }
}
