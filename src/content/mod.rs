//! Semantic content extraction.
//!
//! A [`ContentIterator`] walks the elements of a resource or of a whole
//! publication as a bidirectional cursor. Every [`Element`] carries a
//! [`Locator`] precise enough to resume reading or highlight it later.

mod element;
mod html;
mod publication;
mod selector;

pub use element::{
    ACCESSIBILITY_LABEL, Attributes, AvElement, Element, ImageElement, LANGUAGE, TextElement,
    TextRole, TextSegment,
};
pub use html::{DEFAULT_BEFORE_MAX_LENGTH, HtmlResourceIterator, ParsedElements};
pub use publication::PublicationContentIterator;
pub use selector::{css_selector, escape_identifier};

use crate::error::Result;
use crate::fetcher::Resource;
use crate::manifest::Locator;

/// Bidirectional cursor over content elements.
///
/// `next` moves the cursor forward and returns the element it lands on;
/// `previous` moves it back. `Ok(None)` means the cursor is at an end and
/// did not move.
pub trait ContentIterator {
    fn next(&mut self) -> Result<Option<Element>>;
    fn previous(&mut self) -> Result<Option<Element>>;
}

/// Creates an iterator for a resource, or declines it.
pub type ResourceIteratorFactory =
    Box<dyn Fn(Box<dyn Resource>, &Locator) -> Option<Box<dyn ContentIterator>> + Send + Sync>;

/// Every remaining element of `iterator`, going forward.
pub fn elements(iterator: &mut dyn ContentIterator) -> Result<Vec<Element>> {
    let mut out = Vec::new();
    while let Some(element) = iterator.next()? {
        out.push(element);
    }
    Ok(out)
}

/// Text of the remaining textual elements, joined with `separator`
/// (a newline by default). Audio and video elements are skipped.
pub fn text(iterator: &mut dyn ContentIterator, separator: Option<&str>) -> Result<String> {
    let separator = separator.unwrap_or("\n");
    let texts: Vec<_> = elements(iterator)?
        .iter()
        .filter(|e| matches!(e, Element::Text(_) | Element::Image(_)))
        .map(Element::text)
        .filter(|t| !t.is_empty())
        .collect();
    Ok(texts.join(separator))
}
