use super::{ContentIterator, Element, ResourceIteratorFactory, html::HtmlResourceIterator};
use crate::error::Result;
use crate::manifest::{LinkListExt, Locator};
use crate::publication::Publication;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// A resource iterator and the reading order index of its resource.
struct IndexedIterator {
    index: usize,
    iterator: Box<dyn ContentIterator>,
}

/// Iterates the content of a whole publication, resource by resource along
/// the reading order.
///
/// Each resource is handled by the first factory accepting it; resources no
/// factory accepts are skipped.
pub struct PublicationContentIterator<'a> {
    publication: &'a Publication,
    start_locator: Option<Locator>,
    factories: Vec<ResourceIteratorFactory>,
    current: Option<IndexedIterator>,
    started: bool,
}

impl<'a> PublicationContentIterator<'a> {
    /// Iterator over HTML resources, starting at `start_locator` or at the
    /// beginning of the publication.
    pub fn new(publication: &'a Publication, start_locator: Option<Locator>) -> Self {
        Self::with_factories(
            publication,
            start_locator,
            vec![HtmlResourceIterator::factory()],
        )
    }

    pub fn with_factories(
        publication: &'a Publication,
        start_locator: Option<Locator>,
        factories: Vec<ResourceIteratorFactory>,
    ) -> Self {
        Self {
            publication,
            start_locator,
            factories,
            current: None,
            started: false,
        }
    }

    fn next_in(&mut self, direction: Direction) -> Result<Option<Element>> {
        if !self.started {
            self.started = true;
            self.current = self.initial_iterator();
        }
        loop {
            let Some(current) = self.current.as_mut() else {
                return Ok(None);
            };
            let element = match direction {
                Direction::Forward => current.iterator.next()?,
                Direction::Backward => current.iterator.previous()?,
            };
            if element.is_some() {
                return Ok(element);
            }
            let index = current.index;
            match self.next_iterator_in(direction, index) {
                Some(next) => self.current = Some(next),
                None => return Ok(None),
            }
        }
    }

    fn initial_iterator(&self) -> Option<IndexedIterator> {
        let reading_order = &self.publication.manifest().reading_order;
        if reading_order.is_empty() {
            return None;
        }
        let (index, iterator) = match &self.start_locator {
            Some(locator) => {
                let index = reading_order
                    .index_of_first_with_href(&locator.href)
                    .unwrap_or(0);
                (index, self.load_iterator_at(index, locator))
            }
            None => (0, self.load_iterator_at_progression(0, 0.0)),
        };
        iterator.or_else(|| self.next_iterator_in(Direction::Forward, index))
    }

    /// First resource after (or before) `from` that some factory accepts.
    fn next_iterator_in(&self, direction: Direction, from: usize) -> Option<IndexedIterator> {
        let count = self.publication.manifest().reading_order.len();
        let progression = match direction {
            Direction::Forward => 0.0,
            Direction::Backward => 1.0,
        };
        let mut index = from;
        loop {
            index = match direction {
                Direction::Forward => index.checked_add(1).filter(|&i| i < count)?,
                Direction::Backward => index.checked_sub(1)?,
            };
            if let Some(iterator) = self.load_iterator_at_progression(index, progression) {
                return Some(iterator);
            }
        }
    }

    fn load_iterator_at(&self, index: usize, locator: &Locator) -> Option<IndexedIterator> {
        let link = self.publication.manifest().reading_order.get(index)?;
        self.factories.iter().find_map(|factory| {
            let iterator = factory(self.publication.get(link), locator)?;
            Some(IndexedIterator { index, iterator })
        })
    }

    fn load_iterator_at_progression(&self, index: usize, progression: f64) -> Option<IndexedIterator> {
        let manifest = self.publication.manifest();
        let link = manifest.reading_order.get(index)?;
        let mut locator = manifest.locator_from_link(link)?;
        locator.locations.progression = Some(progression);
        self.load_iterator_at(index, &locator)
    }
}

impl ContentIterator for PublicationContentIterator<'_> {
    fn next(&mut self) -> Result<Option<Element>> {
        self.next_in(Direction::Forward)
    }

    fn previous(&mut self) -> Result<Option<Element>> {
        self.next_in(Direction::Backward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{elements, text};
    use crate::fetcher::{BytesResource, Fetcher, FailureResource, Resource};
    use crate::manifest::{Link, Locations, Manifest};
    use crate::mediatype;
    use crate::publication::PublicationBuilder;

    struct PagesFetcher;

    impl Fetcher for PagesFetcher {
        fn links(&self) -> Vec<Link> {
            Vec::new()
        }

        fn get(&self, link: &Link) -> Box<dyn Resource> {
            let body = match link.href.as_str() {
                "/one.html" => "<html><body><p>One</p><p>Two</p></body></html>",
                "/three.html" => "<html><body><h2>Three</h2></body></html>",
                "/cover.jpg" => "",
                _ => return Box::new(FailureResource::not_found(link.clone())),
            };
            Box::new(BytesResource::new(link.clone(), body.as_bytes().to_vec()))
        }
    }

    fn publication() -> Publication {
        let mut manifest = Manifest::default();
        manifest.reading_order = vec![
            Link::new("/one.html").with_type(mediatype::HTML),
            Link::new("/cover.jpg").with_type(mediatype::JPEG),
            Link::new("/three.html").with_type(mediatype::HTML),
        ];
        PublicationBuilder::new(manifest, Box::new(PagesFetcher)).build()
    }

    #[test]
    fn test_iterates_reading_order() {
        let publication = publication();
        let mut it = PublicationContentIterator::new(&publication, None);
        let all = elements(&mut it).unwrap();
        let texts: Vec<_> = all.iter().map(Element::text).collect();
        assert_eq!(texts, ["One", "Two", "Three"]);
        assert_eq!(all[2].locator().href, "/three.html");
    }

    #[test]
    fn test_text() {
        let publication = publication();
        let mut it = PublicationContentIterator::new(&publication, None);
        assert_eq!(text(&mut it, Some(" | ")).unwrap(), "One | Two | Three");
    }

    #[test]
    fn test_backward_crosses_resources() {
        let publication = publication();
        let locator = Locator::new("/three.html", mediatype::HTML);
        let mut it = PublicationContentIterator::new(&publication, Some(locator));
        assert_eq!(it.next().unwrap().unwrap().text(), "Three");
        assert_eq!(it.previous().unwrap().unwrap().text(), "Two");
        assert_eq!(it.previous().unwrap().unwrap().text(), "One");
        assert_eq!(it.previous().unwrap(), None);
    }

    #[test]
    fn test_start_locator_with_selector() {
        let publication = publication();
        let mut locations = Locations::default();
        locations.set_css_selector("p:nth-child(2)");
        let locator = Locator::new("/one.html", mediatype::HTML).with_locations(locations);
        let mut it = PublicationContentIterator::new(&publication, Some(locator));
        assert_eq!(it.next().unwrap().unwrap().text(), "Two");
        assert_eq!(it.next().unwrap().unwrap().text(), "Three");
        assert_eq!(it.next().unwrap(), None);
    }

    #[test]
    fn test_empty_reading_order() {
        let publication = PublicationBuilder::new(Manifest::default(), Box::new(PagesFetcher)).build();
        let mut it = PublicationContentIterator::new(&publication, None);
        assert_eq!(it.next().unwrap(), None);
        assert_eq!(it.previous().unwrap(), None);
    }
}
