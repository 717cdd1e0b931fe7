//! Opening publications: asset sniffing, parser dispatch and
//! post-processing of the parsed manifest.

mod a11y;

use std::sync::Arc;

use log::debug;
use reqwest::blocking::Client;

use crate::asset::PublicationAsset;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::parser::{self, PublicationParser};
use crate::publication::Publication;

pub use a11y::{InferA11y, infer_accessibility};

/// Options of a [`Streamer`].
#[derive(Default)]
pub struct StreamerConfig {
    pub infer_a11y: InferA11y,
    /// Parsers tried before the default ones.
    pub parsers: Vec<Box<dyn PublicationParser>>,
    /// Only try `parsers`.
    pub ignore_default_parsers: bool,
    /// Client used for remote resources of standalone manifests.
    pub http_client: Option<Client>,
}

/// Opens publication assets with an ordered list of parsers.
pub struct Streamer {
    parsers: Vec<Box<dyn PublicationParser>>,
    infer_a11y: InferA11y,
}

impl Streamer {
    pub fn new(config: StreamerConfig) -> Self {
        let StreamerConfig {
            infer_a11y,
            mut parsers,
            ignore_default_parsers,
            http_client,
        } = config;
        if !ignore_default_parsers {
            parsers.extend(parser::default_parsers(http_client));
        }
        Self {
            parsers,
            infer_a11y,
        }
    }

    /// Parse `asset` with the first parser that recognizes it.
    ///
    /// A parser failing on an asset it claimed does not stop the dispatch;
    /// when no other parser succeeds, the first such failure is returned.
    pub fn open(&self, asset: &dyn PublicationAsset) -> Result<Publication> {
        let fetcher: Arc<dyn Fetcher> = Arc::from(asset.create_fetcher()?);

        let mut first_error = None;
        let mut builder = None;
        for parser in &self.parsers {
            match parser.parse(asset, &fetcher) {
                Ok(Some(b)) => {
                    builder = Some(b);
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Parser failed on {}: {e}", asset.name());
                    first_error.get_or_insert(e);
                }
            }
        }

        let Some(mut builder) = builder else {
            fetcher.close();
            return Err(first_error.unwrap_or_else(|| {
                Error::UnsupportedFormat("cannot find a parser for this asset".into())
            }));
        };

        self.infer_a11y.apply(&mut builder.manifest);
        debug!(
            "Opened {} as {:?} publication \"{}\"",
            asset.name(),
            builder.container,
            builder.manifest.metadata.title()
        );
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::manifest::{Link, Manifest};
    use crate::mediatype::{self, MediaType};
    use crate::parser::test_support::ListFetcher;
    use crate::publication::PublicationBuilder;

    struct FixedParser {
        outcome: fn() -> Result<Option<PublicationBuilder>>,
        calls: Arc<AtomicUsize>,
    }

    impl PublicationParser for FixedParser {
        fn parse(
            &self,
            _asset: &dyn PublicationAsset,
            _fetcher: &Arc<dyn Fetcher>,
        ) -> Result<Option<PublicationBuilder>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    struct Asset;

    impl PublicationAsset for Asset {
        fn name(&self) -> String {
            "Album".into()
        }

        fn media_type(&self) -> MediaType {
            MediaType::parse(mediatype::ZIP).unwrap()
        }

        fn create_fetcher(&self) -> Result<Box<dyn Fetcher>> {
            Ok(Box::new(ListFetcher(vec!["/01.mp3", "/02.mp3"])))
        }
    }

    fn fixed(outcome: fn() -> Result<Option<PublicationBuilder>>) -> (Box<dyn PublicationParser>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let parser = FixedParser {
            outcome,
            calls: Arc::clone(&calls),
        };
        (Box::new(parser), calls)
    }

    fn titled() -> Result<Option<PublicationBuilder>> {
        let mut manifest = Manifest::default();
        manifest.metadata.title = "Custom".into();
        manifest.reading_order.push(Link::new("/01.mp3").with_type(mediatype::MP3));
        Ok(Some(PublicationBuilder::new(
            manifest,
            Box::new(ListFetcher(Vec::new())),
        )))
    }

    #[test]
    fn test_default_parsers() {
        let streamer = Streamer::new(StreamerConfig::default());
        let publication = streamer.open(&Asset).unwrap();
        assert_eq!(publication.manifest().metadata.title(), "Album");
        assert_eq!(publication.manifest().reading_order.len(), 2);
        assert!(publication.manifest().metadata.accessibility.is_none());
    }

    #[test]
    fn test_custom_parsers_come_first() {
        let (parser, calls) = fixed(titled);
        let streamer = Streamer::new(StreamerConfig {
            parsers: vec![parser],
            ..Default::default()
        });
        let publication = streamer.open(&Asset).unwrap();
        assert_eq!(publication.manifest().metadata.title(), "Custom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_parser_falls_through() {
        let (failing, failing_calls) = fixed(|| Err(Error::InvalidEpub("broken".into())));
        let (declining, _) = fixed(|| Ok(None));
        let streamer = Streamer::new(StreamerConfig {
            parsers: vec![declining, failing],
            ..Default::default()
        });
        let publication = streamer.open(&Asset).unwrap();
        assert_eq!(publication.manifest().metadata.title(), "Album");
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_error_is_reported() {
        let (failing, _) = fixed(|| Err(Error::InvalidEpub("broken".into())));
        let (other, _) = fixed(|| Err(Error::Decode("later".into())));
        let streamer = Streamer::new(StreamerConfig {
            parsers: vec![failing, other],
            ignore_default_parsers: true,
            ..Default::default()
        });
        assert!(matches!(streamer.open(&Asset), Err(Error::InvalidEpub(_))));
    }

    #[test]
    fn test_no_parser() {
        let streamer = Streamer::new(StreamerConfig {
            ignore_default_parsers: true,
            ..Default::default()
        });
        let err = streamer.open(&Asset).unwrap_err();
        assert_eq!(err.to_string(), "cannot find a parser for this asset");
    }

    #[test]
    fn test_infers_accessibility() {
        let streamer = Streamer::new(StreamerConfig {
            infer_a11y: InferA11y::Merged,
            ..Default::default()
        });
        let publication = streamer.open(&Asset).unwrap();
        let a11y = publication.manifest().metadata.accessibility.clone().unwrap();
        assert_eq!(a11y.access_modes, ["auditory"]);
        assert_eq!(a11y.access_modes_sufficient, [vec!["auditory".to_string()]]);
    }
}
