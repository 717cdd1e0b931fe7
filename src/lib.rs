//! # rwp
//!
//! Open digital publications (EPUB, packaged or remote Readium Web
//! Publications, audiobooks, comic archives), describe them as a Readium Web
//! Publication Manifest, and serve their resources over HTTP with range and
//! conditional requests.
//!
//! ## Layers
//!
//! - [`archive`] and [`io`]: random-access reads over ZIP files, directories
//!   and HTTP ranges.
//! - [`fetcher`]: turns a [`manifest::Link`] into a [`fetcher::Resource`],
//!   optionally through a chain of transforms.
//! - [`decoder`]: font deobfuscation and LCP decryption transforms.
//! - [`manifest`]: the RWPM data model and its JSON form.
//! - [`parser`] and [`streamer`]: format detection and manifest construction.
//! - [`content`]: semantic element iteration over HTML resources.
//! - [`server`]: the HTTP surface and its publication cache.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rwp::asset::FileAsset;
//! use rwp::streamer::{Streamer, StreamerConfig};
//!
//! let streamer = Streamer::new(StreamerConfig::default());
//! let publication = streamer.open(&FileAsset::new("moby-dick.epub")).unwrap();
//! println!("{}", publication.manifest().metadata.title());
//! println!("{}", publication.manifest().to_json(None).unwrap());
//! ```

pub mod archive;
pub mod asset;
pub mod content;
pub mod decoder;
pub mod dom;
pub mod error;
pub mod fetcher;
pub mod io;
pub mod manifest;
pub mod mediatype;
pub mod parser;
pub mod publication;
pub mod server;
pub mod streamer;
pub(crate) mod util;
pub mod xml;

pub use error::{Error, ResourceError, Result};
pub use manifest::{Link, Locator, Manifest};
pub use publication::Publication;
