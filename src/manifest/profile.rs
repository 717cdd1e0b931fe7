//! Readium Web Publication profiles a manifest can conform to.
//!
//! See <https://readium.org/webpub-manifest/profiles/>.

pub const EPUB: &str = "https://readium.org/webpub-manifest/profiles/epub";

pub const AUDIOBOOK: &str = "https://readium.org/webpub-manifest/profiles/audiobook";

/// Visual narratives: comics, manga and bandes dessinées.
pub const DIVINA: &str = "https://readium.org/webpub-manifest/profiles/divina";

pub const PDF: &str = "https://readium.org/webpub-manifest/profiles/pdf";
