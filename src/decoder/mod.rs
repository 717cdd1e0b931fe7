//! Transparent decoding of protected resources.
//!
//! Decoders are [`ResourceTransformer`]s applied by a
//! [`TransformingFetcher`](crate::fetcher::TransformingFetcher), selected per
//! resource from the `encrypted` property of its link.

pub mod deobfuscation;
pub mod lcp;

use std::sync::Arc;

use crate::fetcher::ResourceTransformer;
use lcp::LcpKeys;

/// Decoders for a publication: font deobfuscation keyed on `identifier`,
/// then LCP decryption when the publication carries a license.
pub fn transformers(identifier: Option<&str>, lcp: Option<Arc<LcpKeys>>) -> Vec<ResourceTransformer> {
    let mut out = Vec::new();
    if let Some(identifier) = identifier.filter(|id| !id.is_empty()) {
        out.push(deobfuscation::transformer(identifier));
    }
    if let Some(keys) = lcp {
        out.push(lcp::transformer(keys));
    }
    out
}
