//! `META-INF/encryption.xml`.

use std::collections::HashMap;

use crate::manifest::{Encryption, LCP_SCHEME};
use crate::util::resolve_href;
use crate::xml::{NS_COMP, NS_DSIG, NS_ENC, XmlElement};

/// `RetrievalMethod` of resources whose key is the LCP content key.
const LCP_KEY_RETRIEVAL: &str = "license.lcpl#/encryption/content_key";

/// Encryption of each protected resource, by resolved href.
pub fn parse_encryption(root: &XmlElement) -> HashMap<String, Encryption> {
    root.find_all(NS_ENC, "EncryptedData")
        .into_iter()
        .filter_map(encrypted_data)
        .collect()
}

fn encrypted_data(data: &XmlElement) -> Option<(String, Encryption)> {
    let uri = data
        .child(NS_ENC, "CipherData")?
        .child(NS_ENC, "CipherReference")?
        .attr("URI")
        .map(str::trim)
        .filter(|uri| !uri.is_empty())?;

    let mut encryption = Encryption {
        algorithm: data
            .child(NS_ENC, "EncryptionMethod")
            .and_then(|m| m.attr("Algorithm"))
            .unwrap_or_default()
            .to_string(),
        ..Default::default()
    };

    let retrieval = data
        .child(NS_DSIG, "KeyInfo")
        .and_then(|k| k.child(NS_DSIG, "RetrievalMethod"))
        .and_then(|r| r.attr("URI"));
    if retrieval == Some(LCP_KEY_RETRIEVAL) {
        encryption.scheme = Some(LCP_SCHEME.to_string());
    }

    let compression = data
        .child(NS_ENC, "EncryptionProperties")
        .into_iter()
        .flat_map(|props| props.children_named(NS_ENC, "EncryptionProperty"))
        .find_map(|prop| prop.child(NS_COMP, "Compression"));
    if let Some(compression) = compression {
        let method = compression.attr("Method").map(str::trim);
        encryption.compression = Some(if method == Some("8") { "deflate" } else { "none" }.to_string());
        encryption.original_length = compression
            .attr("OriginalLength")
            .and_then(|l| l.trim().parse().ok());
    }

    Some((resolve_href(uri, "/"), encryption))
}
