use serde::{Deserialize, Serialize};

/// Scheme URI of Readium LCP.
pub const LCP_SCHEME: &str = "http://readium.org/2014/01/lcp";

/// How a resource is protected, stored in `properties.encrypted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encryption {
    /// URI of the encryption algorithm.
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// `deflate` when the resource was compressed before encryption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    /// Length of the resource before compression and encryption.
    #[serde(
        default,
        alias = "original-length",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_length: Option<u64>,
}

impl Encryption {
    pub fn is_lcp(&self) -> bool {
        self.scheme.as_deref() == Some(LCP_SCHEME)
    }

    pub fn is_deflated(&self) -> bool {
        self.compression.as_deref() == Some("deflate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_legacy_length_key() {
        let e: Encryption = serde_json::from_value(serde_json::json!({
            "algorithm": "http://www.w3.org/2001/04/xmlenc#aes256-cbc",
            "scheme": LCP_SCHEME,
            "compression": "deflate",
            "original-length": 42
        }))
        .unwrap();
        assert!(e.is_lcp());
        assert!(e.is_deflated());
        assert_eq!(e.original_length, Some(42));

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["originalLength"], 42);
        assert!(json.get("profile").is_none());
    }
}
