//! Font obfuscation as defined by the IDPF and by Adobe.
//!
//! Both XOR the head of the font file with a key derived from the
//! publication's unique identifier: the IDPF scheme uses the SHA-1 of the
//! identifier over 1040 bytes, the Adobe scheme the 16 bytes of its UUID
//! over 1024 bytes. Bytes past the head are stored as is, so ranges beyond
//! it are proxied untouched.

use std::io::Write;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::archive::CompressionMethod;
use crate::error::{ResourceError, ResourceResult};
use crate::fetcher::{Resource, ResourceTransformer, clamp_range};
use crate::manifest::Link;

pub const IDPF_ALGORITHM: &str = "http://www.idpf.org/2008/embedding";
pub const ADOBE_ALGORITHM: &str = "http://ns.adobe.com/pdf/enc#RC";

/// Key and obfuscated length for an encryption algorithm, if it is a known
/// obfuscation.
fn obfuscation(algorithm: &str, identifier: &str) -> Option<ResourceResult<(Vec<u8>, u64)>> {
    match algorithm {
        IDPF_ALGORITHM => Some(Ok((idpf_key(identifier).to_vec(), 1040))),
        ADOBE_ALGORITHM => Some(adobe_key(identifier).map(|key| (key, 1024))),
        _ => None,
    }
}

/// SHA-1 of the identifier with all whitespace removed.
pub fn idpf_key(identifier: &str) -> [u8; 20] {
    let cleaned: String = identifier.chars().filter(|c| !c.is_whitespace()).collect();
    sha1_smol::Sha1::from(cleaned).digest().bytes()
}

/// The 16 bytes of the identifier's UUID.
pub fn adobe_key(identifier: &str) -> ResourceResult<Vec<u8>> {
    let hex: Vec<u8> = identifier
        .replace("urn:uuid:", "")
        .bytes()
        .filter(|b| *b != b'-')
        .collect();
    if hex.len() != 32 || !hex.iter().all(u8::is_ascii_hexdigit) {
        return Err(ResourceError::Other(format!("{identifier} is not a UUID")));
    }
    Ok(hex
        .chunks_exact(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect())
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// XOR `data`, which starts at offset `start` of the font, with the key over
/// the first `length` bytes of the font.
pub fn deobfuscate(data: &mut [u8], start: u64, key: &[u8], length: u64) {
    if start >= length || key.is_empty() {
        return;
    }
    let count = (length - start).min(data.len() as u64) as usize;
    for (i, byte) in data[..count].iter_mut().enumerate() {
        *byte ^= key[((start + i as u64) % key.len() as u64) as usize];
    }
}

/// Transformer deobfuscating fonts whose link declares an obfuscation
/// algorithm.
pub fn transformer(identifier: impl Into<String>) -> ResourceTransformer {
    let identifier: Arc<str> = Arc::from(identifier.into());
    Arc::new(move |resource: Box<dyn Resource>| -> Box<dyn Resource> {
        let algorithm = resource
            .link()
            .properties
            .encryption()
            .map(|e| e.algorithm);
        match algorithm.and_then(|a| obfuscation(&a, &identifier)) {
            Some(key) => Box::new(DeobfuscatingResource { resource, key }),
            None => resource,
        }
    })
}

/// A font resource read through its deobfuscation key.
pub struct DeobfuscatingResource {
    resource: Box<dyn Resource>,
    key: ResourceResult<(Vec<u8>, u64)>,
}

impl DeobfuscatingResource {
    fn key(&self) -> ResourceResult<(&[u8], u64)> {
        match &self.key {
            Ok((key, length)) => Ok((key.as_slice(), *length)),
            Err(e) => Err(e.clone()),
        }
    }
}

impl Resource for DeobfuscatingResource {
    fn link(&self) -> &Link {
        self.resource.link()
    }

    fn length(&self) -> ResourceResult<u64> {
        self.resource.length()
    }

    fn read(&self, range: Option<RangeInclusive<u64>>) -> ResourceResult<Vec<u8>> {
        let (key, length) = self.key()?;
        let start = range.as_ref().map_or(0, |r| *r.start());
        let mut data = self.resource.read(range)?;
        deobfuscate(&mut data, start, key, length);
        Ok(data)
    }

    fn stream(&self, sink: &mut dyn Write, range: Option<RangeInclusive<u64>>) -> ResourceResult<u64> {
        let (key, length) = self.key()?;
        let (start, count) = clamp_range(range, self.resource.length()?);
        if count == 0 {
            return Ok(0);
        }
        let end = start + count - 1;
        if start >= length {
            return self.resource.stream(sink, Some(start..=end));
        }

        let head_end = end.min(length - 1);
        let mut head = self.resource.read(Some(start..=head_end))?;
        deobfuscate(&mut head, start, key, length);
        sink.write_all(&head)?;
        let mut written = head.len() as u64;
        if head_end < end {
            written += self.resource.stream(sink, Some(head_end + 1..=end))?;
        }
        Ok(written)
    }

    fn compressed_as(&self, _method: CompressionMethod) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::BytesResource;
    use crate::manifest::{Encryption, Link};

    const IDENTIFIER: &str = "urn:uuid:36d5078e-ff7d-468e-a5f3-f47c14b91f2f";

    fn font() -> Vec<u8> {
        (0..3000u32).map(|i| (i * 7 % 251) as u8).collect()
    }

    fn obfuscated(algorithm: &str) -> Box<dyn Resource> {
        let (key, length) = obfuscation(algorithm, IDENTIFIER).unwrap().unwrap();
        let mut data = font();
        deobfuscate(&mut data, 0, &key, length);
        let mut link = Link::new("/fonts/cut-cut.woff");
        link.properties.set_encryption(&Encryption {
            algorithm: algorithm.to_string(),
            ..Default::default()
        });
        transformer(IDENTIFIER)(Box::new(BytesResource::new(link, data)))
    }

    #[test]
    fn test_adobe_key() {
        let key = adobe_key(IDENTIFIER).unwrap();
        assert_eq!(key.len(), 16);
        assert_eq!(&key[..4], [0x36, 0xd5, 0x07, 0x8e]);
        assert!(adobe_key("not a uuid").is_err());
    }

    #[test]
    fn test_adobe_key_rejects_malformed_identifiers() {
        for identifier in ["aé1", "urn:uuid:36d5078e-ff7d-468e-a5f3-f47c14b91f2", "éééééééééééééééé"] {
            assert!(adobe_key(identifier).is_err(), "{identifier}");
        }

        let mut link = Link::new("/fonts/cut-cut.woff");
        link.properties.set_encryption(&Encryption {
            algorithm: ADOBE_ALGORITHM.to_string(),
            ..Default::default()
        });
        let resource = transformer("urn:uuid:été")(Box::new(BytesResource::new(link, font())));
        assert!(resource.read(None).is_err());
    }

    #[test]
    fn test_idpf_key_ignores_whitespace() {
        assert_eq!(idpf_key(" urn:uuid:1234\n"), idpf_key("urn:uuid:1234"));
    }

    #[test]
    fn test_full_read() {
        for algorithm in [IDPF_ALGORITHM, ADOBE_ALGORITHM] {
            let res = obfuscated(algorithm);
            assert_eq!(res.read(None).unwrap(), font());
            assert_eq!(res.length().unwrap(), 3000);
        }
    }

    #[test]
    fn test_ranges_across_the_obfuscated_head() {
        let res = obfuscated(IDPF_ALGORITHM);
        let expected = font();
        for (start, end) in [(0, 99), (1000, 1100), (1039, 1040), (2000, 2999)] {
            let range = start as u64..=end as u64;
            assert_eq!(res.read(Some(range.clone())).unwrap(), &expected[start..=end]);

            let mut sink = Vec::new();
            res.stream(&mut sink, Some(range)).unwrap();
            assert_eq!(sink, &expected[start..=end]);
        }
    }

    #[test]
    fn test_short_font_is_fully_xored() {
        let key = idpf_key(IDENTIFIER);
        let mut data = vec![0u8; 30];
        deobfuscate(&mut data, 0, &key, 1040);
        assert_eq!(&data[..20], key);
        assert_eq!(&data[20..], &key[..10]);
    }

    #[test]
    fn test_other_algorithms_are_untouched() {
        let mut link = Link::new("/a.woff");
        link.properties.set_encryption(&Encryption {
            algorithm: "http://www.w3.org/2001/04/xmlenc#aes256-cbc".into(),
            ..Default::default()
        });
        let res = transformer(IDENTIFIER)(Box::new(BytesResource::new(link, vec![1, 2, 3])));
        assert_eq!(res.read(None).unwrap(), [1, 2, 3]);
    }
}
