//! Readium LCP: license document, passphrase check and resource decryption.
//!
//! A user passphrase is hashed with SHA-256. The hash decrypts the license's
//! `user_key.key_check`, which must equal the license id, and then its
//! `content_key`, which in turn decrypts every protected resource.

use std::io::Read;
use std::sync::{Arc, OnceLock};

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use chrono::{DateTime, Utc};
use flate2::read::DeflateDecoder;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Error, ResourceError, ResourceResult, Result};
use crate::fetcher::{Resource, ResourceTransformer, TransformingResource};
use crate::manifest::parse_date;

pub const AES256_CBC_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";

/// Upper bound of the preallocation for inflated content, as a multiple of
/// the compressed size.
const MAX_INFLATE_HINT_RATIO: u64 = 4;

/// Path of the license inside an EPUB container.
pub const LICENSE_PATH: &str = "META-INF/license.lcpl";

const BLOCK: usize = 16;

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD
            .decode(text.trim())
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKey {
    #[serde(default)]
    pub algorithm: String,
    #[serde(with = "base64_bytes")]
    pub encrypted_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub text_hint: String,
    #[serde(with = "base64_bytes")]
    pub key_check: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseEncryption {
    #[serde(default)]
    pub profile: String,
    pub content_key: ContentKey,
    pub user_key: UserKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseLink {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// An LCP license document (`application/vnd.readium.lcp.license.v1.0+json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcpLicense {
    pub id: String,
    #[serde(default)]
    pub issued: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub provider: String,
    pub encryption: LicenseEncryption,
    #[serde(default)]
    pub links: Vec<LicenseLink>,
}

impl LcpLicense {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| Error::Lcp(format!("invalid license: {e}")))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.issued)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated.as_deref().and_then(parse_date)
    }

    pub fn link(&self, rel: &str) -> Option<&LicenseLink> {
        self.links.iter().find(|l| l.rel == rel)
    }

    /// Whether `hash` is the SHA-256 of the user passphrase.
    pub fn check_hash_passphrase(&self, hash: &[u8]) -> bool {
        decrypt_aes_cbc(hash, &self.encryption.user_key.key_check)
            .is_ok_and(|id| id == self.id.as_bytes())
    }

    /// Decrypt the content key with a verified passphrase hash.
    pub fn decrypt_content_key(&self, hash: &[u8]) -> Result<Vec<u8>> {
        if !self.check_hash_passphrase(hash) {
            return Err(Error::Lcp("passphrase does not match the license".into()));
        }
        decrypt_aes_cbc(hash, &self.encryption.content_key.encrypted_value)
            .map_err(|e| Error::Lcp(format!("cannot decrypt content key: {e}")))
    }
}

/// SHA-256 of a user passphrase.
pub fn hash_passphrase(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

/// AES-CBC decryption of `data`, whose first block is the IV. The last
/// plaintext byte gives the padding length, which covers both PKCS#7 and
/// W3C padding.
pub fn decrypt_aes_cbc(key: &[u8], data: &[u8]) -> ResourceResult<Vec<u8>> {
    if data.len() < 2 * BLOCK || data.len() % BLOCK != 0 {
        return Err(ResourceError::Other(format!(
            "{} bytes is not a valid AES-CBC ciphertext",
            data.len()
        )));
    }
    let (iv, ciphertext) = data.split_at(BLOCK);
    let decryptor = cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
        .map_err(|_| ResourceError::Other(format!("invalid AES-256 key length {}", key.len())))?;
    let mut buf = ciphertext.to_vec();
    let plain_len = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(ResourceError::other)?
        .len();
    let padding = buf[plain_len - 1] as usize;
    if padding == 0 || padding > BLOCK || padding > plain_len {
        return Err(ResourceError::Other("invalid AES-CBC padding".into()));
    }
    buf.truncate(plain_len - padding);
    Ok(buf)
}

/// The LCP state of a protected publication: its license and, once unlocked,
/// the decrypted content key.
#[derive(Debug)]
pub struct LcpKeys {
    license: LcpLicense,
    content_key: OnceLock<Vec<u8>>,
}

impl LcpKeys {
    pub fn new(license: LcpLicense) -> Self {
        Self {
            license,
            content_key: OnceLock::new(),
        }
    }

    pub fn license(&self) -> &LcpLicense {
        &self.license
    }

    pub fn is_unlocked(&self) -> bool {
        self.content_key.get().is_some()
    }

    pub fn content_key(&self) -> Option<&[u8]> {
        self.content_key.get().map(Vec::as_slice)
    }

    pub fn unlock_with_passphrase(&self, passphrase: &str) -> Result<()> {
        self.unlock_with_hash_passphrase(&hash_passphrase(passphrase))
    }

    pub fn unlock_with_hash_passphrase(&self, hash: &[u8]) -> Result<()> {
        let key = self.license.decrypt_content_key(hash)?;
        let _ = self.content_key.set(key);
        log::debug!("unlocked LCP license {}", self.license.id);
        Ok(())
    }
}

/// Transformer decrypting resources protected with the LCP scheme. Until the
/// keys are unlocked, protected resources fail with `Unauthorized`.
pub fn transformer(keys: Arc<LcpKeys>) -> ResourceTransformer {
    Arc::new(move |resource: Box<dyn Resource>| -> Box<dyn Resource> {
        let Some(encryption) = resource.link().properties.encryption() else {
            return resource;
        };
        if !encryption.is_lcp() {
            return resource;
        }
        let keys = Arc::clone(&keys);
        Box::new(TransformingResource::new(resource, move |data| {
            let key = keys
                .content_key()
                .ok_or_else(|| ResourceError::Unauthorized("LCP license is locked".into()))?;
            if encryption.algorithm != AES256_CBC_ALGORITHM {
                return Err(ResourceError::Other(format!(
                    "unsupported LCP algorithm {}",
                    encryption.algorithm
                )));
            }
            let plain = decrypt_aes_cbc(key, &data)?;
            if !encryption.is_deflated() {
                return Ok(plain);
            }
            // The declared length is only a hint; bound it by the input size.
            let hint = encryption
                .original_length
                .unwrap_or(0)
                .min(plain.len() as u64 * MAX_INFLATE_HINT_RATIO);
            let mut inflated = Vec::with_capacity(hint as usize);
            DeflateDecoder::new(&plain[..]).read_to_end(&mut inflated)?;
            Ok(inflated)
        }))
    })
}
