use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Encryption;
use super::one_or_many;
use super::presentation::{Fit, Layout, Orientation, Overflow, Page, Spread};

/// Open set of properties attached to a [`Link`](super::Link).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(pub Map<String, Value>);

impl Properties {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Insert every entry of `other`, overwriting existing keys.
    pub fn extend(&mut self, other: Properties) {
        self.0.extend(other.0);
    }

    fn typed<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        serde_json::from_value(self.0.get(key)?.clone()).ok()
    }

    fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    /// Encryption of the resource (`encrypted`).
    pub fn encryption(&self) -> Option<Encryption> {
        self.typed("encrypted")
    }

    pub fn set_encryption(&mut self, encryption: &Encryption) {
        if let Ok(value) = serde_json::to_value(encryption) {
            self.set("encrypted", value);
        }
    }

    /// Technologies the resource relies on, e.g. `mathml` (`contains`).
    pub fn contains(&self) -> Vec<String> {
        self.0
            .get("contains")
            .map(one_or_many::strings::from_value)
            .unwrap_or_default()
    }

    pub fn layout(&self) -> Option<Layout> {
        self.typed("layout")
    }

    pub fn page(&self) -> Option<Page> {
        self.typed("page")
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.typed("orientation")
    }

    pub fn overflow(&self) -> Option<Overflow> {
        self.typed("overflow")
    }

    pub fn spread(&self) -> Option<Spread> {
        self.typed("spread")
    }

    pub fn fit(&self) -> Option<Fit> {
        self.typed("fit")
    }

    pub fn clipped(&self) -> Option<bool> {
        self.0.get("clipped")?.as_bool()
    }

    /// Href of the SMIL overlay synchronized with this resource.
    pub fn media_overlay(&self) -> Option<&str> {
        self.str("mediaOverlay")
    }

    pub fn css_selector(&self) -> Option<&str> {
        self.str("cssSelector")
    }
}
