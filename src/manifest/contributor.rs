use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{Link, LocalizedString, one_or_many};

/// A person or organization involved in the publication. Also used for the
/// collections and series of `belongsTo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contributor {
    pub name: LocalizedString,
    pub sort_as: Option<LocalizedString>,
    pub identifier: Option<String>,
    pub roles: Vec<String>,
    /// Position of the publication inside a collection or series.
    pub position: Option<f64>,
    pub links: Vec<Link>,
}

/// `belongsTo` entries share the contributor shape.
pub type Collection = Contributor;

impl Contributor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: LocalizedString::new(name),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        let role = role.into();
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    /// Default translation of the name.
    pub fn name(&self) -> &str {
        self.name.string()
    }

    fn is_name_only(&self) -> bool {
        self.sort_as.is_none()
            && self.identifier.is_none()
            && self.roles.is_empty()
            && self.position.is_none()
            && self.links.is_empty()
            && self.name.len() == 1
    }
}

impl Serialize for Contributor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_name_only() {
            return self.name.serialize(serializer);
        }
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        if let Some(sort_as) = &self.sort_as {
            map.serialize_entry("sortAs", sort_as)?;
        }
        if let Some(identifier) = &self.identifier {
            map.serialize_entry("identifier", identifier)?;
        }
        if !self.roles.is_empty() {
            map.serialize_entry("role", &RolesRef(&self.roles))?;
        }
        if let Some(position) = self.position {
            map.serialize_entry("position", &position)?;
        }
        if !self.links.is_empty() {
            map.serialize_entry("links", &self.links)?;
        }
        map.end()
    }
}

struct RolesRef<'a>(&'a [String]);

impl Serialize for RolesRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        one_or_many::strings::serialize(self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Contributor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Contributor::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl Contributor {
    /// Parse a bare name or a contributor object.
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::String(name) => Ok(Self::new(name)),
            Value::Object(mut obj) => {
                let name = obj
                    .remove("name")
                    .ok_or_else(|| "contributor has no 'name'".to_string())?;
                let name: LocalizedString =
                    serde_json::from_value(name).map_err(|e| e.to_string())?;
                let sort_as = match obj.remove("sortAs") {
                    Some(v) => Some(serde_json::from_value(v).map_err(|e| e.to_string())?),
                    None => None,
                };
                let links = match obj.remove("links") {
                    Some(v @ Value::Array(_)) => {
                        serde_json::from_value(v).map_err(|e| e.to_string())?
                    }
                    _ => Vec::new(),
                };
                Ok(Self {
                    name,
                    sort_as,
                    identifier: obj
                        .get("identifier")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    roles: obj
                        .get("role")
                        .map(one_or_many::strings::from_value)
                        .unwrap_or_default(),
                    position: obj.get("position").and_then(Value::as_f64),
                    links,
                })
            }
            _ => Err("contributor is neither a string nor an object".to_string()),
        }
    }
}

/// Serde helper for contributor lists: accepts a single contributor or an
/// array, drops duplicates and writes a single value when one remains.
pub mod contributors {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[Contributor], serializer: S) -> Result<S::Ok, S::Error> {
        let mut unique: Vec<&Contributor> = Vec::with_capacity(values.len());
        for c in values {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        match unique.as_slice() {
            [single] => single.serialize(serializer),
            _ => serializer.collect_seq(unique),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Contributor>, D::Error> {
        from_value(Value::deserialize(d)?).map_err(serde::de::Error::custom)
    }

    pub fn from_value(value: Value) -> Result<Vec<Contributor>, String> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items.into_iter().map(Contributor::from_value).collect(),
            other => Contributor::from_value(other).map(|c| vec![c]),
        }
    }
}
