use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{Link, LocalizedString};

/// Subject of a publication, possibly coded against a scheme such as BISAC.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub name: LocalizedString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_as: Option<LocalizedString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: LocalizedString::new(name),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        self.name.string()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectObject {
    name: LocalizedString,
    #[serde(default)]
    sort_as: Option<LocalizedString>,
    #[serde(default)]
    scheme: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(name) => Ok(Subject::new(name)),
            value @ Value::Object(_) => {
                let o: SubjectObject =
                    serde_json::from_value(value).map_err(serde::de::Error::custom)?;
                Ok(Subject {
                    name: o.name,
                    sort_as: o.sort_as,
                    scheme: o.scheme,
                    code: o.code,
                    links: o.links,
                })
            }
            _ => Err(serde::de::Error::custom("subject is neither a string nor an object")),
        }
    }
}
