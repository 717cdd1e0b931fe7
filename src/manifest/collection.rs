use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::Link;

/// Collections keyed by role (`pageList`, `landmarks`, `loi`, ...).
pub type Subcollections = BTreeMap<String, Vec<PublicationCollection>>;

/// An extension collection of a manifest, such as a page list or landmarks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicationCollection {
    pub metadata: Map<String, Value>,
    pub links: Vec<Link>,
    pub subcollections: Subcollections,
}

impl PublicationCollection {
    pub fn new(links: Vec<Link>) -> Self {
        Self {
            links,
            ..Default::default()
        }
    }

    /// Every link of the collection and its subcollections, depth first.
    pub fn all_links(&self) -> Vec<&Link> {
        let mut out: Vec<&Link> = self.links.iter().collect();
        for collection in self.subcollections.values().flatten() {
            out.extend(collection.all_links());
        }
        out
    }

    pub(crate) fn links_mut(&mut self) -> Vec<&mut Link> {
        let mut out: Vec<&mut Link> = self.links.iter_mut().collect();
        for collection in self.subcollections.values_mut().flatten() {
            out.extend(collection.links_mut());
        }
        out
    }

    fn is_bare(&self) -> bool {
        self.metadata.is_empty() && self.subcollections.is_empty()
    }

    /// Parse a collection object: `metadata`, `links`, and any other key as a
    /// nested role.
    fn from_object(mut obj: Map<String, Value>) -> Result<Self, String> {
        let metadata = match obj.remove("metadata") {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        let links = match obj.remove("links") {
            Some(v) => parse_links(v)?,
            None => Vec::new(),
        };
        Ok(Self {
            metadata,
            links,
            subcollections: collections_from_json(obj)?,
        })
    }

    /// Parse one role's value: a collection object, an array of links, or an
    /// array of collection objects.
    pub fn from_json(value: Value) -> Result<Vec<Self>, String> {
        match value {
            Value::Object(obj) => Ok(vec![Self::from_object(obj)?]),
            Value::Array(items) => {
                let is_links = items
                    .first()
                    .and_then(Value::as_object)
                    .is_some_and(|o| o.contains_key("href"));
                if is_links {
                    Ok(vec![Self::new(parse_links(Value::Array(items))?)])
                } else {
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Value::Object(obj) => Some(Self::from_object(obj)),
                            _ => None,
                        })
                        .collect()
                }
            }
            _ => Ok(Vec::new()),
        }
    }
}

fn parse_links(value: Value) -> Result<Vec<Link>, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Parse every key of `obj` as a subcollection role. Roles with no usable
/// collection are skipped.
pub fn collections_from_json(obj: Map<String, Value>) -> Result<Subcollections, String> {
    let mut out = Subcollections::new();
    for (role, value) in obj {
        let collections =
            PublicationCollection::from_json(value).map_err(|e| format!("'{role}': {e}"))?;
        if !collections.is_empty() {
            out.insert(role, collections);
        }
    }
    Ok(out)
}

impl Serialize for PublicationCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("metadata", &self.metadata)?;
        map.serialize_entry("links", &self.links)?;
        for (role, collections) in &self.subcollections {
            map.serialize_entry(role, &Role(collections))?;
        }
        map.end()
    }
}

/// The JSON value of one role: a bare link array for a single collection
/// with only links, a single object, or an array of objects.
pub(crate) struct Role<'a>(pub &'a [PublicationCollection]);

impl Serialize for Role<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            [single] if single.is_bare() => single.links.serialize(serializer),
            [single] => single.serialize(serializer),
            many => serializer.collect_seq(many),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Subcollections {
        match value {
            Value::Object(obj) => collections_from_json(obj).unwrap(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_shapes() {
        let subs = parse(json!({
            "sub1": {"metadata": {"m": "v"}, "links": [{"href": "/link"}], "nested": [{"href": "/n"}]},
            "sub2": [{"href": "/sublink1"}, {"href": "/sublink2"}],
            "sub3": [{"links": [{"href": "/sublink3"}]}, {"links": [{"href": "/sublink4"}]}],
            "junk": 42
        }));

        assert_eq!(subs.len(), 3);
        let sub1 = &subs["sub1"][0];
        assert_eq!(sub1.metadata.get("m"), Some(&json!("v")));
        assert_eq!(sub1.subcollections["nested"][0].links[0].href, "/n");
        assert_eq!(subs["sub2"].len(), 1);
        assert_eq!(subs["sub2"][0].links.len(), 2);
        assert_eq!(subs["sub3"].len(), 2);
        assert_eq!(sub1.all_links().len(), 2);
    }

    #[test]
    fn test_serialize_shapes() {
        let bare = [PublicationCollection::new(vec![Link::new("/p1")])];
        assert_eq!(serde_json::to_value(Role(&bare)).unwrap(), json!([{"href": "/p1"}]));

        let mut with_meta = PublicationCollection::new(vec![Link::new("/l")]);
        with_meta.metadata.insert("k".into(), json!(1));
        let one = [with_meta.clone()];
        assert_eq!(
            serde_json::to_value(Role(&one)).unwrap(),
            json!({"metadata": {"k": 1}, "links": [{"href": "/l"}]})
        );

        let two = [with_meta.clone(), with_meta];
        assert!(serde_json::to_value(Role(&two)).unwrap().is_array());
    }
}
