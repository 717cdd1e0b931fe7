use serde::{Deserialize, Serialize};

use super::Link;

/// Suggested method for constraining a resource inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    Width,
    Height,
    Contain,
    Cover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Auto,
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
    Auto,
    Paginated,
    Scrolled,
}

/// Which page of a spread a resource is displayed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spread {
    Auto,
    Both,
    None,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Fixed,
    Reflowable,
    Scrolled,
}

/// Rendering hints for the whole publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clipped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<Fit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow: Option<Overflow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<Spread>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
}

impl Presentation {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Layout of `link`: its own property, else the publication's, else
    /// reflowable.
    pub fn layout_of(&self, link: &Link) -> Layout {
        link.properties
            .layout()
            .or(self.layout)
            .unwrap_or(Layout::Reflowable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Properties;

    #[test]
    fn test_json_values() {
        let p: Presentation = serde_json::from_value(serde_json::json!({
            "layout": "fixed", "spread": "landscape", "overflow": "scrolled", "continuous": false
        }))
        .unwrap();
        assert_eq!(p.layout, Some(Layout::Fixed));
        assert_eq!(p.spread, Some(Spread::Landscape));
        assert_eq!(p.overflow, Some(Overflow::Scrolled));
        assert_eq!(p.continuous, Some(false));
        assert!(p.fit.is_none());
        assert!(Presentation::default().is_empty());
    }

    #[test]
    fn test_layout_of() {
        let mut p = Presentation::default();
        let mut link = Link::new("/a.xhtml");
        assert_eq!(p.layout_of(&link), Layout::Reflowable);

        p.layout = Some(Layout::Fixed);
        assert_eq!(p.layout_of(&link), Layout::Fixed);

        let mut props = Properties::default();
        props.set("layout", "reflowable");
        link.properties = props;
        assert_eq!(p.layout_of(&link), Layout::Reflowable);
    }
}
