//! Accessibility metadata (schema.org accessibility vocabulary).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::one_or_many;

/// Conformance profiles.
pub mod profile {
    pub const EPUB_A11Y_10_WCAG_20_A: &str =
        "http://www.idpf.org/epub/a11y/accessibility-20170105.html#wcag-a";
    pub const EPUB_A11Y_10_WCAG_20_AA: &str =
        "http://www.idpf.org/epub/a11y/accessibility-20170105.html#wcag-aa";
    pub const EPUB_A11Y_10_WCAG_20_AAA: &str =
        "http://www.idpf.org/epub/a11y/accessibility-20170105.html#wcag-aaa";

    /// Every WCAG profile, weakest first.
    pub const WCAG: &[&str] = &[
        EPUB_A11Y_10_WCAG_20_A,
        EPUB_A11Y_10_WCAG_20_AA,
        EPUB_A11Y_10_WCAG_20_AAA,
    ];
}

pub mod access_mode {
    pub const AUDITORY: &str = "auditory";
    pub const CHART_ON_VISUAL: &str = "chartOnVisual";
    pub const CHEM_ON_VISUAL: &str = "chemOnVisual";
    pub const COLOR_DEPENDENT: &str = "colorDependent";
    pub const DIAGRAM_ON_VISUAL: &str = "diagramOnVisual";
    pub const MATH_ON_VISUAL: &str = "mathOnVisual";
    pub const MUSIC_ON_VISUAL: &str = "musicOnVisual";
    pub const TACTILE: &str = "tactile";
    pub const TEXT_ON_VISUAL: &str = "textOnVisual";
    pub const TEXTUAL: &str = "textual";
    pub const VISUAL: &str = "visual";
}

pub mod feature {
    pub const ANNOTATIONS: &str = "annotations";
    pub const ARIA: &str = "ARIA";
    pub const BOOKMARKS: &str = "bookmark";
    pub const INDEX: &str = "index";
    pub const PRINT_PAGE_NUMBERS: &str = "printPageNumbers";
    pub const READING_ORDER: &str = "readingOrder";
    pub const STRUCTURAL_NAVIGATION: &str = "structuralNavigation";
    pub const TABLE_OF_CONTENTS: &str = "tableOfContents";
    pub const TAGGED_PDF: &str = "taggedPDF";
    pub const ALTERNATIVE_TEXT: &str = "alternativeText";
    pub const AUDIO_DESCRIPTION: &str = "audioDescription";
    pub const CAPTIONS: &str = "captions";
    pub const DESCRIBED_MATH: &str = "describeMath";
    pub const LONG_DESCRIPTION: &str = "longDescription";
    pub const RUBY_ANNOTATIONS: &str = "rubyAnnotations";
    pub const SIGN_LANGUAGE: &str = "signLanguage";
    pub const TRANSCRIPT: &str = "transcript";
    pub const DISPLAY_TRANSFORMABILITY: &str = "displayTransformability";
    pub const SYNCHRONIZED_AUDIO_TEXT: &str = "synchronizedAudioText";
    pub const TIMING_CONTROL: &str = "timingControl";
    pub const UNLOCKED: &str = "unlocked";
    pub const CHEM_ML: &str = "ChemML";
    pub const LATEX: &str = "latex";
    pub const MATH_ML: &str = "MathML";
    pub const TTS_MARKUP: &str = "ttsMarkup";
    pub const HIGH_CONTRAST_AUDIO: &str = "highContrastAudio";
    pub const HIGH_CONTRAST_DISPLAY: &str = "highContrastDisplay";
    pub const LARGE_PRINT: &str = "largePrint";
    pub const BRAILLE: &str = "braille";
    pub const TACTILE_GRAPHIC: &str = "tactileGraphic";
    pub const TACTILE_OBJECT: &str = "tactileObject";
    pub const NONE: &str = "none";
}

pub mod hazard {
    pub const FLASHING: &str = "flashing";
    pub const NO_FLASHING_HAZARD: &str = "noFlashingHazard";
    pub const MOTION_SIMULATION: &str = "motionSimulation";
    pub const NO_MOTION_SIMULATION_HAZARD: &str = "noMotionSimulationHazard";
    pub const SOUND: &str = "sound";
    pub const NO_SOUND_HAZARD: &str = "noSoundHazard";
    pub const UNKNOWN: &str = "unknown";
    pub const NONE: &str = "none";
}

/// Who certified the accessibility of the publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

/// Accessibility metadata of a publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct A11y {
    #[serde(
        rename = "conformsTo",
        default,
        deserialize_with = "one_or_many::strings::deserialize",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub conforms_to: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification: Option<Certification>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(
        rename = "accessMode",
        default,
        deserialize_with = "one_or_many::strings::deserialize",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub access_modes: Vec<String>,

    /// Single or combined access modes sufficient to understand the content.
    #[serde(
        rename = "accessModeSufficient",
        default,
        deserialize_with = "deserialize_sufficient",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub access_modes_sufficient: Vec<Vec<String>>,

    #[serde(
        rename = "feature",
        default,
        deserialize_with = "one_or_many::strings::deserialize",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub features: Vec<String>,

    #[serde(
        rename = "hazard",
        default,
        deserialize_with = "one_or_many::strings::deserialize",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub hazards: Vec<String>,
}

/// Each entry is a string or an array of strings; empty entries are dropped.
fn deserialize_sufficient<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<String>>, D::Error> {
    let value = Value::deserialize(d)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .iter()
        .map(one_or_many::strings::from_value)
        .filter(|modes| !modes.is_empty())
        .collect())
}

fn append_missing(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

impl A11y {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Extend this record with `other`. List fields gain the missing
    /// entries; `certification` and `summary` are replaced when `other` has
    /// them.
    pub fn merge(&mut self, other: &A11y) {
        if other.is_empty() {
            return;
        }

        append_missing(&mut self.conforms_to, &other.conforms_to);
        if other.certification.is_some() {
            self.certification = other.certification.clone();
        }
        if other.summary.as_deref().is_some_and(|s| !s.is_empty()) {
            self.summary = other.summary.clone();
        }
        append_missing(&mut self.access_modes, &other.access_modes);
        append_missing(&mut self.features, &other.features);
        append_missing(&mut self.hazards, &other.hazards);

        for modes in &other.access_modes_sufficient {
            if !self.access_modes_sufficient.contains(modes) {
                self.access_modes_sufficient.push(modes.clone());
            }
        }
    }

    /// Whether any WCAG conformance profile is declared.
    pub fn conforms_to_wcag(&self) -> bool {
        self.conforms_to
            .iter()
            .any(|p| profile::WCAG.contains(&p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full() {
        let a11y: A11y = serde_json::from_value(json!({
            "conformsTo": profile::EPUB_A11Y_10_WCAG_20_AA,
            "certification": {"certifiedBy": "Org", "report": "https://report"},
            "summary": "Summary",
            "accessMode": ["auditory", "chartOnVisual"],
            "accessModeSufficient": [["visual", "tactile"], "textual", []],
            "feature": ["readingOrder", "alternativeText"],
            "hazard": "flashing"
        }))
        .unwrap();

        assert_eq!(a11y.conforms_to, [profile::EPUB_A11Y_10_WCAG_20_AA]);
        assert_eq!(a11y.certification.as_ref().unwrap().certified_by.as_deref(), Some("Org"));
        assert_eq!(
            a11y.access_modes_sufficient,
            vec![vec!["visual".to_string(), "tactile".to_string()], vec!["textual".to_string()]]
        );
        assert_eq!(a11y.hazards, ["flashing"]);
        assert!(a11y.conforms_to_wcag());
    }

    #[test]
    fn test_empty_serializes_to_empty_object() {
        assert!(A11y::default().is_empty());
        assert_eq!(serde_json::to_value(A11y::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_merge() {
        let mut a = A11y {
            access_modes: vec![access_mode::TEXTUAL.into()],
            summary: Some("old".into()),
            access_modes_sufficient: vec![vec![access_mode::TEXTUAL.into()]],
            ..Default::default()
        };
        let b = A11y {
            access_modes: vec![access_mode::TEXTUAL.into(), access_mode::VISUAL.into()],
            summary: Some("new".into()),
            access_modes_sufficient: vec![
                vec![access_mode::TEXTUAL.into()],
                vec![access_mode::AUDITORY.into()],
            ],
            features: vec![feature::MATH_ML.into()],
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.access_modes, ["textual", "visual"]);
        assert_eq!(a.summary.as_deref(), Some("new"));
        assert_eq!(a.access_modes_sufficient.len(), 2);
        assert_eq!(a.features, ["MathML"]);
    }
}
