//! Accessibility metadata inferred from the shape of a manifest.

use crate::manifest::a11y::{access_mode, feature, profile as a11y_profile};
use crate::manifest::{A11y, INFERRED_ACCESSIBILITY_KEY, Layout, Link, Manifest, profile};
use crate::mediatype::{self, MediaType};

/// How inferred accessibility metadata is added to a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferA11y {
    /// Nothing is inferred.
    #[default]
    No,
    /// Inferred metadata is merged into `metadata.accessibility`.
    Merged,
    /// Inferred metadata is stored apart, under the
    /// [`INFERRED_ACCESSIBILITY_KEY`] metadata key.
    Split,
}

impl InferA11y {
    /// Add the metadata inferred from `manifest` to it. Applying twice has
    /// the same effect as applying once.
    pub fn apply(self, manifest: &mut Manifest) {
        if self == InferA11y::No {
            return;
        }
        let Some(inferred) = infer_accessibility(manifest) else {
            return;
        };
        match self {
            InferA11y::Merged => match &mut manifest.metadata.accessibility {
                Some(a11y) => a11y.merge(&inferred),
                None => manifest.metadata.accessibility = Some(inferred),
            },
            InferA11y::Split => {
                if let Err(e) = manifest
                    .metadata
                    .set_other_metadata(INFERRED_ACCESSIBILITY_KEY, &inferred)
                {
                    log::warn!("Cannot store inferred accessibility metadata: {e}");
                }
            }
            InferA11y::No => {}
        }
    }
}

fn media_type(link: &Link) -> Option<MediaType> {
    link.media_type()
}

fn is_audio_or_video(link: &Link) -> bool {
    media_type(link).is_some_and(|mt| mt.is_audio() || mt.is_video())
}

fn is_visual(link: &Link) -> bool {
    media_type(link).is_some_and(|mt| mt.is_bitmap() || mt.is_video())
}

/// Accessibility metadata that the manifest implies but does not declare.
///
/// Only what is missing from `metadata.accessibility` is returned; `None`
/// when there is nothing to add. The manifest is left untouched.
pub fn infer_accessibility(manifest: &Manifest) -> Option<A11y> {
    let declared = manifest.metadata.accessibility.clone().unwrap_or_default();
    let mut inferred = A11y::default();

    let all: Vec<&Link> = manifest
        .reading_order
        .iter()
        .chain(&manifest.resources)
        .collect();
    let is_epub = manifest.conforms_to(profile::EPUB);
    let is_reflowable = manifest
        .metadata
        .presentation
        .as_ref()
        .and_then(|p| p.layout)
        .is_none_or(|layout| layout == Layout::Reflowable);

    let textual = declared.conforms_to_wcag()
        || (is_epub
            && is_reflowable
            && !all.iter().any(|link| {
                let Some(mt) = media_type(link) else {
                    return false;
                };
                mt.is_audio()
                    || mt.is_video()
                    || (mt.is_bitmap() && !link.has_rel("cover"))
                    || mt.is_pdf()
            }));

    if declared.access_modes.is_empty() {
        if textual {
            inferred.access_modes.push(access_mode::TEXTUAL.to_string());
        }
        if all.iter().any(|l| is_audio_or_video(l)) {
            inferred.access_modes.push(access_mode::AUDITORY.to_string());
        }
        if all.iter().any(|l| is_visual(l)) {
            inferred.access_modes.push(access_mode::VISUAL.to_string());
        }
    }

    if declared.access_modes_sufficient.is_empty() {
        let mut sufficient = |mode: &str| inferred.access_modes_sufficient.push(vec![mode.to_string()]);
        if textual {
            sufficient(access_mode::TEXTUAL);
        }
        if !all.is_empty() && all.iter().all(|l| media_type(l).is_some_and(|mt| mt.is_audio())) {
            sufficient(access_mode::AUDITORY);
        }
        if !all.is_empty() && all.iter().all(|l| is_visual(l)) {
            sufficient(access_mode::VISUAL);
        }
    }

    let mut add_feature = |f: &str| {
        if !declared.features.iter().any(|d| d == f) && !inferred.features.iter().any(|i| i == f) {
            inferred.features.push(f.to_string());
        }
    };

    if !manifest.toc.is_empty() {
        add_feature(feature::TABLE_OF_CONTENTS);
    }
    if all
        .iter()
        .any(|l| media_type(l).is_some_and(|mt| mt.matches_any(&[mediatype::SMIL])))
    {
        add_feature(feature::SYNCHRONIZED_AUDIO_TEXT);
    }
    if is_epub {
        if manifest.subcollections.contains_key("pageList") {
            add_feature(feature::PRINT_PAGE_NUMBERS);
        }
        if all
            .iter()
            .any(|l| l.properties.contains().iter().any(|c| c == "mathml"))
        {
            add_feature(feature::MATH_ML);
        }
        let fully_accessible = declared.conforms_to.iter().any(|p| {
            p == a11y_profile::EPUB_A11Y_10_WCAG_20_AA || p == a11y_profile::EPUB_A11Y_10_WCAG_20_AAA
        });
        if is_reflowable && fully_accessible {
            add_feature(feature::DISPLAY_TRANSFORMABILITY);
        }
    }

    (!inferred.is_empty()).then_some(inferred)
}
