use crate::browser::{ElementTarget, FrameInfo, FrameQuery};
use crate::error::Result;

use super::cache::AccessorType;
use super::patterns::{hostname_of, is_consent_host};

/// A validated element location: the frame it was found in and the target
/// that matched there. The frame reference is only good until the next
/// navigation.
#[derive(Debug, Clone)]
pub struct Located {
    pub frame: FrameInfo,
    pub target: ElementTarget,
    pub accessor: AccessorType,
}

/// Finds the frame holding a classifier-reported element. Never clicks.
pub struct ElementLocator<'a> {
    frames: &'a dyn FrameQuery,
}

impl<'a> ElementLocator<'a> {
    pub fn new(frames: &'a dyn FrameQuery) -> Self {
        Self { frames }
    }

    /// Search frames in priority order for a matching, visible element.
    /// Returns the first hit, or `None` when the report cannot be validated
    /// anywhere on the page.
    pub async fn locate(
        &self,
        selector: Option<&str>,
        button_text: Option<&str>,
    ) -> Result<Option<Located>> {
        let targets = candidate_targets(selector, button_text);
        if targets.is_empty() {
            return Ok(None);
        }

        for frame in self.search_frames().await? {
            for (target, accessor) in &targets {
                if self.frames.find_visible(&frame, target).await? {
                    tracing::debug!(
                        "Located {} in frame {}",
                        target.describe(),
                        if frame.is_main { "main" } else { &frame.url }
                    );
                    return Ok(Some(Located {
                        frame,
                        target: target.clone(),
                        accessor: *accessor,
                    }));
                }
            }
        }

        Ok(None)
    }

    /// Frames worth searching, in priority order: the main frame, then every
    /// frame whose hostname looks like a consent manager (and not like an
    /// ad-tech sync pixel).
    pub async fn search_frames(&self) -> Result<Vec<FrameInfo>> {
        let all = self.frames.list_frames().await?;

        let mut ordered: Vec<FrameInfo> =
            all.iter().filter(|f| f.is_main).cloned().collect();
        ordered.extend(
            all.into_iter()
                .filter(|f| !f.is_main)
                .filter(|f| {
                    hostname_of(&f.url)
                        .map(|h| is_consent_host(&h))
                        .unwrap_or(false)
                }),
        );

        Ok(ordered)
    }
}

/// Derive lookup targets from a classifier report, most specific first:
/// the selector as plain CSS, text extracted from a `:has-text()` /
/// `:contains()` pseudo-selector as a button-role lookup, then the reported
/// button text as a button-role lookup and a free-text search.
pub fn candidate_targets(
    selector: Option<&str>,
    button_text: Option<&str>,
) -> Vec<(ElementTarget, AccessorType)> {
    let mut targets = Vec::new();

    if let Some(sel) = selector.map(str::trim).filter(|s| !s.is_empty()) {
        if is_plain_css(sel) {
            targets.push((
                ElementTarget::Css(sel.to_string()),
                AccessorType::CssSelector,
            ));
        } else if let Some(text) = extract_pseudo_text(sel) {
            targets.push((ElementTarget::ButtonRole(text), AccessorType::ButtonRole));
        }
    }

    if let Some(text) = button_text.map(str::trim).filter(|s| !s.is_empty()) {
        let button = ElementTarget::ButtonRole(text.to_string());
        if !targets.iter().any(|(t, _)| *t == button) {
            targets.push((button, AccessorType::ButtonRole));
        }
        targets.push((
            ElementTarget::Text(text.to_string()),
            AccessorType::TextSearch,
        ));
    }

    targets
}

/// Whether a reported selector is plain CSS. Classifiers sometimes emit
/// Playwright-style pseudo-selectors, which `querySelector` would reject.
pub(crate) fn is_plain_css(selector: &str) -> bool {
    !selector.contains(":has-text(") && !selector.contains(":contains(")
}

/// Inner text of the first `:has-text("...")` / `:contains("...")` pseudo
fn extract_pseudo_text(selector: &str) -> Option<String> {
    for marker in [":has-text(", ":contains("] {
        if let Some(start) = selector.find(marker) {
            let rest = &selector[start + marker.len()..];
            let end = rest.find(')')?;
            let inner = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
            if !inner.is_empty() {
                return Some(inner.to_string());
            }
        }
    }
    None
}
