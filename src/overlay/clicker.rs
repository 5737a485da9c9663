use std::time::Duration;

use crate::browser::{ElementTarget, FrameInfo, FrameQuery};
use crate::config::OverlayConfig;
use crate::error::Result;

use super::locator::{candidate_targets, ElementLocator, Located};
use super::patterns::{ButtonIntent, GENERIC_CLOSE_SELECTORS};

/// Safety predicate evaluated against a click candidate. Anything that could
/// navigate the page away fails it; everything button-like passes.
const SAFETY_PREDICATE_JS: &str = r#"(function(e) {
    const tag = e.tagName.toLowerCase();
    if (tag === 'button' || tag === 'input' || tag === 'summary') return true;
    if (e.hasAttribute('onclick')) return true;
    const href = e.getAttribute('href');
    const role = (e.getAttribute('role') || '').toLowerCase();
    if (role === 'button' && !href) return true;
    if (!e.hasAttribute('href')) return true;
    const h = (href || '').trim();
    if (h === '' || h.startsWith('#')) return true;
    if (/^javascript:\s*void/i.test(h)) return true;
    return false;
})(el)"#;

/// One dismissal attempt
pub struct ClickRequest<'a> {
    pub selector: Option<&'a str>,
    pub button_text: Option<&'a str>,
    /// Frame where validation already located the element; tried first,
    /// without re-searching.
    pub validated: Option<&'a Located>,
    /// Policy for a safety predicate that timed out: classifier-identified
    /// candidates click anyway, unvalidated guesses skip.
    pub force_on_timeout: bool,
    /// Whether to fall back to the generic close-button heuristics when the
    /// reported selector/text matches nowhere.
    pub use_generic_fallback: bool,
}

/// What a dismissal attempt clicked, if anything
#[derive(Debug, Clone)]
pub enum ClickOutcome {
    Clicked(ClickedWith),
    NotClicked,
}

#[derive(Debug, Clone)]
pub struct ClickedWith {
    pub frame: FrameInfo,
    pub target: ElementTarget,
    /// True when the generic heuristics clicked, not the reported element
    pub generic: bool,
}

/// Clicks dismissal controls without ever leaving the analyzed page.
///
/// Every candidate passes the safety predicate before a click is issued, and
/// every click is verified post-hoc against the page URL — the defense
/// against consent managers that render real anchor tags.
pub struct SafeClicker<'a> {
    frames: &'a dyn FrameQuery,
    config: &'a OverlayConfig,
}

impl<'a> SafeClicker<'a> {
    pub fn new(frames: &'a dyn FrameQuery, config: &'a OverlayConfig) -> Self {
        Self { frames, config }
    }

    /// Run one full dismissal attempt: validated frame, main frame, consent
    /// iframes, then (optionally) generic close heuristics on the main frame.
    pub async fn click_dismiss(&self, req: &ClickRequest<'_>) -> Result<ClickOutcome> {
        let targets = candidate_targets(req.selector, req.button_text);

        // 1. The frame validation already searched
        if let Some(located) = req.validated {
            if self
                .try_target(&located.frame, &located.target, req.force_on_timeout)
                .await?
            {
                return Ok(ClickOutcome::Clicked(ClickedWith {
                    frame: located.frame.clone(),
                    target: located.target.clone(),
                    generic: false,
                }));
            }
        }

        // 2.-3. Main frame, then consent-manager iframes
        let locator = ElementLocator::new(self.frames);
        let search_frames = locator.search_frames().await?;
        for frame in &search_frames {
            for (target, _) in &targets {
                // Step 1 already tried this exact combination
                if req
                    .validated
                    .map(|l| l.frame.frame_id == frame.frame_id && l.target == *target)
                    .unwrap_or(false)
                {
                    continue;
                }
                if self.try_target(frame, target, req.force_on_timeout).await? {
                    return Ok(ClickOutcome::Clicked(ClickedWith {
                        frame: frame.clone(),
                        target: target.clone(),
                        generic: false,
                    }));
                }
            }
        }

        // 4. Generic close heuristics, main frame only. Running these across
        // all iframes would match unrelated links inside ad/content iframes
        // and stall on cross-origin evaluation.
        if req.use_generic_fallback {
            if let Some(main) = search_frames.iter().find(|f| f.is_main) {
                if let Some(clicked) = self.try_generic(main).await? {
                    return Ok(ClickOutcome::Clicked(clicked));
                }
            }
        }

        Ok(ClickOutcome::NotClicked)
    }

    /// Generic heuristics: role-based accept/dismiss texts first, then CSS
    /// attribute/class fallbacks. Unvalidated guesses, so a predicate
    /// timeout skips rather than clicks.
    async fn try_generic(&self, main: &FrameInfo) -> Result<Option<ClickedWith>> {
        for pattern in ButtonIntent::GenericAccept.patterns() {
            let target = ElementTarget::ButtonRole(pattern.to_string());
            if self.try_target(main, &target, false).await? {
                return Ok(Some(ClickedWith {
                    frame: main.clone(),
                    target,
                    generic: true,
                }));
            }
        }

        for selector in GENERIC_CLOSE_SELECTORS {
            let target = ElementTarget::Css(selector.to_string());
            if self.try_target(main, &target, false).await? {
                return Ok(Some(ClickedWith {
                    frame: main.clone(),
                    target,
                    generic: true,
                }));
            }
        }

        Ok(None)
    }

    /// Validate and click one target in one frame. Returns whether a click
    /// was issued and survived the post-click URL check.
    async fn try_target(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        force_on_timeout: bool,
    ) -> Result<bool> {
        if !self.frames.find_visible(frame, target).await? {
            return Ok(false);
        }

        match self
            .frames
            .evaluate_on(
                frame,
                target,
                SAFETY_PREDICATE_JS,
                Duration::from_millis(self.config.predicate_timeout_ms),
            )
            .await?
        {
            Some(true) => {}
            Some(false) => {
                tracing::debug!("Skipping unsafe candidate {}", target.describe());
                return Ok(false);
            }
            None if force_on_timeout => {
                tracing::debug!(
                    "Safety predicate timed out for {}, clicking anyway",
                    target.describe()
                );
            }
            None => {
                tracing::debug!(
                    "Safety predicate timed out for {}, skipping",
                    target.describe()
                );
                return Ok(false);
            }
        }

        let url_before = self.frames.current_url().await?;

        if !self
            .frames
            .click(
                frame,
                target,
                Duration::from_millis(self.config.click_timeout_ms),
            )
            .await?
        {
            return Ok(false);
        }

        self.frames
            .wait(Duration::from_millis(self.config.post_click_wait_ms))
            .await;

        let url_after = self.frames.current_url().await?;
        if url_after != url_before {
            // The click navigated despite the predicate (or via pushState).
            // Conservative policy: treat as a failed dismissal and revert.
            tracing::warn!(
                "Click on {} navigated {} -> {}, reverting",
                target.describe(),
                url_before,
                url_after
            );
            self.frames.go_back().await?;
            self.frames
                .wait(Duration::from_millis(self.config.post_click_wait_ms))
                .await;
            return Ok(false);
        }

        tracing::info!("Dismissal click on {} succeeded", target.describe());
        Ok(true)
    }
}
