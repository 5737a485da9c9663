use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::browser::{ElementTarget, FrameInfo, FrameQuery};
use crate::classifier::OverlayClassifier;
use crate::config::OverlayConfig;
use crate::error::Result;

use super::locator::ElementLocator;
use super::patterns::{matches_pattern, ButtonIntent};

/// What the expansion sub-protocol surfaced from a consent dialog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentDetails {
    pub expanded_manage: bool,
    pub expanded_partners: bool,
    pub expanded_legitimate_interest: bool,
    pub expanded_load_more: bool,
    /// Button texts visible after expansion: vendor names, purposes, toggles
    pub vendor_texts: Vec<String>,
    pub returned_to_consent: bool,
}

/// Drives the informational-only expansion of a consent dialog: surface
/// partner/vendor disclosures, then navigate back to the main consent view.
///
/// Never counts as a found overlay and never fails the pipeline — whatever
/// was harvested when the budget runs out is the result.
pub struct DialogExpander<'a> {
    frames: &'a dyn FrameQuery,
    classifier: &'a dyn OverlayClassifier,
    config: &'a OverlayConfig,
}

impl<'a> DialogExpander<'a> {
    pub fn new(
        frames: &'a dyn FrameQuery,
        classifier: &'a dyn OverlayClassifier,
        config: &'a OverlayConfig,
    ) -> Self {
        Self {
            frames,
            classifier,
            config,
        }
    }

    /// Run the full expansion: manage settings, partner list, legitimate
    /// interest, load more — each attempted once, bounded per step and by an
    /// overall wall-clock budget.
    pub async fn expand(&self) -> ConsentDetails {
        let deadline = Instant::now() + Duration::from_millis(self.config.expansion_budget_ms);
        let mut details = ConsentDetails::default();

        let steps: [(ButtonIntent, fn(&mut ConsentDetails)); 4] = [
            (ButtonIntent::ManageSettings, |d| d.expanded_manage = true),
            (ButtonIntent::PartnerList, |d| d.expanded_partners = true),
            (ButtonIntent::LegitimateInterest, |d| {
                d.expanded_legitimate_interest = true
            }),
            (ButtonIntent::LoadMore, |d| d.expanded_load_more = true),
        ];

        for (intent, mark) in steps {
            if Instant::now() >= deadline {
                tracing::debug!("Expansion budget exhausted, skipping remaining steps");
                break;
            }
            match self.click_intent(intent).await {
                Ok(true) => mark(&mut details),
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!("Expansion step {:?} errored: {}", intent, e);
                }
            }
        }

        details.vendor_texts = self.harvest_texts().await.unwrap_or_default();

        details.returned_to_consent = match self.return_to_consent().await {
            Ok(returned) => returned,
            Err(e) => {
                tracing::debug!("Close/return protocol errored: {}", e);
                false
            }
        };

        details
    }

    /// Click the first visible button carrying the intent, across the main
    /// frame then consent iframes. URL-guarded: a click that navigates is
    /// reverted and the element skipped.
    async fn click_intent(&self, intent: ButtonIntent) -> Result<bool> {
        let locator = ElementLocator::new(self.frames);
        for frame in locator.search_frames().await? {
            let texts = self.frames.visible_button_texts(&frame).await?;
            let Some(text) = texts.into_iter().find(|t| intent.matches(t)) else {
                continue;
            };

            if self.guarded_click(&frame, &text).await? {
                tracing::debug!("Expanded {:?} via \"{}\"", intent, text);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Click a button by text, reverting if the page URL changes
    async fn guarded_click(&self, frame: &FrameInfo, text: &str) -> Result<bool> {
        let target = ElementTarget::ButtonRole(text.to_string());
        let url_before = self.frames.current_url().await?;

        if !self
            .frames
            .click(
                frame,
                &target,
                Duration::from_millis(self.config.step_budget_ms),
            )
            .await?
        {
            return Ok(false);
        }

        self.frames
            .wait(Duration::from_millis(self.config.post_click_wait_ms))
            .await;

        if self.frames.current_url().await? != url_before {
            tracing::debug!("Expansion click on \"{}\" navigated, reverting", text);
            self.frames.go_back().await?;
            self.frames
                .wait(Duration::from_millis(self.config.post_click_wait_ms))
                .await;
            return Ok(false);
        }

        Ok(true)
    }

    /// Visible button texts across the searched frames after expansion
    async fn harvest_texts(&self) -> Result<Vec<String>> {
        let locator = ElementLocator::new(self.frames);
        let mut harvested = Vec::new();
        for frame in locator.search_frames().await? {
            for text in self.frames.visible_button_texts(&frame).await? {
                if !harvested.contains(&text) {
                    harvested.push(text);
                }
            }
            if harvested.len() >= 200 {
                break;
            }
        }
        Ok(harvested)
    }

    /// Navigate back to the main consent view: ranked back/close patterns,
    /// an Escape keypress after two consecutive misses, and finally the
    /// navigation-help classifier — the only point where expansion
    /// re-invokes the external classifier.
    async fn return_to_consent(&self) -> Result<bool> {
        let expected_steps = 4;
        let budget = expected_steps + self.config.close_extra_attempts;
        let mut attempts = 0u32;
        let mut consecutive_misses = 0u32;

        for pattern in ButtonIntent::CloseReturn.patterns() {
            if attempts >= budget {
                break;
            }
            attempts += 1;

            if self.click_close_pattern(pattern).await? {
                return Ok(true);
            }

            consecutive_misses += 1;
            if consecutive_misses >= 2 {
                tracing::debug!("Two close attempts missed, trying Escape");
                self.frames.press_key("Escape").await?;
                self.frames
                    .wait(Duration::from_millis(self.config.post_click_wait_ms))
                    .await;
                consecutive_misses = 0;
                attempts += 1;
            }
        }

        self.ask_classifier_for_exit().await
    }

    /// Try one ranked close/back pattern across the searched frames
    async fn click_close_pattern(&self, pattern: &str) -> Result<bool> {
        let locator = ElementLocator::new(self.frames);
        for frame in locator.search_frames().await? {
            let texts = self.frames.visible_button_texts(&frame).await?;
            let Some(text) = texts.into_iter().find(|t| matches_pattern(pattern, t)) else {
                continue;
            };

            if self.guarded_click(&frame, &text).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Last resort: show the classifier a fresh screenshot and the visible
    /// button texts, and click whichever single button it names.
    async fn ask_classifier_for_exit(&self) -> Result<bool> {
        let screenshot = self.frames.screenshot().await?;
        let texts = self.harvest_texts().await?;

        let hint = match self.classifier.navigation_help(&screenshot, &texts).await {
            Ok(hint) => hint,
            Err(e) => {
                tracing::debug!("Navigation-help classifier unavailable: {}", e);
                return Ok(false);
            }
        };

        let Some(text) = hint.button_text else {
            return Ok(false);
        };

        let locator = ElementLocator::new(self.frames);
        for frame in locator.search_frames().await? {
            let target = ElementTarget::ButtonRole(text.clone());
            if self.frames.find_visible(&frame, &target).await?
                && self.guarded_click(&frame, &text).await?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
