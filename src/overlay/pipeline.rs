use serde::{Deserialize, Serialize};

use crate::browser::{ElementTarget, FrameQuery, StorageSnapshot};
use crate::classifier::{Confidence, Detection, OverlayClassifier, OverlayType};
use crate::config::OverlayConfig;
use crate::error::Result;

use super::cache::{AccessorType, CachedOverlay, OverlayCache, OverlayCacheEntry};
use super::clicker::{ClickOutcome, ClickRequest, ClickedWith, SafeClicker};
use super::expander::{ConsentDetails, DialogExpander};
use super::locator::{is_plain_css, ElementLocator};
use super::patterns::hostname_of;

/// Detections below this confidence are treated as "nothing found"
pub const CERTAINTY_THRESHOLD: Confidence = Confidence::Medium;

/// Terminal output of one pipeline run — the only contract owed to the
/// surrounding analysis system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayHandlingResult {
    pub overlay_count: u32,
    pub consent_details: Option<ConsentDetails>,
    pub failed: bool,
    pub failure_message: Option<String>,
    pub final_storage: StorageSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    Detecting,
    Validating,
    Clicking,
}

/// The bounded detect→validate→click state machine.
///
/// Consults the per-domain cache first, falls back to the vision classifier,
/// and terminates as cleared, blocked, or exhausted. Classifier failures of
/// any kind degrade to "not found" — the pipeline prefers proceeding over
/// crashing, and only an explicit, validated, unclickable overlay escalates.
pub struct OverlayPipeline<'a> {
    frames: &'a dyn FrameQuery,
    classifier: &'a dyn OverlayClassifier,
    cache: &'a OverlayCache,
    config: &'a OverlayConfig,
}

impl<'a> OverlayPipeline<'a> {
    pub fn new(
        frames: &'a dyn FrameQuery,
        classifier: &'a dyn OverlayClassifier,
        cache: &'a OverlayCache,
        config: &'a OverlayConfig,
    ) -> Self {
        Self {
            frames,
            classifier,
            cache,
            config,
        }
    }

    /// Drive the page to a clean state
    pub async fn run(&self) -> Result<OverlayHandlingResult> {
        let page_url = self.frames.current_url().await?;
        let domain = hostname_of(&page_url);

        let mut overlay_count = 0u32;
        let mut consent_details: Option<ConsentDetails> = None;
        let mut failed = false;
        let mut failure_message: Option<String> = None;

        // Scanning: every cached strategy is tried independently. A strategy
        // that fails to locate is skipped, not evicted — it can be
        // domain-wide but page-specific.
        tracing::debug!(state = ?State::Scanning, url = %page_url);
        let cached_hits = match &domain {
            Some(d) => self.scan_cached(d).await?,
            None => 0,
        };

        if cached_hits > 0 {
            // The known blocking UI was handled without the classifier; a
            // changed overlay set simply misses the cache on the next run.
            tracing::info!("Dismissed {} overlay(s) from cache", cached_hits);
            overlay_count += cached_hits;
            return self.finish(overlay_count, consent_details, false, None).await;
        }

        let clicker = SafeClicker::new(self.frames, self.config);
        let locator = ElementLocator::new(self.frames);

        for iteration in 0..self.config.max_overlays {
            tracing::debug!(state = ?State::Detecting, iteration);

            let detection = self.detect(&page_url).await;
            if !detection.found {
                tracing::debug!("No overlay detected: {}", detection.reason);
                break;
            }
            if detection.confidence < CERTAINTY_THRESHOLD {
                tracing::debug!(
                    "Detection below certainty threshold ({:?}), stopping",
                    detection.confidence
                );
                break;
            }

            tracing::debug!(state = ?State::Validating, iteration);
            let located = locator
                .locate(detection.selector.as_deref(), detection.button_text.as_deref())
                .await?;

            let Some(located) = located else {
                // False positive for this iteration; do not loop forever
                // chasing a ghost element.
                tracing::info!(
                    "Detection could not be validated in any frame ({}), stopping",
                    detection.reason
                );
                break;
            };

            tracing::debug!(state = ?State::Clicking, iteration);
            let outcome = clicker
                .click_dismiss(&ClickRequest {
                    selector: detection.selector.as_deref(),
                    button_text: detection.button_text.as_deref(),
                    validated: Some(&located),
                    force_on_timeout: true,
                    use_generic_fallback: true,
                })
                .await?;

            match outcome {
                ClickOutcome::Clicked(clicked) => {
                    overlay_count += 1;

                    if let Some(d) = &domain {
                        self.remember(d, &detection, &clicked);
                    }

                    if detection.overlay_type == Some(OverlayType::CookieConsent) {
                        let expander =
                            DialogExpander::new(self.frames, self.classifier, self.config);
                        consent_details = Some(expander.expand().await);
                    }
                }
                ClickOutcome::NotClicked => {
                    // Validated but unclickable: the caller must abort
                    // downstream analysis against an obstructed page.
                    failed = true;
                    failure_message = Some(format!(
                        "Could not dismiss {} overlay (\"{}\"): every click strategy failed",
                        detection
                            .overlay_type
                            .map(|t| t.as_str())
                            .unwrap_or("blocking"),
                        detection
                            .button_text
                            .as_deref()
                            .or(detection.selector.as_deref())
                            .unwrap_or("unknown control")
                    ));
                    break;
                }
            }
        }

        self.finish(overlay_count, consent_details, failed, failure_message)
            .await
    }

    /// Try every cached strategy for the domain; returns how many dismissed
    async fn scan_cached(&self, domain: &str) -> Result<u32> {
        let Some(entry) = self.cache.load(domain) else {
            return Ok(0);
        };

        let clicker = SafeClicker::new(self.frames, self.config);
        let mut hits = 0u32;

        for cached in &entry.overlays {
            let outcome = clicker
                .click_dismiss(&ClickRequest {
                    selector: cached.selector.as_deref(),
                    button_text: cached.button_text.as_deref(),
                    validated: None,
                    force_on_timeout: true,
                    use_generic_fallback: false,
                })
                .await?;

            if matches!(outcome, ClickOutcome::Clicked(_)) {
                tracing::debug!(
                    "Cached strategy fired: {:?} / {:?}",
                    cached.selector,
                    cached.button_text
                );
                hits += 1;
            }
        }

        Ok(hits)
    }

    /// One classifier call; every failure degrades to "not found"
    async fn detect(&self, page_url: &str) -> Detection {
        let screenshot = match self.frames.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Screenshot failed, treating as no detection: {}", e);
                return Detection::not_found("screenshot unavailable");
            }
        };

        match self.classifier.detect_overlay(&screenshot, page_url).await {
            Ok(detection) => detection,
            Err(e) => {
                tracing::warn!("Classifier call failed, treating as no detection: {}", e);
                Detection::not_found("classifier unavailable")
            }
        }
    }

    /// Persist the strategy that worked. Cache write failures are logged,
    /// never fatal — missing strategies get rediscovered on the next run.
    fn remember(&self, domain: &str, detection: &Detection, clicked: &ClickedWith) {
        let mut entry = self
            .cache
            .load(domain)
            .unwrap_or_else(|| OverlayCacheEntry::new(domain));

        if entry.push_dedup(strategy_from(detection, clicked)) {
            if let Err(e) = self.cache.save(&entry) {
                tracing::warn!("Failed to persist overlay strategy for {}: {}", domain, e);
            }
        }
    }

    async fn finish(
        &self,
        overlay_count: u32,
        consent_details: Option<ConsentDetails>,
        failed: bool,
        failure_message: Option<String>,
    ) -> Result<OverlayHandlingResult> {
        let final_storage = match self.frames.storage_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Storage snapshot failed: {}", e);
                StorageSnapshot::default()
            }
        };

        Ok(OverlayHandlingResult {
            overlay_count,
            consent_details,
            failed,
            failure_message,
            final_storage,
        })
    }
}

/// Compose the cache record for a successful dismissal. The accessor mirrors
/// how the strategy will be replayed: a plain CSS selector, a button-role
/// lookup for pseudo-selectors, a text search when only button text is
/// known, or the generic heuristic that actually clicked.
fn strategy_from(detection: &Detection, clicked: &ClickedWith) -> CachedOverlay {
    let overlay_type = detection
        .overlay_type
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| OverlayType::Other.as_str().to_string());

    if clicked.generic {
        let (selector, button_text) = match &clicked.target {
            ElementTarget::Css(s) => (Some(s.clone()), None),
            ElementTarget::ButtonRole(t) | ElementTarget::Text(t) => (None, Some(t.clone())),
        };
        return CachedOverlay {
            overlay_type,
            button_text,
            selector,
            accessor_type: AccessorType::GenericClose,
        };
    }

    let selector = detection
        .selector
        .clone()
        .filter(|s| !s.trim().is_empty());
    let button_text = detection
        .button_text
        .clone()
        .filter(|s| !s.trim().is_empty());

    let accessor_type = match &selector {
        Some(s) if is_plain_css(s) => AccessorType::CssSelector,
        Some(_) => AccessorType::ButtonRole,
        None => AccessorType::TextSearch,
    };

    CachedOverlay {
        overlay_type,
        button_text,
        selector,
        accessor_type,
    }
}
