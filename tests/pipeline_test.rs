//! End-to-end tests for the overlay engine against a scripted page double.
//!
//! These cover the pipeline's terminal behaviors (cleared, blocked, soft
//! cap), the navigation-safety invariant, cache round-trips, and the dialog
//! expansion sub-protocol.

mod support;

use std::sync::atomic::Ordering;

use pageclear::classifier::{Confidence, OverlayType};
use pageclear::config::OverlayConfig;
use pageclear::overlay::{
    AccessorType, CachedOverlay, ClickOutcome, ClickRequest, DialogExpander, ElementLocator,
    OverlayCache, OverlayCacheEntry, OverlayPipeline, SafeClicker,
};

use support::{detection, main_frame, sub_frame, FakeClassifier, FakeElement, FakePage};

const PAGE_URL: &str = "https://www.example.com/article";

fn temp_cache() -> (tempfile::TempDir, OverlayCache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = OverlayCache::new(dir.path());
    (dir, cache)
}

mod pipeline {
    use super::*;

    /// Scenario A: a single cookie banner whose "Reject All" control is an
    /// anchor with `href="#"` — dismissed, counted, and cached by text.
    #[tokio::test]
    async fn cookie_banner_with_hash_href_is_dismissed_and_cached() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::link("main", "Reject All", "#").dismisses()],
        );
        let classifier = FakeClassifier::scripted(vec![detection(
            OverlayType::CookieConsent,
            Some("Reject All"),
            None,
            Confidence::High,
        )]);
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert_eq!(result.overlay_count, 1);
        assert!(!result.failed);
        assert!(result.failure_message.is_none());
        assert_eq!(result.final_storage.cookies.len(), 1);

        // www. is stripped: the entry lands under the registrable domain
        let entry = cache.load("example.com").expect("strategy was cached");
        assert_eq!(entry.overlays.len(), 1);
        let cached = &entry.overlays[0];
        assert_eq!(cached.button_text.as_deref(), Some("Reject All"));
        assert!(cached.selector.is_none());
        assert_eq!(cached.accessor_type, AccessorType::TextSearch);
        assert_eq!(cached.overlay_type, "cookie-consent");
    }

    /// Scenario B: a sign-in modal whose only control is a real link to
    /// /login. Validation succeeds, but the safety predicate forbids every
    /// click — the run is blocked with zero clicks issued.
    #[tokio::test]
    async fn sign_in_wall_with_real_link_blocks_without_clicking() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::link("main", "Log in", "/login")],
        );
        let classifier = FakeClassifier::always(detection(
            OverlayType::SignIn,
            Some("Log in"),
            None,
            Confidence::High,
        ));
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert!(result.failed);
        assert_eq!(result.overlay_count, 0);
        assert!(result
            .failure_message
            .as_deref()
            .unwrap()
            .contains("sign-in"));
        assert_eq!(page.click_count(), 0);
        assert!(cache.load("example.com").is_none());
    }

    /// Scenario C: revisiting a cached domain with an unchanged banner
    /// dismisses it from the cache alone — zero classifier calls.
    #[tokio::test]
    async fn cached_domain_revisit_issues_no_classifier_calls() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::link("main", "Reject All", "#").dismisses()],
        );
        let classifier = FakeClassifier::silent();
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let mut entry = OverlayCacheEntry::new("example.com");
        entry.push_dedup(CachedOverlay {
            overlay_type: "cookie-consent".to_string(),
            button_text: Some("Reject All".to_string()),
            selector: None,
            accessor_type: AccessorType::TextSearch,
        });
        cache.save(&entry).unwrap();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert_eq!(result.overlay_count, 1);
        assert!(!result.failed);
        assert_eq!(classifier.detect_call_count(), 0);
        assert_eq!(classifier.nav_calls.load(Ordering::SeqCst), 0);
    }

    /// An overlay detected on every iteration and never clickable terminates
    /// promptly with `failed = true`.
    #[tokio::test]
    async fn never_clickable_overlay_terminates_blocked() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::button("main", "Dismiss Everything").unclickable()],
        );
        let classifier = FakeClassifier::always(detection(
            OverlayType::Newsletter,
            Some("Dismiss Everything"),
            None,
            Confidence::High,
        ));
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert!(result.failed);
        assert!(classifier.detect_call_count() as u32 <= config.max_overlays + 2);
    }

    /// A detection below the certainty threshold performs zero click
    /// attempts for that iteration.
    #[tokio::test]
    async fn low_confidence_detection_is_ignored() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::button("main", "Accept").dismisses()],
        );
        let classifier = FakeClassifier::always(detection(
            OverlayType::CookieConsent,
            Some("Accept"),
            None,
            Confidence::Low,
        ));
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert_eq!(page.click_count(), 0);
        assert_eq!(result.overlay_count, 0);
        assert!(!result.failed);
        assert_eq!(classifier.detect_call_count(), 1);
    }

    /// A page that keeps re-showing overlays hits the iteration cap and
    /// reports what was cleared as a soft success.
    #[tokio::test]
    async fn persistent_overlays_stop_at_max_iterations() {
        // Clicks succeed but the element never goes away
        let page = FakePage::single(PAGE_URL, vec![FakeElement::button("main", "No thanks")]);
        let classifier = FakeClassifier::always(detection(
            OverlayType::Newsletter,
            Some("No thanks"),
            None,
            Confidence::High,
        ));
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert!(!result.failed);
        assert_eq!(result.overlay_count, config.max_overlays);
        assert_eq!(classifier.detect_call_count() as u32, config.max_overlays);
    }

    /// An unvalidatable detection is a false positive for the iteration, not
    /// an endless chase.
    #[tokio::test]
    async fn ghost_detection_stops_cleanly() {
        let page = FakePage::single(PAGE_URL, vec![]);
        let classifier = FakeClassifier::always(detection(
            OverlayType::CookieConsent,
            Some("Accept Ghost"),
            Some("#ghost"),
            Confidence::High,
        ));
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert!(!result.failed);
        assert_eq!(result.overlay_count, 0);
        assert_eq!(classifier.detect_call_count(), 1);
        assert_eq!(page.click_count(), 0);
    }

    /// A cached strategy whose element is absent from this page is skipped
    /// without error, and the run falls through to detection.
    #[tokio::test]
    async fn stale_cached_strategy_is_skipped_not_fatal() {
        let page = FakePage::single(PAGE_URL, vec![]);
        let classifier = FakeClassifier::silent();
        let (_dir, cache) = temp_cache();
        let config = OverlayConfig::default();

        let mut entry = OverlayCacheEntry::new("example.com");
        entry.push_dedup(CachedOverlay {
            overlay_type: "cookie-consent".to_string(),
            button_text: Some("Ghost Button".to_string()),
            selector: None,
            accessor_type: AccessorType::TextSearch,
        });
        cache.save(&entry).unwrap();

        let pipeline = OverlayPipeline::new(&page, &classifier, &cache, &config);
        let result = pipeline.run().await.unwrap();

        assert_eq!(result.overlay_count, 0);
        assert!(!result.failed);
        assert_eq!(classifier.detect_call_count(), 1);
        // The stale entry is not evicted: it can be page-specific
        assert!(cache.load("example.com").is_some());
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = pageclear::overlay::OverlayHandlingResult {
            overlay_count: 2,
            consent_details: None,
            failed: false,
            failure_message: None,
            final_storage: Default::default(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["overlayCount"], 2);
        assert!(json.get("finalStorage").is_some());
    }
}

mod clicker {
    use super::*;

    fn request<'a>(button_text: &'a str) -> ClickRequest<'a> {
        ClickRequest {
            selector: None,
            button_text: Some(button_text),
            validated: None,
            force_on_timeout: true,
            use_generic_fallback: false,
        }
    }

    /// The safety predicate property: candidates it rejects are never clicked.
    #[tokio::test]
    async fn unsafe_candidates_are_never_clicked() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::link("main", "Sign in now", "/login")],
        );
        let config = OverlayConfig::default();
        let clicker = SafeClicker::new(&page, &config);

        let outcome = clicker.click_dismiss(&request("Sign in now")).await.unwrap();

        assert!(matches!(outcome, ClickOutcome::NotClicked));
        assert_eq!(page.click_count(), 0);
    }

    #[tokio::test]
    async fn predicate_timeout_clicks_when_forced() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::button("main", "Accept").predicate_times_out().dismisses()],
        );
        let config = OverlayConfig::default();
        let clicker = SafeClicker::new(&page, &config);

        let outcome = clicker.click_dismiss(&request("Accept")).await.unwrap();

        assert!(matches!(outcome, ClickOutcome::Clicked(_)));
        assert_eq!(page.click_count(), 1);
    }

    #[tokio::test]
    async fn predicate_timeout_skips_when_not_forced() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::button("main", "Accept").predicate_times_out()],
        );
        let config = OverlayConfig::default();
        let clicker = SafeClicker::new(&page, &config);

        let mut req = request("Accept");
        req.force_on_timeout = false;
        let outcome = clicker.click_dismiss(&req).await.unwrap();

        assert!(matches!(outcome, ClickOutcome::NotClicked));
        assert_eq!(page.click_count(), 0);
    }

    /// A click that slips past the predicate but changes the page URL is
    /// reverted and counted as failed.
    #[tokio::test]
    async fn navigating_click_is_reverted() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::button("main", "Continue")
                .navigates_to("https://www.example.com/upsell")],
        );
        let config = OverlayConfig::default();
        let clicker = SafeClicker::new(&page, &config);

        let outcome = clicker.click_dismiss(&request("Continue")).await.unwrap();

        assert!(matches!(outcome, ClickOutcome::NotClicked));
        assert_eq!(page.current(), PAGE_URL);
    }

    /// Generic heuristics run on the main frame only, never inside iframes.
    #[tokio::test]
    async fn generic_fallback_ignores_iframe_buttons() {
        let frames = vec![
            main_frame(PAGE_URL),
            sub_frame("cmp", "https://cmp.consensu.org/dialog"),
        ];
        // The only accept-ish button lives in the CMP iframe
        let page = FakePage::new(
            PAGE_URL,
            frames,
            vec![FakeElement::button("cmp", "Accept all").dismisses()],
        );
        let config = OverlayConfig::default();
        let clicker = SafeClicker::new(&page, &config);

        let req = ClickRequest {
            selector: None,
            button_text: Some("Nonexistent Control"),
            validated: None,
            force_on_timeout: true,
            use_generic_fallback: true,
        };
        let outcome = clicker.click_dismiss(&req).await.unwrap();

        assert!(matches!(outcome, ClickOutcome::NotClicked));
        assert_eq!(page.click_count(), 0);
    }

    /// Generic CSS fallbacks fire on the main frame when text matching fails.
    #[tokio::test]
    async fn generic_css_fallback_clicks_known_cmp_selector() {
        let mut accept = FakeElement::button("main", "\u{1F36A}").dismisses();
        accept = accept.with_css("#onetrust-accept-btn-handler");
        let page = FakePage::single(PAGE_URL, vec![accept]);
        let config = OverlayConfig::default();
        let clicker = SafeClicker::new(&page, &config);

        let req = ClickRequest {
            selector: None,
            button_text: Some("Nonexistent Control"),
            validated: None,
            force_on_timeout: true,
            use_generic_fallback: true,
        };
        let outcome = clicker.click_dismiss(&req).await.unwrap();

        match outcome {
            ClickOutcome::Clicked(clicked) => assert!(clicked.generic),
            ClickOutcome::NotClicked => panic!("generic CSS fallback should have clicked"),
        }
    }
}

mod locator {
    use super::*;

    #[tokio::test]
    async fn main_frame_wins_over_consent_frame() {
        let frames = vec![
            main_frame(PAGE_URL),
            sub_frame("cmp", "https://consent.example-cmp.net/dialog"),
        ];
        let page = FakePage::new(
            PAGE_URL,
            frames,
            vec![
                FakeElement::button("cmp", "Accept"),
                FakeElement::button("main", "Accept"),
            ],
        );

        let locator = ElementLocator::new(&page);
        let located = locator.locate(None, Some("Accept")).await.unwrap().unwrap();

        assert!(located.frame.is_main);
        assert_eq!(page.click_count(), 0);
    }

    #[tokio::test]
    async fn consent_frame_is_searched_when_main_misses() {
        let frames = vec![
            main_frame(PAGE_URL),
            sub_frame("cmp", "https://cdn.cookielaw.org/dialog"),
        ];
        let page = FakePage::new(
            PAGE_URL,
            frames,
            vec![FakeElement::button("cmp", "Reject All")],
        );

        let locator = ElementLocator::new(&page);
        let located = locator.locate(None, Some("Reject All")).await.unwrap().unwrap();

        assert_eq!(located.frame.frame_id, "cmp");
    }

    /// Ad-tech sync-pixel frames are excluded even when their URL carries
    /// consent-ish query parameters.
    #[tokio::test]
    async fn sync_pixel_frames_are_never_searched() {
        let frames = vec![
            main_frame(PAGE_URL),
            sub_frame("ad", "https://sync.adnxs.com/pixel?gdpr=1&consent=abc"),
        ];
        let page = FakePage::new(
            PAGE_URL,
            frames,
            vec![FakeElement::button("ad", "Accept")],
        );

        let locator = ElementLocator::new(&page);
        let located = locator.locate(None, Some("Accept")).await.unwrap();

        assert!(located.is_none());
    }

    #[tokio::test]
    async fn hidden_elements_do_not_validate() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::button("main", "Accept").hidden()],
        );

        let locator = ElementLocator::new(&page);
        let located = locator.locate(None, Some("Accept")).await.unwrap();

        assert!(located.is_none());
    }

    #[tokio::test]
    async fn pseudo_selector_falls_back_to_extracted_text() {
        let page = FakePage::single(PAGE_URL, vec![FakeElement::button("main", "Reject All")]);

        let locator = ElementLocator::new(&page);
        let located = locator
            .locate(Some("button:has-text(\"Reject All\")"), None)
            .await
            .unwrap()
            .unwrap();

        assert!(located.frame.is_main);
    }
}

mod expander {
    use super::*;

    fn consent_dialog_elements() -> Vec<FakeElement> {
        vec![
            FakeElement::button("main", "Manage options").dismisses(),
            FakeElement::button("main", "Our partners"),
            FakeElement::button("main", "Legitimate interest"),
            FakeElement::button("main", "Load more"),
            FakeElement::button("main", "Vendor: Example Ads GmbH"),
            FakeElement::button("main", "Back to consent"),
        ]
    }

    #[tokio::test]
    async fn full_expansion_harvests_and_returns() {
        let page = FakePage::single(PAGE_URL, consent_dialog_elements());
        let classifier = FakeClassifier::silent();
        let config = OverlayConfig::default();

        let expander = DialogExpander::new(&page, &classifier, &config);
        let details = expander.expand().await;

        assert!(details.expanded_manage);
        assert!(details.expanded_partners);
        assert!(details.expanded_legitimate_interest);
        assert!(details.expanded_load_more);
        assert!(details
            .vendor_texts
            .iter()
            .any(|t| t.contains("Example Ads")));
        assert!(details.returned_to_consent);
        // Informational only: the expansion never re-invoked detection
        assert_eq!(classifier.detect_call_count(), 0);
    }

    /// An expansion control that is a real link gets its click reverted and
    /// is not counted as expanded.
    #[tokio::test]
    async fn navigating_expansion_click_is_reverted_and_skipped() {
        let page = FakePage::single(
            PAGE_URL,
            vec![
                FakeElement::button("main", "Our partners")
                    .navigates_to("https://partners.example.com/list"),
                FakeElement::button("main", "Back to consent"),
            ],
        );
        let classifier = FakeClassifier::silent();
        let config = OverlayConfig::default();

        let expander = DialogExpander::new(&page, &classifier, &config);
        let details = expander.expand().await;

        assert!(!details.expanded_partners);
        assert_eq!(page.current(), PAGE_URL);
    }

    /// A zero wall-clock budget aborts the expansion steps without failing.
    #[tokio::test]
    async fn exhausted_budget_skips_steps() {
        let page = FakePage::single(PAGE_URL, consent_dialog_elements());
        let classifier = FakeClassifier::silent();
        let config = OverlayConfig {
            expansion_budget_ms: 0,
            ..Default::default()
        };

        let expander = DialogExpander::new(&page, &classifier, &config);
        let details = expander.expand().await;

        assert!(!details.expanded_manage);
        assert!(!details.expanded_partners);
        // The close/return protocol still runs
        assert!(details.returned_to_consent);
    }

    /// When no ranked pattern and no Escape gets back, the navigation-help
    /// classifier names the exit button.
    #[tokio::test]
    async fn close_protocol_falls_back_to_classifier() {
        let page = FakePage::single(
            PAGE_URL,
            vec![FakeElement::button("main", "Apply filters")],
        );
        let classifier = FakeClassifier::silent().with_nav_hint("Apply filters");
        let config = OverlayConfig::default();

        let expander = DialogExpander::new(&page, &classifier, &config);
        let details = expander.expand().await;

        assert!(details.returned_to_consent);
        assert_eq!(classifier.nav_calls.load(Ordering::SeqCst), 1);
        // Escape was attempted along the way
        assert!(page.keys.lock().unwrap().iter().any(|k| k == "Escape"));
    }
}
