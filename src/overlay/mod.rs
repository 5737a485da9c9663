mod cache;
mod clicker;
mod expander;
mod locator;
mod patterns;
mod pipeline;

pub use cache::{AccessorType, CachedOverlay, OverlayCache, OverlayCacheEntry};
pub use clicker::{ClickOutcome, ClickRequest, ClickedWith, SafeClicker};
pub use expander::{ConsentDetails, DialogExpander};
pub use locator::{candidate_targets, ElementLocator, Located};
pub use patterns::{hostname_of, is_consent_host, matches_pattern, ButtonIntent};
pub use pipeline::{OverlayHandlingResult, OverlayPipeline, CERTAINTY_THRESHOLD};
