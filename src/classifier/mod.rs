mod client;
mod types;

pub use client::ClassifierClient;
pub use types::{Confidence, Detection, NavigationHint, OverlayType};

use async_trait::async_trait;

use crate::error::Result;

/// Black-box vision classifier: screenshot in, structured detection out.
///
/// Constructed once per analysis run and injected into the pipeline, so the
/// live HTTP client and scripted test doubles swap freely.
#[async_trait]
pub trait OverlayClassifier: Send + Sync {
    /// Ask whether a blocking overlay is visible in the screenshot.
    async fn detect_overlay(&self, screenshot: &[u8], page_url: &str) -> Result<Detection>;

    /// Ask which of the currently visible buttons returns to the main
    /// consent view. Used only by the dialog expansion sub-protocol.
    async fn navigation_help(
        &self,
        screenshot: &[u8],
        button_texts: &[String],
    ) -> Result<NavigationHint>;
}
