use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Reference to one frame of the live page.
///
/// Valid only for the current navigation. Never cached or persisted — only
/// the strategy that located something in a frame is remembered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub frame_id: String,
    pub url: String,
    pub is_main: bool,
}

/// How to resolve an element inside a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementTarget {
    /// Plain CSS selector
    Css(String),
    /// Element with button role (tag or ARIA) whose accessible text matches
    ButtonRole(String),
    /// Any element whose visible text matches
    Text(String),
}

impl ElementTarget {
    pub fn describe(&self) -> String {
        match self {
            ElementTarget::Css(s) => format!("css `{}`", s),
            ElementTarget::ButtonRole(t) => format!("button \"{}\"", t),
            ElementTarget::Text(t) => format!("text \"{}\"", t),
        }
    }
}

/// Cookie as captured from the cleared page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Storage state captured once the page is clean, handed to the downstream
/// analysis as part of the pipeline result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    pub cookies: Vec<CookieRecord>,
    pub local_storage_keys: Vec<String>,
}

/// Capability surface over a live page.
///
/// The overlay engine depends only on this trait; the CDP driver and the
/// scripted test double both implement it. "Not found" outcomes are values
/// (`false` / `None`), never errors — errors are reserved for transport loss.
#[async_trait]
pub trait FrameQuery: Send + Sync {
    /// All frames of the current page, main frame first.
    async fn list_frames(&self) -> Result<Vec<FrameInfo>>;

    /// Whether a matching, visible element exists in the frame.
    async fn find_visible(&self, frame: &FrameInfo, target: &ElementTarget) -> Result<bool>;

    /// Read an attribute off the first matching element.
    async fn attribute(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        name: &str,
    ) -> Result<Option<String>>;

    /// Visible text of the first matching element.
    async fn text_content(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
    ) -> Result<Option<String>>;

    /// Evaluate a boolean expression against the first matching element.
    /// `None` means the evaluation did not finish within `timeout`
    /// (cross-origin frame, detached element, slow page).
    async fn evaluate_on(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        expression: &str,
        timeout: Duration,
    ) -> Result<Option<bool>>;

    /// Click the first matching element. Returns whether a click was issued.
    async fn click(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        timeout: Duration,
    ) -> Result<bool>;

    /// Texts of all visible button-like controls in the frame.
    async fn visible_button_texts(&self, frame: &FrameInfo) -> Result<Vec<String>>;

    /// URL of the top-level page.
    async fn current_url(&self) -> Result<String>;

    /// Navigate the top-level page back one history entry.
    async fn go_back(&self) -> Result<()>;

    /// Sleep for a fixed duration.
    async fn wait(&self, duration: Duration);

    /// Press a keyboard key against the page.
    async fn press_key(&self, key: &str) -> Result<()>;

    /// Screenshot of the current viewport (PNG bytes).
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Cookies and local-storage keys of the current page.
    async fn storage_snapshot(&self) -> Result<StorageSnapshot>;
}
