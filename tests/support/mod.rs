//! Scripted doubles for the overlay engine: a `FrameQuery` page whose
//! elements, safety verdicts, and navigation behavior are set up per test,
//! and a classifier that replays a canned detection script.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use pageclear::browser::{
    CookieRecord, ElementTarget, FrameInfo, FrameQuery, StorageSnapshot,
};
use pageclear::classifier::{
    Confidence, Detection, NavigationHint, OverlayClassifier, OverlayType,
};
use pageclear::error::{PageclearError, Result};

pub fn main_frame(url: &str) -> FrameInfo {
    FrameInfo {
        frame_id: "main".to_string(),
        url: url.to_string(),
        is_main: true,
    }
}

pub fn sub_frame(id: &str, url: &str) -> FrameInfo {
    FrameInfo {
        frame_id: id.to_string(),
        url: url.to_string(),
        is_main: false,
    }
}

fn norm(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub frame_id: String,
    pub css: Option<String>,
    pub text: Option<String>,
    pub button_like: bool,
    pub visible: bool,
    pub href: Option<String>,
    /// Safety predicate verdict; `None` simulates an evaluation timeout
    pub safe: Option<bool>,
    pub clickable: bool,
    pub present: bool,
    pub dismisses: bool,
    pub navigates_to: Option<String>,
}

impl FakeElement {
    /// A plain, safe, clickable button
    pub fn button(frame_id: &str, text: &str) -> Self {
        Self {
            frame_id: frame_id.to_string(),
            css: None,
            text: Some(text.to_string()),
            button_like: true,
            visible: true,
            href: None,
            safe: Some(true),
            clickable: true,
            present: true,
            dismisses: false,
            navigates_to: None,
        }
    }

    /// An anchor; safety follows the href like the real predicate does
    pub fn link(frame_id: &str, text: &str, href: &str) -> Self {
        let trimmed = href.trim();
        let safe = trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.to_lowercase().starts_with("javascript:void");
        Self {
            href: Some(href.to_string()),
            safe: Some(safe),
            ..Self::button(frame_id, text)
        }
    }

    pub fn with_css(mut self, css: &str) -> Self {
        self.css = Some(css.to_string());
        self
    }

    pub fn dismisses(mut self) -> Self {
        self.dismisses = true;
        self
    }

    pub fn navigates_to(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.to_string());
        self
    }

    pub fn unclickable(mut self) -> Self {
        self.clickable = false;
        self
    }

    pub fn predicate_times_out(mut self) -> Self {
        self.safe = None;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn matches(&self, target: &ElementTarget) -> bool {
        match target {
            ElementTarget::Css(sel) => self.css.as_deref() == Some(sel.as_str()),
            ElementTarget::ButtonRole(wanted) => {
                if !self.button_like {
                    return false;
                }
                match &self.text {
                    Some(text) => {
                        let text = norm(text);
                        let wanted = norm(wanted);
                        text == wanted || text.contains(&wanted)
                    }
                    None => false,
                }
            }
            ElementTarget::Text(wanted) => match &self.text {
                Some(text) => {
                    let text = norm(text);
                    let wanted = norm(wanted);
                    text == wanted || text.contains(&wanted)
                }
                None => false,
            },
        }
    }
}

pub struct FakePage {
    frames: Vec<FrameInfo>,
    elements: Mutex<Vec<FakeElement>>,
    url: Mutex<String>,
    history: Mutex<Vec<String>>,
    pub clicks: AtomicUsize,
    pub keys: Mutex<Vec<String>>,
    pub snapshot: StorageSnapshot,
}

impl FakePage {
    pub fn new(url: &str, frames: Vec<FrameInfo>, elements: Vec<FakeElement>) -> Self {
        Self {
            frames,
            elements: Mutex::new(elements),
            url: Mutex::new(url.to_string()),
            history: Mutex::new(vec![url.to_string()]),
            clicks: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
            snapshot: StorageSnapshot {
                cookies: vec![CookieRecord {
                    name: "sid".to_string(),
                    domain: ".example.com".to_string(),
                    path: Some("/".to_string()),
                }],
                local_storage_keys: Vec::new(),
            },
        }
    }

    /// Single-main-frame page
    pub fn single(url: &str, elements: Vec<FakeElement>) -> Self {
        Self::new(url, vec![main_frame(url)], elements)
    }

    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn find(&self, frame: &FrameInfo, target: &ElementTarget) -> Option<FakeElement> {
        self.elements
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.frame_id == frame.frame_id && e.present && e.matches(target))
            .cloned()
    }
}

#[async_trait]
impl FrameQuery for FakePage {
    async fn list_frames(&self) -> Result<Vec<FrameInfo>> {
        Ok(self.frames.clone())
    }

    async fn find_visible(&self, frame: &FrameInfo, target: &ElementTarget) -> Result<bool> {
        Ok(self.find(frame, target).map(|e| e.visible).unwrap_or(false))
    }

    async fn attribute(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        name: &str,
    ) -> Result<Option<String>> {
        Ok(self.find(frame, target).and_then(|e| match name {
            "href" => e.href.clone(),
            _ => None,
        }))
    }

    async fn text_content(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
    ) -> Result<Option<String>> {
        Ok(self.find(frame, target).and_then(|e| e.text.clone()))
    }

    async fn evaluate_on(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        _expression: &str,
        _timeout: Duration,
    ) -> Result<Option<bool>> {
        match self.find(frame, target) {
            Some(element) => Ok(element.safe),
            None => Ok(None),
        }
    }

    async fn click(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        _timeout: Duration,
    ) -> Result<bool> {
        let Some(found) = self.find(frame, target) else {
            return Ok(false);
        };
        if !found.clickable {
            return Ok(false);
        }

        self.clicks.fetch_add(1, Ordering::SeqCst);

        if let Some(ref destination) = found.navigates_to {
            let mut url = self.url.lock().unwrap();
            *url = destination.clone();
            self.history.lock().unwrap().push(destination.clone());
        }

        if found.dismisses {
            let mut elements = self.elements.lock().unwrap();
            if let Some(e) = elements
                .iter_mut()
                .find(|e| e.frame_id == frame.frame_id && e.present && e.matches(target))
            {
                e.present = false;
            }
        }

        Ok(true)
    }

    async fn visible_button_texts(&self, frame: &FrameInfo) -> Result<Vec<String>> {
        Ok(self
            .elements
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.frame_id == frame.frame_id && e.present && e.visible && e.button_like)
            .filter_map(|e| e.text.clone())
            .collect())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn go_back(&self) -> Result<()> {
        let mut history = self.history.lock().unwrap();
        if history.len() > 1 {
            history.pop();
            *self.url.lock().unwrap() = history.last().unwrap().clone();
        }
        Ok(())
    }

    async fn wait(&self, _duration: Duration) {}

    async fn press_key(&self, key: &str) -> Result<()> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }

    async fn storage_snapshot(&self) -> Result<StorageSnapshot> {
        Ok(self.snapshot.clone())
    }
}

pub struct FakeClassifier {
    script: Mutex<VecDeque<Detection>>,
    repeat_last: bool,
    pub detect_calls: AtomicUsize,
    pub nav_calls: AtomicUsize,
    nav_hint: Option<NavigationHint>,
}

impl FakeClassifier {
    /// Replays the given detections in order, then reports nothing found
    pub fn scripted(detections: Vec<Detection>) -> Self {
        Self {
            script: Mutex::new(detections.into()),
            repeat_last: false,
            detect_calls: AtomicUsize::new(0),
            nav_calls: AtomicUsize::new(0),
            nav_hint: None,
        }
    }

    /// Reports the same detection on every call
    pub fn always(detection: Detection) -> Self {
        Self {
            script: Mutex::new(vec![detection].into()),
            repeat_last: true,
            detect_calls: AtomicUsize::new(0),
            nav_calls: AtomicUsize::new(0),
            nav_hint: None,
        }
    }

    /// Never detects anything
    pub fn silent() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn with_nav_hint(mut self, button_text: &str) -> Self {
        self.nav_hint = Some(NavigationHint {
            button_text: Some(button_text.to_string()),
            selector: None,
            confidence: Confidence::High,
            reason: String::new(),
        });
        self
    }

    pub fn detect_call_count(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OverlayClassifier for FakeClassifier {
    async fn detect_overlay(&self, _screenshot: &[u8], _page_url: &str) -> Result<Detection> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if self.repeat_last {
            if let Some(front) = script.front() {
                return Ok(front.clone());
            }
        }
        Ok(script
            .pop_front()
            .unwrap_or_else(|| Detection::not_found("script exhausted")))
    }

    async fn navigation_help(
        &self,
        _screenshot: &[u8],
        _button_texts: &[String],
    ) -> Result<NavigationHint> {
        self.nav_calls.fetch_add(1, Ordering::SeqCst);
        self.nav_hint.clone().ok_or_else(|| {
            PageclearError::ClassifierError("no navigation hint scripted".to_string())
        })
    }
}

pub fn detection(
    overlay_type: OverlayType,
    button_text: Option<&str>,
    selector: Option<&str>,
    confidence: Confidence,
) -> Detection {
    Detection {
        found: true,
        overlay_type: Some(overlay_type),
        button_text: button_text.map(String::from),
        selector: selector.map(String::from),
        confidence,
        reason: "scripted".to_string(),
    }
}
