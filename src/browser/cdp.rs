use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::Mutex;

use super::frame_query::{
    CookieRecord, ElementTarget, FrameInfo, FrameQuery, StorageSnapshot,
};
use super::session::CdpConnection;
use crate::error::{PageclearError, Result};

/// Live-browser implementation of [`FrameQuery`] over one page's CDP socket
pub struct CdpFrameQuery {
    conn: Mutex<CdpConnection>,
}

impl CdpFrameQuery {
    pub fn new(conn: CdpConnection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    /// JavaScript that defines `__pcFind(kind, value)` and `__pcVisible(el)`.
    ///
    /// `kind` is "css", "button", or "text". Button lookup matches the
    /// normalized accessible text of button-like elements; text lookup
    /// matches any element's own visible text, innermost match preferred.
    fn helper_js() -> &'static str {
        r#"
        function __pcNorm(s) {
            return (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
        }
        function __pcVisible(el) {
            if (!el) return false;
            if (el.hidden) return false;
            if (el.getAttribute && el.getAttribute('aria-hidden') === 'true') return false;
            const cs = getComputedStyle(el);
            if (cs.display === 'none' || cs.visibility === 'hidden') return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }
        function __pcIsButtonLike(el) {
            const tag = el.tagName.toLowerCase();
            if (tag === 'button') return true;
            if (tag === 'input') {
                const type = (el.getAttribute('type') || '').toLowerCase();
                return type === 'button' || type === 'submit' || type === 'reset';
            }
            const role = (el.getAttribute('role') || '').toLowerCase();
            if (role === 'button') return true;
            if (tag === 'a') return true;
            return false;
        }
        function __pcButtonText(el) {
            const tag = el.tagName.toLowerCase();
            if (tag === 'input') return el.value || el.getAttribute('aria-label') || '';
            return el.innerText || el.getAttribute('aria-label') || '';
        }
        function __pcFind(kind, value) {
            if (kind === 'css') {
                try { return document.querySelector(value); } catch (e) { return null; }
            }
            const wanted = __pcNorm(value);
            if (!wanted) return null;
            if (kind === 'button') {
                const candidates = document.querySelectorAll(
                    'button, input[type=button], input[type=submit], input[type=reset], [role=button], a');
                for (const el of candidates) {
                    if (!__pcIsButtonLike(el)) continue;
                    if (__pcNorm(__pcButtonText(el)) === wanted) return el;
                }
                // Fall back to a contains match on button-like elements only
                for (const el of candidates) {
                    if (!__pcIsButtonLike(el)) continue;
                    if (__pcNorm(__pcButtonText(el)).includes(wanted)) return el;
                }
                return null;
            }
            // Free-text search: innermost element whose own text matches
            const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT);
            let best = null;
            let node;
            while ((node = walker.nextNode())) {
                const text = __pcNorm(node.innerText);
                if (text !== wanted && !text.includes(wanted)) continue;
                if (node.innerText && node.innerText.length > value.length * 4) continue;
                best = node;
            }
            return best;
        }
        "#
    }

    fn target_args(target: &ElementTarget) -> Result<(String, String)> {
        let (kind, value) = match target {
            ElementTarget::Css(s) => ("css", s),
            ElementTarget::ButtonRole(t) => ("button", t),
            ElementTarget::Text(t) => ("text", t),
        };
        Ok((kind.to_string(), serde_json::to_string(value)?))
    }

    /// Execution context for a frame. Main frame uses the page's main world;
    /// subframes get a fresh isolated world so host-page globals cannot
    /// interfere with the helper functions.
    async fn context_for(
        conn: &mut CdpConnection,
        frame: &FrameInfo,
    ) -> Result<Option<i64>> {
        if frame.is_main {
            return Ok(None);
        }

        let result = conn
            .send(
                "Page.createIsolatedWorld",
                serde_json::json!({
                    "frameId": frame.frame_id,
                    "worldName": "__pageclear",
                }),
            )
            .await?;

        result
            .get("executionContextId")
            .and_then(|v| v.as_i64())
            .map(Some)
            .ok_or_else(|| {
                PageclearError::CdpConnectionFailed(
                    "No execution context for frame".to_string(),
                )
            })
    }

    /// Evaluate a script body wrapped with the helpers, in the frame's context
    async fn eval_in_frame(
        &self,
        frame: &FrameInfo,
        body: &str,
    ) -> Result<serde_json::Value> {
        let js = [
            "(function() {",
            Self::helper_js(),
            body,
            "})()",
        ]
        .join("\n");

        let mut conn = self.conn.lock().await;
        let context = Self::context_for(&mut conn, frame).await?;
        conn.evaluate_in_context(&js, context).await
    }

    fn walk_frame_tree(node: &serde_json::Value, is_main: bool, out: &mut Vec<FrameInfo>) {
        if let Some(frame) = node.get("frame") {
            let frame_id = frame
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let url = frame
                .get("url")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            out.push(FrameInfo {
                frame_id,
                url,
                is_main,
            });
        }
        if let Some(children) = node.get("childFrames").and_then(|v| v.as_array()) {
            for child in children {
                Self::walk_frame_tree(child, false, out);
            }
        }
    }
}

#[async_trait]
impl FrameQuery for CdpFrameQuery {
    async fn list_frames(&self) -> Result<Vec<FrameInfo>> {
        let mut conn = self.conn.lock().await;
        let tree = conn.send("Page.getFrameTree", serde_json::json!({})).await?;

        let mut frames = Vec::new();
        if let Some(root) = tree.get("frameTree") {
            Self::walk_frame_tree(root, true, &mut frames);
        }
        Ok(frames)
    }

    async fn find_visible(&self, frame: &FrameInfo, target: &ElementTarget) -> Result<bool> {
        let (kind, value) = Self::target_args(target)?;
        let body = format!(
            "const el = __pcFind('{kind}', {value});\nreturn !!(el && __pcVisible(el));"
        );

        let found = self.eval_in_frame(frame, &body).await?;
        Ok(found.as_bool().unwrap_or(false))
    }

    async fn attribute(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        name: &str,
    ) -> Result<Option<String>> {
        let (kind, value) = Self::target_args(target)?;
        let name_json = serde_json::to_string(name)?;
        let body = format!(
            "const el = __pcFind('{kind}', {value});\nreturn el ? el.getAttribute({name_json}) : null;"
        );

        let attr = self.eval_in_frame(frame, &body).await?;
        Ok(attr.as_str().map(|s| s.to_string()))
    }

    async fn text_content(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
    ) -> Result<Option<String>> {
        let (kind, value) = Self::target_args(target)?;
        let body = format!(
            "const el = __pcFind('{kind}', {value});\nreturn el ? (el.innerText || '').trim() : null;"
        );

        let text = self.eval_in_frame(frame, &body).await?;
        Ok(text.as_str().map(|s| s.to_string()))
    }

    async fn evaluate_on(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        expression: &str,
        timeout: Duration,
    ) -> Result<Option<bool>> {
        let (kind, value) = Self::target_args(target)?;
        let body = format!(
            "const el = __pcFind('{kind}', {value});\nif (!el) return null;\nreturn !!({expression});"
        );

        match tokio::time::timeout(timeout, self.eval_in_frame(frame, &body)).await {
            Ok(Ok(serde_json::Value::Bool(b))) => Ok(Some(b)),
            Ok(Ok(_)) => Ok(None),
            Ok(Err(PageclearError::JavaScriptError(e))) => {
                tracing::debug!("Predicate evaluation threw: {}", e);
                Ok(None)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn click(
        &self,
        frame: &FrameInfo,
        target: &ElementTarget,
        timeout: Duration,
    ) -> Result<bool> {
        let (kind, value) = Self::target_args(target)?;

        if frame.is_main {
            // Scroll into view and resolve viewport-center coordinates, then
            // dispatch a trusted mouse click. mouseMoved first so the browser
            // updates its hit-test target before the press.
            let body = format!(
                "const el = __pcFind('{kind}', {value});\n\
                 if (!el) return null;\n\
                 el.scrollIntoView({{ behavior: 'instant', block: 'center', inline: 'center' }});\n\
                 const rect = el.getBoundingClientRect();\n\
                 return {{ x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 }};"
            );

            let coords = match tokio::time::timeout(timeout, self.eval_in_frame(frame, &body)).await
            {
                Ok(result) => result?,
                Err(_) => return Ok(false),
            };

            if coords.is_null() {
                return Ok(false);
            }

            let x = coords.get("x").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let y = coords.get("y").and_then(|v| v.as_f64()).unwrap_or(0.0);

            let mut conn = self.conn.lock().await;
            for event_type in ["mouseMoved", "mousePressed", "mouseReleased"] {
                let mut params = serde_json::json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                });
                if event_type != "mouseMoved" {
                    params["button"] = serde_json::json!("left");
                    params["clickCount"] = serde_json::json!(1);
                }
                conn.send("Input.dispatchMouseEvent", params).await?;
            }
            return Ok(true);
        }

        // Subframe coordinates are relative to the frame viewport, not the
        // page, so a synthetic in-context click is used instead of mouse
        // event dispatch.
        let body = format!(
            "const el = __pcFind('{kind}', {value});\n\
             if (!el) return false;\n\
             el.scrollIntoView({{ behavior: 'instant', block: 'center', inline: 'center' }});\n\
             el.click();\n\
             return true;"
        );

        match tokio::time::timeout(timeout, self.eval_in_frame(frame, &body)).await {
            Ok(result) => Ok(result?.as_bool().unwrap_or(false)),
            Err(_) => Ok(false),
        }
    }

    async fn visible_button_texts(&self, frame: &FrameInfo) -> Result<Vec<String>> {
        let body = "\
            const texts = [];\n\
            const seen = new Set();\n\
            const candidates = document.querySelectorAll(\n\
                'button, input[type=button], input[type=submit], [role=button], a');\n\
            for (const el of candidates) {\n\
                if (!__pcVisible(el)) continue;\n\
                const text = __pcButtonText(el).replace(/\\s+/g, ' ').trim();\n\
                if (!text || text.length > 80 || seen.has(text)) continue;\n\
                seen.add(text);\n\
                texts.push(text);\n\
                if (texts.length >= 100) break;\n\
            }\n\
            return texts;";

        let result = self.eval_in_frame(frame, body).await?;
        let texts = result
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(texts)
    }

    async fn current_url(&self) -> Result<String> {
        let mut conn = self.conn.lock().await;
        let url = conn.evaluate("document.location.href").await?;
        Ok(url.as_str().unwrap_or_default().to_string())
    }

    async fn go_back(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let history = conn
            .send("Page.getNavigationHistory", serde_json::json!({}))
            .await?;

        let current_index = history
            .get("currentIndex")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        if current_index > 0 {
            if let Some(entries) = history.get("entries").and_then(|v| v.as_array()) {
                if let Some(entry) = entries.get((current_index - 1) as usize) {
                    if let Some(entry_id) = entry.get("id").and_then(|v| v.as_i64()) {
                        conn.send(
                            "Page.navigateToHistoryEntry",
                            serde_json::json!({ "entryId": entry_id }),
                        )
                        .await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        // Virtual key codes follow the Windows VK standard, cross-platform in CDP
        let (key_value, code, text, vk) = match key.to_lowercase().as_str() {
            "enter" | "return" => ("Enter", "Enter", "\r", 13),
            "tab" => ("Tab", "Tab", "\t", 9),
            "escape" | "esc" => ("Escape", "Escape", "", 27),
            "space" => (" ", "Space", " ", 32),
            "arrowup" | "up" => ("ArrowUp", "ArrowUp", "", 38),
            "arrowdown" | "down" => ("ArrowDown", "ArrowDown", "", 40),
            _ => (key, key, key, 0),
        };

        let mut key_down = serde_json::json!({
            "type": "keyDown",
            "key": key_value,
            "code": code,
            "windowsVirtualKeyCode": vk,
        });
        if !text.is_empty() {
            key_down["text"] = serde_json::json!(text);
        }

        let mut conn = self.conn.lock().await;
        conn.send("Input.dispatchKeyEvent", key_down).await?;
        conn.send(
            "Input.dispatchKeyEvent",
            serde_json::json!({
                "type": "keyUp",
                "key": key_value,
                "code": code,
                "windowsVirtualKeyCode": vk,
            }),
        )
        .await?;

        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let mut conn = self.conn.lock().await;
        let result = conn
            .send(
                "Page.captureScreenshot",
                serde_json::json!({ "format": "png" }),
            )
            .await?;

        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PageclearError::Other("No screenshot data".to_string()))?;

        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| PageclearError::Other(format!("Failed to decode screenshot: {}", e)))
    }

    async fn storage_snapshot(&self) -> Result<StorageSnapshot> {
        let mut conn = self.conn.lock().await;

        let result = conn
            .send("Network.getAllCookies", serde_json::json!({}))
            .await?;
        let cookies = result
            .get("cookies")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| {
                        Some(CookieRecord {
                            name: c.get("name")?.as_str()?.to_string(),
                            domain: c.get("domain")?.as_str()?.to_string(),
                            path: c.get("path").and_then(|v| v.as_str()).map(String::from),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let keys = conn
            .evaluate("JSON.stringify(Object.keys(window.localStorage || {}))")
            .await
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
            .unwrap_or_default();

        Ok(StorageSnapshot {
            cookies,
            local_storage_keys: keys,
        })
    }
}
