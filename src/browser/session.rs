use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::Browser;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::launcher::BrowserLauncher;
use crate::config::BrowserConfig;
use crate::error::{PageclearError, Result};

/// Page info from CDP /json/list endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Session state persisted to disk
#[derive(Debug, Serialize, Deserialize)]
struct SessionState {
    cdp_port: u16,
    pid: Option<u32>,
    cdp_url: String,
}

#[derive(Debug)]
pub enum SessionStatus {
    Running { cdp_port: u16, cdp_url: String },
    Stale { cdp_port: u16 },
    NotRunning,
}

/// Manages the analysis browser across CLI invocations
pub struct SessionManager {
    browser_config: BrowserConfig,
    sessions_dir: PathBuf,
}

impl SessionManager {
    pub fn new(browser_config: BrowserConfig) -> Self {
        let sessions_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pageclear")
            .join("sessions");

        Self {
            browser_config,
            sessions_dir,
        }
    }

    fn session_file(&self) -> PathBuf {
        self.sessions_dir.join("browser.json")
    }

    fn load_session_state(&self) -> Option<SessionState> {
        let path = self.session_file();
        if path.exists() {
            let content = fs::read_to_string(&path).ok()?;
            serde_json::from_str(&content).ok()
        } else {
            None
        }
    }

    fn save_session_state(&self, state: &SessionState) -> Result<()> {
        fs::create_dir_all(&self.sessions_dir)?;
        let content = serde_json::to_string_pretty(state)?;
        fs::write(self.session_file(), content)?;
        Ok(())
    }

    fn remove_session_state(&self) -> Result<()> {
        let path = self.session_file();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn http_client() -> reqwest::Client {
        // Bypass any configured proxy for localhost
        reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }

    /// Check if a session is still alive
    async fn is_session_alive(&self, state: &SessionState) -> bool {
        let url = format!("http://127.0.0.1:{}/json/version", state.cdp_port);
        Self::http_client().get(&url).send().await.is_ok()
    }

    /// Fetch the current browser WebSocket URL from a CDP port.
    /// Returns `None` if the port is unreachable or the response is malformed.
    async fn fetch_browser_ws_url(&self, cdp_port: u16) -> Option<String> {
        let url = format!("http://127.0.0.1:{}/json/version", cdp_port);
        let resp = Self::http_client().get(&url).send().await.ok()?;
        let info: serde_json::Value = resp.json().await.ok()?;
        info.get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Reuse the persisted browser session or launch a fresh one
    pub async fn ensure_running(&self) -> Result<u16> {
        if let Some(mut state) = self.load_session_state() {
            if self.is_session_alive(&state).await {
                // The browser may have restarted on the same port, which
                // generates a new session ID and invalidates the cached URL.
                if let Some(fresh_url) = self.fetch_browser_ws_url(state.cdp_port).await {
                    if fresh_url != state.cdp_url {
                        tracing::debug!("CDP WebSocket URL changed, updating session");
                        state.cdp_url = fresh_url;
                        self.save_session_state(&state)?;
                    }
                }
                tracing::debug!("Reusing existing browser session");
                return Ok(state.cdp_port);
            }
            tracing::debug!("Persisted browser session is dead, removing");
            self.remove_session_state()?;
        }

        tracing::debug!("No running browser found, launching a new one");
        let launcher = BrowserLauncher::from_config(&self.browser_config)?;
        let (child, cdp_url) = launcher.launch_and_wait().await?;

        let state = SessionState {
            cdp_port: launcher.cdp_port(),
            pid: Some(child.id()),
            cdp_url,
        };
        self.save_session_state(&state)?;

        Ok(state.cdp_port)
    }

    /// Get browser status
    pub async fn status(&self) -> SessionStatus {
        match self.load_session_state() {
            Some(state) => {
                if self.is_session_alive(&state).await {
                    SessionStatus::Running {
                        cdp_port: state.cdp_port,
                        cdp_url: state.cdp_url,
                    }
                } else {
                    SessionStatus::Stale {
                        cdp_port: state.cdp_port,
                    }
                }
            }
            None => SessionStatus::NotRunning,
        }
    }

    /// Close the browser session gracefully
    pub async fn close(&self) -> Result<()> {
        if let Some(state) = self.load_session_state() {
            if let Ok((mut browser, mut handler)) = Browser::connect(&state.cdp_url).await {
                tokio::spawn(async move { while handler.next().await.is_some() {} });
                let _ = browser.close().await;
            }
            self.remove_session_state()?;
        }
        Ok(())
    }

    /// List open pages (tabs only, not extensions or workers)
    pub async fn pages(&self) -> Result<Vec<PageInfo>> {
        let state = self
            .load_session_state()
            .ok_or(PageclearError::BrowserNotRunning)?;

        let url = format!("http://127.0.0.1:{}/json/list", state.cdp_port);
        let response = Self::http_client().get(&url).send().await.map_err(|e| {
            PageclearError::CdpConnectionFailed(format!("Failed to list pages: {}", e))
        })?;

        let pages: Vec<PageInfo> = response.json().await.map_err(|e| {
            PageclearError::CdpConnectionFailed(format!("Failed to parse page list: {}", e))
        })?;

        Ok(pages
            .into_iter()
            .filter(|p| p.page_type == "page")
            .collect())
    }

    /// Open a new tab at the given URL and return its page info
    pub async fn open_page(&self, url: &str) -> Result<PageInfo> {
        let state = self
            .load_session_state()
            .ok_or(PageclearError::BrowserNotRunning)?;

        // Chrome 111+ requires PUT for /json/new
        let endpoint = format!("http://127.0.0.1:{}/json/new?{}", state.cdp_port, url);
        let response = Self::http_client()
            .put(&endpoint)
            .send()
            .await
            .map_err(|e| {
                PageclearError::CdpConnectionFailed(format!("Failed to open page: {}", e))
            })?;

        response.json().await.map_err(|e| {
            PageclearError::CdpConnectionFailed(format!("Failed to parse page info: {}", e))
        })
    }
}

/// A WebSocket carrying sequenced CDP commands to one page.
///
/// The connection is held open for the lifetime of an analysis run; command
/// ids correlate responses, CDP events interleaved on the socket are skipped.
pub struct CdpConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: i64,
}

impl CdpConnection {
    pub async fn open(ws_url: &str) -> Result<Self> {
        let (ws, _) = connect_async(ws_url).await.map_err(|e| {
            PageclearError::CdpConnectionFailed(format!("WebSocket connection failed: {}", e))
        })?;

        Ok(Self { ws, next_id: 1 })
    }

    /// Send one CDP command and wait for its response
    pub async fn send(&mut self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id;
        self.next_id += 1;

        let cmd = serde_json::json!({
            "id": id,
            "method": method,
            "params": params
        });

        self.ws
            .send(Message::Text(cmd.to_string().into()))
            .await
            .map_err(|e| PageclearError::Other(format!("Failed to send command: {}", e)))?;

        while let Some(msg) = self.ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let response: serde_json::Value = serde_json::from_str(text.as_str())?;
                    if response.get("id") == Some(&serde_json::json!(id)) {
                        if let Some(error) = response.get("error") {
                            return Err(PageclearError::Other(format!("CDP error: {}", error)));
                        }
                        return Ok(response
                            .get("result")
                            .cloned()
                            .unwrap_or(serde_json::Value::Null));
                    }
                    // Interleaved event or stale response; keep reading
                }
                Ok(_) => continue,
                Err(e) => return Err(PageclearError::Other(format!("WebSocket error: {}", e))),
            }
        }

        Err(PageclearError::Other("No response received".to_string()))
    }

    /// Evaluate a JavaScript expression in the page's main world
    pub async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value> {
        self.evaluate_in_context(expression, None).await
    }

    /// Evaluate a JavaScript expression, optionally inside a specific
    /// execution context (an isolated world created for a frame)
    pub async fn evaluate_in_context(
        &mut self,
        expression: &str,
        context_id: Option<i64>,
    ) -> Result<serde_json::Value> {
        let mut params = serde_json::json!({
            "expression": expression,
            "returnByValue": true
        });
        if let Some(ctx) = context_id {
            params["contextId"] = serde_json::json!(ctx);
        }

        let result = self.send("Runtime.evaluate", params).await?;

        if let Some(exception) = result.get("exceptionDetails") {
            return Err(PageclearError::JavaScriptError(exception.to_string()));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Navigate the page and poll until the new document is ready. The old
    /// document reports `readyState == "complete"` too, so readiness only
    /// counts once the location has left the starting URL.
    pub async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<String> {
        let initial = self
            .evaluate("document.location.href")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();

        self.send("Page.navigate", serde_json::json!({ "url": url }))
            .await?;

        let start = std::time::Instant::now();
        loop {
            tokio::time::sleep(Duration::from_millis(200)).await;

            let ready = self.evaluate("document.readyState").await?;
            let current = self
                .evaluate("document.location.href")
                .await?
                .as_str()
                .unwrap_or_default()
                .to_string();

            if ready.as_str() == Some("complete") && current != initial {
                return Ok(current);
            }

            if start.elapsed() > timeout {
                return Err(PageclearError::Timeout(format!(
                    "Navigation to {} did not complete within {:?}",
                    url, timeout
                )));
            }
        }
    }
}
