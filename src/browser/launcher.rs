use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::time::sleep;

use super::discovery::{discover_browser, BrowserInfo, BrowserKind};
use crate::config::BrowserConfig;
use crate::error::{PageclearError, Result};

/// Launches a Chromium-family browser with CDP enabled
pub struct BrowserLauncher {
    browser_info: BrowserInfo,
    cdp_port: u16,
    headless: bool,
    user_data_dir: PathBuf,
}

impl BrowserLauncher {
    /// Create a launcher from browser configuration
    pub fn from_config(config: &BrowserConfig) -> Result<Self> {
        let browser_info = match config.executable {
            Some(ref path) => {
                let path = PathBuf::from(shellexpand::tilde(path).to_string());
                if !path.exists() {
                    return Err(PageclearError::BrowserLaunchFailed(format!(
                        "Browser not found at: {:?}",
                        path
                    )));
                }
                // Assume Chrome-compatible flags for explicit paths
                BrowserInfo::new(BrowserKind::Chrome, path)
            }
            None => discover_browser()?,
        };

        let user_data_dir = match config.user_data_dir {
            Some(ref dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pageclear")
                .join("profile"),
        };

        Ok(Self {
            browser_info,
            cdp_port: config.cdp_port,
            headless: config.headless,
            user_data_dir,
        })
    }

    /// Build the browser launch arguments
    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.cdp_port),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-infobars".to_string(),
            "--window-size=1440,1024".to_string(),
            "--disable-save-password-bubble".to_string(),
            "--disable-translate".to_string(),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args
    }

    /// Launch the browser process
    pub fn launch(&self) -> Result<Child> {
        std::fs::create_dir_all(&self.user_data_dir)?;

        let args = self.build_args();

        tracing::debug!(
            "Launching browser: {:?} with args: {:?}",
            self.browser_info.path,
            args
        );

        let child = Command::new(&self.browser_info.path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                PageclearError::BrowserLaunchFailed(format!(
                    "Failed to launch {}: {}",
                    self.browser_info.kind.name(),
                    e
                ))
            })?;

        Ok(child)
    }

    /// Launch the browser and wait for CDP to answer
    pub async fn launch_and_wait(&self) -> Result<(Child, String)> {
        let child = self.launch()?;
        let cdp_url = self.wait_for_cdp().await?;
        Ok((child, cdp_url))
    }

    /// Poll /json/version until the CDP endpoint is ready
    async fn wait_for_cdp(&self) -> Result<String> {
        let url = format!("http://127.0.0.1:{}/json/version", self.cdp_port);

        // Bypass any configured proxy for localhost
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        for i in 0..20 {
            sleep(Duration::from_millis(500)).await;

            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let json: serde_json::Value = response.json().await.map_err(|e| {
                        PageclearError::CdpConnectionFailed(format!(
                            "Failed to parse CDP response: {}",
                            e
                        ))
                    })?;

                    if let Some(ws_url) = json.get("webSocketDebuggerUrl").and_then(|v| v.as_str())
                    {
                        tracing::info!("CDP ready at: {}", ws_url);
                        return Ok(ws_url.to_string());
                    }
                }
                Ok(_) => {
                    tracing::debug!("CDP not ready yet (attempt {})", i + 1);
                }
                Err(e) => {
                    tracing::debug!("CDP connection attempt {} failed: {}", i + 1, e);
                }
            }
        }

        Err(PageclearError::CdpConnectionFailed(
            "Timeout waiting for CDP to be ready".to_string(),
        ))
    }

    pub fn cdp_port(&self) -> u16 {
        self.cdp_port
    }

    pub fn browser_info(&self) -> &BrowserInfo {
        &self.browser_info
    }
}
