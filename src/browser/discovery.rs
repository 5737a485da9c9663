use std::path::PathBuf;
use std::process::Command;

use crate::error::{PageclearError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Brave,
    Edge,
    Chromium,
}

impl BrowserKind {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "Google Chrome",
            BrowserKind::Brave => "Brave",
            BrowserKind::Edge => "Microsoft Edge",
            BrowserKind::Chromium => "Chromium",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserInfo {
    pub kind: BrowserKind,
    pub path: PathBuf,
    pub version: Option<String>,
}

impl BrowserInfo {
    pub fn new(kind: BrowserKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            version: None,
        }
    }

    pub fn with_version(mut self) -> Self {
        self.version = detect_version(&self.path);
        self
    }
}

/// Discover the best available browser on the system
pub fn discover_browser() -> Result<BrowserInfo> {
    discover_all_browsers()
        .into_iter()
        .next()
        .ok_or(PageclearError::BrowserNotFound)
}

/// Discover all available browsers, highest priority first
pub fn discover_all_browsers() -> Vec<BrowserInfo> {
    let mut found = Vec::new();

    for (kind, paths, bin_names) in browser_candidates() {
        let hit = paths
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .or_else(|| bin_names.iter().find_map(|n| which::which(n).ok()));

        if let Some(path) = hit {
            found.push(BrowserInfo::new(kind, path).with_version());
        }
    }

    found
}

/// Candidate install locations and PATH binary names per platform
fn browser_candidates() -> Vec<(BrowserKind, Vec<&'static str>, Vec<&'static str>)> {
    #[cfg(target_os = "macos")]
    {
        vec![
            (
                BrowserKind::Chrome,
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                ],
                vec![],
            ),
            (
                BrowserKind::Brave,
                vec![
                    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
                    "~/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
                ],
                vec![],
            ),
            (
                BrowserKind::Edge,
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"],
                vec![],
            ),
            (
                BrowserKind::Chromium,
                vec!["/Applications/Chromium.app/Contents/MacOS/Chromium"],
                vec![],
            ),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            (
                BrowserKind::Chrome,
                vec!["/usr/bin/google-chrome", "/usr/bin/google-chrome-stable"],
                vec!["google-chrome", "google-chrome-stable"],
            ),
            (
                BrowserKind::Brave,
                vec!["/usr/bin/brave-browser", "/usr/bin/brave"],
                vec!["brave-browser"],
            ),
            (
                BrowserKind::Edge,
                vec!["/usr/bin/microsoft-edge", "/usr/bin/microsoft-edge-stable"],
                vec!["microsoft-edge"],
            ),
            (
                BrowserKind::Chromium,
                vec![
                    "/usr/bin/chromium",
                    "/usr/bin/chromium-browser",
                    "/snap/bin/chromium",
                ],
                vec!["chromium", "chromium-browser"],
            ),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            (
                BrowserKind::Chrome,
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ],
                vec!["chrome"],
            ),
            (
                BrowserKind::Brave,
                vec![
                    r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
                ],
                vec!["brave"],
            ),
            (
                BrowserKind::Edge,
                vec![
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                ],
                vec!["msedge"],
            ),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec![]
    }
}

/// Detect browser version from `--version` output
fn detect_version(path: &PathBuf) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;

    if !output.status.success() {
        return None;
    }

    let version = String::from_utf8_lossy(&output.stdout);
    let version = version.trim();
    // "Google Chrome 120.0.6099.109" -> "120.0.6099.109"
    match version.rfind(' ') {
        Some(idx) => Some(version[idx + 1..].to_string()),
        None => Some(version.to_string()),
    }
}
