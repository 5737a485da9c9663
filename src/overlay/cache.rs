use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a cached strategy locates its element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessorType {
    ButtonRole,
    CssSelector,
    TextSearch,
    GenericClose,
}

/// One dismissal strategy known to have worked on a domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedOverlay {
    pub overlay_type: String,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    pub accessor_type: AccessorType,
}

impl CachedOverlay {
    /// Identity key for deduplication
    fn identity(&self) -> (Option<&str>, Option<&str>) {
        (self.selector.as_deref(), self.button_text.as_deref())
    }
}

/// All known strategies for one domain.
///
/// Logically an unordered set: a page may show only a subset of previously
/// seen overlays, so every entry is tried independently each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayCacheEntry {
    pub domain: String,
    pub overlays: Vec<CachedOverlay>,
}

impl OverlayCacheEntry {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            overlays: Vec::new(),
        }
    }

    /// Add a strategy unless one with the same `(selector, button_text)`
    /// key is already present. Returns whether it was added.
    pub fn push_dedup(&mut self, overlay: CachedOverlay) -> bool {
        if self
            .overlays
            .iter()
            .any(|o| o.identity() == overlay.identity())
        {
            return false;
        }
        self.overlays.push(overlay);
        true
    }

    fn dedup(&mut self) {
        let mut kept: Vec<CachedOverlay> = Vec::with_capacity(self.overlays.len());
        for overlay in self.overlays.drain(..) {
            if !kept.iter().any(|o| o.identity() == overlay.identity()) {
                kept.push(overlay);
            }
        }
        self.overlays = kept;
    }
}

/// Per-domain persisted dismissal strategies, one JSON file per domain
pub struct OverlayCache {
    dir: PathBuf,
}

impl OverlayCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `www.x.com` and `x.com` share state
    fn normalize_domain(domain: &str) -> String {
        let domain = domain.trim().to_lowercase();
        domain
            .strip_prefix("www.")
            .map(|d| d.to_string())
            .unwrap_or(domain)
    }

    /// Filename: normalized domain with anything outside `[a-z0-9.-]`
    /// replaced by `_`, capped at 100 characters
    fn file_for(&self, domain: &str) -> PathBuf {
        let normalized = Self::normalize_domain(domain);
        let mut name: String = normalized
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        name.truncate(100);
        self.dir.join(format!("{}.json", name))
    }

    /// Load the entry for a domain. A malformed file is deleted and treated
    /// as absent: the cache never blocks the pipeline.
    pub fn load(&self, domain: &str) -> Option<OverlayCacheEntry> {
        let path = self.file_for(domain);
        if !path.exists() {
            return None;
        }

        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<OverlayCacheEntry>(&content) {
            Ok(mut entry) => {
                entry.dedup();
                Some(entry)
            }
            Err(e) => {
                tracing::warn!("Discarding corrupt overlay cache file {:?}: {}", path, e);
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Persist an entry, deduplicated, replacing any prior file for the
    /// domain. The write goes to a temp file first and is renamed into
    /// place, so concurrent writers can only supersede whole files.
    pub fn save(&self, entry: &OverlayCacheEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let mut entry = entry.clone();
        entry.domain = Self::normalize_domain(&entry.domain);
        entry.dedup();

        let path = self.file_for(&entry.domain);
        let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp, serde_json::to_string_pretty(&entry)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Drop the entry for a domain (used when cached strategies stop working)
    pub fn remove(&self, domain: &str) -> Result<()> {
        let path = self.file_for(domain);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Domains with a cache entry on disk
    pub fn list_domains(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut domains = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(entry) = serde_json::from_str::<OverlayCacheEntry>(&content) {
                    domains.push(entry.domain);
                }
            }
        }
        domains.sort();
        Ok(domains)
    }

    #[allow(dead_code)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
