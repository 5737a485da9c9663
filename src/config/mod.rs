mod overlay;

pub use overlay::OverlayConfig;

use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{PageclearError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Vision classifier API configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Browser configuration
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Overlay engine tuning
    #[serde(default)]
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Classifier API base URL
    #[serde(default = "default_classifier_url")]
    pub base_url: String,

    /// API key
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_classifier_url(),
            api_key: None,
            timeout_secs: default_classifier_timeout_secs(),
        }
    }
}

fn default_classifier_url() -> String {
    "https://api.pageclear.dev".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Browser executable path (overrides auto-discovery)
    pub executable: Option<String>,

    /// CDP port for the managed browser
    #[serde(default = "default_cdp_port")]
    pub cdp_port: u16,

    /// User data directory for the managed browser
    pub user_data_dir: Option<String>,

    /// Default headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            cdp_port: default_cdp_port(),
            user_data_dir: None,
            headless: default_headless(),
        }
    }
}

fn default_cdp_port() -> u16 {
    9222
}

fn default_headless() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            browser: BrowserConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from all sources (file, env, defaults)
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let config: Config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Merge config file if exists
            .merge(Toml::file(&config_path))
            // Merge environment variables (PAGECLEAR_*)
            .merge(Env::prefixed("PAGECLEAR_").split("_"))
            .extract()
            .map_err(|e| PageclearError::ConfigError(e.to_string()))?;

        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pageclear")
            .join("config.toml")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PageclearError::ConfigError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory holding the per-domain overlay strategy cache
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.overlay.cache_dir {
            return PathBuf::from(shellexpand::tilde(dir).to_string());
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pageclear")
            .join("overlay-cache")
    }
}
