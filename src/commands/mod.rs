pub mod browser;
pub mod cache;
pub mod clear;
pub mod config;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;

/// Load configuration with CLI flag overrides applied
pub(crate) fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;

    if let Some(ref path) = cli.browser_path {
        config.browser.executable = Some(path.clone());
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(ref key) = cli.api_key {
        config.classifier.api_key = Some(key.clone());
    }

    Ok(config)
}
