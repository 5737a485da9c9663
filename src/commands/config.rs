use colored::Colorize;

use crate::cli::{Cli, ConfigCommands};
use crate::config::Config;
use crate::error::{PageclearError, Result};

pub async fn run(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(cli).await,
        ConfigCommands::Set { key, value } => set(cli, key, value).await,
        ConfigCommands::Get { key } => get(cli, key).await,
        ConfigCommands::Path => path(cli).await,
    }
}

async fn show(cli: &Cli) -> Result<()> {
    let config = Config::load()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| PageclearError::ConfigError(e.to_string()))?;
        println!("{}", toml_str);
    }

    Ok(())
}

async fn set(_cli: &Cli, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    match key {
        "classifier.base_url" => config.classifier.base_url = value.to_string(),
        "classifier.api_key" => config.classifier.api_key = Some(value.to_string()),
        "browser.executable" => config.browser.executable = Some(value.to_string()),
        "browser.cdp_port" => {
            config.browser.cdp_port = value.parse().map_err(|_| {
                PageclearError::ConfigError("cdp_port must be a port number".to_string())
            })?
        }
        "browser.headless" => {
            config.browser.headless = value.parse().map_err(|_| {
                PageclearError::ConfigError("headless must be true or false".to_string())
            })?
        }
        "overlay.max_overlays" => {
            config.overlay.max_overlays = value.parse().map_err(|_| {
                PageclearError::ConfigError("max_overlays must be a number".to_string())
            })?
        }
        "overlay.cache_dir" => config.overlay.cache_dir = Some(value.to_string()),
        _ => {
            return Err(PageclearError::ConfigError(format!(
                "Unknown config key: {}",
                key
            )))
        }
    }

    config.save()?;
    println!("{} Set {} = {}", "✓".green(), key, value);

    Ok(())
}

async fn get(cli: &Cli, key: &str) -> Result<()> {
    let config = Config::load()?;

    let value = match key {
        "classifier.base_url" => Some(config.classifier.base_url.clone()),
        "classifier.api_key" => config.classifier.api_key.clone(),
        "browser.executable" => config.browser.executable.clone(),
        "browser.cdp_port" => Some(config.browser.cdp_port.to_string()),
        "browser.headless" => Some(config.browser.headless.to_string()),
        "overlay.max_overlays" => Some(config.overlay.max_overlays.to_string()),
        "overlay.cache_dir" => config.overlay.cache_dir.clone(),
        _ => {
            return Err(PageclearError::ConfigError(format!(
                "Unknown config key: {}",
                key
            )))
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "key": key,
                "value": value
            })
        );
    } else {
        match value {
            Some(v) => println!("{}", v),
            None => println!("{}", "(not set)".dimmed()),
        }
    }

    Ok(())
}

async fn path(cli: &Cli) -> Result<()> {
    let path = Config::config_path();

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string()
            })
        );
    } else {
        println!("{}", path.display());
    }

    Ok(())
}
