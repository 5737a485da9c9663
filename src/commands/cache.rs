use colored::Colorize;
use dialoguer::Confirm;

use crate::cli::{CacheCommands, Cli};
use crate::error::{PageclearError, Result};
use crate::overlay::OverlayCache;

pub async fn run(cli: &Cli, command: &CacheCommands) -> Result<()> {
    let config = super::load_config(cli)?;
    let cache = OverlayCache::new(config.cache_dir());

    match command {
        CacheCommands::List => list(cli, &cache),
        CacheCommands::Show { domain } => show(cli, &cache, domain),
        CacheCommands::Remove { domain, yes } => remove(cli, &cache, domain, *yes),
    }
}

fn list(cli: &Cli, cache: &OverlayCache) -> Result<()> {
    let domains = cache.list_domains()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&domains)?);
        return Ok(());
    }

    if domains.is_empty() {
        println!("{}", "No cached dismissal strategies.".dimmed());
        return Ok(());
    }

    for domain in domains {
        println!("{}", domain);
    }
    Ok(())
}

fn show(cli: &Cli, cache: &OverlayCache, domain: &str) -> Result<()> {
    let entry = cache.load(domain).ok_or_else(|| {
        PageclearError::CacheError(format!("No cached strategies for {}", domain))
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    println!("{}", entry.domain.bold());
    for overlay in &entry.overlays {
        let locator = match (&overlay.selector, &overlay.button_text) {
            (Some(sel), Some(text)) => format!("{} / \"{}\"", sel, text),
            (Some(sel), None) => sel.clone(),
            (None, Some(text)) => format!("\"{}\"", text),
            (None, None) => "(empty)".to_string(),
        };
        println!(
            "  {} {} via {:?}",
            overlay.overlay_type.cyan(),
            locator,
            overlay.accessor_type
        );
    }
    Ok(())
}

fn remove(cli: &Cli, cache: &OverlayCache, domain: &str, yes: bool) -> Result<()> {
    if !yes && !cli.json {
        let confirm = Confirm::new()
            .with_prompt(format!("Drop cached strategies for {}?", domain))
            .default(false)
            .interact()
            .map_err(|e| PageclearError::Other(format!("Prompt failed: {}", e)))?;

        if !confirm {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    cache.remove(domain)?;

    if cli.json {
        println!("{}", serde_json::json!({ "status": "removed", "domain": domain }));
    } else {
        println!("{} Removed cached strategies for {}", "✓".green(), domain);
    }
    Ok(())
}
