use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::browser::{CdpConnection, CdpFrameQuery, FrameQuery, SessionManager};
use crate::classifier::ClassifierClient;
use crate::cli::Cli;
use crate::error::{PageclearError, Result};
use crate::overlay::{OverlayCache, OverlayHandlingResult, OverlayPipeline};
use crate::watchdog::ScreenshotWatchdog;

pub async fn run(cli: &Cli, url: &str, timeout_ms: u64, budget_ms: u64) -> Result<()> {
    let config = super::load_config(cli)?;

    let spinner = if cli.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    spinner.set_message("Starting browser...");
    let session = SessionManager::new(config.browser.clone());
    session.ensure_running().await?;

    spinner.set_message(format!("Navigating to {}...", url));
    let page = session.open_page("about:blank").await?;
    let ws_url = page.web_socket_debugger_url.clone().ok_or_else(|| {
        PageclearError::CdpConnectionFailed("Page has no WebSocket URL".to_string())
    })?;

    let mut conn = CdpConnection::open(&ws_url).await?;
    conn.navigate(url, Duration::from_millis(timeout_ms)).await?;

    let frames: Arc<dyn FrameQuery> = Arc::new(CdpFrameQuery::new(conn));

    // Observe the page visually while it settles
    let watchdog = spawn_observer(frames.clone());
    frames.wait(Duration::from_millis(1_200)).await;

    // Suspend before overlay handling: the watchdog is signalled and awaited,
    // so no screenshot can describe a half-clicked state
    watchdog.suspend().await;

    spinner.set_message("Dismissing overlays...");
    let classifier = ClassifierClient::from_config(&config)?;
    let cache = OverlayCache::new(config.cache_dir());
    let pipeline = OverlayPipeline::new(frames.as_ref(), &classifier, &cache, &config.overlay);

    // Exceeding the wall-clock budget is reported the same as a blocked page
    let result = match tokio::time::timeout(Duration::from_millis(budget_ms), pipeline.run()).await
    {
        Ok(result) => result?,
        Err(_) => OverlayHandlingResult {
            overlay_count: 0,
            consent_details: None,
            failed: true,
            failure_message: Some(format!(
                "Overlay handling exceeded its {}ms budget",
                budget_ms
            )),
            final_storage: Default::default(),
        },
    };

    // Resume observation once handling is done, long enough for one clean
    // capture of the final state
    let watchdog = spawn_observer(frames.clone());
    frames.wait(Duration::from_millis(500)).await;
    watchdog.suspend().await;

    spinner.finish_and_clear();
    report(cli, url, &result)?;

    if result.failed {
        std::process::exit(1);
    }
    Ok(())
}

fn spawn_observer(frames: Arc<dyn FrameQuery>) -> ScreenshotWatchdog {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(8);
    tokio::spawn(async move {
        let mut captured = 0u32;
        while let Some(bytes) = rx.recv().await {
            captured += 1;
            tracing::trace!("Viewport frame {} captured ({} bytes)", captured, bytes.len());
        }
    });
    ScreenshotWatchdog::spawn(frames, Duration::from_secs(2), tx)
}

fn report(cli: &Cli, url: &str, result: &OverlayHandlingResult) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if result.failed {
        println!(
            "{} {}",
            "✗".red(),
            result
                .failure_message
                .as_deref()
                .unwrap_or("Could not dismiss overlay")
        );
        return Ok(());
    }

    println!(
        "{} Cleared {} overlay(s) on {}",
        "✓".green(),
        result.overlay_count,
        url
    );

    if let Some(ref details) = result.consent_details {
        let mut expanded = Vec::new();
        if details.expanded_manage {
            expanded.push("settings");
        }
        if details.expanded_partners {
            expanded.push("partners");
        }
        if details.expanded_legitimate_interest {
            expanded.push("legitimate interest");
        }
        if details.expanded_load_more {
            expanded.push("more vendors");
        }
        if !expanded.is_empty() {
            println!("  consent dialog expanded: {}", expanded.join(", "));
        }
        if !details.vendor_texts.is_empty() {
            println!("  vendor controls seen: {}", details.vendor_texts.len());
        }
        if !details.returned_to_consent {
            println!("  {}", "did not confirm return to consent view".dimmed());
        }
    }

    println!(
        "  cookies after clearing: {}",
        result.final_storage.cookies.len()
    );

    Ok(())
}
