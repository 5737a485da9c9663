use colored::Colorize;

use crate::browser::{SessionManager, SessionStatus};
use crate::cli::{BrowserCommands, Cli};
use crate::error::Result;

pub async fn run(cli: &Cli, command: &BrowserCommands) -> Result<()> {
    let config = super::load_config(cli)?;
    let session = SessionManager::new(config.browser);

    match command {
        BrowserCommands::Status => status(cli, &session).await,
        BrowserCommands::Close => close(cli, &session).await,
    }
}

async fn status(cli: &Cli, session: &SessionManager) -> Result<()> {
    let status = session.status().await;

    if cli.json {
        let value = match &status {
            SessionStatus::Running { cdp_port, cdp_url } => serde_json::json!({
                "status": "running",
                "cdpPort": cdp_port,
                "cdpUrl": cdp_url,
            }),
            SessionStatus::Stale { cdp_port } => serde_json::json!({
                "status": "stale",
                "cdpPort": cdp_port,
            }),
            SessionStatus::NotRunning => serde_json::json!({ "status": "not_running" }),
        };
        println!("{}", value);
        return Ok(());
    }

    match status {
        SessionStatus::Running { cdp_port, .. } => {
            println!("{} Browser running on CDP port {}", "✓".green(), cdp_port);
        }
        SessionStatus::Stale { cdp_port } => {
            println!(
                "{} Stale session on CDP port {} (browser not responding)",
                "!".yellow(),
                cdp_port
            );
        }
        SessionStatus::NotRunning => {
            println!("{}", "No browser session.".dimmed());
        }
    }
    Ok(())
}

async fn close(cli: &Cli, session: &SessionManager) -> Result<()> {
    session.close().await?;

    if cli.json {
        println!("{}", serde_json::json!({ "status": "closed" }));
    } else {
        println!("{} Browser session closed", "✓".green());
    }
    Ok(())
}
