use clap::{Parser, Subcommand};

use crate::commands;
use crate::error::Result;

/// Pageclear CLI - Dismiss blocking overlays before page analysis
#[derive(Parser)]
#[command(name = "pageclear")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Browser executable path (overrides auto-discovery)
    #[arg(long, env = "PAGECLEAR_BROWSER_PATH", global = true)]
    pub browser_path: Option<String>,

    /// Run the browser headed (overlay debugging)
    #[arg(long, env = "PAGECLEAR_HEADED", global = true)]
    pub headed: bool,

    /// Classifier API key
    #[arg(long, env = "PAGECLEAR_API_KEY", global = true)]
    pub api_key: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Navigate to a URL and dismiss its blocking overlays
    Clear {
        /// URL to analyze
        url: String,

        /// Navigation timeout in milliseconds
        #[arg(long, default_value = "30000")]
        timeout: u64,

        /// Wall-clock budget for overlay handling in milliseconds; exceeding
        /// it is treated the same as a blocked page
        #[arg(long, default_value = "120000")]
        budget: u64,
    },

    /// Inspect the per-domain dismissal strategy cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage the analysis browser session
    Browser {
        #[command(subcommand)]
        command: BrowserCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List domains with cached strategies
    List,

    /// Show the cached strategies for a domain
    Show {
        /// Domain (e.g. "example.com")
        domain: String,
    },

    /// Drop the cached strategies for a domain
    Remove {
        /// Domain (e.g. "example.com")
        domain: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum BrowserCommands {
    /// Show browser session status
    Status,

    /// Close the browser session
    Close,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Show configuration file path
    Path,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Clear {
                url,
                timeout,
                budget,
            } => commands::clear::run(self, url, *timeout, *budget).await,
            Commands::Cache { command } => commands::cache::run(self, command).await,
            Commands::Browser { command } => commands::browser::run(self, command).await,
            Commands::Config { command } => commands::config::run(self, command).await,
        }
    }
}
