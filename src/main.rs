use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pageclear::cli::Cli;
use pageclear::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with filters to suppress noisy CDP transport errors.
    // These are harmless - they occur when the browser sends CDP events the
    // client libraries don't recognize (common with newer Chrome versions)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("chromiumoxide::conn=warn".parse().unwrap())
            .add_directive("chromiumoxide::handler=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap())
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let cli = Cli::parse();
    cli.run().await
}
