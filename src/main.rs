//! pit-db: Main entry point

use clap::Parser;
use pit_db::cli::Cli;
use pit_db::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    pit_db::cli::run(cli).await
}
