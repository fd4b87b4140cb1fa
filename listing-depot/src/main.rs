use anyhow::Result;
use clap::Parser;
use listing_depot::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` may carry UPSTREAM_API_KEY and the DEPOT_* variables.
    let dotenv = dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dotenv = ?dotenv,
        "listing-depot starting"
    );

    run(Cli::parse()).await.inspect_err(|e| {
        tracing::error!(error = %e, "listing-depot run failed");
    })
}
