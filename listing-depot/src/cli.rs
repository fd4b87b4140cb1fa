/// # listing-depot CLI
///
/// Command parsing and run orchestration for the `listing-depot` binary. All listing logic
/// (compilation, compression, depot access, synchronisation) lives in `listing-depot-core`;
/// this module only loads configuration and wires the pieces together.
///
/// ## Commands
/// - `compile`: fetch upstream metadata and compile every listing into the output folder.
/// - `publish`: compile, then synchronise the result to the configured depot.
///
/// The depot is selected from the environment, see
/// [`listing_depot_core::config::DepotConfig::from_env`].
use crate::load_config::{load_config, PublishConfig};
use crate::upstream::HttpVersionClient;
use anyhow::Result;
use clap::{Parser, Subcommand};
use listing_depot_core::assemble::register_loader_listings;
use listing_depot_core::compile::{CompiledListings, ListingCompiler};
use listing_depot_core::config::DepotConfig;
use listing_depot_core::synchronise::synchronise;
use std::path::PathBuf;

/// CLI for listing-depot: compile loader listings and publish them to a depot.
#[derive(Parser)]
#[clap(
    name = "listing-depot",
    version,
    about = "Compile loader metadata listings and publish them incrementally to a depot"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile every listing into the configured output folder without publishing
    Compile {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Compile every listing and upload what changed to the depot
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Upload everything when the depot has no index yet
        #[clap(long)]
        full_resync: bool,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Compile { config } => {
            let config = load_config(config)?;
            let compiled = compile(&config).await?;
            println!(
                "Compiled {} listings into {}",
                compiled.listings().len(),
                config.output_dir.display()
            );
            Ok(())
        }
        Commands::Publish {
            config,
            full_resync,
        } => {
            let config = load_config(config)?;
            // Resolve the depot before doing any upstream work.
            let depot_config = DepotConfig::from_env()?;
            depot_config.trace_loaded();
            let depot = depot_config.build()?;

            let compiled = compile(&config).await?;

            tracing::info!(command = "publish", full_resync, "Starting synchronisation");
            match synchronise(&*depot, &compiled, full_resync).await {
                Ok(report) => {
                    tracing::info!(
                        command = "publish",
                        uploaded = report.uploaded.len(),
                        unchanged = report.unchanged.len(),
                        "Synchronisation complete"
                    );
                    println!(
                        "Published {} listings ({} unchanged), index at {}",
                        report.uploaded.len(),
                        report.unchanged.len(),
                        depot.public_url(&report.index.file.url)
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "publish", error = %e, "Synchronisation failed");
                    Err(e.into())
                }
            }
        }
    }
}

async fn compile(config: &PublishConfig) -> Result<CompiledListings> {
    let source = HttpVersionClient::new(
        &config.upstream.base_url,
        config.upstream.api_key.clone(),
        config.upstream.max_concurrency,
    );
    let mut compiler = ListingCompiler::new(config.output_dir.clone(), config.pretty);
    let assembly = register_loader_listings(&mut compiler, &source).await?;
    if !assembly.skipped.is_empty() {
        tracing::warn!(skipped = ?assembly.skipped, "Some upstream versions were not published");
    }
    Ok(compiler.finalize().await?)
}
