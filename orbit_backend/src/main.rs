use anyhow::Result;
use clap::{Parser, Subcommand};
use orbit_backend::api;
use orbit_backend::bootstrap;
use orbit_backend::config::OrbitConfig;
use orbit_backend::seed;
use orbit_backend::telemetry;
use orbit_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Orbit proximity backend daemon")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Populate the database with a demo cast of users and locations
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = OrbitConfig::from_env()?;
    let resources = bootstrap::initialize(&config)?;
    tracing::info!(
        db_initialized = resources.database_initialized,
        directories_created = resources.directories_created.len(),
        "bootstrap complete"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve_http(config, resources.database).await,
        Command::Seed => seed::run(&resources.database, &config.proximity),
    }
}
