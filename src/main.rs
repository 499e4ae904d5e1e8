// Main binary that starts the server
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use roost_server::config::DEFAULT_CONFIG_PATH;
use roost_server::{build_service, run as run_server, ServerConfig};
use std::io::stderr;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

// Define the command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Roost policy-driven provisioning server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, env = "ROOST_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the boot server
    Serve,
    /// Validate the configuration and its policies, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Respect RUST_LOG, fall back to verbose/info for our crates
    let level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "roost={level},roost_server={level},roost_policy={level},roost_ipxe={level},tower_http={level},hyper=warn",
        level = level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();

    debug!("Using configuration {}", cli.config.display());
    let config = ServerConfig::load(&cli.config).map_err(|e| eyre!("{:#}", e))?;

    match cli.command {
        Commands::Serve => {
            info!("Starting Roost server");
            run_server(config).await.map_err(|e| eyre!("{:#}", e))?;
        }
        Commands::CheckConfig => {
            let service = build_service(&config).map_err(|e| eyre!("{:#}", e))?;
            let policies = service.policies().await;
            println!("Configuration OK: {}", cli.config.display());
            println!("  listen:      {}", config.listen);
            println!("  server_url:  {}", service.server_url());
            println!("  tasks:       {}", config.tasks.len());
            println!("  policies:    {}", policies.len());
            for policy in policies {
                println!(
                    "    {:>5}  {} -> {}{}",
                    policy.line_number,
                    policy.name,
                    policy.installer_task,
                    if policy.enabled { "" } else { " (disabled)" }
                );
            }
        }
    }

    Ok(())
}
