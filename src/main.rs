//! Couples Companion CLI - serves the VAPID key endpoint.
//!
//! This is the main binary entry point. See the `couples_companion`
//! library for the core functionality.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use couples_companion::env::Environment;
use couples_companion::{Config, KeyPairReply, KeyPairService, Server};
use mimalloc::MiMalloc;

/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "couples")]
#[command(version)]
#[command(about = "Couples companion backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind, overriding config and COUPLES_LISTEN_ADDR
        #[arg(long)]
        listen: Option<String>,
    },
    /// Print one freshly generated VAPID key pair as JSON
    GenerateVapidKeys,
    /// Print the effective configuration
    Config,
}

fn init_logging(environment: Environment) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(environment.default_log_filter()),
    );
    builder.format_timestamp_secs();

    // COUPLES_LOG_FILE redirects logs away from stderr
    if let Ok(path) = std::env::var("COUPLES_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let environment = Environment::current();
    init_logging(environment)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen } => {
            let mut config = Config::load()?;
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            log::info!(
                "Couples Companion v{} starting ({environment})",
                env!("CARGO_PKG_VERSION")
            );
            let server = Server::bind(&config, KeyPairService::default()).await?;
            server.run().await?;
        }
        Commands::GenerateVapidKeys => {
            let reply = KeyPairService::default().generate();
            println!("{}", serde_json::to_string_pretty(&reply)?);
            if let KeyPairReply::Failure { error } = reply {
                anyhow::bail!("VAPID key generation failed: {error}");
            }
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
