use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use skyqueue::config::Config;

/// Skyqueue: forward Japanese Bluesky posts and likes to work queues.
///
/// Subscribes to Jetstream, keeps posts tagged `ja` (plus every post
/// deletion and every like change), and publishes compact task messages
/// onto the POST and LIKE RabbitMQ queues.
#[derive(Parser)]
#[command(name = "skyqueue", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge until SIGINT or SIGTERM
    Run {
        /// Resume the subscription from this microsecond cursor
        #[arg(long)]
        cursor: Option<u64>,
    },

    /// Print task messages to stdout instead of publishing them
    DryRun {
        /// Resume the subscription from this microsecond cursor
        #[arg(long)]
        cursor: Option<u64>,
    },

    /// Show the effective configuration (credentials masked)
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skyqueue=info")),
        )
        .init();

    // Both the WebSocket and AMQP TLS stacks use rustls; pin one provider.
    // Err means a provider was already installed, which is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Run { cursor } => {
            config.cursor = cursor.or(config.cursor);
            info!(
                jetstream = %config.jetstream_url,
                amqp = %config.redacted_amqp_url(),
                "Starting skyqueue"
            );
            skyqueue::lifecycle::run(&config).await?;
        }

        Commands::DryRun { cursor } => {
            config.cursor = cursor.or(config.cursor);
            info!(jetstream = %config.jetstream_url, "Starting skyqueue dry run");
            skyqueue::lifecycle::dry_run(&config).await?;
        }

        Commands::ShowConfig => {
            println!("Jetstream URL:       {}", config.jetstream_url);
            println!("AMQP URL:            {}", config.redacted_amqp_url());
            println!("Queues:              {}", skyqueue::queue::QUEUES.join(", "));
            println!("Publish buffer:      {}", config.publish_buffer);
            println!(
                "Reconnect max delay: {}s",
                config.reconnect_max_delay.as_secs()
            );
            match config.cursor {
                Some(cursor) => println!("Cursor:              {cursor}"),
                None => println!("Cursor:              live tail"),
            }
        }
    }

    Ok(())
}
