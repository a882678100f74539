//! Darkroom - Event-Driven Image Ingestion Pipeline
//!
//! Normalizes blob-store upload notifications, routes them through a
//! predicate-filtered broker with at-least-once delivery, and records
//! accepted uploads in a keyed metadata store.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use darkroom_core::config::DarkroomConfig;
use darkroom_metadata::{MemoryRepository, MetadataRepository, PostgresRepository};
use darkroom_pipeline::mailer::{HttpMailTransport, LogMailTransport, MailTransport};
use darkroom_pipeline::metrics::MetricsRecorder;
use darkroom_pipeline::{Pipeline, PipelineServer};

#[derive(Parser)]
#[command(name = "darkroomd")]
#[command(version = darkroom_core::VERSION)]
#[command(about = "Event-driven image ingestion pipeline", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Bind address
    #[arg(long, env = "DARKROOM_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, env = "DARKROOM_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DARKROOM_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        DarkroomConfig::from_file(config_path)?
    } else {
        DarkroomConfig::from_env()
    };

    // Override with CLI args
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let metrics = Arc::new(MetricsRecorder::new());
    info!("Prometheus metrics initialized");

    let repository: Arc<dyn MetadataRepository> = match config.metadata.engine.as_str() {
        "memory" => Arc::new(MemoryRepository::new()),
        "postgres" => Arc::new(
            PostgresRepository::new(
                &config.metadata.database_url,
                config.metadata.max_connections,
            )
            .await?,
        ),
        other => anyhow::bail!("unknown metadata engine: {}", other),
    };
    info!("Metadata engine: {}", config.metadata.engine);

    let transport: Arc<dyn MailTransport> = match config.mail.transport.as_str() {
        "http" => Arc::new(HttpMailTransport::new(
            config.mail.endpoint.clone(),
            config.mail.timeout(),
        )),
        "log" => Arc::new(LogMailTransport),
        other => anyhow::bail!("unknown mail transport: {}", other),
    };
    info!("Mail transport: {}", config.mail.transport);

    let pipeline = Arc::new(Pipeline::start(&config, repository, transport));

    PipelineServer::new(config).run(pipeline, metrics).await?;
    Ok(())
}
