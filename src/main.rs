//! MakeTicket API
//!
//! Backend for the multi-tenant ticketing platform: API-key
//! authentication, rate limiting, and request observability in front of
//! the business handlers.

use anyhow::Result;
use clap::Parser;
use maketicket_api::{
    config::{Environment, Settings},
    logging::{Logger, SizeBasedRollingWriter, StdStreamSink},
    server::App,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// MakeTicket API
///
/// Multi-tenant ticketing platform backend.
#[derive(Parser, Debug)]
#[command(name = "maketicket-api")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Log file path for request logs (enables file logging with 10MB rotation)
    /// Example: --log-file /var/log/maketicket/api.log
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    // Override settings with CLI arguments
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }

    // Process-level diagnostics go through tracing
    init_tracing(&settings.log_level);

    // Request-level structured logs go through the redacting logger,
    // optionally copied into a rolling file
    let sink = match &args.log_file {
        Some(path) => {
            let writer = SizeBasedRollingWriter::with_defaults(path)?;
            eprintln!(
                "Logging requests to file: {} (10MB rotation)",
                path.display()
            );
            StdStreamSink::with_file(writer)
        }
        None => StdStreamSink::new(),
    };
    let logger = Logger::with_sink(&settings, Arc::new(sink));

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        host = %settings.host,
        port = %settings.port,
        "Starting application"
    );

    // Build the application
    let app = App::new(settings, logger);

    // Run the server with graceful shutdown
    app.run_with_graceful_shutdown().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}

/// Initialize tracing subscriber with the specified log level
fn init_tracing(log_level: &str) {
    // Build filter from RUST_LOG env var or use provided log level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let console_layer = fmt::layer().json().with_filter(filter);

    tracing_subscriber::registry().with(console_layer).init();
}
