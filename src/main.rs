//! lineframe server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - LINEFRAME_HOST: Bind address (default: 0.0.0.0)
//! - LINEFRAME_PORT: Port number (default: 8080)
//! - LINEFRAME_USE_LABELS_COLUMN: Group by metric name into wide frames (default: false)
//! - LINEFRAME_FLOAT_NUMBERS: Store integer fields as float64 (default: false)
//! - LINEFRAME_MAX_BODY_BYTES: Largest accepted batch (default: 10 MiB)
//! - RUST_LOG: Log level (default: info)
//!
//! Both converter options can be overridden per request with the
//! `labels_column` and `float_numbers` query parameters on `POST /write`.

use lineframe::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lineframe=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    tracing::info!("lineframe configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!(
        "  Labels column: {}",
        config.converter.use_labels_column
    );
    tracing::info!("  Float numbers: {}", config.converter.float_numbers);
    tracing::info!(
        "  Max body: {} KB",
        config.max_body_bytes / 1024
    );

    run_server(config).await
}
