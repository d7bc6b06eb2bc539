//! studbot-engine - development backend entry point.
//!
//! Serves an [`EchoEngine`] on the configured backend address. A real
//! deployment swaps in an engine that wraps an actual model; the wire
//! protocol and server loop stay the same.

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;

use studbot_common::config::Config;
use studbot_common::logging::init_logging;
use studbot_engine::{BackendServer, EchoEngine, GenerateParams};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("studbot engine v{}", env!("CARGO_PKG_VERSION"));

    let listener = TcpListener::bind(config.backend.bind_addr()).await?;
    let server = Arc::new(BackendServer::new(
        Arc::new(EchoEngine),
        GenerateParams::default(),
        config.backend.bytes_limit,
    ));

    server.serve(listener).await?;
    Ok(())
}
