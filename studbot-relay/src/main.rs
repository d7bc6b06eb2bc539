//! studbot-relay - main entry point.

use anyhow::Result;

use studbot_common::config::Config;
use studbot_common::logging::init_logging;
use studbot_relay::Relay;

/// User id assumed for the local CLI session.
const CLI_USER_ID: i64 = 1;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("studbot relay v{}", env!("CARGO_PKG_VERSION"));

    let relay = Relay::start(&config);
    studbot_relay::cli::run(&relay, CLI_USER_ID).await?;

    relay.stop();
    Ok(())
}
