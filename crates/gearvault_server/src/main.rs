//! GearVault snapshot server.

use anyhow::Result;
use clap::Parser;
use gearvault_core::init_logging;
use gearvault_server::{run, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    config.validate()?;
    init_logging(config.log_level(), config.log_sink()?).map_err(anyhow::Error::msg)?;

    run(config).await
}
