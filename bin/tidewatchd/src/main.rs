//! tidewatch daemon entrypoint.

use anyhow::{anyhow, Result};
use argh::from_env;
use tidewatch_common::logging;
use tokio::runtime;
use tracing::info;

use crate::{args::Args, errors::InitError};

mod args;
mod config;
mod context;
mod errors;
mod services;

fn main() -> Result<()> {
    let args: Args = from_env();

    let config = context::load_config(&args)
        .map_err(|e| anyhow!("failed to load configuration: {e}"))?;

    logging::init_logging(logging::LoggingInitConfig {
        filter: config.logging.filter.as_deref(),
        json_format: config.logging.json_format,
    });

    let rt = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tidewatch-rt")
        .build()
        .map_err(InitError::RuntimeBuild)?;

    rt.block_on(async {
        let executor = services::start_services(&config).await?;
        if !executor.monitor().await {
            return Err(anyhow!("a critical task failed"));
        }
        Ok::<(), anyhow::Error>(())
    })?;

    info!("exiting tidewatchd");
    Ok(())
}
