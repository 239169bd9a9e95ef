//! tidewatch operator tool.
//!
//! Works directly on the store, so the daemon must be stopped; the store's
//! directory lock enforces this. Exit code 0 on success, 1 with a one-line
//! diagnostic on stderr otherwise.

use std::{process::ExitCode, sync::Arc, time::Duration};

use argh::from_env;
use tidewatch_chain_client::HttpChainClient;
use tidewatch_config::Config;
use tidewatch_db::init_watcher_db;
use tidewatch_state::Materializer;
use tidewatch_status::CursorManager;

use crate::args::{Args, Command};

mod args;
mod cmd;

fn main() -> ExitCode {
    let args: Args = from_env();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.config)?;
    let config: Config = toml::from_str(&raw)?;

    let db = Arc::new(init_watcher_db(&config.db.datadir)?);
    let cursors = CursorManager::new(db.clone())?;
    let materializer = Materializer::new(db.clone());
    let client = HttpChainClient::new(
        &config.rpc.url,
        Duration::from_millis(config.rpc.request_timeout_ms),
        config.rpc.fetch_proofs,
    )?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        match args.command {
            Command::CreateCheckpoint(cmd) => {
                cmd::create_checkpoint::run(&db, &client, &materializer, &cursors, cmd).await
            }
            Command::ResetToBlock(cmd) => cmd::reset_to_block::run(&db, &cursors, cmd),
            Command::FillState(cmd) => cmd::fill_state::run(&db, &client, &materializer, cmd).await,
        }
    })
}
