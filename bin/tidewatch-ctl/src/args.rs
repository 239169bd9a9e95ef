use std::path::PathBuf;

use argh::FromArgs;

#[derive(Debug, FromArgs)]
#[argh(description = "tidewatch operator tool (run with the daemon stopped)")]
pub(crate) struct Args {
    #[argh(option, short = 'c', description = "path to configuration toml")]
    pub config: PathBuf,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
pub(crate) enum Command {
    CreateCheckpoint(CreateCheckpointCmd),
    ResetToBlock(ResetToBlockCmd),
    FillState(FillStateCmd),
}

/// Create a checkpoint for a contract at a block (latest canonical when no
/// hash is given).
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "create-checkpoint")]
pub(crate) struct CreateCheckpointCmd {
    #[argh(positional, description = "watched contract address")]
    pub contract: String,

    #[argh(positional, description = "block hash (default: latest canonical)")]
    pub block_hash: Option<String>,
}

/// Administrative reset: drop all blocks and state above a height and rewind
/// every cursor onto it.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "reset-to-block")]
pub(crate) struct ResetToBlockCmd {
    #[argh(positional, description = "height to reset onto")]
    pub number: u64,
}

/// Fill state records over an already-indexed historical range.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "fill-state")]
pub(crate) struct FillStateCmd {
    #[argh(positional, description = "first block of the range (inclusive)")]
    pub start: u64,

    #[argh(positional, description = "last block of the range (inclusive)")]
    pub end: u64,
}
