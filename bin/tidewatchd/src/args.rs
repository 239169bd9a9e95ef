//! CLI argument parsing.

use std::path::PathBuf;

use argh::FromArgs;

use crate::errors::InitError;

#[derive(Clone, Debug, FromArgs)]
#[argh(description = "tidewatch chain-indexing daemon")]
pub(crate) struct Args {
    #[argh(option, short = 'c', description = "path to configuration toml")]
    pub config: PathBuf,

    /// Data directory override.
    #[argh(option, short = 'd', description = "datadir path used for the store")]
    pub datadir: Option<PathBuf>,

    /// Upstream RPC endpoint override.
    #[argh(option, description = "upstream chain rpc url")]
    pub rpc_url: Option<String>,

    /// Other generic overrides to the config toml, e.g.
    /// `-o sync.poll_wait_ms=1000 -o queue.block_workers=4`.
    #[argh(option, short = 'o', description = "generic config overrides")]
    pub overrides: Vec<String>,
}

impl Args {
    /// Override strings gathered from dedicated flags and `-o` options.
    pub(crate) fn get_all_overrides(&self) -> Result<Vec<String>, InitError> {
        let mut overrides = self.overrides.clone();

        if let Some(datadir) = &self.datadir {
            let datadir = datadir
                .to_str()
                .ok_or_else(|| InitError::InvalidDatadirPath(datadir.clone()))?;
            overrides.push(format!("db.datadir={datadir}"));
        }
        if let Some(rpc_url) = &self.rpc_url {
            overrides.push(format!("rpc.url={rpc_url}"));
        }

        Ok(overrides)
    }
}
