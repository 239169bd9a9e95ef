//! Config loading with CLI overrides applied.

use std::fs;

use tidewatch_config::Config;

use crate::{
    args::Args,
    config::{apply_override, parse_override},
    errors::InitError,
};

/// Reads the config toml and applies the dedicated-flag and `-o` overrides
/// before deserializing.
pub(crate) fn load_config(args: &Args) -> Result<Config, InitError> {
    let raw = fs::read_to_string(&args.config)?;
    let mut table: toml::value::Table = toml::from_str(&raw)?;

    for override_str in args.get_all_overrides()? {
        let (path, value) = parse_override(&override_str)?;
        apply_override(&path, value, &mut table)?;
    }

    let config: Config = toml::Value::Table(table).try_into()?;
    Ok(config)
}
