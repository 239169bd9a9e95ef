//! Configuration tree for the tidewatch daemon and operator tools.

mod config;
pub mod defaults;

pub use config::{
    Config, ContractConfig, DbConfig, LoggingConfig, QueueConfig, RpcConfig, SyncConfig,
};
