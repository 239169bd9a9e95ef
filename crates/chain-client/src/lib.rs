//! Uniform view over the upstream chain's JSON-RPC interface.
//!
//! The [`ChainClient`] capability trait is what the rest of the pipeline
//! consumes; [`HttpChainClient`] implements it over `eth_*` methods with
//! transient-fault retry, and [`CachingClient`] adds an LRU layer for
//! idempotent by-hash reads.

mod cache;
mod error;
mod http;
mod traits;
mod types;

pub use cache::CachingClient;
pub use error::{ClientError, ClientResult};
pub use http::HttpChainClient;
pub use traits::ChainClient;
pub use types::{ChainHeader, FullBlock, StorageSlot};

#[cfg(any(test, feature = "test-utils"))]
pub use traits::MockChainClient;
