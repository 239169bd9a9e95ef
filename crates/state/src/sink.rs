use async_trait::async_trait;
use tidewatch_primitives::Cid;

use crate::error::StateResult;

/// Optional push endpoint for content-addressed state blobs.
///
/// Injected where configured; callers check presence by holding an
/// `Option<Arc<dyn StateSink>>`. Implementations must be idempotent under
/// repeated submission of the same CID.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait StateSink: Send + Sync + 'static {
    async fn push(&self, cid: Cid, data: Vec<u8>) -> StateResult<()>;
}
