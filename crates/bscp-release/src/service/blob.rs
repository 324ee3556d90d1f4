//! Content blob existence checks used when confirming commits.

use async_trait::async_trait;

use bscp_api::ContentRef;
use bscp_common::BscpResult;

/// Answers whether a content blob has been uploaded with the expected size.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, biz_id: i64, content: &ContentRef) -> BscpResult<bool>;
}

/// Accepts every blob. Used when no blob store endpoint is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct UncheckedBlobStore;

#[async_trait]
impl BlobStore for UncheckedBlobStore {
    async fn exists(&self, _biz_id: i64, _content: &ContentRef) -> BscpResult<bool> {
        Ok(true)
    }
}
