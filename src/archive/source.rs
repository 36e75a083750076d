use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ArchiveError;
use crate::store::{ByteRange, ObjectStore};

/// Bytes returned by a ranged archive read.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub data: Bytes,
    pub etag: Option<String>,
    pub cache_control: Option<String>,
}

/// Random access to the bytes of one archive.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Read `length` bytes at `offset`. When `etag` is given, the read fails
    /// with [`ArchiveError::EtagMismatch`] if the archive has changed.
    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        etag: Option<&str>,
    ) -> Result<RangeResponse, ArchiveError>;

    /// Identifier for this archive, used by readers as a cache key. Distinct
    /// archives must have distinct keys.
    fn key(&self) -> &str;
}

/// [`RangeSource`] reading an archive object out of an [`ObjectStore`].
///
/// The source is keyed by its storage key, which already carries the
/// subdirectory and path template, so `vector/parks` and `raster/parks`
/// never share reader state.
pub struct StoreRangeSource {
    store: Arc<dyn ObjectStore>,
    storage_key: String,
}

impl StoreRangeSource {
    pub fn new(store: Arc<dyn ObjectStore>, storage_key: impl Into<String>) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
        }
    }

    /// The object key the archive is read from.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

#[async_trait]
impl RangeSource for StoreRangeSource {
    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        etag: Option<&str>,
    ) -> Result<RangeResponse, ArchiveError> {
        let object = self
            .store
            .get(
                &self.storage_key,
                Some(ByteRange::new(offset, length)),
                etag,
            )
            .await?;

        Ok(RangeResponse {
            data: object.data,
            etag: object.etag,
            cache_control: object.cache_control,
        })
    }

    fn key(&self) -> &str {
        &self.storage_key
    }
}
