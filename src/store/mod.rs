//! Object store layer.
//!
//! Archives, glyph ranges and static assets all live in one bucket. The
//! gateway only ever reads from it, either a whole object or a byte range
//! of one, optionally conditioned on the object's etag so that a
//! multi-read archive open notices when the object is replaced underneath.

mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub use s3::{create_s3_client, S3ObjectStore};

/// A byte range within an object: `length` bytes starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Render as an HTTP `Range` header value. Both ends are inclusive.
    ///
    /// Returns `None` for an empty range, which cannot be expressed.
    pub fn to_header(&self) -> Option<String> {
        if self.length == 0 {
            return None;
        }
        let end = self.offset.saturating_add(self.length - 1);
        Some(format!("bytes={}-{}", self.offset, end))
    }
}

/// An object (or part of one) read from the store.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
}

/// Read-only access to the backing object store.
///
/// Implementations must report a missing key as [`StoreError::NotFound`] and
/// an etag mismatch on a conditional read as
/// [`StoreError::PreconditionFailed`], never as a generic failure.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read `key`, optionally restricted to `range` and conditioned on
    /// `if_match` (an etag previously returned for the same key).
    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        if_match: Option<&str>,
    ) -> Result<StoredObject, StoreError>;
}
