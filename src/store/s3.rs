use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use tracing::debug;

use super::{ByteRange, ObjectStore, StoredObject};
use crate::error::StoreError;

/// S3-backed implementation of [`ObjectStore`].
///
/// Works against S3 or any S3-compatible service (MinIO, R2, etc.). Ranged
/// reads become HTTP range requests and conditional reads use `If-Match`.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a store reading from `bucket`.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn map_error(&self, key: &str, etag: Option<&str>, e: SdkError<GetObjectError>) -> StoreError {
        let is_no_such_key = e
            .as_service_error()
            .map(|se| se.is_no_such_key())
            .unwrap_or(false);
        let status = e.raw_response().map(|r| r.status().as_u16());

        if is_no_such_key || status == Some(404) {
            return StoreError::NotFound(format!("s3://{}/{}", self.bucket, key));
        }

        if status == Some(412) {
            return StoreError::PreconditionFailed {
                key: key.to_string(),
                etag: etag.unwrap_or_default().to_string(),
            };
        }

        match e {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                StoreError::Connection(e.to_string())
            }
            other => StoreError::S3(other.to_string()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(
        &self,
        key: &str,
        range: Option<ByteRange>,
        if_match: Option<&str>,
    ) -> Result<StoredObject, StoreError> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);

        if let Some(header) = range.and_then(|r| r.to_header()) {
            request = request.range(header);
        }
        if let Some(etag) = if_match {
            request = request.if_match(etag);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| self.map_error(key, if_match, e))?;

        let etag = resp.e_tag().map(str::to_string);
        let content_type = resp.content_type().map(str::to_string);
        let cache_control = resp.cache_control().map(str::to_string);

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .into_bytes();

        debug!(key = key, bytes = data.len(), "Read object from S3");

        Ok(StoredObject {
            data,
            etag,
            content_type,
            cache_control,
        })
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO or R2:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
