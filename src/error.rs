use thiserror::Error;

/// Errors returned by an object store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A conditional read (`If-Match`) did not match the stored object
    #[error("Precondition failed for {key}: expected etag {etag}")]
    PreconditionFailed { key: String, etag: String },

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Errors raised while reading a tile archive.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The archive object does not exist in storage
    #[error("Archive not found: {0}")]
    NotFound(String),

    /// The archive changed between two reads of the same open archive
    #[error("Archive etag mismatch: {0}")]
    EtagMismatch(String),

    /// Storage failure other than a missing object
    #[error("Storage error: {0}")]
    Store(StoreError),

    /// The decompression callback could not decode a block
    #[error("Decompression failed: {0}")]
    Decompress(String),

    /// The archive bytes could not be interpreted
    #[error("Invalid archive: {0}")]
    Format(String),
}

impl From<StoreError> for ArchiveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => ArchiveError::NotFound(key),
            StoreError::PreconditionFailed { key, .. } => ArchiveError::EtagMismatch(key),
            other => ArchiveError::Store(other),
        }
    }
}

/// Errors raised by an edge cache when storing a response.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The entry is larger than the whole cache
    #[error("Entry of {size} bytes exceeds cache capacity of {capacity} bytes")]
    TooLarge { size: usize, capacity: usize },

    /// Backend failure
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Classification of a request failure, used to pick the HTTP status and
/// cache lifetime of the error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    OriginNotAllowed,
    RateLimited,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// Short identifier used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::OriginNotAllowed => "origin_not_allowed",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors raised anywhere in the request pipeline.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    OriginNotAllowed(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    BadRequest(String),

    /// Unclassified collaborator failure
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::OriginNotAllowed(_) => ErrorKind::OriginNotAllowed,
            GatewayError::RateLimited(_) => ErrorKind::RateLimited,
            GatewayError::BadRequest(_) => ErrorKind::BadRequest,
            GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable message carried by the error.
    pub fn message(&self) -> &str {
        match self {
            GatewayError::NotFound(m)
            | GatewayError::OriginNotAllowed(m)
            | GatewayError::RateLimited(m)
            | GatewayError::BadRequest(m)
            | GatewayError::Internal(m) => m,
        }
    }
}

impl From<ArchiveError> for GatewayError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::NotFound(_) => GatewayError::NotFound("Archive not found".to_string()),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => GatewayError::NotFound("Not found".to_string()),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind to {0}: {1}")]
    Bind(String, #[source] std::io::Error),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
