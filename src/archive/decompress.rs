use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use flate2::read::GzDecoder;

use crate::error::ArchiveError;

/// Compression applied to an archive's internal blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Unknown,
    None,
    Gzip,
    Brotli,
    Zstd,
}

/// Decompression callback handed to the archive reader.
pub type Decompressor = Arc<dyn Fn(Bytes, Compression) -> Result<Bytes, ArchiveError> + Send + Sync>;

/// Decompress `buf` using the codecs available to the gateway.
///
/// Uncompressed and unknown data pass through untouched. Gzip is inflated.
/// Anything else is reported as unsupported.
pub fn native_decompress(buf: Bytes, compression: Compression) -> Result<Bytes, ArchiveError> {
    match compression {
        Compression::None | Compression::Unknown => Ok(buf),
        Compression::Gzip => {
            let mut out = Vec::with_capacity(buf.len() * 2);
            GzDecoder::new(buf.as_ref())
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::Decompress(e.to_string()))?;
            Ok(Bytes::from(out))
        }
        other => Err(ArchiveError::Decompress(format!(
            "Compression method not supported: {:?}",
            other
        ))),
    }
}
