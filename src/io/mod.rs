//! Random-access data sources.
//!
//! Streaming compression and decompression work on plain `Read`/`Write`.
//! Listing an archive only needs its header and its last 8 bytes, so the
//! inspector reads through [`ReadAt`] instead and never touches the body.
//! For remote archives that means two small HTTP Range requests.

mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at `offset` into `buf`, returning how many bytes were filled.
    ///
    /// Fewer than `buf.len()` bytes are returned only at the end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}
