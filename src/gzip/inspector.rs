//! Metadata listing without decompression.
//!
//! A gzip member can be summarised from its two ends: the header at the
//! front and the 8-byte trailer at the back. The inspector reads only those,
//! which keeps listing a remote archive down to a couple of Range requests.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use log::debug;

use crate::io::ReadAt;

use super::error::{FormatError, GzError};
use super::header::decode_header_with_len;
use super::structures::{HEADER_SIZE, Header, TRAILER_SIZE, Trailer};

/// First header window; doubled until the header fits
const INITIAL_WINDOW: usize = 4096;

/// Summary of a gzip file
#[derive(Debug, Clone)]
pub struct GzEntry {
    pub header: Header,
    /// Bytes occupied by the header
    pub header_len: u64,
    /// Bytes of deflate data between header and trailer
    pub compressed_size: u64,
    /// Uncompressed length modulo 2^32, as stored in the trailer
    pub uncompressed_size: u32,
    pub crc32: u32,
}

impl GzEntry {
    /// Percentage saved by compression; negative when the file grew.
    pub fn ratio(&self) -> f64 {
        if self.uncompressed_size == 0 {
            return 0.0;
        }
        let uncompressed = f64::from(self.uncompressed_size);
        let compressed = (self.compressed_size + self.header_len + TRAILER_SIZE as u64) as f64;
        (uncompressed - compressed) * 100.0 / uncompressed
    }
}

/// Reads gzip metadata from a random-access source
pub struct GzInspector<R: ReadAt> {
    reader: Arc<R>,
}

impl<R: ReadAt> GzInspector<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    /// Parse the header and trailer of the source.
    ///
    /// # Errors
    ///
    /// Fails if the source is too small to be a gzip file, if the header is
    /// invalid, or if the header runs into the trailer.
    pub async fn inspect(&self) -> Result<GzEntry> {
        let size = self.reader.size();
        if size < (HEADER_SIZE + TRAILER_SIZE) as u64 {
            bail!("Not a gzip file: only {} bytes", size);
        }

        let (header, header_len) = self.read_header(size).await?;
        let header_len = header_len as u64;
        if header_len + TRAILER_SIZE as u64 > size {
            bail!("gzip header overlaps the trailer");
        }

        let mut buf = [0u8; TRAILER_SIZE];
        let n = self
            .reader
            .read_at(size - TRAILER_SIZE as u64, &mut buf)
            .await?;
        if n != TRAILER_SIZE {
            bail!("short read on gzip trailer");
        }
        let trailer = Trailer::from_bytes(&buf);

        Ok(GzEntry {
            header,
            header_len,
            compressed_size: size - header_len - TRAILER_SIZE as u64,
            uncompressed_size: trailer.isize,
            crc32: trailer.crc32,
        })
    }

    /// Read the header through a window that grows until the header fits.
    async fn read_header(&self, size: u64) -> Result<(Header, usize)> {
        let mut window = INITIAL_WINDOW;
        loop {
            let want = (window as u64).min(size) as usize;
            let mut buf = vec![0u8; want];
            let n = self.reader.read_at(0, &mut buf).await?;
            buf.truncate(n);

            match decode_header_with_len(&mut &buf[..]) {
                Ok(parsed) => return Ok(parsed),
                Err(GzError::Format(FormatError::Truncated)) if (n as u64) < size => {
                    debug!("gzip header exceeds {} byte window, growing", n);
                    window = window.saturating_mul(2);
                }
                Err(e) => return Err(e).context("cannot read gzip header"),
            }
        }
    }
}
