//! Compression transform and checksum seams.
//!
//! The gzip body is a raw deflate stream. The writer and reader only talk to
//! the engine through [`Compressor`] and [`Decompressor`], which keeps the
//! framing logic independent of how deflate is actually performed.

use std::io;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::error::{CorruptionError, GzError};

/// Output space reserved per engine call
const CHUNK_SIZE: usize = 32 * 1024;

/// Block compression transform.
pub trait Compressor: Send {
    /// Compress `input`, appending whatever output the engine produces.
    fn feed(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()>;
    /// Emit pending output so that everything fed so far is decodable.
    fn flush(&mut self, out: &mut Vec<u8>) -> io::Result<()>;
    /// Emit all remaining output plus the end-of-stream marker.
    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()>;
}

/// Result of a single [`Decompressor::feed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Input bytes consumed
    pub consumed: usize,
    /// Output bytes written
    pub produced: usize,
    /// The transform reached its own end marker
    pub stream_end: bool,
}

/// Streaming decompression transform.
pub trait Decompressor: Send {
    /// Decompress from `input` into `out`.
    ///
    /// Returns how far both buffers advanced and whether the end marker was
    /// reached. End marker and final data may arrive in the same call.
    fn feed(&mut self, input: &[u8], out: &mut [u8]) -> Result<Progress, GzError>;
    /// Drop internal state so a later `feed` starts a fresh stream.
    fn reset(&mut self);
}

/// Raw deflate compressor backed by flate2
pub struct DeflateCompressor {
    inner: Compress,
}

impl DeflateCompressor {
    pub fn new(level: Compression) -> Self {
        Self {
            inner: Compress::new(level, false),
        }
    }

    fn run(
        &mut self,
        mut input: &[u8],
        out: &mut Vec<u8>,
        flush: FlushCompress,
    ) -> io::Result<Status> {
        loop {
            out.reserve(CHUNK_SIZE);
            let before_in = self.inner.total_in();
            let status = self
                .inner
                .compress_vec(input, out, flush)
                .map_err(io::Error::other)?;
            let consumed = (self.inner.total_in() - before_in) as usize;
            input = &input[consumed..];

            let has_room = out.len() < out.capacity();
            match status {
                Status::StreamEnd => return Ok(status),
                // Output space left over means the engine drained everything it could
                _ if input.is_empty() && has_room => return Ok(status),
                _ => {}
            }
        }
    }
}

impl Compressor for DeflateCompressor {
    fn feed(&mut self, input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        if input.is_empty() {
            return Ok(());
        }
        self.run(input, out, FlushCompress::None).map(|_| ())
    }

    fn flush(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.run(&[], out, FlushCompress::Sync).map(|_| ())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> io::Result<()> {
        loop {
            if self.run(&[], out, FlushCompress::Finish)? == Status::StreamEnd {
                return Ok(());
            }
        }
    }
}

/// Raw deflate decompressor backed by flate2
pub struct DeflateDecompressor {
    inner: Decompress,
}

impl DeflateDecompressor {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
        }
    }
}

impl Default for DeflateDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor for DeflateDecompressor {
    fn feed(&mut self, input: &[u8], out: &mut [u8]) -> Result<Progress, GzError> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, out, FlushDecompress::None)
            .map_err(|e| CorruptionError::Deflate(e.to_string()))?;
        Ok(Progress {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
            stream_end: status == Status::StreamEnd,
        })
    }

    fn reset(&mut self) {
        self.inner.reset(false);
    }
}

/// Running CRC-32 and length of a payload.
#[derive(Debug, Clone, Default)]
pub struct Checksum {
    hasher: crc32fast::Hasher,
    amount: u32,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.amount = self.amount.wrapping_add(data.len() as u32);
    }

    pub fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Bytes seen so far, modulo 2^32
    pub fn amount(&self) -> u32 {
        self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inflate_all(compressed: &[u8]) -> (Vec<u8>, bool) {
        let mut dec = DeflateDecompressor::new();
        let mut out = Vec::new();
        let mut input = compressed;
        let mut buf = [0u8; 7];
        loop {
            let p = dec.feed(input, &mut buf).unwrap();
            input = &input[p.consumed..];
            out.extend_from_slice(&buf[..p.produced]);
            if p.stream_end {
                return (out, true);
            }
            if p.consumed == 0 && p.produced == 0 {
                return (out, false);
            }
        }
    }

    #[test]
    fn deflate_round_trip() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut enc = DeflateCompressor::new(Compression::default());
        let mut compressed = Vec::new();
        for chunk in payload.chunks(4096) {
            enc.feed(chunk, &mut compressed).unwrap();
        }
        enc.finish(&mut compressed).unwrap();
        assert!(compressed.len() < payload.len());

        let (out, ended) = inflate_all(&compressed);
        assert!(ended);
        assert_eq!(out, payload);
    }

    #[test]
    fn empty_stream_has_end_marker() {
        let mut enc = DeflateCompressor::new(Compression::default());
        let mut compressed = Vec::new();
        enc.finish(&mut compressed).unwrap();
        assert!(!compressed.is_empty());

        let (out, ended) = inflate_all(&compressed);
        assert!(ended);
        assert!(out.is_empty());
    }

    #[test]
    fn sync_flush_makes_prefix_decodable() {
        let mut enc = DeflateCompressor::new(Compression::best());
        let mut compressed = Vec::new();
        enc.feed(b"hello, gzip", &mut compressed).unwrap();
        enc.flush(&mut compressed).unwrap();

        let (out, ended) = inflate_all(&compressed);
        assert!(!ended);
        assert_eq!(out, b"hello, gzip");
    }

    #[test]
    fn garbage_is_corruption() {
        let mut dec = DeflateDecompressor::new();
        let mut buf = [0u8; 64];
        let err = dec.feed(&[0xff; 16], &mut buf).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn checksum_matches_crc32_reference() {
        let mut sum = Checksum::new();
        sum.update(b"1234");
        sum.update(b"56789");
        assert_eq!(sum.value(), 0xcbf4_3926);
        assert_eq!(sum.amount(), 9);
    }
}
