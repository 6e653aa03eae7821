use std::io::{self, BufRead, Read};

use log::{debug, warn};

use super::error::{CorruptionError, GzError, UseError};
use super::header::decode_header;
use super::structures::{Header, Trailer};
use super::transform::{Checksum, DeflateDecompressor, Decompressor};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Decompressing the body
    Body,
    /// Deflate end marker seen, trailer not yet checked
    Trailer,
    /// Trailer verified, only end-of-stream remains
    Done,
    /// Trailer did not match; reported on every further read
    Corrupt(CorruptionError),
    Closed,
}

/// Streaming gzip consumer.
///
/// The header is parsed eagerly by [`GzReader::new`]. Payload bytes are
/// decompressed on demand, and the trailer is verified once the deflate
/// stream reports its end marker. A trailer mismatch surfaces as an
/// [`io::ErrorKind::InvalidData`] error carrying a [`CorruptionError`], only
/// after every decompressed byte has been handed out.
///
/// Only the first gzip member is read; anything after its trailer is left in
/// the source.
///
/// ## Example
///
/// ```
/// use std::io::{Read, Write};
/// use rgz::{GzReader, GzWriter};
///
/// let mut w = GzWriter::new(Vec::new());
/// w.write_all(b"payload")?;
/// let bytes = w.finish()?;
///
/// let mut r = GzReader::new(&bytes[..])?;
/// let mut out = String::new();
/// r.read_to_string(&mut out)?;
/// assert_eq!(out, "payload");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GzReader<R: BufRead> {
    source: R,
    header: Header,
    decompressor: Box<dyn Decompressor>,
    checksum: Checksum,
    state: State,
}

impl<R: BufRead> GzReader<R> {
    /// Parse the header from `source`; fails if it is not a valid gzip header.
    pub fn new(source: R) -> Result<Self, GzError> {
        Self::with_decompressor(source, Box::new(DeflateDecompressor::new()))
    }

    /// Create a reader around a caller-supplied decompression transform.
    pub fn with_decompressor(
        mut source: R,
        decompressor: Box<dyn Decompressor>,
    ) -> Result<Self, GzError> {
        let header = decode_header(&mut source)?;
        Ok(Self {
            source,
            header,
            decompressor,
            checksum: Checksum::new(),
            state: State::Body,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Decompressed bytes produced so far, modulo 2^32
    pub fn total_out(&self) -> u32 {
        self.checksum.amount()
    }

    /// True once the trailer has been read and verified.
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    /// Release the decompression state. Further reads fail; closing again is a no-op.
    pub fn close(&mut self) {
        if self.state != State::Closed {
            self.decompressor.reset();
            self.state = State::Closed;
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn read_payload(&mut self, buf: &mut [u8]) -> Result<usize, GzError> {
        match self.state {
            State::Body => {}
            State::Trailer => return self.finish().map(|_| 0),
            State::Done => return Ok(0),
            State::Corrupt(ref err) => return Err(err.clone().into()),
            State::Closed => return Err(UseError::ReadAfterClose.into()),
        }
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let input = self.source.fill_buf()?;
            let at_eof = input.is_empty();
            let progress = self.decompressor.feed(input, buf)?;
            self.source.consume(progress.consumed);

            let out = &buf[..progress.produced];
            self.checksum.update(out);

            if progress.stream_end {
                self.state = State::Trailer;
                // Hand out the final bytes first; the trailer is checked on the next call
                if progress.produced > 0 {
                    return Ok(progress.produced);
                }
                return self.finish().map(|_| 0);
            }
            if progress.produced > 0 {
                return Ok(progress.produced);
            }
            if at_eof {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "gzip stream ended before the deflate end marker",
                )
                .into());
            }
        }
    }

    fn finish(&mut self) -> Result<(), GzError> {
        let trailer = match Trailer::read_from(&mut self.source) {
            Ok(trailer) => trailer,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "gzip stream ended inside the trailer",
                )
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        let crc32 = self.checksum.value();
        let isize = self.checksum.amount();
        let mismatch = if trailer.crc32 != crc32 {
            Some(CorruptionError::ChecksumMismatch {
                stored: trailer.crc32,
                computed: crc32,
            })
        } else if trailer.isize != isize {
            Some(CorruptionError::LengthMismatch {
                stored: trailer.isize,
                computed: isize,
            })
        } else {
            None
        };

        if let Some(err) = mismatch {
            warn!("gzip trailer mismatch: {}", err);
            self.state = State::Corrupt(err.clone());
            return Err(err.into());
        }

        debug!("verified gzip trailer: crc32 {:#010x}, isize {}", crc32, isize);
        self.state = State::Done;
        Ok(())
    }
}

impl<R: BufRead> Read for GzReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_payload(buf).map_err(io::Error::from)
    }
}
