use std::io::{self, Write};

use flate2::Compression;
use log::debug;

use super::error::{GzError, UseError};
use super::header::encode_header;
use super::structures::{Header, Trailer};
use super::transform::{Checksum, Compressor, DeflateCompressor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Header not yet emitted, still mutable
    Init,
    /// Header emitted, payload flowing
    Streaming,
    /// Compressor finished and trailer queued, sink not yet drained
    Finishing,
    /// Trailer emitted
    Closed,
}

/// Streaming gzip producer.
///
/// The header is emitted on the first [`write`](Write::write), `flush` or
/// [`close`](GzWriter::close); until then it can be changed through
/// [`header_mut`](GzWriter::header_mut). Closing emits the trailer exactly
/// once, and dropping an unclosed writer closes it, ignoring errors.
///
/// ## Example
///
/// ```
/// use std::io::Write;
/// use rgz::{GzWriter, Header};
///
/// let mut w = GzWriter::new(Vec::new());
/// w.header_mut()?.set_name(Some("hello.txt".into()));
/// w.write_all(b"hello")?;
/// let bytes = w.finish()?;
/// assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct GzWriter<W: Write> {
    sink: Option<W>,
    header: Header,
    compressor: Box<dyn Compressor>,
    checksum: Checksum,
    state: State,
    buf: Vec<u8>,
}

impl<W: Write> GzWriter<W> {
    /// Create a writer with an empty header and the default level.
    pub fn new(sink: W) -> Self {
        Self::with_header(sink, Header::default(), Compression::default())
    }

    pub fn with_level(sink: W, level: Compression) -> Self {
        Self::with_header(sink, Header::default(), level)
    }

    pub fn with_header(sink: W, header: Header, level: Compression) -> Self {
        Self::with_compressor(sink, header, Box::new(DeflateCompressor::new(level)))
    }

    /// Create a writer around a caller-supplied compression transform.
    pub fn with_compressor(sink: W, header: Header, compressor: Box<dyn Compressor>) -> Self {
        Self {
            sink: Some(sink),
            header,
            compressor,
            checksum: Checksum::new(),
            state: State::Init,
            buf: Vec::new(),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable access to the header, only before it has been written.
    pub fn header_mut(&mut self) -> Result<&mut Header, GzError> {
        match self.state {
            State::Init => Ok(&mut self.header),
            _ => Err(UseError::HeaderFrozen.into()),
        }
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.sink.as_ref()
    }

    /// Payload bytes accepted so far, modulo 2^32
    pub fn total_in(&self) -> u32 {
        self.checksum.amount()
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    fn sink(&mut self) -> io::Result<&mut W> {
        self.sink.as_mut().ok_or_else(finished)
    }

    /// Queue the header ahead of any compressed output.
    fn write_header(&mut self) -> Result<(), GzError> {
        if self.state != State::Init {
            return Ok(());
        }
        let bytes = encode_header(&self.header)?;
        self.buf.extend_from_slice(&bytes);
        self.state = State::Streaming;
        Ok(())
    }

    /// Hand buffered output to the sink.
    ///
    /// Bytes leave the buffer only once the sink accepted them, so a failed
    /// drain can be retried without duplicating or losing output.
    fn drain(&mut self) -> io::Result<()> {
        while !self.buf.is_empty() {
            let sink = self.sink.as_mut().ok_or_else(finished)?;
            match sink.write(&self.buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.buf.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn write_payload(&mut self, data: &[u8]) -> Result<usize, GzError> {
        if matches!(self.state, State::Finishing | State::Closed) {
            return Err(UseError::WriteAfterClose.into());
        }
        // Output left over from an earlier call goes first; an error here
        // means none of `data` was taken
        self.drain()?;
        self.write_header()?;
        self.compressor.feed(data, &mut self.buf)?;
        self.checksum.update(data);
        // The input is accepted now; a sink error leaves the output queued
        // for the next call
        if let Err(e) = self.drain() {
            debug!("deferring {} compressed bytes: {}", self.buf.len(), e);
        }
        Ok(data.len())
    }

    fn flush_payload(&mut self) -> Result<(), GzError> {
        match self.state {
            State::Closed => return Ok(()),
            State::Finishing => {}
            State::Init | State::Streaming => {
                self.write_header()?;
                self.compressor.flush(&mut self.buf)?;
            }
        }
        self.drain()?;
        self.sink()?.flush()?;
        Ok(())
    }

    /// Finish the stream: header if still pending, compressed tail, trailer.
    ///
    /// Calling `close` again after success does nothing and succeeds. If the
    /// header cannot be encoded the writer stays open, so the header can be
    /// fixed and `close` retried. If the sink fails, the unwritten tail stays
    /// queued and a later `close` resumes writing it.
    pub fn close(&mut self) -> Result<(), GzError> {
        match self.state {
            State::Closed => return Ok(()),
            State::Finishing => {}
            State::Init | State::Streaming => {
                self.write_header()?;
                self.compressor.finish(&mut self.buf)?;
                let trailer = Trailer {
                    crc32: self.checksum.value(),
                    isize: self.checksum.amount(),
                };
                trailer.write_to(&mut self.buf)?;
                self.state = State::Finishing;
                debug!(
                    "queued gzip trailer: crc32 {:#010x}, isize {}",
                    trailer.crc32, trailer.isize
                );
            }
        }
        self.drain()?;
        self.sink()?.flush()?;
        self.state = State::Closed;
        Ok(())
    }

    /// Close the stream and hand back the sink.
    pub fn finish(mut self) -> Result<W, GzError> {
        self.close()?;
        Ok(self.sink.take().ok_or_else(finished)?)
    }
}

fn finished() -> io::Error {
    io::Error::other("gzip writer already finished")
}

impl<W: Write> Write for GzWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_payload(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_payload().map_err(io::Error::from)
    }
}

impl<W: Write> Drop for GzWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && self.state != State::Closed {
            let _ = self.close();
        }
    }
}
