//! Error taxonomy for the gzip codec.
//!
//! Every failure the codec can report falls into one of four kinds, plus
//! plain I/O errors from the underlying source or sink:
//!
//! - [`FormatError`]: the header cannot be parsed
//! - encoding errors: a Name/Comment field is not representable in Latin-1
//! - [`CorruptionError`]: the body or trailer does not match the payload
//! - [`UseError`]: the API was driven in an invalid order or with invalid values
//!
//! End-of-stream is never an error; readers report it as `Ok(0)`.

use std::fmt;
use std::io;

use thiserror::Error;

use super::latin1::Latin1Error;

/// Header field carrying Latin-1 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Name,
    Comment,
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextField::Name => f.write_str("name"),
            TextField::Comment => f.write_str("comment"),
        }
    }
}

/// The header could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid magic bytes {0:02x} {1:02x}")]
    BadMagic(u8, u8),
    #[error("unsupported compression method {0}")]
    UnknownMethod(u8),
    #[error("header checksum mismatch (stored {stored:#06x}, computed {computed:#06x})")]
    HeaderChecksum { stored: u16, computed: u16 },
    #[error("header is truncated")]
    Truncated,
}

/// The compressed body or the trailer does not match the decoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptionError {
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("length mismatch (stored {stored}, computed {computed})")]
    LengthMismatch { stored: u32, computed: u32 },
    #[error("invalid deflate data: {0}")]
    Deflate(String),
}

/// The codec was used incorrectly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UseError {
    #[error("write after close")]
    WriteAfterClose,
    #[error("read after close")]
    ReadAfterClose,
    #[error("header can no longer be modified once written")]
    HeaderFrozen,
    #[error("extra field is {0} bytes, at most 65535 allowed")]
    ExtraTooLong(usize),
    #[error("modification time does not fit in 32 bits")]
    MtimeOutOfRange,
}

#[derive(Debug, Error)]
pub enum GzError {
    #[error("invalid gzip header: {0}")]
    Format(#[from] FormatError),
    #[error("cannot write {field} field: {source}")]
    Encoding {
        field: TextField,
        #[source]
        source: Latin1Error,
    },
    #[error("corrupt gzip stream: {0}")]
    Corruption(#[from] CorruptionError),
    #[error("{0}")]
    Use(#[from] UseError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl GzError {
    /// Recover a codec error that travelled through `std::io::Read`/`Write`.
    pub fn from_io_ref(err: &io::Error) -> Option<&GzError> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<GzError>())
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, GzError::Corruption(_))
    }
}

impl From<GzError> for io::Error {
    fn from(err: GzError) -> Self {
        let kind = match err {
            GzError::Io(inner) => return inner,
            GzError::Format(FormatError::Truncated) => io::ErrorKind::UnexpectedEof,
            GzError::Format(_) | GzError::Corruption(_) => io::ErrorKind::InvalidData,
            GzError::Encoding { .. } => io::ErrorKind::InvalidInput,
            GzError::Use(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_round_trip_keeps_the_kind() {
        let err: io::Error = GzError::from(CorruptionError::LengthMismatch {
            stored: 1,
            computed: 2,
        })
        .into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let inner = GzError::from_io_ref(&err).unwrap();
        assert!(inner.is_corruption());
    }

    #[test]
    fn io_errors_are_unwrapped() {
        let err: io::Error = GzError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe")).into();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(GzError::from_io_ref(&err).is_none());
    }

    #[test]
    fn encoding_error_names_the_field() {
        let err = GzError::Encoding {
            field: TextField::Comment,
            source: Latin1Error::EmbeddedNul { index: 3 },
        };
        assert!(err.to_string().starts_with("cannot write comment field"));
    }
}
