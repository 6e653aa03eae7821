//! gzip (RFC 1952) stream codec.
//!
//! ## Architecture
//!
//! - [`structures`]: wire constants, the [`Header`] value and the trailer
//! - [`latin1`]: ISO-8859-1 codec for the Name and Comment fields
//! - [`header`]: header encoding and decoding
//! - [`transform`]: deflate and CRC-32 seams
//! - [`writer`] / [`reader`]: the streaming producer and consumer
//! - [`inspector`]: header/trailer listing over random-access sources
//!
//! ## Format Overview
//!
//! A gzip member consists of:
//! 1. A 10-byte fixed header plus optional Extra, Name, Comment and header CRC
//! 2. A raw deflate stream
//! 3. An 8-byte trailer holding the CRC-32 and length (mod 2^32) of the payload
//!
//! ## Limitations
//!
//! - Only the first member of a multi-member file is decoded
//! - Deflate (method 8) is the only compression method

pub mod error;
pub mod header;
mod inspector;
pub mod latin1;
mod reader;
pub mod structures;
pub mod transform;
mod writer;

pub use error::{CorruptionError, FormatError, GzError, TextField, UseError};
pub use header::{decode_header, encode_header};
pub use inspector::{GzEntry, GzInspector};
pub use reader::GzReader;
pub use structures::{Header, Os, Trailer};
pub use writer::GzWriter;
