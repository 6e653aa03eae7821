//! # rgz
//!
//! A streaming gzip codec and a gzip-compatible command line tool.
//!
//! This library frames arbitrary byte streams in the gzip container format
//! (RFC 1952) and parses them back, verifying the CRC-32 and length stored in
//! the trailer. Header metadata (modification time, name, comment, extra
//! data, OS marker and the optional header checksum) is exposed as a typed
//! [`Header`] value.
//!
//! ## Features
//!
//! - Streaming [`GzWriter`] (`std::io::Write`) and [`GzReader`] (`std::io::Read`)
//! - Latin-1 validation for the Name and Comment fields
//! - Distinct errors for bad headers, corrupt payloads and truncated streams
//! - Listing of local or remote (HTTP Range) gzip files without decompressing
//!
//! ## Example
//!
//! ```
//! use std::io::{Read, Write};
//! use rgz::{GzReader, GzWriter, Header};
//!
//! let header = Header::new().with_name("greeting.txt").with_comment("hi");
//! let mut writer = GzWriter::with_header(Vec::new(), header, Default::default());
//! writer.write_all(b"hello world")?;
//! let compressed = writer.finish()?;
//!
//! let mut reader = GzReader::new(&compressed[..])?;
//! assert_eq!(reader.header().name(), Some("greeting.txt"));
//! let mut text = String::new();
//! reader.read_to_string(&mut text)?;
//! assert_eq!(text, "hello world");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod gzip;
pub mod io;

pub use cli::Cli;
pub use flate2::Compression;
pub use gzip::{
    CorruptionError, FormatError, GzEntry, GzError, GzInspector, GzReader, GzWriter, Header, Os,
    UseError,
};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt};
