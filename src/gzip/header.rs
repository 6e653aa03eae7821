//! Header codec.
//!
//! Encodes a [`Header`] into its wire form and parses it back. The wire
//! layout, in order:
//!
//! 1. Fixed 10 bytes: magic, method, flags, mtime, extra flags, OS
//! 2. `FEXTRA`: 2-byte length then the raw bytes
//! 3. `FNAME`: Latin-1 text, NUL terminated
//! 4. `FCOMMENT`: Latin-1 text, NUL terminated
//! 5. `FHCRC`: low 16 bits of the CRC-32 over every preceding header byte

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read};
use std::time::UNIX_EPOCH;

use log::{debug, warn};

use super::error::{FormatError, GzError, TextField, UseError};
use super::latin1;
use super::structures::{
    HEADER_SIZE, Header, MAGIC, MAX_EXTRA_LEN, METHOD_DEFLATE, Os, XFL, flags, mtime_from_secs,
};

/// Encode `header` into a complete byte buffer.
///
/// Nothing is produced on error, so a failed encode never leaves a partial
/// header in the output.
pub fn encode_header(header: &Header) -> Result<Vec<u8>, GzError> {
    let extra = header.extra.as_deref().filter(|e| !e.is_empty());
    if let Some(extra) = extra {
        if extra.len() > MAX_EXTRA_LEN {
            return Err(UseError::ExtraTooLong(extra.len()).into());
        }
    }
    let name = encode_text(header.name.as_deref(), TextField::Name)?;
    let comment = encode_text(header.comment.as_deref(), TextField::Comment)?;
    let mtime = encode_mtime(header)?;

    let mut flg = 0u8;
    if extra.is_some() {
        flg |= flags::FEXTRA;
    }
    if name.is_some() {
        flg |= flags::FNAME;
    }
    if comment.is_some() {
        flg |= flags::FCOMMENT;
    }
    if header.header_crc {
        flg |= flags::FHCRC;
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(&MAGIC);
    buf.push(METHOD_DEFLATE);
    buf.push(flg);
    buf.write_u32::<LittleEndian>(mtime)?;
    buf.push(XFL);
    buf.push(header.os.as_u8());

    if let Some(extra) = extra {
        buf.write_u16::<LittleEndian>(extra.len() as u16)?;
        buf.extend_from_slice(extra);
    }
    for text in [name, comment].into_iter().flatten() {
        buf.extend_from_slice(&text);
        buf.push(0);
    }
    if header.header_crc {
        let crc = crc32fast::hash(&buf) as u16;
        buf.write_u16::<LittleEndian>(crc)?;
    }

    debug!("encoded gzip header: {} bytes, flags {:#04x}", buf.len(), flg);
    Ok(buf)
}

/// Latin-1 encode an optional text field; empty text counts as absent.
fn encode_text(text: Option<&str>, field: TextField) -> Result<Option<Vec<u8>>, GzError> {
    match text {
        Some(text) if !text.is_empty() => latin1::encode(text)
            .map(Some)
            .map_err(|source| GzError::Encoding { field, source }),
        _ => Ok(None),
    }
}

fn encode_mtime(header: &Header) -> Result<u32, GzError> {
    let Some(mtime) = header.mtime else {
        return Ok(0);
    };
    // Times before the epoch have no representation and are stored as unknown
    let secs = match mtime.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs(),
        Err(_) => return Ok(0),
    };
    u32::try_from(secs).map_err(|_| UseError::MtimeOutOfRange.into())
}

/// Reader adapter that hashes every byte it hands out
struct CrcReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    consumed: usize,
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.consumed += n;
        Ok(n)
    }
}

/// Parse a header from `reader`.
///
/// Only header bytes are consumed from `reader` itself; callers that want
/// to avoid per-byte reads should hand in a buffered source.
pub fn decode_header<R: Read>(reader: &mut R) -> Result<Header, GzError> {
    decode_header_with_len(reader).map(|(header, _)| header)
}

/// Parse a header and report how many bytes it occupied.
pub fn decode_header_with_len<R: Read>(reader: &mut R) -> Result<(Header, usize), GzError> {
    let mut r = CrcReader {
        inner: reader,
        hasher: crc32fast::Hasher::new(),
        consumed: 0,
    };
    let header = parse(&mut r).map_err(|e| match e {
        GzError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
            GzError::Format(FormatError::Truncated)
        }
        other => other,
    })?;
    debug!("parsed gzip header: {} bytes", r.consumed);
    Ok((header, r.consumed))
}

fn parse<R: Read>(r: &mut CrcReader<R>) -> Result<Header, GzError> {
    let mut fixed = [0u8; HEADER_SIZE];
    r.read_exact(&mut fixed)?;

    if fixed[0..2] != MAGIC {
        return Err(FormatError::BadMagic(fixed[0], fixed[1]).into());
    }
    if fixed[2] != METHOD_DEFLATE {
        return Err(FormatError::UnknownMethod(fixed[2]).into());
    }

    let flg = fixed[3];
    if flg & flags::RESERVED != 0 {
        warn!("ignoring reserved gzip header flags {:#04x}", flg & flags::RESERVED);
    }

    let mut cursor = &fixed[4..];
    let mtime = cursor.read_u32::<LittleEndian>()?;
    let _xfl = cursor.read_u8()?;
    let os = Os::from_u8(cursor.read_u8()?);

    let mut header = Header {
        mtime: mtime_from_secs(mtime),
        os,
        ..Header::default()
    };

    if flg & flags::FEXTRA != 0 {
        let len = r.read_u16::<LittleEndian>()?;
        let mut extra = vec![0u8; len as usize];
        r.read_exact(&mut extra)?;
        header.extra = Some(extra);
    }
    if flg & flags::FNAME != 0 {
        header.name = Some(read_text(r)?);
    }
    if flg & flags::FCOMMENT != 0 {
        header.comment = Some(read_text(r)?);
    }
    if flg & flags::FHCRC != 0 {
        let computed = r.hasher.clone().finalize() as u16;
        let stored = r.read_u16::<LittleEndian>()?;
        if stored != computed {
            return Err(FormatError::HeaderChecksum { stored, computed }.into());
        }
        header.header_crc = true;
    }

    Ok(header)
}

/// Read NUL-terminated Latin-1 text
fn read_text<R: Read>(r: &mut R) -> Result<String, GzError> {
    let mut bytes = Vec::new();
    loop {
        match r.read_u8()? {
            0 => break,
            b => bytes.push(b),
        }
    }
    Ok(latin1::decode(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gzip::latin1::Latin1Error;

    #[test]
    fn minimal_header_layout() {
        let bytes = encode_header(&Header::new()).unwrap();
        assert_eq!(bytes, [0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn full_header_layout() {
        let header = Header::new()
            .with_mtime_secs(0x0403_0201)
            .with_extra(b"ex".to_vec())
            .with_name("n\u{e9}")
            .with_comment("c")
            .with_os(Os::Unix);
        let bytes = encode_header(&header).unwrap();
        assert_eq!(
            bytes,
            [
                0x1f, 0x8b, 8, 0x1c, 1, 2, 3, 4, 0, 3, // fixed
                2, 0, b'e', b'x', // extra
                b'n', 0xe9, 0, // name
                b'c', 0, // comment
            ]
        );
        let (decoded, len) = decode_header_with_len(&mut &bytes[..]).unwrap();
        assert_eq!(len, bytes.len());
        assert_eq!(decoded, header);
    }

    #[test]
    fn empty_fields_are_not_written() {
        let header = Header::new().with_name("").with_comment("").with_extra(Vec::new());
        let bytes = encode_header(&header).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(bytes[3], 0);
    }

    #[test]
    fn header_crc_round_trip() {
        let header = Header::new().with_name("file.txt").with_header_crc(true);
        let bytes = encode_header(&header).unwrap();
        assert_eq!(bytes[3] & flags::FHCRC, flags::FHCRC);

        let decoded = decode_header(&mut &bytes[..]).unwrap();
        assert!(decoded.header_crc());
        assert_eq!(decoded.name(), Some("file.txt"));
    }

    #[test]
    fn header_crc_detects_damage() {
        let header = Header::new().with_name("file.txt").with_header_crc(true);
        let mut bytes = encode_header(&header).unwrap();
        bytes[11] ^= 0x20;
        let err = decode_header(&mut &bytes[..]).unwrap_err();
        assert!(matches!(
            err,
            GzError::Format(FormatError::HeaderChecksum { .. })
        ));
    }

    #[test]
    fn bad_magic_and_method() {
        let mut bytes = encode_header(&Header::new()).unwrap();
        bytes[1] = 0x8c;
        assert!(matches!(
            decode_header(&mut &bytes[..]),
            Err(GzError::Format(FormatError::BadMagic(0x1f, 0x8c)))
        ));

        let mut bytes = encode_header(&Header::new()).unwrap();
        bytes[2] = 7;
        assert!(matches!(
            decode_header(&mut &bytes[..]),
            Err(GzError::Format(FormatError::UnknownMethod(7)))
        ));
    }

    #[test]
    fn truncation_is_reported() {
        let bytes = encode_header(&Header::new().with_name("abc")).unwrap();
        for cut in 0..bytes.len() {
            let err = decode_header(&mut &bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, GzError::Format(FormatError::Truncated)),
                "cut at {cut}: {err}"
            );
        }
    }

    #[test]
    fn reserved_flags_are_ignored() {
        let mut bytes = encode_header(&Header::new()).unwrap();
        bytes[3] |= flags::RESERVED | flags::FTEXT;
        assert!(decode_header(&mut &bytes[..]).is_ok());
    }

    #[test]
    fn unencodable_name_is_rejected() {
        let err = encode_header(&Header::new().with_name("\u{100}")).unwrap_err();
        assert!(matches!(
            err,
            GzError::Encoding {
                field: TextField::Name,
                source: Latin1Error::OutOfRange { .. }
            }
        ));
        let err = encode_header(&Header::new().with_comment("a\0b")).unwrap_err();
        assert!(matches!(
            err,
            GzError::Encoding {
                field: TextField::Comment,
                source: Latin1Error::EmbeddedNul { index: 1 }
            }
        ));
    }

    #[test]
    fn oversized_extra_is_rejected() {
        let header = Header::new().with_extra(vec![0u8; MAX_EXTRA_LEN + 1]);
        assert!(matches!(
            encode_header(&header),
            Err(GzError::Use(UseError::ExtraTooLong(_)))
        ));
    }

    #[test]
    fn out_of_range_mtime_is_rejected() {
        let far = UNIX_EPOCH + std::time::Duration::from_secs(u64::from(u32::MAX) + 1);
        let header = Header::new().with_mtime(far);
        assert!(matches!(
            encode_header(&header),
            Err(GzError::Use(UseError::MtimeOutOfRange))
        ));
    }
}
