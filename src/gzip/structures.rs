use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Read, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// gzip magic bytes (ID1, ID2)
pub const MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression method byte for deflate, the only method defined
pub const METHOD_DEFLATE: u8 = 8;

/// Extra-flags byte, always written as zero
pub const XFL: u8 = 0;

/// Fixed header: ID1 ID2 CM FLG MTIME(4) XFL OS
pub const HEADER_SIZE: usize = 10;

/// Trailer: CRC32(4) ISIZE(4)
pub const TRAILER_SIZE: usize = 8;

/// Largest Extra payload the 2-byte XLEN field can describe
pub const MAX_EXTRA_LEN: usize = u16::MAX as usize;

/// Header flag bits
pub mod flags {
    pub const FTEXT: u8 = 0x01;
    pub const FHCRC: u8 = 0x02;
    pub const FEXTRA: u8 = 0x04;
    pub const FNAME: u8 = 0x08;
    pub const FCOMMENT: u8 = 0x10;
    pub const RESERVED: u8 = 0xe0;
}

/// Operating system the stream was produced on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Os {
    Fat,
    Amiga,
    Vms,
    Unix,
    VmCms,
    AtariTos,
    Hpfs,
    Macintosh,
    ZSystem,
    Cpm,
    Tops20,
    Ntfs,
    Qdos,
    AcornRiscos,
    #[default]
    Unknown,
    Other(u8),
}

impl Os {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Os::Fat,
            1 => Os::Amiga,
            2 => Os::Vms,
            3 => Os::Unix,
            4 => Os::VmCms,
            5 => Os::AtariTos,
            6 => Os::Hpfs,
            7 => Os::Macintosh,
            8 => Os::ZSystem,
            9 => Os::Cpm,
            10 => Os::Tops20,
            11 => Os::Ntfs,
            12 => Os::Qdos,
            13 => Os::AcornRiscos,
            255 => Os::Unknown,
            _ => Os::Other(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Os::Fat => 0,
            Os::Amiga => 1,
            Os::Vms => 2,
            Os::Unix => 3,
            Os::VmCms => 4,
            Os::AtariTos => 5,
            Os::Hpfs => 6,
            Os::Macintosh => 7,
            Os::ZSystem => 8,
            Os::Cpm => 9,
            Os::Tops20 => 10,
            Os::Ntfs => 11,
            Os::Qdos => 12,
            Os::AcornRiscos => 13,
            Os::Unknown => 255,
            Os::Other(v) => *v,
        }
    }

    /// The marker for the platform this binary was built for
    pub fn current() -> Self {
        if cfg!(unix) {
            Os::Unix
        } else if cfg!(windows) {
            Os::Ntfs
        } else {
            Os::Unknown
        }
    }
}

/// gzip member header metadata.
///
/// Absent fields are `None`. An empty Extra, Name or Comment is treated as
/// absent when written, so it reads back as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub(crate) mtime: Option<SystemTime>,
    pub(crate) extra: Option<Vec<u8>>,
    pub(crate) name: Option<String>,
    pub(crate) comment: Option<String>,
    pub(crate) os: Os,
    pub(crate) header_crc: bool,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Set the modification time from seconds since the epoch; zero means unknown.
    pub fn with_mtime_secs(mut self, secs: u32) -> Self {
        self.mtime = mtime_from_secs(secs);
        self
    }

    pub fn with_extra(mut self, extra: impl Into<Vec<u8>>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_os(mut self, os: Os) -> Self {
        self.os = os;
        self
    }

    /// Request the optional 16-bit header checksum.
    pub fn with_header_crc(mut self, enabled: bool) -> Self {
        self.header_crc = enabled;
        self
    }

    pub fn set_mtime(&mut self, mtime: Option<SystemTime>) {
        self.mtime = mtime;
    }

    pub fn set_extra(&mut self, extra: Option<Vec<u8>>) {
        self.extra = extra;
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    pub fn set_os(&mut self, os: Os) {
        self.os = os;
    }

    pub fn set_header_crc(&mut self, enabled: bool) {
        self.header_crc = enabled;
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    /// Modification time as stored on the wire, zero when unknown
    pub fn mtime_secs(&self) -> u64 {
        self.mtime
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn extra(&self) -> Option<&[u8]> {
        self.extra.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn header_crc(&self) -> bool {
        self.header_crc
    }
}

pub(crate) fn mtime_from_secs(secs: u32) -> Option<SystemTime> {
    if secs == 0 {
        None
    } else {
        Some(UNIX_EPOCH + Duration::from_secs(u64::from(secs)))
    }
}

/// Trailer following the compressed body - 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub crc32: u32,
    /// Uncompressed length modulo 2^32
    pub isize: u32,
}

impl Trailer {
    pub fn from_bytes(data: &[u8; TRAILER_SIZE]) -> Self {
        Self {
            crc32: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            isize: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        }
    }

    pub fn read_from<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut buf = [0u8; TRAILER_SIZE];
        reader.read_exact(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.isize)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_marker_round_trips() {
        for value in 0..=255u8 {
            assert_eq!(Os::from_u8(value).as_u8(), value);
        }
        assert_eq!(Os::default().as_u8(), 255);
    }

    #[test]
    fn trailer_is_little_endian() {
        let trailer = Trailer {
            crc32: 0x0403_0201,
            isize: 0x0807_0605,
        };
        let mut buf = Vec::new();
        trailer.write_to(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(Trailer::read_from(&buf[..]).unwrap(), trailer);
    }

    #[test]
    fn zero_mtime_means_unknown() {
        let header = Header::new().with_mtime_secs(0);
        assert_eq!(header.mtime(), None);
        assert_eq!(header.mtime_secs(), 0);

        let header = Header::new().with_mtime_secs(100_000_000);
        assert_eq!(header.mtime_secs(), 100_000_000);
    }
}
