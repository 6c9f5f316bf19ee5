use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, Local, Timelike};
use std::io::{self, Cursor, Write};
use std::time::SystemTime;

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// Minimum "version needed to extract" for entries using this method.
    pub fn version_needed(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 10,
            _ => 20,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionMethod::Stored => "stored",
            CompressionMethod::Deflate => "deflated",
            CompressionMethod::Unknown(_) => "unknown",
        }
    }
}

/// "Version made by": APPNOTE 2.0, UNIX host.
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// General purpose flag bit 11: file name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// MS-DOS date and time as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    pub const EPOCH: DosDateTime = DosDateTime {
        date: (1 << 5) | 1,
        time: 0,
    };

    /// Convert a filesystem timestamp to local DOS time, clamped to 1980..=2107.
    pub fn from_system_time(time: SystemTime) -> Self {
        let local: chrono::DateTime<Local> = time.into();
        let year = local.year();
        if year < 1980 {
            return Self::EPOCH;
        }
        if year > 2107 {
            return DosDateTime {
                date: (127 << 9) | (12 << 5) | 31,
                time: (23 << 11) | (59 << 5) | 29,
            };
        }
        DosDateTime {
            date: (((year - 1980) as u16) << 9) | ((local.month() as u16) << 5) | local.day() as u16,
            time: ((local.hour() as u16) << 11)
                | ((local.minute() as u16) << 5)
                | (local.second() as u16 / 2),
        }
    }

    /// Parse date to (year, month, day)
    pub fn ymd(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse time to (hour, minute, second)
    pub fn hms(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Single-disk EOCD with no archive comment.
    pub fn new(entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entries,
            total_entries: entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            bail!("Invalid End of Central Directory");
        }

        // Verify signature
        if &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(Self::SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.disk_number)?;
        w.write_u16::<LittleEndian>(self.disk_with_cd)?;
        w.write_u16::<LittleEndian>(self.disk_entries)?;
        w.write_u16::<LittleEndian>(self.total_entries)?;
        w.write_u32::<LittleEndian>(self.cd_size)?;
        w.write_u32::<LittleEndian>(self.cd_offset)?;
        w.write_u16::<LittleEndian>(self.comment_len)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Offset of the CRC-32 field inside a local file header; crc and both
/// sizes follow back to back.
pub const LFH_CRC_OFFSET: u64 = 14;

/// Header fields shared by the local and central records of one entry.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub lfh_offset: u32,
}

impl EntryHeader {
    fn flags(&self) -> u16 {
        if self.file_name.is_ascii() { 0 } else { FLAG_UTF8 }
    }

    /// Write the Local File Header, without extra field.
    pub fn write_local<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(LFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(self.compression_method.version_needed())?;
        w.write_u16::<LittleEndian>(self.flags())?;
        w.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        w.write_u16::<LittleEndian>(self.modified.time)?;
        w.write_u16::<LittleEndian>(self.modified.date)?;
        self.write_sizes(w)?;
        w.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_all(self.file_name.as_bytes())
    }

    /// Write crc32, compressed size and uncompressed size, in header order.
    pub fn write_sizes<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.crc32)?;
        w.write_u32::<LittleEndian>(self.compressed_size)?;
        w.write_u32::<LittleEndian>(self.uncompressed_size)
    }

    /// Write the Central Directory File Header.
    pub fn write_central<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(CDFH_SIGNATURE)?;
        w.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        w.write_u16::<LittleEndian>(self.compression_method.version_needed())?;
        w.write_u16::<LittleEndian>(self.flags())?;
        w.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        w.write_u16::<LittleEndian>(self.modified.time)?;
        w.write_u16::<LittleEndian>(self.modified.date)?;
        self.write_sizes(w)?;
        w.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        w.write_u16::<LittleEndian>(0)?; // extra field length
        w.write_u16::<LittleEndian>(0)?; // file comment length
        w.write_u16::<LittleEndian>(0)?; // disk number start
        w.write_u16::<LittleEndian>(0)?; // internal attributes
        // Regular file, rw-r--r--
        w.write_u32::<LittleEndian>(0o100644 << 16)?;
        w.write_u32::<LittleEndian>(self.lfh_offset)?;
        w.write_all(self.file_name.as_bytes())
    }

    /// Size of this entry's record in the central directory.
    #[cfg(test)]
    pub fn central_len(&self) -> usize {
        CDFH_MIN_SIZE + self.file_name.len()
    }
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    fn modified(&self) -> DosDateTime {
        DosDateTime {
            date: self.last_mod_date,
            time: self.last_mod_time,
        }
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        self.modified().ymd()
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        self.modified().hms()
    }
}
