//! Low-level ZIP archive parser.
//!
//! Reads an archive back from any [`ReadAt`] source, the way a consumer
//! of a rebuilt package would:
//! 1. Find the End of Central Directory (EOCD) at the end of the archive
//! 2. Read the Central Directory to get metadata for all entries
//! 3. For extraction, read each entry's Local File Header to locate its data
//!
//! ZIP64 archives are recognized and rejected; the writer never produces them.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser, generic over the data source.
///
/// Typically used through [`ZipExtractor`](super::ZipExtractor).
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Tries the common no-comment layout first, then searches backwards
    /// through a possible archive comment.
    ///
    /// Returns the record and its offset in the archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = self.size - EndOfCentralDirectory::SIZE as u64;
            let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
            self.reader.read_exact_at(offset, &mut buf).await?;

            if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
                let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
                return Ok((eocd, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        for i in (0..buf.len().saturating_sub(EndOfCentralDirectory::SIZE)).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length must account for every remaining byte.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// List all entries in archive order, as recorded in the Central Directory.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        if eocd.is_zip64() {
            bail!("ZIP64 archives are not supported");
        }
        if eocd.disk_number != 0 || eocd.disk_with_cd != 0 {
            bail!("Multi-disk archives are not supported");
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_size = eocd.cd_size as u64;
        if cd_offset + cd_size > eocd_offset {
            bail!("Central Directory overlaps the End of Central Directory record");
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(eocd.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for index in 0..eocd.total_entries {
            let entry = parse_cdfh(&mut cursor)
                .with_context(|| format!("Corrupt Central Directory entry #{index}"))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Offset of the first byte of an entry's (possibly compressed) data.
    ///
    /// The Local File Header may carry a different extra field than the
    /// Central Directory, so its own lengths are read.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader.read_exact_at(entry.lfh_offset, &mut lfh_buf).await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for '{}'", entry.file_name);
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Parse one Central Directory File Header.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        bail!("Invalid Central Directory File Header");
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    if flags & 0x0001 != 0 {
        bail!("Encrypted entries are not supported");
    }

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

    let is_directory = file_name.ends_with('/');

    // Neither the extra field nor the comment is used.
    cursor.set_position(cursor.position() + extra_field_length as u64 + file_comment_length as u64);

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        last_mod_time,
        last_mod_date,
        is_directory,
    })
}
