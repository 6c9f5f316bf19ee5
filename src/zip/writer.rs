//! Streaming ZIP archive writer.
//!
//! Entries are written one after another as a Local File Header followed
//! by the entry data. The CRC-32 and sizes are only known once the data
//! has been streamed, so the writer seeks back and patches them into the
//! local header. No data descriptors are emitted: every local header is
//! complete, which packaged-document readers rely on for the leading
//! `mimetype` entry.
//!
//! [`ZipWriter::finish`] appends the Central Directory and the End of
//! Central Directory record. A writer dropped before `finish` finalizes
//! itself on a best-effort basis, so an aborted build still leaves a
//! readable archive of the entries completed so far.

use flate2::write::DeflateEncoder;
use flate2::{Compression, CrcReader};
use std::collections::HashSet;
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::structures::*;

/// Entry as recorded in the archive, returned by [`ZipWriter::write_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// ZIP writer over a seekable sink.
pub struct ZipWriter<W: Write + Seek> {
    /// `None` once the archive has been finalized
    inner: Option<W>,
    entries: Vec<EntryHeader>,
    names: HashSet<String>,
    level: Compression,
}

impl<W: Write + Seek> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Some(inner),
            entries: Vec::new(),
            names: HashSet::new(),
            level: Compression::default(),
        }
    }

    /// Set the deflate level (0-9) used for subsequent entries.
    pub fn set_compression_level(&mut self, level: u32) {
        self.level = Compression::new(level.min(9));
    }

    /// Write one entry, streaming all of `data` into it.
    pub fn write_entry<R: Read>(
        &mut self,
        name: &str,
        method: CompressionMethod,
        modified: DosDateTime,
        data: &mut R,
    ) -> io::Result<WrittenEntry> {
        validate_name(name)?;
        if self.names.contains(name) {
            return Err(invalid_input(format!("duplicate entry name '{name}'")));
        }
        if self.entries.len() >= u16::MAX as usize {
            return Err(invalid_input("too many entries for a non-ZIP64 archive"));
        }
        if !matches!(method, CompressionMethod::Stored | CompressionMethod::Deflate) {
            return Err(invalid_input(format!(
                "unsupported compression method {}",
                method.as_u16()
            )));
        }

        let level = self.level;
        let inner = self.inner_mut()?;
        let lfh_offset = to_u32(inner.stream_position()?, "archive offset")?;

        let mut header = EntryHeader {
            file_name: name.to_string(),
            compression_method: method,
            modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            lfh_offset,
        };
        header.write_local(inner)?;
        let data_start = inner.stream_position()?;

        let mut source = CrcReader::new(data);
        let uncompressed = match method {
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(&mut *inner, level);
                io::copy(&mut source, &mut encoder)?;
                let total_in = encoder.total_in();
                encoder.finish()?;
                total_in
            }
            _ => io::copy(&mut source, inner)?,
        };
        let data_end = inner.stream_position()?;

        header.crc32 = source.crc().sum();
        header.uncompressed_size = to_u32(uncompressed, "entry size")?;
        header.compressed_size = to_u32(data_end - data_start, "compressed entry size")?;

        // Patch crc and sizes into the local header.
        inner.seek(SeekFrom::Start(lfh_offset as u64 + LFH_CRC_OFFSET))?;
        header.write_sizes(inner)?;
        inner.seek(SeekFrom::Start(data_end))?;

        let written = WrittenEntry {
            file_name: header.file_name.clone(),
            compression_method: method,
            crc32: header.crc32,
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
        };
        self.names.insert(header.file_name.clone());
        self.entries.push(header);
        Ok(written)
    }

    /// Write the Central Directory and EOCD, flush, and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        let result = self.finalize();
        let inner = self.inner.take();
        result?;
        inner.ok_or_else(|| io::Error::other("archive already finalized"))
    }

    fn finalize(&mut self) -> io::Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(io::Error::other("archive already finalized"));
        };
        let cd_offset = inner.stream_position()?;
        for entry in &self.entries {
            entry.write_central(inner)?;
        }
        let cd_size = inner.stream_position()? - cd_offset;

        EndOfCentralDirectory::new(
            self.entries.len() as u16,
            to_u32(cd_size, "central directory size")?,
            to_u32(cd_offset, "central directory offset")?,
        )
        .write_to(inner)?;
        inner.flush()
    }

    fn inner_mut(&mut self) -> io::Result<&mut W> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::other("archive already finalized"))
    }
}

impl<W: Write + Seek> Drop for ZipWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            if let Err(e) = self.finalize() {
                tracing::warn!("failed to finalize archive on drop: {e}");
            }
        }
    }
}

fn validate_name(name: &str) -> io::Result<()> {
    if name.is_empty() {
        return Err(invalid_input("empty entry name"));
    }
    if name.starts_with('/') {
        return Err(invalid_input(format!("entry name '{name}' must be relative")));
    }
    if name.len() > u16::MAX as usize {
        return Err(invalid_input("entry name too long"));
    }
    Ok(())
}

fn to_u32(value: u64, what: &str) -> io::Result<u32> {
    u32::try_from(value)
        .map_err(|_| invalid_input(format!("{what} exceeds 4 GiB (ZIP64 is not supported)")))
}

fn invalid_input(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.into())
}
