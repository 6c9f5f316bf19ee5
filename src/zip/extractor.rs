use flate2::read::DeflateDecoder;
use std::io::Read;
use std::path::{Component, Path};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract file data to memory, checking size and CRC-32.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.get_data_offset(entry).await?;

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_exact_at(data_offset, &mut raw).await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                DeflateDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!(
                    "Unsupported compression method {} for '{}'",
                    method,
                    entry.file_name
                );
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "Size mismatch for '{}': expected {} bytes, got {}",
                entry.file_name,
                entry.uncompressed_size,
                data.len()
            );
        }

        let mut crc = flate2::Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!(
                "CRC-32 mismatch for '{}': expected {:08x}, got {:08x}",
                entry.file_name,
                entry.crc32,
                crc.sum()
            );
        }

        Ok(data)
    }

    /// Extract an entry under `dest_dir`, recreating its relative path.
    pub async fn extract_into(&self, entry: &ZipFileEntry, dest_dir: &Path) -> Result<()> {
        let relative = Path::new(&entry.file_name);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("Refusing to extract unsafe path '{}'", entry.file_name);
        }
        self.extract_to_file(entry, &dest_dir.join(relative)).await
    }

    /// Extract file to disk
    pub async fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = self.extract_to_memory(entry).await?;

        let mut file = fs::File::create(output_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::{DosDateTime, ZipWriter};
    use std::io::Cursor;

    fn single_entry(method: CompressionMethod, data: &[u8]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.write_entry("xl/sharedStrings.xml", method, DosDateTime::EPOCH, &mut &data[..])
            .unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn inflates_deflated_entries() {
        let content = b"<sst count=\"3\"><si><t>a</t></si></sst>".repeat(10);
        let extractor =
            ZipExtractor::new(Arc::new(MemoryReader::new(single_entry(CompressionMethod::Deflate, &content))));
        let entries = extractor.list_files().await.unwrap();
        assert_eq!(extractor.extract_to_memory(&entries[0]).await.unwrap(), content);
    }

    #[tokio::test]
    async fn detects_corrupted_stored_data() {
        let mut archive = single_entry(CompressionMethod::Stored, b"hello world");
        let data_at = crate::zip::LFH_SIZE + "xl/sharedStrings.xml".len();
        archive[data_at] ^= 0xFF;

        let extractor = ZipExtractor::new(Arc::new(MemoryReader::new(archive)));
        let entries = extractor.list_files().await.unwrap();
        let err = extractor.extract_to_memory(&entries[0]).await.unwrap_err();
        assert!(err.to_string().contains("CRC-32 mismatch"));
    }
}
