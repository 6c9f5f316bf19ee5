use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::io::ReadAt;
use crate::zip::{CompressionMethod, ZipExtractor, ZipFileEntry};

use super::{CONTENT_TYPES, MIMETYPE};

/// What [`verify_package`] found in a well-formed archive.
#[derive(Debug, Clone)]
pub struct PackageCheck {
    pub entries: Vec<ZipFileEntry>,
    pub has_mimetype: bool,
    pub has_content_types: bool,
}

/// Re-read an archive and check the packaging rules: a `mimetype` entry,
/// when present, is the first entry and is stored uncompressed; entry
/// names are unique; every entry decompresses to its recorded size and CRC.
pub async fn verify_package<R: ReadAt>(reader: Arc<R>) -> Result<PackageCheck> {
    let extractor = ZipExtractor::new(reader);
    let entries = extractor.list_files().await?;

    if let Some(position) = entries.iter().position(|e| e.file_name == MIMETYPE) {
        if position != 0 {
            bail!("'{MIMETYPE}' must be the first entry, found at position {position}");
        }
        if entries[0].compression_method != CompressionMethod::Stored {
            bail!("'{MIMETYPE}' must be stored without compression");
        }
    }

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.file_name.as_str()) {
            bail!("Duplicate entry '{}'", entry.file_name);
        }
        if !entry.is_directory {
            extractor
                .extract_to_memory(entry)
                .await
                .with_context(|| format!("Entry '{}' is unreadable", entry.file_name))?;
        }
    }

    Ok(PackageCheck {
        has_mimetype: entries.first().is_some_and(|e| e.file_name == MIMETYPE),
        has_content_types: entries.iter().any(|e| e.file_name == CONTENT_TYPES),
        entries,
    })
}
