//! Packaged-document rebuilding.
//!
//! A packaged document (xlsx, docx, ods, ...) is a ZIP container whose
//! unpacked form is a directory tree. Rebuilding it takes more than zipping
//! the directory: ODF-style packages require an uncompressed `mimetype`
//! entry at the very start of the archive, and OPC packages expect entry
//! names with forward slashes relative to the package root.
//!
//! - [`builder`]: walks a directory and writes the archive
//! - [`verify`]: reads an archive back and checks the packaging rules

mod builder;
mod options;
mod verify;

use std::fmt;
use std::path::PathBuf;

use crate::zip::WrittenEntry;

pub use builder::{PackageBuilder, build};
pub use options::PackOptions;
pub use verify::{PackageCheck, verify_package};

/// Name of the leading, uncompressed package entry.
pub const MIMETYPE: &str = "mimetype";

/// Content-type manifest at the root of every OPC package.
pub const CONTENT_TYPES: &str = "[Content_Types].xml";

/// Advisory conditions raised during a build. None of them fail it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackWarning {
    /// No `[Content_Types].xml` at the root; the tree may not be an unpacked package.
    MissingContentTypes,
    /// No `mimetype` file at the root; the archive may not be a conformant package.
    MissingMimetype,
    /// A symbolic link to a directory was not followed.
    SkippedSymlinkDir(PathBuf),
}

impl fmt::Display for PackWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackWarning::MissingContentTypes => write!(
                f,
                "could not find '{CONTENT_TYPES}', the directory might not be an unpacked package"
            ),
            PackWarning::MissingMimetype => write!(
                f,
                "'{MIMETYPE}' file not found, the output package may be invalid"
            ),
            PackWarning::SkippedSymlinkDir(path) => write!(
                f,
                "skipped symbolic link to directory '{}'",
                path.display()
            ),
        }
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    /// Where the archive was saved; `None` when packing into a caller-supplied writer.
    pub output: Option<PathBuf>,
    /// Entries in archive order.
    pub entries: Vec<WrittenEntry>,
    pub warnings: Vec<PackWarning>,
}

impl PackReport {
    pub fn total_uncompressed(&self) -> u64 {
        self.entries.iter().map(|e| e.uncompressed_size).sum()
    }

    pub fn total_compressed(&self) -> u64 {
        self.entries.iter().map(|e| e.compressed_size).sum()
    }
}
