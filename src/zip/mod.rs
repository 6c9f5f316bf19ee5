//! ZIP container reading and writing.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (EOCD, local and central headers, DOS time)
//! - [`writer`]: streaming archive writer used to rebuild packages
//! - [`parser`]: low-level parsing of ZIP structures from a [`ReadAt`](crate::io::ReadAt) source
//! - [`extractor`]: entry listing and extraction on top of the parser
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) and DEFLATE compression methods
//!
//! ## Limitations
//!
//! - No ZIP64: entries, offsets and archives are limited to 4 GiB and 65535 entries
//! - No encryption support
//! - No multi-disk archive support

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{WrittenEntry, ZipWriter};
