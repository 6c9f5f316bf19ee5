//! # rezip
//!
//! Rebuild packaged-document archives (xlsx, docx, pptx, ods, ...) from
//! their unpacked directory trees.
//!
//! Packaged documents are ZIP containers with a few rules that a plain
//! `zip -r` does not honor. This crate walks the unpacked directory and
//! writes an archive where:
//!
//! - a root-level `mimetype` file becomes the first entry, stored without
//!   compression
//! - every other regular file is deflated under its `/`-separated path
//!   relative to the root
//! - entries follow a deterministic, sorted depth-first walk
//!
//! The rebuilt archive can be read back and checked with the bundled ZIP
//! reader.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rezip::{LocalFileReader, verify_package};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let report = rezip::build("unpacked-book", "book.xlsx")?;
//!     for warning in &report.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!
//!     let reader = Arc::new(LocalFileReader::new("book.xlsx".as_ref())?);
//!     let check = verify_package(reader).await?;
//!     println!("{} entries", check.entries.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod logging;
pub mod package;
pub mod zip;

pub use cli::Cli;
pub use error::{PackError, Result};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use package::{
    PackOptions, PackReport, PackWarning, PackageBuilder, PackageCheck, build, verify_package,
};
pub use zip::{CompressionMethod, ZipExtractor, ZipFileEntry, ZipWriter};
