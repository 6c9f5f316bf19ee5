//! Rebuild a package archive from an unpacked directory tree.
//!
//! Entry order:
//! 1. `mimetype`, Stored, if the root has one
//! 2. every other regular file, Deflated, in sorted depth-first walk order
//!
//! The output file, its buffer and the [`ZipWriter`] are plain owned values:
//! whichever way the build exits, dropping them finalizes the central
//! directory, flushes and closes the file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{PackError, Result};
use crate::zip::{CompressionMethod, DosDateTime, WrittenEntry, ZipWriter};

use super::{CONTENT_TYPES, MIMETYPE, PackOptions, PackReport, PackWarning};

/// Rebuild `source_dir` into `output` with default options.
pub fn build(source_dir: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<PackReport> {
    PackageBuilder::default().build(source_dir.as_ref(), output.as_ref())
}

#[derive(Debug, Clone, Default)]
pub struct PackageBuilder {
    options: PackOptions,
}

impl PackageBuilder {
    pub fn new(options: PackOptions) -> Self {
        Self { options }
    }

    /// Rebuild `source_dir` into the archive file `output`.
    ///
    /// The source is checked before anything is written, so a missing or
    /// non-directory source never creates `output`. Without
    /// [`PackOptions::atomic`] a failed build leaves a partial archive at
    /// `output` for the caller to discard.
    pub fn build(&self, source_dir: &Path, output: &Path) -> Result<PackReport> {
        check_source(source_dir)?;
        info!("rebuilding package from directory '{}'", source_dir.display());

        let mut report = if self.options.atomic {
            self.build_atomic(source_dir, output)?
        } else {
            self.build_in_place(source_dir, output)?
        };
        report.output = Some(output.to_path_buf());

        info!(
            entries = report.entries.len(),
            "rebuilt package saved to '{}'",
            output.display()
        );
        Ok(report)
    }

    /// Pack `source_dir` into an arbitrary seekable sink and hand it back.
    pub fn pack_to_writer<W: Write + Seek>(
        &self,
        source_dir: &Path,
        sink: W,
    ) -> Result<(W, PackReport)> {
        check_source(source_dir)?;
        self.pack(source_dir, sink, Path::new("<archive>"), &[])
    }

    fn build_in_place(&self, source_dir: &Path, output: &Path) -> Result<PackReport> {
        let file = File::create(output).map_err(|e| PackError::io("create output file", output, e))?;
        let exclude: Vec<PathBuf> = resolve_sink_path(output).into_iter().collect();

        let (sink, report) = self.pack(source_dir, BufWriter::new(file), output, &exclude)?;
        sink.into_inner()
            .map_err(|e| PackError::io("flush output file", output, e.into_error()))?;
        Ok(report)
    }

    fn build_atomic(&self, source_dir: &Path, output: &Path) -> Result<PackReport> {
        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(parent)
            .map_err(|e| PackError::io("create temporary file in", parent, e))?;

        let mut exclude: Vec<PathBuf> = resolve_sink_path(output).into_iter().collect();
        exclude.extend(resolve_sink_path(temp.path()));
        let temp_path = temp.path().to_path_buf();

        let (sink, report) = self.pack(source_dir, BufWriter::new(temp), &temp_path, &exclude)?;
        let temp = sink
            .into_inner()
            .map_err(|e| PackError::io("flush temporary file", &temp_path, e.into_error()))?;
        temp.persist(output)
            .map_err(|e| PackError::io("move temporary file to", output, e.error))?;
        Ok(report)
    }

    /// Write the archive. `sink_name` labels sink errors; `exclude` holds
    /// canonical paths of files being written, so an output placed inside
    /// the source tree is not packed into itself.
    fn pack<W: Write + Seek>(
        &self,
        source_dir: &Path,
        sink: W,
        sink_name: &Path,
        exclude: &[PathBuf],
    ) -> Result<(W, PackReport)> {
        let root = fs::canonicalize(source_dir)
            .map_err(|e| PackError::io("resolve directory", source_dir, e))?;
        let mut report = PackReport::default();

        if !root.join(CONTENT_TYPES).is_file() {
            self.advise(&mut report, PackWarning::MissingContentTypes);
        }

        let mut zip = ZipWriter::new(sink);
        zip.set_compression_level(self.options.compression_level);

        let mimetype = root.join(MIMETYPE);
        if mimetype.is_file() {
            let entry = self.add_file(&mut zip, &mimetype, MIMETYPE, CompressionMethod::Stored)?;
            report.entries.push(entry);
        } else {
            self.advise(&mut report, PackWarning::MissingMimetype);
        }

        let walker = WalkDir::new(&root)
            .follow_links(self.options.follow_links)
            .sort_by_file_name();

        for item in walker {
            let item = item.map_err(|source| PackError::Walk {
                root: source_dir.to_path_buf(),
                source,
            })?;
            let path = item.path();
            let file_type = item.file_type();

            if file_type.is_dir() {
                continue;
            }
            if exclude.iter().any(|p| p == path) {
                debug!("skipping '{}', it is the archive being written", path.display());
                continue;
            }

            let relative = path
                .strip_prefix(&root)
                .map_err(|e| PackError::io("relativize path", path, io::Error::other(e)))?;

            if file_type.is_symlink() {
                // Not followed: archive the target's bytes if it is a file.
                let target = fs::metadata(path)
                    .map_err(|e| PackError::io("resolve symbolic link", path, e))?;
                if target.is_dir() {
                    self.advise(
                        &mut report,
                        PackWarning::SkippedSymlinkDir(relative.to_path_buf()),
                    );
                    continue;
                }
                if !target.is_file() {
                    debug!("skipping special file '{}'", path.display());
                    continue;
                }
            } else if !file_type.is_file() {
                debug!("skipping special file '{}'", path.display());
                continue;
            }

            let name = entry_name(relative);
            if name == MIMETYPE {
                continue;
            }

            let entry = self.add_file(&mut zip, path, &name, CompressionMethod::Deflate)?;
            report.entries.push(entry);
        }

        let sink = zip
            .finish()
            .map_err(|e| PackError::io("finalize archive", sink_name, e))?;
        Ok((sink, report))
    }

    fn add_file<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        path: &Path,
        name: &str,
        method: CompressionMethod,
    ) -> Result<WrittenEntry> {
        let mut file = File::open(path).map_err(|e| PackError::io("open file", path, e))?;
        let modified = self.timestamp(&file);

        debug!(entry = name, method = method.name(), "adding entry");
        zip.write_entry(name, method, modified, &mut file)
            .map_err(|e| PackError::io("add to archive", path, e))
    }

    fn timestamp(&self, file: &File) -> DosDateTime {
        if self.options.reproducible {
            return DosDateTime::EPOCH;
        }
        file.metadata()
            .and_then(|m| m.modified())
            .map(DosDateTime::from_system_time)
            .unwrap_or(DosDateTime::EPOCH)
    }

    fn advise(&self, report: &mut PackReport, warning: PackWarning) {
        warn!("{warning}");
        report.warnings.push(warning);
    }
}

fn check_source(source_dir: &Path) -> Result<()> {
    match fs::metadata(source_dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PackError::NotADirectory(source_dir.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PackError::NotFound(source_dir.to_path_buf()))
        }
        Err(e) => Err(PackError::io("inspect", source_dir, e)),
    }
}

/// Archive name for a path relative to the package root: `/`-separated
/// whatever the host separator.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonical form of a file path whose parent exists, whether or not the
/// file itself does yet.
fn resolve_sink_path(path: &Path) -> Option<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path.file_name()?;
    fs::canonicalize(parent).ok().map(|p| p.join(name))
}
