/// Knobs for a package build. The CLI maps its flags onto this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOptions {
    /// Follow symbolic links while walking the source tree. Directory
    /// cycles are then reported as walk errors.
    pub follow_links: bool,
    /// Stamp every entry with 1980-01-01 00:00 instead of the file's mtime,
    /// so identical trees produce identical archives.
    pub reproducible: bool,
    /// Deflate level, 0-9.
    pub compression_level: u32,
    /// Write to a temporary file next to the output and rename it into
    /// place only once the archive is complete.
    pub atomic: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            reproducible: false,
            compression_level: 6,
            atomic: false,
        }
    }
}
