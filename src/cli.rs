use clap::Parser;
use std::convert::Infallible;
use std::path::{Path, PathBuf};

use crate::package::PackOptions;

#[derive(Parser, Debug)]
#[command(name = "rezip")]
#[command(version)]
#[command(about = "Rebuild an xlsx/docx/ods package from its unpacked directory", long_about = None)]
#[command(after_help = "Examples:\n  \
  rezip --in book/ --out book.xlsx             rebuild book.xlsx from book/\n  \
  rezip -i book/ -o book.xlsx --verify -v     rebuild, check and list the result\n  \
  rezip -i doc/ -o doc.ods --atomic           only replace doc.ods on success")]
pub struct Cli {
    /// Directory holding the unpacked document (required)
    #[arg(short = 'i', long = "in", value_name = "DIR", value_parser = parse_path)]
    pub input: Option<PathBuf>,

    /// Path of the rebuilt archive, overwritten if it exists (required)
    #[arg(short = 'o', long = "out", value_name = "FILE", value_parser = parse_path)]
    pub output: Option<PathBuf>,

    /// List the rebuilt archive (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List the rebuilt archive verbosely and log every added entry
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Read the rebuilt archive back and check the packaging rules
    #[arg(long)]
    pub verify: bool,

    /// Write to a temporary file and rename it over the output on success
    #[arg(long)]
    pub atomic: bool,

    /// Follow symbolic links inside the source directory
    #[arg(long)]
    pub follow_links: bool,

    /// Use a fixed timestamp for every entry
    #[arg(long)]
    pub reproducible: bool,

    /// Deflate compression level
    #[arg(long, value_name = "0-9", default_value_t = 6,
          value_parser = clap::value_parser!(u32).range(0..=9))]
    pub level: u32,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// Input and output paths, if both were given and non-empty.
    pub fn paths(&self) -> Option<(&Path, &Path)> {
        fn given(p: &Option<PathBuf>) -> Option<&Path> {
            p.as_deref().filter(|p| !p.as_os_str().is_empty())
        }
        Some((given(&self.input)?, given(&self.output)?))
    }

    /// Default log level: `-qq` errors only, `-q` warnings, `-v` per-entry debug.
    pub fn log_level(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.is_quiet() {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    pub fn pack_options(&self) -> PackOptions {
        PackOptions {
            follow_links: self.follow_links,
            reproducible: self.reproducible,
            compression_level: self.level,
            atomic: self.atomic,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}

/// Accepts empty values so `--in ""` is reported like a missing flag.
fn parse_path(value: &str) -> Result<PathBuf, Infallible> {
    Ok(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_forms() {
        let cli = Cli::try_parse_from(["rezip", "--in", "book", "-o", "book.xlsx", "--atomic"])
            .unwrap();
        let (input, output) = cli.paths().unwrap();
        assert_eq!(input, Path::new("book"));
        assert_eq!(output, Path::new("book.xlsx"));

        let options = cli.pack_options();
        assert!(options.atomic);
        assert_eq!(options.compression_level, 6);
    }

    #[test]
    fn paths_require_both_flags() {
        let cli = Cli::try_parse_from(["rezip", "--in", "book"]).unwrap();
        assert!(cli.paths().is_none());
    }

    #[test]
    fn empty_paths_count_as_missing() {
        let cli = Cli::try_parse_from(["rezip", "--in", "", "--out", "book.xlsx"]).unwrap();
        assert!(cli.paths().is_none());
    }

    #[test]
    fn log_level_follows_verbosity_flags() {
        let level = |args: &[&str]| {
            let mut argv = vec!["rezip"];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).unwrap().log_level()
        };
        assert_eq!(level(&[]), "info");
        assert_eq!(level(&["-v"]), "debug");
        assert_eq!(level(&["-v", "-q"]), "warn");
        assert_eq!(level(&["-qq"]), "error");
    }

    #[test]
    fn level_is_bounded() {
        assert!(Cli::try_parse_from(["rezip", "--level", "10"]).is_err());
    }
}
