//! Main entry point for the rezip CLI application.
//!
//! Rebuilds a packaged document from its unpacked directory, then
//! optionally reads the result back to verify or list it.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use rezip::logging::init_logging;
use rezip::{Cli, LocalFileReader, PackReport, PackageBuilder, ZipExtractor, verify_package};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some((input, output)) = cli.paths() else {
        println!("Missing required flags: --in and --out are required.");
        println!("{}", Cli::command().render_usage());
        return ExitCode::FAILURE;
    };
    let (input, output) = (input.to_path_buf(), output.to_path_buf());

    init_logging(cli.log_level());

    match run(&cli, input, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("\nAn unexpected error occurred: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Build the package, then verify and list it when asked to.
async fn run(cli: &Cli, input: PathBuf, output: PathBuf) -> Result<()> {
    let builder = PackageBuilder::new(cli.pack_options());

    let target = output.clone();
    let report = tokio::task::spawn_blocking(move || builder.build(&input, &target)).await??;

    if !cli.is_quiet() {
        print_report(&report);
        let name = output
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| output.display().to_string());
        println!("\nRebuilt package saved to '{name}'");
    }

    if cli.verify {
        let reader = Arc::new(LocalFileReader::new(&output)?);
        let check = verify_package(reader).await?;
        if !cli.is_quiet() {
            println!(
                "Verified {} entries (mimetype first: {}, content types: {})",
                check.entries.len(),
                yes_no(check.has_mimetype),
                yes_no(check.has_content_types)
            );
        }
    }

    if cli.list || cli.verbose {
        list_files(&output, cli.verbose).await?;
    }

    Ok(())
}

fn print_report(report: &PackReport) {
    for entry in &report.entries {
        println!(
            "  adding: {} ({})",
            entry.file_name,
            entry.compression_method.name()
        );
    }
    println!(
        "{} entries, {} -> {}",
        report.entries.len(),
        format_size(report.total_uncompressed()),
        format_size(report.total_compressed())
    );
}

/// List entries of the rebuilt archive.
///
/// Simple format (`-l`) prints one name per line; verbose (`-v`) prints a
/// table with sizes, method and timestamps.
async fn list_files(archive: &Path, verbose: bool) -> Result<()> {
    let extractor = ZipExtractor::new(Arc::new(LocalFileReader::new(archive)?));
    let entries = extractor.list_files().await?;

    if !verbose {
        for entry in &entries {
            println!("{}", entry.file_name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>8}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Method", "Date", "Time"
    );
    println!("{}", "-".repeat(80));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:>8}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            entry.compression_method.name(),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        total_uncompressed += entry.uncompressed_size;
        total_compressed += entry.compressed_size;
    }

    println!("{}", "-".repeat(80));
    println!(
        "{:>10}  {:>10}  {}  {:>31}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        entries.len()
    );

    Ok(())
}

/// Space saved as a right-aligned percentage. Stored entries and tiny
/// inputs can grow, which shows as a negative ratio.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 {
        return "  0%".to_string();
    }
    let saved = 100 - (compressed as i128 * 100 / uncompressed as i128);
    format!("{saved:>4}%")
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
