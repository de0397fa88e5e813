//! dupsift - find duplicate files by clustering on size, then content.
//!
//! Usage:
//!   dupsift [PATH]                 Report duplicate files under PATH
//!   dupsift --sizes-only [PATH]    Report files sharing a size, unverified
//!   dupsift --format json [PATH]   Emit the report as JSON
//!   dupsift --help                 Show help

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dupsift_analyze::{ContentVerifier, DuplicateCollector, VerifyConfig};
use dupsift_scan::{LengthScanner, ScanConfig, ScanOutcome, ScanSummary};

#[derive(Parser)]
#[command(
    name = "dupsift",
    version,
    about = "Find duplicate files",
    long_about = "dupsift walks a directory tree in parallel, clusters files by size \
                  and then compares the members of each cluster by content.\n\n\
                  Files that share no size with any other file are never read."
)]
struct Cli {
    /// Directory to scan (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Worker threads for walking and hashing (0 = one per CPU)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,

    /// Give up waiting for the walk after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Minimum file size to compare (e.g., "1KB", "1MB")
    #[arg(short, long, default_value = "1B")]
    min_size: String,

    /// Include hidden files and directories
    #[arg(long, overrides_with = "no_hidden")]
    hidden: bool,

    /// Skip hidden files and directories
    #[arg(long = "no-hidden", overrides_with = "hidden")]
    no_hidden: bool,

    /// Skip symbolic links instead of following them
    #[arg(short = 'P', long)]
    no_follow_symlinks: bool,

    /// Count each hardlinked inode only once
    #[arg(long)]
    skip_hardlinks: bool,

    /// Skip entries by name; supports a leading or trailing `*`
    #[arg(short, long = "ignore", value_name = "PATTERN", action = ArgAction::Append)]
    ignore: Vec<String>,

    /// Report size clusters without comparing file contents
    #[arg(long)]
    sizes_only: bool,

    /// Maximum number of groups to show
    #[arg(short = 'n', long)]
    top: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Files sharing one size, as printed by `--sizes-only`.
#[derive(Debug, Serialize)]
struct SizeCluster {
    size: u64,
    paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct SizeReport<'a> {
    root: &'a Path,
    summary: &'a ScanSummary,
    clusters: Vec<SizeCluster>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = scan_config(&cli)?;
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .thread_name(|i| format!("dupsift-hash-{i}"))
            .build_global()
            .context("Failed to configure hashing threads")?;
    }

    eprintln!("Scanning {}...", cli.path.display());
    let outcome = LengthScanner::new().scan(&config).context("Scan failed")?;
    debug!(warnings = outcome.warnings.len(), "scan warnings collected");

    if outcome.summary.timed_out {
        eprintln!("Warning: scan timed out, results are partial");
    }

    if cli.sizes_only {
        run_sizes_only(&outcome, cli.top, cli.format)
    } else {
        run_duplicates(&outcome, &cli)
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("dupsift=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dupsift=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Translate command-line flags into a scan configuration.
fn scan_config(cli: &Cli) -> Result<ScanConfig> {
    let timeout = match cli.timeout {
        Some(0) => bail!("--timeout must be greater than zero"),
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    ScanConfig::builder()
        .root(cli.path.clone())
        .threads(cli.threads)
        .include_hidden(cli.hidden || !cli.no_hidden)
        .follow_symlinks(!cli.no_follow_symlinks)
        .skip_hardlinks(cli.skip_hardlinks)
        .ignore_patterns(cli.ignore.clone())
        .timeout(timeout)
        .build()
        .context("Invalid scan configuration")
}

/// Print the size clusters straight from the scan.
fn run_sizes_only(outcome: &ScanOutcome, top: Option<usize>, format: OutputFormat) -> Result<()> {
    let mut clusters: Vec<SizeCluster> = outcome
        .clusters
        .iter()
        .map(|(size, files)| {
            let mut paths: Vec<PathBuf> = files.iter().map(|f| f.path.to_path_buf()).collect();
            paths.sort();
            SizeCluster { size, paths }
        })
        .collect();
    clusters.sort_by(|a, b| b.size.cmp(&a.size));
    if let Some(top) = top {
        clusters.truncate(top);
    }

    match format {
        OutputFormat::Text => {
            print_header("Size Cluster Report");
            print_summary(&outcome.root, &outcome.summary);

            if clusters.is_empty() {
                println!(" No files share a size.");
            }
            for (i, cluster) in clusters.iter().enumerate() {
                println!(
                    " Cluster {} ({} files, {} each)",
                    i + 1,
                    cluster.paths.len(),
                    format_size(cluster.size)
                );
                for path in &cluster.paths {
                    println!("   {}", path.display());
                }
                println!();
            }
        }
        OutputFormat::Json => {
            let report = SizeReport {
                root: &outcome.root,
                summary: &outcome.summary,
                clusters,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Verify clusters by content and print duplicate groups.
fn run_duplicates(outcome: &ScanOutcome, cli: &Cli) -> Result<()> {
    let min_bytes = parse_size(&cli.min_size)?;
    eprintln!(
        "Comparing {} files in {} size clusters (min size: {})...",
        outcome.summary.candidate_files, outcome.summary.candidate_clusters, cli.min_size
    );

    let verify_config = VerifyConfig::builder()
        .min_size(min_bytes)
        .build()
        .context("Invalid verification configuration")?;

    let mut collector = DuplicateCollector::new();
    ContentVerifier::with_config(verify_config).verify(&outcome.clusters, &mut collector);
    let mut report = collector.into_report();
    if let Some(top) = cli.top {
        report.truncate(top);
    }

    match cli.format {
        OutputFormat::Text => {
            print_header("Duplicate File Report");
            print_summary(&outcome.root, &outcome.summary);

            if report.groups.is_empty() {
                println!(" No duplicate files found.");
            } else {
                println!(
                    " Found {} duplicate groups ({} files)",
                    report.groups.len(),
                    report.total_duplicate_files()
                );
                println!(
                    " Total wasted space: {}",
                    format_size(report.total_wasted_space)
                );
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        " Group {} ({} files, {} each, {} wasted)",
                        i + 1,
                        group.count(),
                        format_size(group.size),
                        format_size(group.wasted_bytes)
                    );
                    for path in &group.paths {
                        println!("   {}", path.display());
                    }
                    println!();
                }
            }

            if report.failed_files > 0 {
                println!(" {} file(s) could not be read", report.failed_files);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn print_header(title: &str) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" {title}");
    println!("{}", "─".repeat(70));
    println!();
}

fn print_summary(root: &Path, summary: &ScanSummary) {
    println!(
        " {} - {} files, {} directories, {}",
        root.display(),
        summary.files_clustered,
        summary.dirs_walked,
        format_size(summary.bytes_clustered)
    );
    println!(" Scanned in {:.2}s", summary.duration.as_secs_f64());
    if !summary.is_complete() {
        println!(
            " Incomplete: {} skipped, {} refused, {} failed",
            summary.entries_skipped, summary.failed_submissions, summary.failed_tasks
        );
    }
    println!();
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');

    let multiplier: u64 = match &s[digits.len()..] {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        unit => bail!("Unknown size unit: {unit}"),
    };
    let num: f64 = digits
        .parse()
        .with_context(|| format!("Invalid size: {s}"))?;

    Ok((num * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1").unwrap(), 1);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1.5k").unwrap(), 1536);
        assert_eq!(parse_size("2MB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("KB").is_err());
    }

    #[test]
    fn test_cli_builds_scan_config() {
        let cli = Cli::parse_from([
            "dupsift",
            "/tmp",
            "--no-hidden",
            "--ignore",
            "*.tmp",
            "--ignore",
            "target",
            "--timeout",
            "5",
            "-j",
            "3",
        ]);
        let config = scan_config(&cli).unwrap();

        assert_eq!(config.root, PathBuf::from("/tmp"));
        assert!(!config.include_hidden);
        assert_eq!(config.ignore_patterns, vec!["*.tmp", "target"]);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.threads, 3);
        assert!(config.follow_symlinks);
    }

    #[test]
    fn test_symlinks_can_be_skipped() {
        let cli = Cli::parse_from(["dupsift", "--no-follow-symlinks"]);
        assert!(!scan_config(&cli).unwrap().follow_symlinks);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = Cli::parse_from(["dupsift", "--timeout", "0"]);
        assert!(scan_config(&cli).is_err());
    }
}
