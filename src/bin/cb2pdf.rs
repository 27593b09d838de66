//! CLI binary for cb2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, discovers archives in directory arguments, and prints
//! results.

use anyhow::{Context, Result};
use cb2pdf::pipeline::archive::unrar_tool;
use cb2pdf::{
    convert_batch, inspect, ArchiveKind, ConversionConfig, ConversionProgressCallback,
    ProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across the batch, a log line per
/// finished archive. Archives complete out of order when `--jobs > 1`, so
/// everything prints through `bar.println` to stay above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> std::sync::Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} archives  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        std::sync::Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_archives: usize) {
        self.bar.set_length(total_archives as u64);
    }

    fn on_archive_start(&self, archive: &Path, pages: usize) {
        self.bar.set_message(format!(
            "{} ({pages} pages)",
            archive.file_name().unwrap_or_default().to_string_lossy()
        ));
    }

    fn on_page_rejected(&self, entry: &str, reason: &str) {
        // Truncate very long reasons to keep the log tidy.
        let reason = truncate_chars(reason, 79);
        self.bar
            .println(format!("  {} {entry}  {}", yellow("⚠"), dim(&reason)));
    }

    fn on_archive_complete(&self, archive: &Path, pages: usize, rejected: usize) {
        let name = archive.file_name().unwrap_or_default().to_string_lossy();
        if rejected == 0 {
            self.bar
                .println(format!("  {} {name}  {}", green("✓"), dim(&format!("{pages} pages"))));
        } else {
            self.bar.println(format!(
                "  {} {name}  {}",
                yellow("⚠"),
                dim(&format!("{pages} pages, {rejected} rejected"))
            ));
        }
        self.bar.inc(1);
    }

    fn on_archive_failed(&self, archive: &Path, reason: &str) {
        let name = archive.file_name().unwrap_or_default().to_string_lossy();
        self.bar
            .println(format!("  {} {name}  {}", red("✗"), red(reason)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total_archives: usize, _completed: usize) {
        self.bar.finish_and_clear();
    }
}

/// Shorten a message to `max` characters plus an ellipsis. Counts chars,
/// not bytes: rejection reasons embed entry names, which are frequently
/// multi-byte UTF-8, and a byte slice could split a character.
fn truncate_chars(msg: &str, max: usize) -> String {
    if msg.chars().count() <= max {
        return msg.to_string();
    }
    let mut out: String = msg.chars().take(max).collect();
    out.push('\u{2026}');
    out
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert one archive (PDF lands next to it)
  cb2pdf "Saga Vol 1.cbz"

  # Convert every .cbz/.cbr in a directory
  cb2pdf ~/comics/

  # Collect PDFs in one place, 4 archives at a time
  cb2pdf ~/comics/ -o ~/pdfs/ --jobs 4

  # Keep full scan resolution, maximum quality
  cb2pdf --max-dimension 10000 --quality 100 scan.cbz

  # Archive the sources after a successful conversion
  cb2pdf ~/comics/ --move-to ~/comics/old_files/

  # Machine-readable batch report
  cb2pdf --json ~/comics/ > report.json

  # List pages in reading order without converting
  cb2pdf --inspect-only weird.cbz

  # Verify CBR support
  cb2pdf --check-unrar

CBR SUPPORT:
  Rar extraction shells out to the `unrar` binary. Resolution order:
  --unrar flag, CB2PDF_UNRAR environment variable, then PATH. Zip-based
  archives (.cbz) need no external tool. Archives are detected by content,
  so a .cbz that is really a rar still converts when unrar is present.

ENVIRONMENT VARIABLES:
  CB2PDF_UNRAR         Path to the unrar binary
  CB2PDF_OUTPUT_DIR    Default for --output-dir
  CB2PDF_JOBS          Default for --jobs
  RUST_LOG             Tracing filter (overrides -v/-q)
"#;

/// Convert comic book archives (CBZ/CBR) to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "cb2pdf",
    version,
    about = "Convert comic book archives (CBZ/CBR) to PDF",
    long_about = "Convert comic book archives into one PDF per archive. Pages are put into \
natural reading order (page2 before page10), oversized scans are downscaled with Lanczos \
resampling, and corrupt pages are skipped with a warning instead of failing the archive.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Archive files (.cbz/.cbr) or directories to scan for them.
    inputs: Vec<PathBuf>,

    /// Write PDFs to this directory instead of next to each archive.
    #[arg(short, long, env = "CB2PDF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Move each source archive here after its PDF is written.
    #[arg(long)]
    move_to: Option<PathBuf>,

    /// Number of archives converted concurrently.
    #[arg(short, long, env = "CB2PDF_JOBS", default_value_t = 2)]
    jobs: usize,

    /// Longest image side in pixels; larger pages are downscaled.
    #[arg(long, default_value_t = 2560,
          value_parser = clap::value_parser!(u32).range(100..))]
    max_dimension: u32,

    /// JPEG quality for re-encoded pages (1-100).
    #[arg(long, default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Path to the unrar binary for .cbr extraction.
    #[arg(long, env = "CB2PDF_UNRAR")]
    unrar: Option<PathBuf>,

    /// Output the batch report as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// List each archive's pages in reading order, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Report whether the unrar binary can be found, then exit.
    #[arg(long)]
    check_unrar: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the user-facing feedback channel; keep library
    // logs at error level while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── unrar check mode ─────────────────────────────────────────────────
    if cli.check_unrar {
        return match unrar_tool(cli.unrar.as_deref()) {
            Some(tool) => {
                println!("{} unrar found: {}", green("✔"), tool.display());
                Ok(())
            }
            None => {
                eprintln!(
                    "{} unrar not found (checked --unrar, CB2PDF_UNRAR, PATH)",
                    red("✘")
                );
                std::process::exit(1);
            }
        };
    }

    if cli.inputs.is_empty() {
        anyhow::bail!("no archives given (pass files or directories)");
    }

    // ── Discover archives ────────────────────────────────────────────────
    let archives = discover_archives(&cli.inputs)?;
    if archives.is_empty() {
        anyhow::bail!("no .cbz or .cbr archives found in the given inputs");
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        for archive in &archives {
            let info = inspect(archive)
                .await
                .with_context(|| format!("failed to inspect {}", archive.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{}", bold(&archive.display().to_string()));
                println!("  kind:    {}", info.kind);
                println!("  entries: {}", info.total_entries);
                println!("  pages:   {}", info.page_names.len());
                for (i, name) in info.page_names.iter().enumerate() {
                    println!("  {:>4}  {name}", i + 1);
                }
            }
        }
        return Ok(());
    }

    // ── CBR preflight ────────────────────────────────────────────────────
    // Warn up front rather than failing mid-batch on the first rar.
    let has_rar = archives
        .iter()
        .any(|a| cb2pdf::detect_kind(a).map(|k| k == ArchiveKind::Rar).unwrap_or(false));
    if has_rar && unrar_tool(cli.unrar.as_deref()).is_none() && !cli.quiet {
        eprintln!(
            "{} rar archives present but unrar was not found; they will fail \
             (install unrar or pass --unrar)",
            yellow("⚠")
        );
    }

    // ── Build config and run ─────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as ProgressCallback)
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .max_dimension(cli.max_dimension)
        .jpeg_quality(cli.quality)
        .jobs(cli.jobs);
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(ref path) = cli.unrar {
        builder = builder.unrar_path(path);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("invalid configuration")?;

    let report = convert_batch(&archives, &config).await;

    // ── Retire converted sources ─────────────────────────────────────────
    if let Some(ref move_to) = cli.move_to {
        std::fs::create_dir_all(move_to)
            .with_context(|| format!("failed to create {}", move_to.display()))?;
        for output in report.outputs() {
            if let Err(e) = move_archive(&output.archive, move_to) {
                eprintln!(
                    "{} could not move {}: {e}",
                    yellow("⚠"),
                    output.archive.display()
                );
            }
        }
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.quiet {
        let completed = report.completed();
        let failed: Vec<_> = report.failures().collect();
        eprintln!(
            "{}  {}/{} archives converted  {}ms",
            if failed.is_empty() { green("✔") } else { cyan("⚠") },
            bold(&completed.to_string()),
            report.outcomes.len(),
            report.total_duration_ms,
        );
        for rec in &failed {
            eprintln!("   {} {}  {}", red("✗"), rec.archive.display(), rec.reason);
        }
    }

    if report.completed() == 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Expand the input list: files pass through, directories are scanned
/// (non-recursively) for `.cbz`/`.cbr`. Results are sorted for a stable
/// conversion order.
fn discover_archives(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in std::fs::read_dir(input)
                .with_context(|| format!("failed to read directory {}", input.display()))?
            {
                let path = entry?.path();
                if path.is_file() && is_comic_archive(&path) {
                    archives.push(path);
                }
            }
        } else {
            archives.push(input.clone());
        }
    }
    archives.sort();
    archives.dedup();
    Ok(archives)
}

fn is_comic_archive(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            e == "cbz" || e == "cbr"
        })
        .unwrap_or(false)
}

/// Move a converted archive into the retention directory. `rename` fails
/// across filesystems, so fall back to copy + remove.
fn move_archive(archive: &Path, dest_dir: &Path) -> io::Result<()> {
    let file_name = archive
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "archive has no file name"))?;
    let dest = dest_dir.join(file_name);
    match std::fs::rename(archive, &dest) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(archive, &dest)?;
            std::fs::remove_file(archive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_chars_not_bytes() {
        // 100 three-byte characters; a byte slice at index 79 would split
        // one of them and panic.
        let reason = "ペ".repeat(100);
        let short = truncate_chars(&reason, 79);
        assert_eq!(short.chars().count(), 80);
        assert!(short.ends_with('\u{2026}'));
    }

    #[test]
    fn short_messages_are_untouched() {
        assert_eq!(truncate_chars("corrupt image", 79), "corrupt image");
    }

    #[test]
    fn archive_extensions_match_case_insensitively() {
        assert!(is_comic_archive(Path::new("a.cbz")));
        assert!(is_comic_archive(Path::new("b.CBR")));
        assert!(!is_comic_archive(Path::new("c.zip")));
        assert!(!is_comic_archive(Path::new("noext")));
    }
}
