//! CLI binary for pdf-transcode.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes the finished artifact.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_transcode::{
    convert, inspect, ConversionConfig, ConversionOutput, ConversionProgressCallback,
    PageContentKind, PageSelection, ProgressCallback, ReleasePolicy, TargetMode,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback. Native pages advance the bar as soon as they
/// are classified; OCR pages advance it when recognition finishes, possibly
/// out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    total: AtomicUsize,
    ocr_queued: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose length is set by `on_conversion_start`.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total: AtomicUsize::new(0),
            ocr_queued: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.set_message("");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.total.store(total_pages, Ordering::SeqCst);
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} pages…"))
        ));
    }

    fn on_page_classified(&self, page_num: usize, kind: Option<PageContentKind>) {
        let total = self.total.load(Ordering::SeqCst);
        match kind {
            Some(kind) => {
                let label = match kind {
                    PageContentKind::Tables => "tables",
                    _ => "text",
                };
                self.bar.println(format!(
                    "  {} Page {:>3}/{:<3}  {}",
                    green("✓"),
                    page_num,
                    total,
                    dim(label),
                ));
                self.bar.inc(1);
            }
            None => {
                let queued = self.ocr_queued.fetch_add(1, Ordering::SeqCst) + 1;
                self.bar.set_prefix("OCR");
                self.bar.set_message(format!("{queued} pages queued for OCR"));
            }
        }
    }

    fn on_ocr_complete(&self, page_num: usize, chars: usize) {
        let total = self.total.load(Ordering::SeqCst);
        let mark = if chars > 0 { green("✓") } else { yellow("∅") };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            mark,
            page_num,
            total,
            dim(&format!("ocr {chars:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_pages: usize, content_found: bool) {
        self.bar.finish_and_clear();
        if content_found {
            eprintln!(
                "{} {} pages processed",
                green("✔"),
                bold(&total_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {} pages processed, no extractable content",
                yellow("⚠"),
                bold(&total_pages.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Plain-text transcript on stdout
  pdf-transcode scan.pdf

  # Word document next to the input (scan.docx)
  pdf-transcode --mode document scan.pdf

  # Spreadsheet to a chosen path
  pdf-transcode --mode spreadsheet invoice.pdf -o invoice.xlsx

  # Only some pages, German OCR
  pdf-transcode --pages 2-4 --lang deu letter.pdf

  # Inspect PDF metadata (no extraction)
  pdf-transcode --inspect document.pdf

  # Conversion stats as JSON on stdout
  pdf-transcode --mode document --json scan.pdf -o scan.docx

MODES:
  transcript   Plain UTF-8 text, one line break between pages (default)
  document     .docx with a paragraph per line and native tables
  spreadsheet  .xlsx with one sheet per page text block or table

ENVIRONMENT VARIABLES:
  PDF_TRANSCODE_MODE         Default target mode
  PDF_TRANSCODE_LANG         Tesseract language(s), e.g. eng+deu
  PDF_TRANSCODE_TESSERACT    Tesseract executable
  PDFIUM_LIB_PATH            Directory holding libpdfium
  PDF_TRANSCODE_SCRATCH_DIR  Where intermediate files live
  RUST_LOG                   Log filter (overrides -v / -q)

SETUP:
  Install tesseract (apt install tesseract-ocr, brew install tesseract) and
  place libpdfium in the working directory or on the library path. Pages
  with a text layer never invoke tesseract.
"#;

/// Convert PDF files into transcripts, Word documents, or spreadsheets.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-transcode",
    version,
    about = "Convert PDF files into transcripts, Word documents, or spreadsheets",
    long_about = "Convert PDF documents into a plain-text transcript, a Word document (.docx), \
or a spreadsheet workbook (.xlsx). Native text and tables are read directly from the PDF; \
pages without a text layer are rasterised and recognised with Tesseract OCR.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Output kind: transcript, document, or spreadsheet.
    #[arg(short, long, env = "PDF_TRANSCODE_MODE", default_value = "transcript")]
    mode: TargetMode,

    /// Write the artifact here. Transcripts go to stdout without it; other
    /// modes default to the input name with the new extension.
    #[arg(short, long, env = "PDF_TRANSCODE_OUTPUT")]
    output: Option<PathBuf>,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF_TRANSCODE_PAGES", default_value = "all")]
    pages: PageSelection,

    /// OCR rendering DPI (72–400).
    #[arg(long, env = "PDF_TRANSCODE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of pages rasterised and OCR'd at once.
    #[arg(short, long, env = "PDF_TRANSCODE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Tesseract language code(s).
    #[arg(long, env = "PDF_TRANSCODE_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract executable.
    #[arg(long, env = "PDF_TRANSCODE_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Scratch directory for intermediate and output files.
    #[arg(long, env = "PDF_TRANSCODE_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Print PDF metadata only, no conversion.
    #[arg(long)]
    inspect: bool,

    /// Print conversion stats (or metadata with --inspect) as JSON on stdout.
    #[arg(long, env = "PDF_TRANSCODE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF_TRANSCODE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF_TRANSCODE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF_TRANSCODE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is visible.
    let writes_stdout = cli.json || (cli.output.is_none() && cli.mode == TargetMode::Transcript);
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect && !cli.json;
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

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect mode ─────────────────────────────────────────────────────
    if cli.inspect {
        let meta = inspect(bytes, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let source_name = cli.input.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let output = convert(bytes, cli.mode, &config)
        .await
        .context("Conversion failed")?
        .with_source_name(source_name);

    if !output.content_found && !cli.quiet {
        eprintln!(
            "{} no extractable content found in {}",
            yellow("warning:"),
            cli.input.display()
        );
    }

    let destination = match (&cli.output, cli.mode) {
        (Some(path), _) => Some(path.clone()),
        (None, TargetMode::Transcript) if !cli.json => None,
        (None, _) => Some(default_output_path(&cli.input, &output)),
    };

    match destination {
        Some(ref path) => {
            let written = write_artifact(&output, path).await?;
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{}  {} bytes  {}ms  →  {}",
                    green("✔"),
                    written,
                    output.stats.total_duration_ms,
                    bold(&path.display().to_string()),
                );
                eprintln!(
                    "   {}",
                    dim(&format!(
                        "{} native / {} tables / {} ocr / {} empty",
                        output.stats.native_text_pages,
                        output.stats.table_pages,
                        output.stats.ocr_text_pages,
                        output.stats.empty_pages
                    ))
                );
            }
        }
        None => {
            let text = output
                .artifact
                .read_all()
                .await
                .context("Failed to read transcript")?;
            write_transcript(&mut io::stdout().lock(), &text)?;
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output.stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet && !show_progress && writes_stdout {
        eprintln!(
            "Converted {} pages in {}ms",
            output.stats.total_pages, output.stats.total_duration_ms
        );
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .pages(cli.pages.clone())
        .ocr_language(cli.lang.clone())
        .tesseract_cmd(cli.tesseract.clone())
        // The process exits right after writing; nothing reopens the file.
        .release_policy(ReleasePolicy::AfterRead);

    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(dir.clone());
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `<input dir>/<suggested filename>`.
fn default_output_path(input: &Path, output: &ConversionOutput) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&output.filename)
}

/// Print a transcript, terminated by exactly one trailing newline.
fn write_transcript(out: &mut impl Write, text: &[u8]) -> Result<()> {
    out.write_all(text).context("Failed to write to stdout")?;
    if !text.ends_with(b"\n") {
        out.write_all(b"\n").context("Failed to write to stdout")?;
    }
    out.flush().context("Failed to write to stdout")
}

/// Stream the artifact into `path`; the artifact releases itself once the
/// reader reaches EOF.
async fn write_artifact(output: &ConversionOutput, path: &Path) -> Result<u64> {
    let mut reader = output
        .artifact
        .open()
        .await
        .context("Failed to open converted artifact")?;
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let written = tokio::io::copy(&mut reader, &mut file)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tokio::io::AsyncWriteExt::flush(&mut file)
        .await
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts `budget` bytes, then fails like a closed pipe.
    struct ClosedAfter {
        budget: usize,
        written: Vec<u8>,
    }

    impl Write for ClosedAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transcript_gets_trailing_newline() {
        let mut out = Vec::new();
        write_transcript(&mut out, b"page one").unwrap();
        assert_eq!(out, b"page one\n");

        let mut out = Vec::new();
        write_transcript(&mut out, b"page one\n").unwrap();
        assert_eq!(out, b"page one\n");
    }

    #[test]
    fn failed_trailing_newline_is_reported() {
        let mut out = ClosedAfter {
            budget: 8,
            written: Vec::new(),
        };
        let err = write_transcript(&mut out, b"page one").unwrap_err();
        assert_eq!(out.written, b"page one");
        assert!(err.to_string().contains("stdout"), "{err:#}");
    }
}
