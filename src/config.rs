//! Configuration types for PDF transcoding.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds every knob so a run
//! can be shared across tasks and logged as a whole.

use crate::error::TranscodeError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for a PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_transcode::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(300)
///     .concurrency(4)
///     .ocr_language("deu")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI for pages sent to OCR. Range: 72–400. Default: 200.
    ///
    /// Tesseract is tuned for text around 300 DPI; 200 keeps images small
    /// while staying well inside its accuracy range for body text.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 3000.
    ///
    /// Caps memory for oversized pages (posters, engineering drawings)
    /// independently of DPI.
    pub max_rendered_pixels: u32,

    /// Number of pages rasterised and OCR'd at once. Default: available
    /// parallelism, at most 8.
    ///
    /// Also bounds how many page images are alive at the same time.
    pub concurrency: usize,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Tesseract language code(s), e.g. "eng" or "eng+deu". Default: "eng".
    pub ocr_language: String,

    /// Tesseract executable. Default: "tesseract" (resolved via PATH).
    pub tesseract_cmd: PathBuf,

    /// Directory containing the pdfium shared library. If None, the current
    /// directory is tried first, then the system library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Root of the scratch namespace for transient artifacts.
    /// Default: `<system temp>/pdf-transcode`.
    pub scratch_dir: PathBuf,

    /// When the finished artifact is removed after being read.
    pub release_policy: ReleasePolicy,

    /// Safety net: an artifact nobody is reading is removed after this long,
    /// even if the caller never opened it. Default: 300 s.
    pub artifact_ttl: Duration,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(8)
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 3000,
            concurrency: default_concurrency(),
            pages: PageSelection::default(),
            ocr_language: "eng".to_string(),
            tesseract_cmd: PathBuf::from("tesseract"),
            pdfium_library_path: None,
            scratch_dir: std::env::temp_dir().join("pdf-transcode"),
            release_policy: ReleasePolicy::default(),
            artifact_ttl: Duration::from_secs(300),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("pages", &self.pages)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("scratch_dir", &self.scratch_dir)
            .field("release_policy", &self.release_policy)
            .field("artifact_ttl", &self.artifact_ttl)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    pub fn pdfium_library_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(dir.into());
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.config.release_policy = policy;
        self
    }

    pub fn artifact_ttl(mut self, ttl: Duration) -> Self {
        self.config.artifact_ttl = ttl;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, TranscodeError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(TranscodeError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(TranscodeError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(TranscodeError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if let ReleasePolicy::Delayed(grace) = c.release_policy {
            if grace > c.artifact_ttl {
                return Err(TranscodeError::InvalidConfig(format!(
                    "release grace period ({grace:?}) exceeds artifact TTL ({:?})",
                    c.artifact_ttl
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The kind of artifact a conversion produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    /// Flat UTF-8 text, pages separated by a single line break.
    Transcript,
    /// Word-processing document (.docx).
    Document,
    /// Spreadsheet workbook (.xlsx), one sheet per page fragment.
    Spreadsheet,
}

impl TargetMode {
    pub fn content_type(&self) -> &'static str {
        match self {
            TargetMode::Transcript => "text/plain; charset=utf-8",
            TargetMode::Document => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            TargetMode::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TargetMode::Transcript => "txt",
            TargetMode::Document => "docx",
            TargetMode::Spreadsheet => "xlsx",
        }
    }

    /// Suggested download filename, derived from the uploaded file's name.
    pub fn suggested_filename(&self, original: Option<&str>) -> String {
        let stem = original
            .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name))
            .map(|name| match name.rsplit_once('.') {
                Some((stem, ext)) if ext.eq_ignore_ascii_case("pdf") => stem,
                _ => name,
            })
            .filter(|stem| !stem.trim().is_empty())
            .unwrap_or("converted");
        format!("{}.{}", stem, self.extension())
    }
}

impl FromStr for TargetMode {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transcript" | "text" | "txt" => Ok(TargetMode::Transcript),
            "document" | "docx" | "word" => Ok(TargetMode::Document),
            "spreadsheet" | "xlsx" | "excel" => Ok(TargetMode::Spreadsheet),
            other => Err(TranscodeError::InvalidConfig(format!(
                "unknown target mode '{other}' (expected transcript, document or spreadsheet)"
            ))),
        }
    }
}

/// When a finished artifact is removed from scratch storage.
///
/// Either way the artifact is removed exactly once, never while a reader is
/// still open, and never later than [`ConversionConfig::artifact_ttl`] if
/// nobody opens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleasePolicy {
    /// Remove as soon as the last open reader is closed or dropped.
    AfterRead,
    /// Remove this long after the last reader closes, so a retried download
    /// can reopen it.
    Delayed(Duration),
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        ReleasePolicy::Delayed(Duration::from_secs(10))
    }
}

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 1-based page numbers.
    pub fn to_page_numbers(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![*p]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1);
                let e = (*end).min(total_pages);
                (s..=e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total_pages)
                .collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

impl FromStr for PageSelection {
    type Err = TranscodeError;

    /// Parse `all`, `5`, `3-15`, or `1,3,5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let parse = |p: &str| -> Result<usize, TranscodeError> {
            let n: usize = p.trim().parse().map_err(|_| {
                TranscodeError::InvalidConfig(format!("Invalid page number: '{}'", p.trim()))
            })?;
            if n < 1 {
                return Err(TranscodeError::InvalidConfig(
                    "Pages are 1-indexed, minimum is 1".into(),
                ));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                return Err(TranscodeError::InvalidConfig(format!(
                    "Invalid page range '{start}-{end}': start must be <= end"
                )));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            let pages = s.split(',').map(parse).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        Ok(PageSelection::Single(parse(&s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_selection_to_page_numbers() {
        assert_eq!(PageSelection::All.to_page_numbers(3), vec![1, 2, 3]);
        assert_eq!(PageSelection::Single(3).to_page_numbers(5), vec![3]);
        assert!(PageSelection::Single(6).to_page_numbers(5).is_empty());
        assert_eq!(PageSelection::Range(3, 10).to_page_numbers(4), vec![3, 4]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3, 2]).to_page_numbers(5),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn page_selection_parse() {
        assert!(matches!("all".parse(), Ok(PageSelection::All)));
        assert!(matches!("4".parse(), Ok(PageSelection::Single(4))));
        assert!(matches!("2-5".parse(), Ok(PageSelection::Range(2, 5))));
        match "1, 3,5".parse::<PageSelection>() {
            Ok(PageSelection::Set(v)) => assert_eq!(v, vec![1, 3, 5]),
            other => panic!("unexpected: {other:?}"),
        }
        assert!("5-2".parse::<PageSelection>().is_err());
        assert!("0".parse::<PageSelection>().is_err());
        assert!("abc".parse::<PageSelection>().is_err());
    }

    #[test]
    fn target_mode_parse_and_tags() {
        assert_eq!("spreadsheet".parse::<TargetMode>().unwrap(), TargetMode::Spreadsheet);
        assert_eq!("DOCUMENT".parse::<TargetMode>().unwrap(), TargetMode::Document);
        assert_eq!("transcript".parse::<TargetMode>().unwrap(), TargetMode::Transcript);
        assert!("pptx".parse::<TargetMode>().is_err());
        assert!(TargetMode::Transcript.content_type().starts_with("text/plain"));
        assert!(TargetMode::Spreadsheet.content_type().contains("spreadsheetml"));
    }

    #[test]
    fn suggested_filename_strips_pdf_extension() {
        assert_eq!(
            TargetMode::Document.suggested_filename(Some("reports/q3.PDF")),
            "q3.docx"
        );
        assert_eq!(TargetMode::Spreadsheet.suggested_filename(None), "converted.xlsx");
        assert_eq!(TargetMode::Transcript.suggested_filename(Some("notes")), "notes.txt");
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ConversionConfig::builder().dpi(1000).concurrency(0).build().unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.concurrency, 1);

        let err = ConversionConfig::builder()
            .release_policy(ReleasePolicy::Delayed(Duration::from_secs(600)))
            .artifact_ttl(Duration::from_secs(60))
            .build();
        assert!(matches!(err, Err(TranscodeError::InvalidConfig(_))));

        let err = ConversionConfig::builder().ocr_language("  ").build();
        assert!(err.is_err());
    }
}
