//! # pdf-transcode
//!
//! Turn uploaded PDF documents into one of three artifacts: a plain-text
//! transcript, a Word document (.docx), or a spreadsheet workbook (.xlsx).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Extract   native text + table detection via pdfium (spawn_blocking)
//!  ├─ 2. Classify  native text / tables / needs OCR, per page
//!  ├─ 3. OCR       rasterise the pages that need it, run tesseract concurrently
//!  ├─ 4. Assemble  transcript / docx / xlsx written into a scratch file
//!  └─ 5. Deliver   TransientArtifact, removed once read (or after a TTL)
//! ```
//!
//! Pages that carry a text layer never reach the OCR engine. A document that
//! yields nothing still produces a valid artifact: an empty transcript, a
//! document holding a notice paragraph, or a workbook with a single
//! `No_Content` sheet.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_transcode::{convert, ConversionConfig, TargetMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let config = ConversionConfig::default();
//!     let output = convert(bytes, TargetMode::Transcript, &config).await?;
//!     let text = output.artifact.read_all().await?;
//!     println!("{}", String::from_utf8_lossy(&text));
//!     eprintln!("{} pages, {} via OCR",
//!         output.stats.total_pages,
//!         output.stats.ocr_text_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-transcode` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-transcode = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! - A pdfium shared library, found in
//!   [`ConversionConfig::pdfium_library_path`], the working directory, or the
//!   system library path.
//! - The `tesseract` executable (override with
//!   [`ConversionConfig::tesseract_cmd`]). It is only invoked for pages
//!   without a text layer.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod assemble;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{ArtifactStore, ArtifactStream, TransientArtifact};
pub use config::{
    ConversionConfig, ConversionConfigBuilder, PageSelection, ReleasePolicy, TargetMode,
};
pub use convert::{
    convert, convert_sync, convert_with, extract, inspect, ConversionOutput, ConversionStats,
};
pub use error::{Stage, TranscodeError};
pub use model::{
    DocumentMetadata, PageContent, PageContentKind, PageImage, PageResult, PageStructure,
    PipelineResult, SourceDocument, Table,
};
pub use pipeline::{
    OcrEngine, OcrError, PdfiumExtractor, PdfiumRasterizer, Pipeline, Rasterizer,
    StructureExtractor, TesseractEngine,
};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
