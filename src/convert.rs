//! Conversion entry points.
//!
//! [`convert`] runs the whole thing: extraction, classification, OCR, then
//! assembly into a [`TransientArtifact`] the caller streams out. The
//! artifact removes itself according to the configured
//! [`ReleasePolicy`](crate::config::ReleasePolicy); the caller never deletes
//! anything.

use crate::artifact::TransientArtifact;
use crate::assemble;
use crate::config::{ConversionConfig, TargetMode};
use crate::error::TranscodeError;
use crate::model::{DocumentMetadata, PageContentKind, PipelineResult, SourceDocument};
use crate::pipeline::{Pipeline, PipelineTimings};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    /// Pages converted (after page selection).
    pub total_pages: usize,
    pub native_text_pages: usize,
    pub table_pages: usize,
    pub ocr_text_pages: usize,
    pub empty_pages: usize,
    /// Tables across all pages.
    pub table_count: usize,
    /// Pages sent to OCR, whatever the outcome.
    pub ocr_attempted_pages: usize,
    pub extract_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    fn new(
        result: &PipelineResult,
        timings: &PipelineTimings,
        assemble: Duration,
        total: Duration,
    ) -> Self {
        Self {
            total_pages: result.pages().len(),
            native_text_pages: result.count(PageContentKind::NativeText),
            table_pages: result.count(PageContentKind::Tables),
            ocr_text_pages: result.count(PageContentKind::OcrText),
            empty_pages: result.count(PageContentKind::Empty),
            table_count: result.table_count(),
            ocr_attempted_pages: timings.ocr_pages,
            extract_duration_ms: timings.extract.as_millis() as u64,
            ocr_duration_ms: timings.ocr.as_millis() as u64,
            assemble_duration_ms: assemble.as_millis() as u64,
            total_duration_ms: total.as_millis() as u64,
        }
    }
}

/// A finished conversion.
#[derive(Debug)]
pub struct ConversionOutput {
    /// Identifies this run in logs and artifact names.
    pub run_id: Uuid,
    /// The assembled file. Stream it out with [`TransientArtifact::open`].
    pub artifact: TransientArtifact,
    pub mode: TargetMode,
    pub content_type: &'static str,
    /// Suggested download name.
    pub filename: String,
    /// `false` when no page yielded any text or table. The artifact is still
    /// valid; callers may want to warn the end user.
    pub content_found: bool,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Derive [`filename`](Self::filename) from the uploaded file's name.
    pub fn with_source_name(mut self, original: &str) -> Self {
        self.filename = self.mode.suggested_filename(Some(original));
        self
    }
}

/// Convert PDF bytes into the artifact for `mode`, using pdfium and
/// tesseract.
///
/// # Example
/// ```rust,no_run
/// use pdf_transcode::{convert, ConversionConfig, TargetMode};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("invoice.pdf")?;
/// let output = convert(bytes, TargetMode::Spreadsheet, &ConversionConfig::default()).await?;
/// if !output.content_found {
///     eprintln!("warning: nothing could be extracted");
/// }
/// let xlsx = output.artifact.read_all().await?;
/// std::fs::write(&output.filename, xlsx)?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - [`TranscodeError::UnreadableDocument`] if the bytes are not a PDF
/// - [`TranscodeError::ExtractionFailure`] if pdfium or tesseract faults
/// - [`TranscodeError::AssemblyFailure`] if the output cannot be written
pub async fn convert(
    bytes: impl Into<Arc<[u8]>>,
    mode: TargetMode,
    config: &ConversionConfig,
) -> Result<ConversionOutput, TranscodeError> {
    let pipeline = Pipeline::from_config(config)?;
    convert_with(&pipeline, SourceDocument::new(bytes), mode, config).await
}

/// [`convert`] with caller-supplied engines.
pub async fn convert_with(
    pipeline: &Pipeline,
    doc: SourceDocument,
    mode: TargetMode,
    config: &ConversionConfig,
) -> Result<ConversionOutput, TranscodeError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("convert", run = %run_id, ?mode);

    async move {
        let total_start = Instant::now();
        info!("Starting conversion: {} bytes", doc.len());

        let (result, timings) = pipeline.run(&doc, config).await?;
        drop(doc);

        let assemble_start = Instant::now();
        let artifact = assemble::assemble(
            &result,
            mode,
            pipeline.store(),
            &run_id.to_string(),
            config.release_policy,
        )
        .await?;

        let stats = ConversionStats::new(
            &result,
            &timings,
            assemble_start.elapsed(),
            total_start.elapsed(),
        );
        info!(
            "Conversion complete: {} pages ({} native, {} tables, {} ocr, {} empty), {}ms",
            stats.total_pages,
            stats.native_text_pages,
            stats.table_pages,
            stats.ocr_text_pages,
            stats.empty_pages,
            stats.total_duration_ms
        );

        Ok(ConversionOutput {
            run_id,
            artifact,
            mode,
            content_type: mode.content_type(),
            filename: mode.suggested_filename(None),
            content_found: result.content_found(),
            stats,
        })
    }
    .instrument(span)
    .await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally. Without a runtime left to
/// run timers, a delayed release happens as soon as the artifact has been
/// read, and the TTL safety net is replaced by release on drop.
pub fn convert_sync(
    bytes: impl Into<Arc<[u8]>>,
    mode: TargetMode,
    config: &ConversionConfig,
) -> Result<ConversionOutput, TranscodeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TranscodeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(bytes, mode, config))
}

/// Run extraction, classification and OCR only.
pub async fn extract(
    bytes: impl Into<Arc<[u8]>>,
    config: &ConversionConfig,
) -> Result<PipelineResult, TranscodeError> {
    let pipeline = Pipeline::from_config(config)?;
    let (result, _) = pipeline.run(&SourceDocument::new(bytes), config).await?;
    Ok(result)
}

/// Read PDF metadata without extracting or OCR'ing any page.
pub async fn inspect(
    bytes: impl Into<Arc<[u8]>>,
    config: &ConversionConfig,
) -> Result<DocumentMetadata, TranscodeError> {
    let pipeline = Pipeline::from_config(config)?;
    pipeline.metadata(&SourceDocument::new(bytes)).await
}
