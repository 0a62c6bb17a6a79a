//! Pipeline stages for PDF transcoding.
//!
//! Each submodule implements exactly one step. Engines sit behind the
//! [`Rasterizer`], [`StructureExtractor`] and [`OcrEngine`] traits so the
//! orchestration here has no dependency on pdfium or tesseract.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ native content ───────────────────────────┐
//! extract ──▶ classify                                      ├──▶ PipelineResult
//! (pdfium)   └──▶ needs OCR ──▶ render ──▶ ocr ──▶ normalize ┘
//!                              (pdfium)  (tesseract)
//! ```
//!
//! 1. [`extract`]   read the text layer and detect tables ([`tables`])
//! 2. [`classify`]  tables > native text > OCR, as a pure function
//! 3. [`render`]    rasterise only the pages that need OCR, `concurrency`
//!    pages at a time so page images never pile up
//! 4. [`ocr`]       recognise each image on the blocking pool
//! 5. [`normalize`] deterministic text clean-up shared by both paths

pub mod classify;
pub mod extract;
pub mod normalize;
pub mod ocr;
pub mod render;
pub mod tables;

pub use extract::{PdfiumExtractor, StructureExtractor};
pub use ocr::{OcrEngine, OcrError, TesseractEngine};
pub use render::{PdfiumRasterizer, Rasterizer};

use crate::artifact::ArtifactStore;
use crate::config::ConversionConfig;
use crate::error::{Stage, TranscodeError};
use crate::model::{
    DocumentMetadata, PageContent, PageResult, PipelineResult, SourceDocument,
};
use classify::Classification;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wall-clock time spent in each phase of [`Pipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineTimings {
    pub extract: Duration,
    pub ocr: Duration,
    /// Pages that went through rasterisation and OCR.
    pub ocr_pages: usize,
}

/// The engines one conversion runs with.
///
/// Cheap to clone; engines are shared behind `Arc`s, so a single pipeline
/// can serve many concurrent runs.
#[derive(Clone)]
pub struct Pipeline {
    rasterizer: Arc<dyn Rasterizer>,
    extractor: Arc<dyn StructureExtractor>,
    ocr: Arc<dyn OcrEngine>,
    store: ArtifactStore,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("ocr", &self.ocr.name())
            .field("store", &self.store.root())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        extractor: Arc<dyn StructureExtractor>,
        ocr: Arc<dyn OcrEngine>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            rasterizer,
            extractor,
            ocr,
            store,
        }
    }

    /// pdfium for rendering and extraction, tesseract for OCR, scratch space
    /// under `config.scratch_dir`.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, TranscodeError> {
        let store = ArtifactStore::new(&config.scratch_dir, config.artifact_ttl)?;
        let lib = config.pdfium_library_path.clone();
        Ok(Self::new(
            Arc::new(PdfiumRasterizer::new(
                lib.clone(),
                config.dpi,
                config.max_rendered_pixels,
            )),
            Arc::new(PdfiumExtractor::new(lib)),
            Arc::new(TesseractEngine::new(
                &config.tesseract_cmd,
                &config.ocr_language,
                store.clone(),
            )),
            store,
        ))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Document metadata without any page processing.
    pub async fn metadata(&self, doc: &SourceDocument) -> Result<DocumentMetadata, TranscodeError> {
        let extractor = Arc::clone(&self.extractor);
        let doc = doc.clone();
        blocking(Stage::Extract, move || extractor.metadata(&doc)).await
    }

    /// Extract, classify and OCR the selected pages of `doc`.
    pub async fn run(
        &self,
        doc: &SourceDocument,
        config: &ConversionConfig,
    ) -> Result<(PipelineResult, PipelineTimings), TranscodeError> {
        let mut timings = PipelineTimings::default();
        let cb = config.progress_callback.as_deref();

        // ── Step 1: Page selection ───────────────────────────────────────
        let total = self.metadata(doc).await?.page_count;
        let page_nums = config.pages.to_page_numbers(total);
        if page_nums.is_empty() && total > 0 {
            return Err(TranscodeError::InvalidConfig(format!(
                "page selection {:?} matches no pages (document has {total})",
                config.pages
            )));
        }
        info!("Converting {} of {} pages", page_nums.len(), total);
        if let Some(cb) = cb {
            cb.on_conversion_start(page_nums.len());
        }

        // ── Step 2: Native extraction + classification ───────────────────
        let started = Instant::now();
        let structures = {
            let extractor = Arc::clone(&self.extractor);
            let doc = doc.clone();
            let nums = page_nums.clone();
            blocking(Stage::Extract, move || extractor.extract(&doc, &nums)).await?
        };
        if structures.len() != page_nums.len() {
            return Err(TranscodeError::extraction(
                Stage::Extract,
                format!(
                    "extractor returned {} pages for {} requested",
                    structures.len(),
                    page_nums.len()
                ),
            ));
        }

        let mut contents: BTreeMap<usize, PageContent> = BTreeMap::new();
        let mut needs_ocr = Vec::new();
        for structure in structures {
            let page_num = structure.page_num;
            match classify::classify(structure) {
                Classification::Native(content) => {
                    if let Some(cb) = cb {
                        cb.on_page_classified(page_num, Some(content.kind()));
                    }
                    contents.insert(page_num, content);
                }
                Classification::NeedsOcr => {
                    if let Some(cb) = cb {
                        cb.on_page_classified(page_num, None);
                    }
                    needs_ocr.push(page_num);
                }
            }
        }
        timings.extract = started.elapsed();
        debug!(
            native = contents.len(),
            ocr = needs_ocr.len(),
            "classification done"
        );

        // ── Step 3: Rasterise + OCR the rest, a chunk at a time ──────────
        let started = Instant::now();
        let concurrency = config.concurrency.max(1);
        for chunk in needs_ocr.chunks(concurrency) {
            let images = {
                let rasterizer = Arc::clone(&self.rasterizer);
                let doc = doc.clone();
                let nums = chunk.to_vec();
                blocking(Stage::Rasterize, move || rasterizer.rasterize(&doc, &nums)).await?
            };
            let rendered: Vec<usize> = images.iter().map(|i| i.page_num).collect();
            if rendered != chunk {
                return Err(TranscodeError::extraction(
                    Stage::Rasterize,
                    format!("rasterizer returned pages {rendered:?} for {chunk:?}"),
                ));
            }

            let recognised: Vec<Result<(usize, String), TranscodeError>> = stream::iter(images)
                .map(|image| {
                    let ocr = Arc::clone(&self.ocr);
                    async move {
                        let page_num = image.page_num;
                        let text = blocking(Stage::Ocr, move || {
                            ocr.recognize(&image).map_err(|e| {
                                TranscodeError::extraction(
                                    Stage::Ocr,
                                    format!("page {page_num}: {e}"),
                                )
                            })
                        })
                        .await?;
                        Ok((page_num, text))
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for item in recognised {
                let (page_num, raw) = item?;
                let content = classify::resolve_ocr(&raw);
                if let Some(cb) = cb {
                    cb.on_ocr_complete(page_num, content.text().map_or(0, str::len));
                }
                contents.insert(page_num, content);
            }
        }
        timings.ocr = started.elapsed();
        timings.ocr_pages = needs_ocr.len();

        // Every selected page was either classified natively or OCR'd.
        let pages = page_nums
            .iter()
            .map(|&page_num| {
                contents
                    .remove(&page_num)
                    .map(|content| PageResult { page_num, content })
                    .ok_or_else(|| {
                        TranscodeError::extraction(
                            Stage::Ocr,
                            format!("page {page_num} has no content after OCR"),
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let result = PipelineResult::new(pages);

        if let Some(cb) = cb {
            cb.on_conversion_complete(result.pages().len(), result.content_found());
        }
        Ok((result, timings))
    }
}

/// Run an engine call on the blocking pool.
async fn blocking<T, F>(stage: Stage, f: F) -> Result<T, TranscodeError>
where
    F: FnOnce() -> Result<T, TranscodeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TranscodeError::extraction(stage, format!("{stage} task panicked: {e}")))?
}
