//! Native structure extraction: text layer and tables, straight from the PDF.

use crate::error::{Stage, TranscodeError};
use crate::model::{DocumentMetadata, PageStructure, SourceDocument};
use crate::pipeline::normalize::normalize_text;
use crate::pipeline::render::{bind_pdfium, load_document};
use crate::pipeline::tables::{TableDetector, TextSpan};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Reads text and tables from a document's structural layer.
///
/// Called from blocking worker threads; implementations may block.
pub trait StructureExtractor: Send + Sync {
    /// Page count and document info, without touching page content.
    fn metadata(&self, doc: &SourceDocument) -> Result<DocumentMetadata, TranscodeError>;

    /// One [`PageStructure`] per requested 1-based page, in the order given.
    fn extract(
        &self,
        doc: &SourceDocument,
        page_nums: &[usize],
    ) -> Result<Vec<PageStructure>, TranscodeError>;
}

/// [`StructureExtractor`] backed by pdfium's text API and [`TableDetector`].
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library_dir: Option<PathBuf>,
    detector: TableDetector,
}

impl PdfiumExtractor {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self {
            library_dir,
            detector: TableDetector::new(),
        }
    }

    pub fn with_detector(mut self, detector: TableDetector) -> Self {
        self.detector = detector;
        self
    }
}

impl StructureExtractor for PdfiumExtractor {
    fn metadata(&self, doc: &SourceDocument) -> Result<DocumentMetadata, TranscodeError> {
        let pdfium = bind_pdfium(self.library_dir.as_deref(), Stage::Extract)?;
        let document = load_document(&pdfium, doc)?;
        let metadata = document.metadata();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().trim().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        Ok(DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            page_count: document.pages().len() as usize,
            pdf_version: format!("{:?}", document.version()),
        })
    }

    fn extract(
        &self,
        doc: &SourceDocument,
        page_nums: &[usize],
    ) -> Result<Vec<PageStructure>, TranscodeError> {
        let pdfium = bind_pdfium(self.library_dir.as_deref(), Stage::Extract)?;
        let document = load_document(&pdfium, doc)?;
        let pages = document.pages();
        let total_pages = pages.len() as usize;

        let mut structures = Vec::with_capacity(page_nums.len());
        for &page_num in page_nums {
            if page_num == 0 || page_num > total_pages {
                return Err(TranscodeError::extraction(
                    Stage::Extract,
                    format!("page {page_num} out of range (total={total_pages})"),
                ));
            }
            let page = pages.get((page_num - 1) as u16).map_err(|e| {
                TranscodeError::extraction(Stage::Extract, format!("page {page_num}: {e:?}"))
            })?;
            let text = page.text().map_err(|e| {
                TranscodeError::extraction(Stage::Extract, format!("page {page_num} text: {e:?}"))
            })?;

            let spans: Vec<TextSpan> = text
                .segments()
                .iter()
                .map(|segment| {
                    let bounds = segment.bounds();
                    TextSpan::new(
                        segment.text(),
                        bounds.left().value,
                        bounds.bottom().value,
                        bounds.width().value,
                        bounds.height().value,
                    )
                })
                .collect();

            let layout = self.detector.detect(spans);
            // Without tables the text API's own reading order is better than
            // lines rebuilt from segments.
            let page_text = if layout.tables.is_empty() {
                normalize_text(&text.all())
            } else {
                normalize_text(&layout.text_lines.join("\n"))
            };

            debug!(
                page = page_num,
                chars = page_text.as_ref().map_or(0, String::len),
                tables = layout.tables.len(),
                "native structure extracted"
            );
            structures.push(PageStructure {
                page_num,
                text: page_text,
                tables: layout.tables,
            });
        }

        Ok(structures)
    }
}
