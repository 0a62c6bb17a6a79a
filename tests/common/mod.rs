//! In-memory engines for exercising the pipeline without pdfium or tesseract.

#![allow(dead_code)]

use image::DynamicImage;
use pdf_transcode::{
    ArtifactStore, DocumentMetadata, OcrEngine, OcrError, PageImage, PageStructure, Pipeline,
    Rasterizer, SourceDocument, StructureExtractor, Table, TranscodeError,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serves a fixed list of page structures. Page `n` is `pages[n - 1]`.
pub struct FakeExtractor {
    pub pages: Vec<PageStructure>,
    pub unreadable: bool,
}

impl FakeExtractor {
    pub fn new(pages: Vec<PageStructure>) -> Self {
        Self {
            pages,
            unreadable: false,
        }
    }

    pub fn unreadable() -> Self {
        Self {
            pages: Vec::new(),
            unreadable: true,
        }
    }
}

impl StructureExtractor for FakeExtractor {
    fn metadata(&self, _doc: &SourceDocument) -> Result<DocumentMetadata, TranscodeError> {
        if self.unreadable {
            return Err(TranscodeError::unreadable("no PDF header"));
        }
        Ok(DocumentMetadata {
            page_count: self.pages.len(),
            pdf_version: "1.7".into(),
            ..Default::default()
        })
    }

    fn extract(
        &self,
        _doc: &SourceDocument,
        page_nums: &[usize],
    ) -> Result<Vec<PageStructure>, TranscodeError> {
        Ok(page_nums
            .iter()
            .map(|&n| PageStructure {
                page_num: n,
                ..self.pages[n - 1].clone()
            })
            .collect())
    }
}

/// Produces a 1×1 image per requested page and counts what it rendered.
#[derive(Default)]
pub struct FakeRasterizer {
    pub rendered: AtomicUsize,
    /// Silently leave this page out of the output.
    pub drop_page: Option<usize>,
}

impl Rasterizer for FakeRasterizer {
    fn rasterize(
        &self,
        _doc: &SourceDocument,
        page_nums: &[usize],
    ) -> Result<Vec<PageImage>, TranscodeError> {
        self.rendered.fetch_add(page_nums.len(), Ordering::SeqCst);
        Ok(page_nums
            .iter()
            .filter(|&&page_num| self.drop_page != Some(page_num))
            .map(|&page_num| PageImage {
                page_num,
                image: DynamicImage::new_rgb8(1, 1),
            })
            .collect())
    }
}

/// Returns canned text per page. Pages without an entry recognise as blank.
#[derive(Default)]
pub struct FakeOcr {
    pub texts: HashMap<usize, String>,
    pub calls: AtomicUsize,
    pub fail_on: Option<usize>,
    pub panic_on: Option<usize>,
    /// Later pages finish first when set, to shuffle completion order.
    pub reverse_delay: Option<Duration>,
}

impl FakeOcr {
    pub fn with_texts(texts: &[(usize, &str)]) -> Self {
        Self {
            texts: texts.iter().map(|&(n, t)| (n, t.to_string())).collect(),
            ..Default::default()
        }
    }
}

impl OcrEngine for FakeOcr {
    fn name(&self) -> &str {
        "fake"
    }

    fn recognize(&self, image: &PageImage) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(step) = self.reverse_delay {
            let pages_after = 32usize.saturating_sub(image.page_num) as u32;
            std::thread::sleep(step * pages_after);
        }
        if self.panic_on == Some(image.page_num) {
            panic!("engine internal fault");
        }
        if self.fail_on == Some(image.page_num) {
            return Err(OcrError::Failed("engine crashed".into()));
        }
        Ok(self.texts.get(&image.page_num).cloned().unwrap_or_default())
    }
}

/// Engines plus handles to inspect them after a run.
pub struct Harness {
    pub pipeline: Pipeline,
    pub rasterizer: Arc<FakeRasterizer>,
    pub ocr: Arc<FakeOcr>,
}

pub fn harness(root: &Path, pages: Vec<PageStructure>, ocr: FakeOcr) -> Harness {
    harness_with(root, FakeExtractor::new(pages), ocr)
}

pub fn harness_with(root: &Path, extractor: FakeExtractor, ocr: FakeOcr) -> Harness {
    harness_parts(root, extractor, FakeRasterizer::default(), ocr)
}

pub fn harness_parts(
    root: &Path,
    extractor: FakeExtractor,
    rasterizer: FakeRasterizer,
    ocr: FakeOcr,
) -> Harness {
    let store = ArtifactStore::new(root, Duration::from_secs(60)).unwrap();
    let rasterizer = Arc::new(rasterizer);
    let ocr = Arc::new(ocr);
    let pipeline = Pipeline::new(
        rasterizer.clone(),
        Arc::new(extractor),
        ocr.clone(),
        store,
    );
    Harness {
        pipeline,
        rasterizer,
        ocr,
    }
}

pub fn text_page(text: &str) -> PageStructure {
    PageStructure {
        page_num: 0,
        text: Some(text.to_string()),
        tables: Vec::new(),
    }
}

pub fn scanned_page() -> PageStructure {
    PageStructure::default()
}

pub fn name_age_table() -> Table {
    Table::new(vec![
        vec!["Name".into(), "Age".into()],
        vec!["Ann".into(), "30".into()],
        vec!["Bob".into(), "41".into()],
    ])
    .unwrap()
}

pub fn pdf_bytes() -> SourceDocument {
    SourceDocument::new(b"%PDF-1.7\n%fake".to_vec())
}

pub fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
