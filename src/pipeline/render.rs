//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! ## Pixel cap
//!
//! An A0 poster at 200 DPI renders to 6,600 × 9,300 px. The longest edge is
//! capped at `max_rendered_pixels` regardless of physical size; letter and A4
//! pages still render at the requested DPI.

use crate::error::{Stage, TranscodeError};
use crate::model::{PageImage, SourceDocument};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Renders pages of a document to images.
///
/// Called from blocking worker threads; implementations may block.
pub trait Rasterizer: Send + Sync {
    /// Render the given 1-based pages: exactly one image per requested page,
    /// in the order given.
    fn rasterize(
        &self,
        doc: &SourceDocument,
        page_nums: &[usize],
    ) -> Result<Vec<PageImage>, TranscodeError>;
}

/// [`Rasterizer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
    dpi: u32,
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>, dpi: u32, max_pixels: u32) -> Self {
        Self {
            library_dir,
            dpi,
            max_pixels,
        }
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        doc: &SourceDocument,
        page_nums: &[usize],
    ) -> Result<Vec<PageImage>, TranscodeError> {
        let pdfium = bind_pdfium(self.library_dir.as_deref(), Stage::Rasterize)?;
        let document = load_document(&pdfium, doc)?;
        let pages = document.pages();
        let total_pages = pages.len() as usize;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut results = Vec::with_capacity(page_nums.len());
        for &page_num in page_nums {
            if page_num == 0 || page_num > total_pages {
                return Err(TranscodeError::extraction(
                    Stage::Rasterize,
                    format!("page {page_num} out of range (total={total_pages})"),
                ));
            }

            let page = pages.get((page_num - 1) as u16).map_err(|e| {
                TranscodeError::extraction(Stage::Rasterize, format!("page {page_num}: {e:?}"))
            })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                TranscodeError::extraction(Stage::Rasterize, format!("page {page_num}: {e:?}"))
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );
            results.push(PageImage { page_num, image });
        }

        Ok(results)
    }
}

/// Bind to the pdfium shared library.
///
/// With an explicit directory only that directory is tried; otherwise the
/// working directory, then the system library path.
pub(crate) fn bind_pdfium(
    library_dir: Option<&Path>,
    stage: Stage,
) -> Result<Pdfium, TranscodeError> {
    let at = |dir: &Path| {
        Pdfium::bind_to_library(dir.join(Pdfium::pdfium_platform_library_name()))
    };
    let bindings = match library_dir {
        Some(dir) => at(dir),
        None => at(Path::new(".")).or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| {
        TranscodeError::extraction(stage, format!("failed to load pdfium library: {e:?}"))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Parse the document from memory. Any parse failure is the document's fault.
pub(crate) fn load_document<'a>(
    pdfium: &'a Pdfium,
    doc: &'a SourceDocument,
) -> Result<PdfDocument<'a>, TranscodeError> {
    if !doc.has_pdf_header() {
        return Err(TranscodeError::unreadable("missing %PDF header"));
    }
    pdfium
        .load_pdf_from_byte_slice(doc.bytes(), None)
        .map_err(|e| {
            let detail = format!("{e:?}");
            if detail.to_lowercase().contains("password") {
                TranscodeError::unreadable("document is password-protected")
            } else {
                TranscodeError::unreadable(detail)
            }
        })
}
