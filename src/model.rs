//! The per-page content model shared by every pipeline stage.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An uploaded PDF, held in memory and never mutated.
///
/// Cloning is cheap (the bytes are reference-counted), so the same document
/// can be handed to the rasterizer and the extractor on different threads.
#[derive(Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
}

impl SourceDocument {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Pre-flight check for the `%PDF` magic anywhere in the first 1 KiB;
    /// readers tolerate leading junk before it.
    pub fn has_pdf_header(&self) -> bool {
        let head = &self.bytes[..self.bytes.len().min(1024)];
        head.windows(4).any(|w| w == b"%PDF")
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A rasterised page, consumed by OCR.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// A rectangular table: every row has the same number of cells.
///
/// The first row is the header. Construction through [`Table::new`]
/// guarantees the table has a header plus at least one data row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from rows, padding short rows with empty cells.
    ///
    /// Returns `None` for tables with one row or fewer, or with no columns.
    pub fn new(mut rows: Vec<Vec<String>>) -> Option<Self> {
        if rows.len() < 2 {
            return None;
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return None;
        }
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Some(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header(&self) -> &[String] {
        &self.rows[0]
    }

    pub fn body(&self) -> &[Vec<String>] {
        &self.rows[1..]
    }

    pub fn column_count(&self) -> usize {
        self.rows[0].len()
    }
}

/// Native-extraction result for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    /// 1-based page number.
    pub page_num: usize,
    /// Text outside any detected table; `None` when the page has no text layer
    /// or only whitespace.
    pub text: Option<String>,
    pub tables: Vec<Table>,
}

/// Which path produced a page's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageContentKind {
    NativeText,
    OcrText,
    Tables,
    Empty,
}

/// The merged, final content for one page.
///
/// `Tables` carries the page's native text alongside its tables, so a page
/// with both contributes a text fragment and table fragments downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageContent {
    NativeText(String),
    OcrText(String),
    Tables {
        text: Option<String>,
        tables: Vec<Table>,
    },
    Empty,
}

impl PageContent {
    pub fn kind(&self) -> PageContentKind {
        match self {
            PageContent::NativeText(_) => PageContentKind::NativeText,
            PageContent::OcrText(_) => PageContentKind::OcrText,
            PageContent::Tables { .. } => PageContentKind::Tables,
            PageContent::Empty => PageContentKind::Empty,
        }
    }

    /// The page's plain-text payload, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            PageContent::NativeText(t) | PageContent::OcrText(t) => Some(t),
            PageContent::Tables { text, .. } => text.as_deref(),
            PageContent::Empty => None,
        }
    }

    pub fn tables(&self) -> &[Table] {
        match self {
            PageContent::Tables { tables, .. } => tables,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PageContent::Empty)
    }
}

/// Content for one page of the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number.
    pub page_num: usize,
    pub content: PageContent,
}

/// Ordered page contents for a whole run.
///
/// Only constructible through [`PipelineResult::new`], which derives
/// `content_found` from the pages so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pages: Vec<PageResult>,
    content_found: bool,
}

impl PipelineResult {
    /// Sorts pages by page number and computes `content_found`.
    pub fn new(mut pages: Vec<PageResult>) -> Self {
        pages.sort_by_key(|p| p.page_num);
        let content_found = pages.iter().any(|p| !p.content.is_empty());
        Self {
            pages,
            content_found,
        }
    }

    pub fn pages(&self) -> &[PageResult] {
        &self.pages
    }

    pub fn content_found(&self) -> bool {
        self.content_found
    }

    /// Number of pages whose content has the given kind.
    pub fn count(&self, kind: PageContentKind) -> usize {
        self.pages.iter().filter(|p| p.content.kind() == kind).count()
    }

    pub fn table_count(&self) -> usize {
        self.pages.iter().map(|p| p.content.tables().len()).sum()
    }
}

/// Document-level metadata, read without OCR.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn single_row_table_is_rejected() {
        assert!(Table::new(vec![row(&["Name", "Age"])]).is_none());
        assert!(Table::new(vec![]).is_none());
        assert!(Table::new(vec![vec![], vec![]]).is_none());
    }

    #[test]
    fn ragged_rows_are_padded() {
        let t = Table::new(vec![row(&["A", "B", "C"]), row(&["1"])]).unwrap();
        assert_eq!(t.column_count(), 3);
        assert_eq!(t.body()[0], row(&["1", "", ""]));
    }

    #[test]
    fn content_found_tracks_non_empty_pages() {
        let empty = PipelineResult::new(vec![
            PageResult {
                page_num: 1,
                content: PageContent::Empty,
            },
            PageResult {
                page_num: 2,
                content: PageContent::Empty,
            },
        ]);
        assert!(!empty.content_found());

        let some = PipelineResult::new(vec![
            PageResult {
                page_num: 2,
                content: PageContent::OcrText("x".into()),
            },
            PageResult {
                page_num: 1,
                content: PageContent::Empty,
            },
        ]);
        assert!(some.content_found());
        assert_eq!(some.pages()[0].page_num, 1);
    }

    #[test]
    fn pdf_header_sniffing() {
        assert!(SourceDocument::new(b"%PDF-1.7\n...".to_vec()).has_pdf_header());
        assert!(SourceDocument::new(b"\xEF\xBB\xBF%PDF-1.4".to_vec()).has_pdf_header());
        assert!(!SourceDocument::new(b"PK\x03\x04".to_vec()).has_pdf_header());
    }
}
