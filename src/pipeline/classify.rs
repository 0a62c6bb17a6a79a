//! Per-page classification and merge.
//!
//! Precedence is tables, then native text, then OCR, then empty. The first
//! step looks only at the native structure and decides whether OCR is needed
//! at all; OCR output is folded in by [`resolve_ocr`].

use crate::model::{PageContent, PageStructure};
use crate::pipeline::normalize::normalize_text;

/// Outcome of looking at a page's native structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Native content is usable; OCR must not run for this page.
    Native(PageContent),
    /// No usable native content; rasterise and OCR the page.
    NeedsOcr,
}

/// Classify a page from its native structure alone.
///
/// A page with tables yields [`PageContent::Tables`], carrying any native
/// text alongside the tables. A page with only text yields
/// [`PageContent::NativeText`]. Anything else needs OCR.
pub fn classify(structure: PageStructure) -> Classification {
    let text = structure.text.filter(|t| !t.trim().is_empty());
    if !structure.tables.is_empty() {
        return Classification::Native(PageContent::Tables {
            text,
            tables: structure.tables,
        });
    }
    match text {
        Some(text) => Classification::Native(PageContent::NativeText(text)),
        None => Classification::NeedsOcr,
    }
}

/// Content for a page that went through OCR.
pub fn resolve_ocr(raw: &str) -> PageContent {
    match normalize_text(raw) {
        Some(text) => PageContent::OcrText(text),
        None => PageContent::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageContentKind, Table};

    fn table() -> Table {
        Table::new(vec![
            vec!["Name".into(), "Age".into()],
            vec!["Ann".into(), "30".into()],
        ])
        .unwrap()
    }

    fn structure(text: Option<&str>, tables: Vec<Table>) -> PageStructure {
        PageStructure {
            page_num: 1,
            text: text.map(String::from),
            tables,
        }
    }

    #[test]
    fn tables_take_precedence_and_keep_text() {
        match classify(structure(Some("Heading"), vec![table()])) {
            Classification::Native(content) => {
                assert_eq!(content.kind(), PageContentKind::Tables);
                assert_eq!(content.text(), Some("Heading"));
                assert_eq!(content.tables().len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tables_without_text() {
        let c = classify(structure(None, vec![table()]));
        assert_eq!(
            c,
            Classification::Native(PageContent::Tables {
                text: None,
                tables: vec![table()],
            })
        );
    }

    #[test]
    fn native_text_never_needs_ocr() {
        assert_eq!(
            classify(structure(Some("Body text"), vec![])),
            Classification::Native(PageContent::NativeText("Body text".into()))
        );
    }

    #[test]
    fn blank_text_layer_falls_through_to_ocr() {
        assert_eq!(classify(structure(None, vec![])), Classification::NeedsOcr);
        assert_eq!(
            classify(structure(Some(" \n\t "), vec![])),
            Classification::NeedsOcr
        );
    }

    #[test]
    fn ocr_result_maps_to_text_or_empty() {
        assert_eq!(
            resolve_ocr("Scanned words\n\x0c"),
            PageContent::OcrText("Scanned words".into())
        );
        assert_eq!(resolve_ocr(""), PageContent::Empty);
        assert_eq!(resolve_ocr("  \n \x0c"), PageContent::Empty);
    }
}
