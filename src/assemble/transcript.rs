//! Flat text transcript.

use crate::model::PipelineResult;

/// Concatenate page contents in page order, one line break between pages.
///
/// Each page contributes its text, then its tables with cells joined by tabs,
/// one row per line. An empty page contributes an empty line, so page
/// boundaries stay visible.
pub fn transcript(result: &PipelineResult) -> String {
    result
        .pages()
        .iter()
        .map(|page| {
            let mut lines: Vec<String> = Vec::new();
            if let Some(text) = page.content.text() {
                lines.push(text.to_string());
            }
            for table in page.content.tables() {
                lines.extend(table.rows().iter().map(|row| row.join("\t")));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageContent, PageResult, Table};

    fn page(page_num: usize, content: PageContent) -> PageResult {
        PageResult { page_num, content }
    }

    #[test]
    fn empty_pages_are_kept_as_blank_lines() {
        let result = PipelineResult::new(vec![
            page(1, PageContent::NativeText("Hello".into())),
            page(2, PageContent::Empty),
            page(3, PageContent::OcrText("World".into())),
        ]);
        assert_eq!(transcript(&result), "Hello\n\nWorld");
    }

    #[test]
    fn tables_follow_page_text() {
        let table = Table::new(vec![
            vec!["Name".into(), "Age".into()],
            vec!["Ann".into(), "30".into()],
        ])
        .unwrap();
        let result = PipelineResult::new(vec![
            page(
                1,
                PageContent::Tables {
                    text: Some("Staff".into()),
                    tables: vec![table.clone()],
                },
            ),
            page(
                2,
                PageContent::Tables {
                    text: None,
                    tables: vec![table],
                },
            ),
        ]);
        assert_eq!(
            transcript(&result),
            "Staff\nName\tAge\nAnn\t30\nName\tAge\nAnn\t30"
        );
    }

    #[test]
    fn no_pages_is_empty_string() {
        assert_eq!(transcript(&PipelineResult::new(vec![])), "");
    }
}
