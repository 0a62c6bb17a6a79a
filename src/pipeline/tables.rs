//! Table detection from positioned text spans (stream mode).
//!
//! Tables are found from text alignment alone, without ruling lines:
//!
//! 1. spans are grouped into rows by baseline, with a tolerance relative to
//!    the font size;
//! 2. left edges that recur across rows become column edges;
//! 3. runs of consecutive multi-span rows whose spans sit on those edges
//!    become table regions;
//! 4. each region is re-analysed on its own, rejected if it has too many
//!    columns or is really a bulleted/numbered list, and otherwise turned
//!    into a rectangular [`Table`] with the first row as header.
//!
//! Rows that end up outside every table are returned as plain text lines, so
//! a page's text and tables never duplicate each other.

use crate::model::Table;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A run of text with its bounding box, in PDF points (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Left edge.
    pub x: f32,
    /// Bottom edge.
    pub y: f32,
    pub width: f32,
    /// Box height, used as the font size.
    pub font_size: f32,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, font_size: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            font_size,
        }
    }
}

/// Tuning knobs for [`TableDetector`].
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum rows (header included) for a region to count as a table.
    pub min_rows: usize,
    pub min_columns: usize,
    /// Above this, the "columns" are usually words of a justified paragraph.
    pub max_columns: usize,
    /// Row grouping tolerance as a fraction of font size.
    pub y_tolerance_factor: f32,
    /// Fraction of a row's spans that must sit on a column edge.
    pub min_alignment_ratio: f32,
    /// Column edges closer than this (points) are merged.
    pub min_column_gap: f32,
    /// Width of the buckets left edges are snapped to (points).
    pub edge_bucket: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            edge_bucket: 5.0,
        }
    }
}

/// Tables and leftover text lines for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub tables: Vec<Table>,
    /// Lines outside any table, top to bottom.
    pub text_lines: Vec<String>,
}

#[derive(Debug, Clone)]
struct Row {
    /// Sorted left to right.
    spans: Vec<TextSpan>,
}

/// Stream-mode table detector.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Split a page's spans into tables and plain text lines.
    pub fn detect(&self, spans: Vec<TextSpan>) -> PageLayout {
        let rows = self.group_into_rows(spans);
        let mut in_table = vec![false; rows.len()];
        let mut tables = Vec::new();

        if rows.len() >= self.config.min_rows {
            let columns = self.detect_columns(&rows);
            if columns.len() >= self.config.min_columns {
                for (start, end) in self.find_table_regions(&rows, &columns) {
                    let region = &rows[start..=end];
                    if let Some(table) = self.build_table(region) {
                        in_table[start..=end].iter_mut().for_each(|f| *f = true);
                        tables.push(table);
                    }
                }
            }
        }

        let text_lines = rows
            .iter()
            .zip(&in_table)
            .filter(|(_, used)| !**used)
            .map(|(row, _)| row_text(row))
            .filter(|line| !line.trim().is_empty())
            .collect();

        debug!(tables = tables.len(), rows = rows.len(), "table detection done");
        PageLayout { tables, text_lines }
    }

    /// Group spans into rows, top of page first.
    fn group_into_rows(&self, mut spans: Vec<TextSpan>) -> Vec<Row> {
        spans.retain(|s| !s.text.trim().is_empty());
        spans.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
        });

        let mut rows: Vec<Row> = Vec::new();
        let mut current: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in spans {
            let tolerance = span.font_size.max(1.0) * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
                _ => {
                    if !current.is_empty() {
                        rows.push(finish_row(std::mem::take(&mut current)));
                    }
                    current_y = Some(span.y);
                    current.push(span);
                }
            }
        }
        if !current.is_empty() {
            rows.push(finish_row(current));
        }
        rows
    }

    /// Left edges that recur in enough multi-span rows, merged when close.
    fn detect_columns(&self, rows: &[Row]) -> Vec<f32> {
        let multi: Vec<&Row> = rows.iter().filter(|r| r.spans.len() >= 2).collect();
        if multi.len() < self.config.min_rows {
            return vec![];
        }

        let bucket = self.config.edge_bucket;
        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &multi {
            let buckets: HashSet<i32> = row
                .spans
                .iter()
                .map(|s| (s.x / bucket).round() as i32)
                .collect();
            for b in buckets {
                *edge_counts.entry(b).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((multi.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .into_iter()
            .filter(|(_, count)| *count >= min_occurrences)
            .map(|(b, _)| b as f32 * bucket)
            .collect();
        edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let mut merged: Vec<f32> = Vec::with_capacity(edges.len());
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Maximal runs of consecutive aligned multi-span rows.
    fn find_table_regions(&self, rows: &[Row], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            let aligned = row.spans.len() >= 2
                && self.alignment_score(row, columns) >= self.config.min_alignment_ratio;
            match (aligned, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if i - s >= self.config.min_rows {
                        regions.push((s, i - 1));
                    }
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }
        regions
    }

    fn alignment_score(&self, row: &Row, columns: &[f32]) -> f32 {
        if row.spans.is_empty() || columns.is_empty() {
            return 0.0;
        }
        let tolerance = self.config.edge_bucket;
        let aligned = row
            .spans
            .iter()
            .filter(|s| columns.iter().any(|c| (s.x - c).abs() <= tolerance))
            .count();
        aligned as f32 / row.spans.len() as f32
    }

    fn build_table(&self, region: &[Row]) -> Option<Table> {
        let columns = self.detect_columns(region);
        if columns.len() < self.config.min_columns {
            return None;
        }
        if columns.len() > self.config.max_columns {
            debug!(columns = columns.len(), "region rejected: too many columns");
            return None;
        }
        if is_list_pattern(region) {
            debug!("region rejected: list pattern");
            return None;
        }

        let right_x = region
            .iter()
            .flat_map(|r| r.spans.iter())
            .map(|s| s.x + s.width)
            .fold(f32::MIN, f32::max);

        let rows: Vec<Vec<String>> = region
            .iter()
            .map(|row| {
                let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
                for span in &row.spans {
                    let col = column_for(span.x, &columns, right_x);
                    cells[col].push(span.text.trim());
                }
                cells.into_iter().map(|parts| parts.join(" ")).collect::<Vec<_>>()
            })
            .collect();

        Table::new(rows)
    }
}

fn finish_row(mut spans: Vec<TextSpan>) -> Row {
    spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    Row { spans }
}

fn row_text(row: &Row) -> String {
    row.spans
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Column whose `[start - 10, next_start - 10)` band holds `x`, else the
/// nearest edge.
fn column_for(x: f32, columns: &[f32], right_x: f32) -> usize {
    for (i, &start) in columns.iter().enumerate() {
        let end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if x >= start - 10.0 && x < end - 10.0 {
            return i;
        }
    }
    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (x - **a)
                .abs()
                .partial_cmp(&(x - **b).abs())
                .unwrap_or(Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// A "table" whose first column is mostly bullets or list numbers.
fn is_list_pattern(rows: &[Row]) -> bool {
    if rows.is_empty() {
        return false;
    }
    let markers = rows
        .iter()
        .filter_map(|r| r.spans.first())
        .filter(|s| is_list_marker(s.text.trim()))
        .count();
    markers * 2 >= rows.len()
}

fn is_list_marker(text: &str) -> bool {
    const BULLETS: &[&str] = &["•", "-", "*", "–", "—", "·", "◦", "▪", "▸", "►"];
    if BULLETS.contains(&text) {
        return true;
    }
    // "1." "12)" "a." "(iv)"
    let inner = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .or_else(|| text.strip_suffix('.'))
        .or_else(|| text.strip_suffix(')'));
    match inner {
        Some(s) if !s.is_empty() && s.len() <= 4 => {
            s.chars().all(|c| c.is_ascii_digit())
                || (s.len() == 1 && s.chars().all(|c| c.is_ascii_alphabetic()))
                || s.chars().all(|c| matches!(c, 'i' | 'v' | 'x'))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan::new(text, x, y, 6.0 * text.len() as f32, 10.0)
    }

    fn cells(t: &Table) -> Vec<Vec<&str>> {
        t.rows()
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn detects_simple_two_column_table() {
        let spans = vec![
            span("Employees", 72.0, 730.0),
            span("Name", 72.0, 700.0),
            span("Age", 200.0, 700.0),
            span("Ann", 72.0, 686.0),
            span("30", 200.0, 686.0),
            span("Bo", 72.0, 672.0),
            span("22", 200.0, 672.0),
        ];
        let layout = TableDetector::new().detect(spans);
        assert_eq!(layout.tables.len(), 1);
        assert_eq!(
            cells(&layout.tables[0]),
            vec![vec!["Name", "Age"], vec!["Ann", "30"], vec!["Bo", "22"]]
        );
        assert_eq!(layout.tables[0].header(), ["Name", "Age"]);
        assert_eq!(layout.text_lines, vec!["Employees"]);
    }

    #[test]
    fn single_aligned_row_is_not_a_table() {
        let spans = vec![
            span("Name", 72.0, 700.0),
            span("Age", 200.0, 700.0),
            span("Just a paragraph of prose", 72.0, 680.0),
        ];
        let layout = TableDetector::new().detect(spans);
        assert!(layout.tables.is_empty());
        assert_eq!(
            layout.text_lines,
            vec!["Name Age", "Just a paragraph of prose"]
        );
    }

    #[test]
    fn prose_only_yields_lines() {
        let spans = vec![
            span("First line", 72.0, 700.0),
            span("Second line", 72.0, 686.0),
        ];
        let layout = TableDetector::new().detect(spans);
        assert!(layout.tables.is_empty());
        assert_eq!(layout.text_lines, vec!["First line", "Second line"]);
    }

    #[test]
    fn bulleted_list_is_not_a_table() {
        let spans = vec![
            span("•", 72.0, 700.0),
            span("apples", 90.0, 700.0),
            span("•", 72.0, 686.0),
            span("pears", 90.0, 686.0),
            span("•", 72.0, 672.0),
            span("plums", 90.0, 672.0),
        ];
        let layout = TableDetector::new().detect(spans);
        assert!(layout.tables.is_empty());
        assert_eq!(layout.text_lines.len(), 3);
    }

    #[test]
    fn missing_cell_keeps_rows_rectangular() {
        let spans = vec![
            span("Item", 72.0, 700.0),
            span("Qty", 200.0, 700.0),
            span("Note", 320.0, 700.0),
            span("Bolt", 72.0, 686.0),
            span("4", 200.0, 686.0),
            span("Nut", 72.0, 672.0),
            span("9", 200.0, 672.0),
            span("spare", 320.0, 672.0),
        ];
        let layout = TableDetector::new().detect(spans);
        assert_eq!(layout.tables.len(), 1);
        let t = &layout.tables[0];
        assert_eq!(t.column_count(), 3);
        assert!(t.rows().iter().all(|r| r.len() == 3));
        assert_eq!(t.rows()[1], vec!["Bolt", "4", ""]);
    }

    #[test]
    fn spans_on_same_baseline_within_tolerance_share_a_row() {
        let spans = vec![
            span("Name", 72.0, 700.0),
            span("Age", 200.0, 701.5),
            span("Ann", 72.0, 686.0),
            span("30", 200.0, 685.0),
        ];
        let layout = TableDetector::new().detect(spans);
        assert_eq!(layout.tables.len(), 1);
        assert_eq!(layout.tables[0].rows().len(), 2);
    }

    #[test]
    fn list_markers() {
        assert!(is_list_marker("1."));
        assert!(is_list_marker("12)"));
        assert!(is_list_marker("(iv)"));
        assert!(is_list_marker("a."));
        assert!(is_list_marker("•"));
        assert!(!is_list_marker("30"));
        assert!(!is_list_marker("Name"));
    }
}
