//! Spreadsheet output (.xlsx, SpreadsheetML in a zip container).
//!
//! One sheet per page fragment:
//!
//! | fragment            | sheet name          | layout                        |
//! |---------------------|---------------------|-------------------------------|
//! | text of page *n*    | `Page{n}_Text`      | one line per row, column A    |
//! | table *k* of page *n* | `Page{n}_Table{k}` | table rows, bold header row   |
//!
//! Page number, table index and fragment kind make every name unique, so no
//! de-duplication pass is needed. Names stay far below Excel's 31-character
//! limit.

use super::{add_part, xml_text, NO_CONTENT_NOTICE, XML_DECL};
use crate::error::TranscodeError;
use crate::model::PipelineResult;
use std::fmt::Write as _;
use std::io::{Seek, Write};
use zip::ZipWriter;

/// Name of the sheet written when nothing else would be.
pub const FALLBACK_SHEET_NAME: &str = "No_Content";

/// One worksheet, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
    /// Render the first row in bold.
    pub header: bool,
}

/// Lay out the workbook.
///
/// The fallback sheet is decided once, after every page has been visited:
/// a workbook always has at least one sheet.
pub fn build_workbook(result: &PipelineResult) -> Vec<Sheet> {
    let mut sheets = Vec::new();
    for page in result.pages() {
        let n = page.page_num;
        if let Some(text) = page.content.text() {
            let rows: Vec<Vec<String>> = text
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.trim().is_empty())
                .map(|l| vec![l.to_string()])
                .collect();
            if !rows.is_empty() {
                sheets.push(Sheet {
                    name: format!("Page{n}_Text"),
                    rows,
                    header: false,
                });
            }
        }
        for (k, table) in page.content.tables().iter().enumerate() {
            sheets.push(Sheet {
                name: format!("Page{}_Table{}", n, k + 1),
                rows: table.rows().to_vec(),
                header: true,
            });
        }
    }

    if sheets.is_empty() {
        sheets.push(Sheet {
            name: FALLBACK_SHEET_NAME.to_string(),
            rows: vec![vec![NO_CONTENT_NOTICE.to_string()]],
            header: false,
        });
    }
    sheets
}

/// Write `sheets` as an .xlsx container.
pub fn write_workbook<W: Write + Seek>(sheets: &[Sheet], writer: W) -> Result<W, TranscodeError> {
    if sheets.is_empty() {
        return Err(TranscodeError::AssemblyFailure {
            detail: "a workbook needs at least one sheet".into(),
            source: None,
        });
    }

    let mut zip = ZipWriter::new(writer);
    add_part(&mut zip, "[Content_Types].xml", &content_types(sheets.len()))?;
    add_part(&mut zip, "_rels/.rels", ROOT_RELS)?;
    add_part(&mut zip, "xl/workbook.xml", &workbook_xml(sheets))?;
    add_part(&mut zip, "xl/_rels/workbook.xml.rels", &workbook_rels(sheets.len()))?;
    add_part(&mut zip, "xl/styles.xml", STYLES)?;
    for (i, sheet) in sheets.iter().enumerate() {
        add_part(
            &mut zip,
            &format!("xl/worksheets/sheet{}.xml", i + 1),
            &sheet_xml(sheet),
        )?;
    }
    Ok(zip.finish()?)
}

/// Spreadsheet column letters: 0 → A, 25 → Z, 26 → AA.
fn column_name(mut idx: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

fn content_types(sheet_count: usize) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(concat!(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        r#"<Default Extension="xml" ContentType="application/xml"/>"#,
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    ));
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

fn workbook_xml(sheets: &[Sheet]) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(concat!(
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
        r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    ));
    for (i, sheet) in sheets.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_text(&sheet.name),
            i + 1,
            i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels(sheet_count: usize) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
        );
    }
    let _ = write!(
        xml,
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    );
    xml.push_str("</Relationships>");
    xml
}

fn sheet_xml(sheet: &Sheet) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#);
    for (r, row) in sheet.rows.iter().enumerate() {
        let _ = write!(xml, r#"<row r="{}">"#, r + 1);
        let style = if sheet.header && r == 0 { r#" s="1""# } else { "" };
        for (c, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let _ = write!(
                xml,
                r#"<c r="{}{}" t="inlineStr"{}><is><t xml:space="preserve">{}</t></is></c>"#,
                column_name(c),
                r + 1,
                style,
                xml_text(cell)
            );
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

// Style 0 is the default, style 1 is bold (header rows).
const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font>"#,
    r#"<font><b/><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill>"#,
    r#"<fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#,
    r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs>"#,
    r#"</styleSheet>"#,
);
