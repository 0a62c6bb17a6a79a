//! Word-processing output (.docx, WordprocessingML in a zip container).

use super::{add_part, xml_text, NO_CONTENT_NOTICE, XML_DECL};
use crate::error::TranscodeError;
use crate::model::{PipelineResult, Table};
use std::io::{Seek, Write};
use zip::ZipWriter;

/// One body element of the output document.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(String),
    /// Native table; the first row is the header.
    Table(Table),
    PageBreak,
}

/// Lay out the document body.
///
/// Every non-empty text line becomes a paragraph, every table a native
/// table, and source pages are separated by page breaks. A result with no
/// content gets a single notice paragraph.
pub fn build_document(result: &PipelineResult) -> Vec<Block> {
    if !result.content_found() {
        return vec![Block::Paragraph(NO_CONTENT_NOTICE.to_string())];
    }

    let mut blocks = Vec::new();
    for (i, page) in result.pages().iter().enumerate() {
        if i > 0 {
            blocks.push(Block::PageBreak);
        }
        if let Some(text) = page.content.text() {
            blocks.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(|l| Block::Paragraph(l.to_string())),
            );
        }
        blocks.extend(page.content.tables().iter().cloned().map(Block::Table));
    }
    blocks
}

/// Write `blocks` as a .docx container.
pub fn write_document<W: Write + Seek>(blocks: &[Block], writer: W) -> Result<W, TranscodeError> {
    let mut zip = ZipWriter::new(writer);
    add_part(&mut zip, "[Content_Types].xml", CONTENT_TYPES)?;
    add_part(&mut zip, "_rels/.rels", ROOT_RELS)?;
    add_part(&mut zip, "word/document.xml", &document_xml(blocks))?;
    Ok(zip.finish()?)
}

fn document_xml(blocks: &[Block]) -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#);
    for block in blocks {
        match block {
            Block::Paragraph(text) => paragraph(&mut xml, text, false),
            Block::PageBreak => xml.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#),
            Block::Table(table) => {
                table_xml(&mut xml, table);
                // Keeps adjacent tables from merging.
                xml.push_str("<w:p/>");
            }
        }
    }
    xml.push_str("<w:sectPr/></w:body></w:document>");
    xml
}

fn paragraph(xml: &mut String, text: &str, bold: bool) {
    xml.push_str("<w:p><w:r>");
    if bold {
        xml.push_str("<w:rPr><w:b/></w:rPr>");
    }
    xml.push_str(r#"<w:t xml:space="preserve">"#);
    xml.push_str(&xml_text(text));
    xml.push_str("</w:t></w:r></w:p>");
}

fn table_xml(xml: &mut String, table: &Table) {
    xml.push_str(concat!(
        "<w:tbl><w:tblPr>",
        r#"<w:tblW w:w="0" w:type="auto"/>"#,
        "<w:tblBorders>",
        r#"<w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        r#"<w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#,
        "</w:tblBorders></w:tblPr><w:tblGrid>",
    ));
    for _ in 0..table.column_count() {
        xml.push_str("<w:gridCol/>");
    }
    xml.push_str("</w:tblGrid>");
    for (i, row) in table.rows().iter().enumerate() {
        xml.push_str("<w:tr>");
        for cell in row {
            xml.push_str("<w:tc>");
            // Every cell needs at least one paragraph.
            paragraph(xml, cell, i == 0);
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
}

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#,
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#,
);
