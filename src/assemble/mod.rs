//! Document assembly: turn a [`PipelineResult`] into the requested artifact.
//!
//! Each format is split into a pure *build* step (page contents → format
//! model) and a *write* step (format model → bytes). The build steps carry
//! all the layout rules and are tested without touching the filesystem.

pub mod document;
pub mod spreadsheet;
pub mod transcript;

pub use document::{build_document, write_document, Block};
pub use spreadsheet::{build_workbook, write_workbook, Sheet, FALLBACK_SHEET_NAME};
pub use transcript::transcript;

use crate::artifact::{ArtifactStore, TransientArtifact};
use crate::config::{ReleasePolicy, TargetMode};
use crate::error::TranscodeError;
use crate::model::PipelineResult;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::{debug, error};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Text of the notice written when a document yields no content.
pub const NO_CONTENT_NOTICE: &str = "No extractable content found";

pub(crate) const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// The built, not yet written, form of an artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    Transcript(String),
    Document(Vec<Block>),
    Workbook(Vec<Sheet>),
}

impl Assembled {
    pub fn build(result: &PipelineResult, mode: TargetMode) -> Self {
        match mode {
            TargetMode::Transcript => Assembled::Transcript(transcript(result)),
            TargetMode::Document => Assembled::Document(build_document(result)),
            TargetMode::Spreadsheet => Assembled::Workbook(build_workbook(result)),
        }
    }

    /// Write to `path`, truncating whatever is there.
    pub fn write_to(&self, path: &Path) -> Result<(), TranscodeError> {
        let file = File::create(path)
            .map_err(|e| TranscodeError::assembly(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        let mut writer = match self {
            Assembled::Transcript(text) => {
                writer
                    .write_all(text.as_bytes())
                    .map_err(|e| TranscodeError::assembly("writing transcript", e))?;
                writer
            }
            Assembled::Document(blocks) => write_document(blocks, writer)?,
            Assembled::Workbook(sheets) => write_workbook(sheets, writer)?,
        };
        writer
            .flush()
            .map_err(|e| TranscodeError::assembly(format!("flushing {}", path.display()), e))
    }
}

/// Build and write `result` into a fresh artifact from `store`.
///
/// If writing fails the half-written artifact is released before the error
/// is returned.
pub async fn assemble(
    result: &PipelineResult,
    mode: TargetMode,
    store: &ArtifactStore,
    label: &str,
    policy: ReleasePolicy,
) -> Result<TransientArtifact, TranscodeError> {
    let assembled = Assembled::build(result, mode);
    let artifact = store.allocate(label, mode.extension(), policy)?;
    let path = artifact.path().to_path_buf();

    tokio::task::spawn_blocking(move || assembled.write_to(&path))
        .await
        .map_err(|e| {
            error!(artifact = %artifact.id(), "assembly task panicked: {e}");
            TranscodeError::AssemblyFailure {
                detail: "assembly task panicked".into(),
                source: None,
            }
        })??;

    debug!(artifact = %artifact.id(), ?mode, "assembled");
    Ok(artifact)
}

/// Add one XML part to an OOXML container.
pub(crate) fn add_part<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    contents: &str,
) -> Result<(), TranscodeError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, options)?;
    zip.write_all(contents.as_bytes())
        .map_err(|e| TranscodeError::assembly(format!("writing {name}"), e))
}

/// Escape text for XML content or attributes, dropping characters XML 1.0
/// cannot represent at all.
pub(crate) fn xml_text(s: &str) -> String {
    let valid: String = s
        .chars()
        .filter(|&c| {
            matches!(c,
                '\t' | '\n' | '\r'
                | '\u{20}'..='\u{D7FF}'
                | '\u{E000}'..='\u{FFFD}'
                | '\u{10000}'..='\u{10FFFF}')
        })
        .collect();
    quick_xml::escape::escape(valid.as_str()).into_owned()
}
