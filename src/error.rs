//! Error types for the pdf-transcode library.
//!
//! Three failure classes cover every way a conversion can go wrong:
//!
//! * [`TranscodeError::UnreadableDocument`]: the bytes are not a PDF we can
//!   parse. A client error, never retried.
//!
//! * [`TranscodeError::ExtractionFailure`]: an engine (pdfium, tesseract)
//!   faulted. The detail is logged in full; the `Display` form stays generic
//!   so it can be shown to an end user.
//!
//! * [`TranscodeError::AssemblyFailure`]: the output container could not be
//!   written, usually because scratch storage is full or unwritable.
//!
//! A document that yields no content at all is *not* an error: it still
//! produces a valid artifact, flagged with `content_found == false`.

use std::fmt;
use thiserror::Error;

/// The engine stage an [`TranscodeError::ExtractionFailure`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Rasterize,
    Extract,
    Ocr,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Rasterize => "rasterization",
            Stage::Extract => "structure extraction",
            Stage::Ocr => "ocr",
        })
    }
}

/// All fatal errors returned by the pdf-transcode library.
#[derive(Debug, Error)]
pub enum TranscodeError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt, or the bytes are not a PDF at all.
    #[error("Document is not a readable PDF: {detail}")]
    UnreadableDocument { detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// An engine call faulted unexpectedly. `detail` is for logs only.
    #[error("Internal extraction failure during {stage}")]
    ExtractionFailure { stage: Stage, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Writing the output container failed.
    #[error("Failed to assemble output: {detail}")]
    AssemblyFailure {
        detail: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The artifact's lease ended (read to completion, expired, or dropped)
    /// before it was opened.
    #[error("Artifact '{id}' has already been released")]
    ArtifactReleased { id: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panics, runtime creation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranscodeError {
    /// Build an [`TranscodeError::ExtractionFailure`], logging the full detail.
    ///
    /// This is the single place engine faults enter the taxonomy, so the
    /// `error!` line is guaranteed even though `Display` hides the detail.
    pub fn extraction(stage: Stage, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(%stage, %detail, "engine fault");
        TranscodeError::ExtractionFailure { stage, detail }
    }

    pub fn unreadable(detail: impl Into<String>) -> Self {
        TranscodeError::UnreadableDocument {
            detail: detail.into(),
        }
    }

    pub fn assembly(detail: impl Into<String>, source: std::io::Error) -> Self {
        TranscodeError::AssemblyFailure {
            detail: detail.into(),
            source: Some(source),
        }
    }

    /// `true` when the caller sent something we cannot process (HTTP 4xx).
    /// Everything else is a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranscodeError::UnreadableDocument { .. } | TranscodeError::InvalidConfig(_)
        )
    }

    /// Internal detail of an engine fault, for logs and diagnostics.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TranscodeError::ExtractionFailure { detail, .. }
            | TranscodeError::UnreadableDocument { detail }
            | TranscodeError::AssemblyFailure { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for TranscodeError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => {
                TranscodeError::assembly("writing output container", io)
            }
            other => TranscodeError::AssemblyFailure {
                detail: other.to_string(),
                source: None,
            },
        }
    }
}
