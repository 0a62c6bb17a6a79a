//! OCR engine capability and the tesseract command-line implementation.
//!
//! The pipeline only sees [`OcrEngine`]; engine-specific failures are
//! reported as [`OcrError`] and wrapped into
//! [`TranscodeError::ExtractionFailure`](crate::error::TranscodeError) at the
//! pipeline boundary. "No text on this page" is an empty string, never an
//! error.

use crate::artifact::ArtifactStore;
use crate::config::ReleasePolicy;
use crate::model::PageImage;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Errors from OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognises text in one page image.
///
/// Implementations are called from blocking worker threads, possibly for
/// several pages at once.
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Recognised text, or an empty string when the page has none.
    fn recognize(&self, image: &PageImage) -> Result<String, OcrError>;
}

/// OCR through the `tesseract` executable.
///
/// Each page image is written as PNG to a transient artifact, handed to
/// tesseract by path, and released as soon as tesseract returns.
pub struct TesseractEngine {
    cmd: PathBuf,
    language: String,
    store: ArtifactStore,
}

impl TesseractEngine {
    pub fn new(cmd: impl Into<PathBuf>, language: impl Into<String>, store: ArtifactStore) -> Self {
        Self {
            cmd: cmd.into(),
            language: language.into(),
            store,
        }
    }

    /// `true` if the executable can be launched.
    pub fn is_available(&self) -> bool {
        Command::new(&self.cmd)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, page: &PageImage) -> Result<String, OcrError> {
        let start = Instant::now();
        let scratch = self
            .store
            .allocate(&format!("ocr-p{}", page.page_num), "png", ReleasePolicy::AfterRead)
            .map_err(|e| OcrError::Failed(e.to_string()))?;

        page.image
            .save_with_format(scratch.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::Image(e.to_string()))?;

        let output = Command::new(&self.cmd)
            .arg(scratch.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        let text = match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(OcrError::Failed(format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    stderr.trim()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OcrError::EngineNotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.cmd.display()
                )));
            }
            Err(e) => return Err(OcrError::Io(e)),
        };

        debug!(
            page = page.page_num,
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tesseract done"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};
    use std::time::Duration;
    use tempfile::TempDir;

    fn blank_page(page_num: usize) -> PageImage {
        PageImage {
            page_num,
            image: DynamicImage::ImageRgb8(RgbImage::new(8, 8)),
        }
    }

    #[test]
    fn missing_binary_is_engine_not_available() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path(), Duration::from_secs(60)).unwrap();
        let engine = TesseractEngine::new(
            "/nonexistent/definitely-not-tesseract",
            "eng",
            store.clone(),
        );
        assert!(!engine.is_available());
        let err = engine.recognize(&blank_page(1)).unwrap_err();
        assert!(matches!(err, OcrError::EngineNotAvailable(_)), "got {err:?}");
        // The scratch PNG is released even though tesseract never ran.
        assert_eq!(store.live_count(), 0);
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }
}
