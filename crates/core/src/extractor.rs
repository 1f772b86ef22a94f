use crate::error::IngestError;
use lopdf::Document;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// A readable PDF, either on disk or already in memory.
#[derive(Debug, Clone)]
pub enum PdfSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl PdfSource {
    /// File name used as provenance metadata. In-memory sources have none.
    pub fn source_name(&self) -> Option<String> {
        match self {
            Self::Path(path) => path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string),
            Self::Bytes(_) => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

impl From<PathBuf> for PdfSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for PdfSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for PdfSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, source: &PdfSource) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, source: &PdfSource) -> Result<Vec<PageText>, IngestError> {
        let document = match source {
            PdfSource::Path(path) => Document::load(path),
            PdfSource::Bytes(bytes) => Document::load_mem(bytes),
        }
        .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

/// Joins page texts in page order with a blank line between pages.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Best-effort text extraction. Never fails: a missing file, an unreadable
/// PDF, or a whitespace-only result all yield an empty string.
pub fn extract_text(source: &PdfSource) -> String {
    extract_text_with(&LopdfExtractor, source)
}

pub fn extract_text_with<E: PdfExtractor + ?Sized>(extractor: &E, source: &PdfSource) -> String {
    if let PdfSource::Path(path) = source {
        if !path.is_file() {
            debug!(path = %path.display(), "pdf source does not exist");
            return String::new();
        }
    }

    match extractor.extract_pages(source) {
        Ok(pages) => join_pages(&pages),
        Err(error) => {
            warn!(source = %source.describe(), error = %error, "pdf text extraction failed");
            String::new()
        }
    }
}

/// [`extract_text_with`] on tokio's blocking pool, so parsing a large PDF
/// never holds an async worker. Keeps the never-fails contract: a panicked
/// or cancelled extraction yields an empty string.
pub async fn extract_text_blocking<E: PdfExtractor + ?Sized + 'static>(
    extractor: Arc<E>,
    source: PdfSource,
) -> String {
    let described = source.describe();
    match tokio::task::spawn_blocking(move || extract_text_with(extractor.as_ref(), &source)).await
    {
        Ok(text) => text,
        Err(join_error) => {
            warn!(source = %described, error = %join_error, "pdf extraction task did not complete");
            String::new()
        }
    }
}
