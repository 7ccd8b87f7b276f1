use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::core::errors::ApiError;

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>|<w:p/>").expect("valid regex"));
static TEXT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("valid regex"));

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse DOCX {0}: {1}")]
    Docx(PathBuf, String),
    #[error("Failed to extract text from PDF {0}: {1}")]
    Pdf(PathBuf, String),
    #[error("Document extraction task failed: {0}")]
    Join(String),
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Unsupported(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_supported(file_name: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(Path::new(file_name)).as_str())
}

/// Extracts plain text from a `.pdf`, `.docx` or `.txt` reference document.
pub fn read_document(path: &Path) -> Result<String, DocumentError> {
    match extension_of(path).as_str() {
        "pdf" => read_pdf(path),
        "docx" => read_docx(path),
        "txt" => read_text(path),
        other => Err(DocumentError::Unsupported(format!(".{}", other))),
    }
}

/// Like [`read_document`] but any other extension is read as lossy UTF-8.
pub fn read_scope_document(path: &Path) -> Result<String, DocumentError> {
    match extension_of(path).as_str() {
        "pdf" => read_pdf(path),
        "docx" => read_docx(path),
        _ => read_text(path),
    }
}

pub async fn load_document(path: PathBuf) -> Result<String, DocumentError> {
    tokio::task::spawn_blocking(move || read_document(&path))
        .await
        .map_err(|e| DocumentError::Join(e.to_string()))?
}

pub async fn load_scope_document(path: PathBuf) -> Result<String, DocumentError> {
    tokio::task::spawn_blocking(move || read_scope_document(&path))
        .await
        .map_err(|e| DocumentError::Join(e.to_string()))?
}

fn io_error(path: &Path, source: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_text(path: &Path) -> Result<String, DocumentError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_pdf(path: &Path) -> Result<String, DocumentError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| DocumentError::Pdf(path.to_path_buf(), e.to_string()))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
    }
    Ok(text)
}

fn read_docx(path: &Path) -> Result<String, DocumentError> {
    let file = fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| DocumentError::Docx(path.to_path_buf(), e.to_string()))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| DocumentError::Docx(path.to_path_buf(), e.to_string()))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| io_error(path, e))?;

    Ok(docx_xml_to_text(&xml))
}

/// One line per `<w:p>` paragraph, built from its `<w:t>` runs.
pub(crate) fn docx_xml_to_text(xml: &str) -> String {
    PARAGRAPH_RE
        .find_iter(xml)
        .map(|paragraph| {
            TEXT_RUN_RE
                .captures_iter(paragraph.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|run| decode_xml_entities(run.as_str()))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_xml_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
