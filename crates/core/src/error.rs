use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch of {locator} returned {status}")]
    FetchStatus { locator: String, status: u16 },

    #[error("invalid document reference: {0}")]
    InvalidReference(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("rendering page {page} failed: {details}")]
    Render { page: u32, details: String },

    #[error("ocr failed on page {page}: {details}")]
    OcrFailed { page: u32, details: String },

    #[error("ocr on page {page} timed out after {after:?}")]
    OcrTimeout { page: u32, after: Duration },
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("extraction task for document {position} failed: {reason}")]
    TaskFailed { position: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported {kind} export format: {format}")]
    UnsupportedFormat { kind: &'static str, format: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is in step {actual}, expected {expected}")]
    WrongStep {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("question {0} was already answered")]
    AlreadyAnswered(usize),

    #[error("option {selected} is out of range for {available} options")]
    OptionOutOfRange { selected: usize, available: usize },

    #[error("question {index} expects {expected}")]
    ResponseMismatch {
        index: usize,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("course not found in catalog: {0}")]
    UnknownCourse(String),
}

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("notes json error: {0}")]
    Json(#[from] serde_json::Error),
}
