use crate::objects::ObjectId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page size not defined and no existing page to infer it from")]
    PageSizeNotDefined,

    #[error("Dangling reference: {0}")]
    DanglingReference(ObjectId),

    #[error("Invalid fit operands for /{style}: expected {expected}, found {found}")]
    InvalidFitOperands {
        style: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported encryption configuration: {0}")]
    UnsupportedEncryption(String),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid page index: {0}")]
    InvalidPageIndex(usize),

    #[error("Compression error: {0}")]
    CompressionError(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;
