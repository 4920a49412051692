use thiserror::Error;

#[derive(Error, Debug)]
pub enum PontoSplitError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page {page} does not exist (document has {count} pages)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for PontoSplitError {
    fn from(e: zip::result::ZipError) -> Self {
        PontoSplitError::ArchiveError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PontoSplitError>;
