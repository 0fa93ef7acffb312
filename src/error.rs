use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinplanError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "xlsx")]
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] calamine::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Missing column in header row: {0}")]
    MissingColumn(String),

    #[error("Unknown term: {0}")]
    UnknownTerm(String),

    #[error("Unknown report: {0}")]
    UnknownReport(String),

    #[error("Unknown {kind}: {name}")]
    UnknownLookup { kind: String, name: String },

    #[error("Submission blocked: {0} invalid row(s)")]
    SubmissionBlocked(usize),

    #[error("Nothing to submit: no rows left")]
    EmptySubmission,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("This file has already been uploaded for term {0} (use --force to upload again)")]
    DuplicateUpload(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FinplanError>;
