use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook read error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{file}: no column found for {field} (looked for: {aliases})")]
    MissingColumn {
        file: String,
        field: String,
        aliases: String,
    },

    #[error("{0}: no sheet with data found")]
    EmptyWorkbook(String),

    #[error("unsupported input file type: {0}")]
    UnsupportedFile(String),

    #[error("cannot parse month label '{0}'")]
    InvalidMonth(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("missing input: {0}")]
    MissingInput(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
