use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BatchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned status {status} for {url}")]
    TransportStatus { status: u16, url: String },

    #[error("batch join failed: {0}")]
    BatchAggregation(String),

    #[error("failed to read url list at {0}")]
    #[diagnostic(help("pass a readable text file with one url per line"))]
    InputRead(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}
