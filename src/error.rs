use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubseekError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("File is too small to be hashed ({size} bytes, need at least 64 KiB)")]
    FileTooSmall { size: u64 },

    #[error("Remote protocol error: {0}")]
    RemoteProtocol(String),

    #[error("No subtitle candidates found")]
    NoCandidates,

    #[error("Failed to write subtitle to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SubseekError>;
