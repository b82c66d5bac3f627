use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Traversal Error: Path '{path}': {reason}")]
    Traversal { path: PathBuf, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON Serialization Error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("XML Serialization Error: {0}")]
    XmlSerialize(String),

    #[error("Worker Pool Error: {0}")]
    WorkerPool(String),
}

impl From<quick_xml::Error> for AppError {
    fn from(err: quick_xml::Error) -> Self {
        AppError::XmlSerialize(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for AppError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        AppError::WorkerPool(err.to_string())
    }
}

/// Non-fatal conditions noticed while loading rules or walking the tree.
///
/// These never abort a run. They are logged as warnings and handed back to the
/// caller alongside the result so a front end can summarize them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A symbolic link pointed at a directory inside the scan root, or at one
    /// already walked through another link.
    CycleSkipped { link: String, target: PathBuf },
    /// The project rule file exists but could not be read.
    RuleFileUnreadable { path: PathBuf, reason: String },
    /// A rule pattern is not a valid glob; only exact matching applies to it.
    InvalidPattern { pattern: String, reason: String },
    /// A directory was visited but its entries could not be listed.
    UnreadableDirectory { path: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CycleSkipped { link, target } => write!(
                f,
                "skipped symlink at '{}' (target '{}' is already part of the walk)",
                link,
                target.display()
            ),
            Diagnostic::RuleFileUnreadable { path, reason } => {
                write!(f, "could not read rule file '{}': {}", path.display(), reason)
            }
            Diagnostic::InvalidPattern { pattern, reason } => write!(
                f,
                "pattern \"{}\" is not a valid glob ({}), using exact matching only",
                pattern, reason
            ),
            Diagnostic::UnreadableDirectory { path, reason } => {
                write!(f, "could not list directory '{}': {}", path, reason)
            }
        }
    }
}
