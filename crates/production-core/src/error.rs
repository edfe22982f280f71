use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the production pipeline.
///
/// Only ingestion-level failures surface here. Per-row problems are counted
/// in the ingestion report and computation guards return `None` or an empty
/// result instead of an error.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The work-order source (file or URL) could not be fetched.
    #[error("Source unavailable ({location}): {reason}")]
    SourceUnavailable { location: String, reason: String },

    /// A column required downstream is absent after renaming.
    #[error("Schema error: required column '{0}' is missing")]
    MissingColumn(String),

    /// The source could not be interpreted as a table at all.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A column name is not part of the record schema.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A shift pattern name is not one of the recognised patterns.
    #[error("Invalid shift pattern: {0}")]
    InvalidShift(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether the error belongs to the schema class (missing column or an
    /// uninterpretable table) as opposed to a fetch failure.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::MissingColumn(_) | Self::Schema(_))
    }
}

/// Convenience alias used throughout the production crates.
pub type Result<T> = std::result::Result<T, PipelineError>;
