use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SieveError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(Box<rusqlite::Error>),

    #[error("CSV error: {0}")]
    Csv(Box<csv::Error>),

    #[error("A note filter still uses a default/unselected option")]
    DefaultSettings,

    #[error("Note type '{0}' no longer exists in the collection")]
    NoteTypeNotFound(String),

    #[error("Field '{field}' no longer exists on note type '{note_type}'")]
    FieldNotFound { note_type: String, field: String },

    #[error("Morphemizer '{0}' was not found")]
    MorphemizerNotFound(String),

    #[error("Priority file not found: {}", path.display())]
    PriorityFileNotFound { path: PathBuf },

    #[error("Priority file {} is malformed: {reason}", path.display())]
    PriorityFileMalformed { path: PathBuf, reason: String },

    #[error("Known morphs file {} is malformed", path.display())]
    KnownMorphsFileMalformed { path: PathBuf },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cache schema mismatch, all tables were dropped; rerun recalc")]
    SchemaMismatch,

    #[error("Collection error: {0}")]
    Collection(String),
}

impl From<std::io::Error> for SieveError {
    fn from(error: std::io::Error) -> Self {
        SieveError::Io(Box::new(error))
    }
}

impl From<rusqlite::Error> for SieveError {
    fn from(error: rusqlite::Error) -> Self {
        SieveError::Sqlite(Box::new(error))
    }
}

impl From<csv::Error> for SieveError {
    fn from(error: csv::Error) -> Self {
        SieveError::Csv(Box::new(error))
    }
}
