//! Level loading errors.

/// Why a level could not be built.
///
/// `level` is always the zero-based index into the level set.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("level {level}: unknown block symbol {symbol:?} at row {row}, column {column}")]
    UnknownBlockType {
        level: usize,
        symbol: char,
        row: usize,
        column: usize,
    },

    #[error("level {level}: no spawn marker '@'")]
    MissingSpawn { level: usize },

    #[error("level {level}: more than one spawn marker '@'")]
    DuplicateSpawn { level: usize },

    #[error("level {level}: row {row} has {found} columns, expected {expected}")]
    RaggedRows {
        level: usize,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("level {level}: bitmap is empty")]
    EmptyBitmap { level: usize },

    #[error("level {index} out of range ({count} levels)")]
    OutOfRange { index: usize, count: usize },

    #[error("level set contains no levels")]
    NoLevels,

    #[error("failed to parse level set: {0}")]
    Json(#[from] serde_json::Error),
}
