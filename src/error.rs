//! Error types for microsim-snapshot

use thiserror::Error;

/// Errors raised while indexing places or flattening individuals.
///
/// None of these are transient: each one points at a mismatch between the
/// location tables, the individuals table and the configured layout that has to
/// be fixed upstream.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Unknown activity category: {0}")]
    UnknownCategory(String),

    #[error("Local id {local_id} out of range for category {category} (valid: 0..{count})")]
    OutOfRange {
        category: String,
        local_id: i64,
        count: usize,
    },

    #[error(
        "Padding overflow: person {person_id} visits {venues} venues in {category}, padding width is {width}"
    )]
    PaddingOverflow {
        person_id: u64,
        category: String,
        venues: usize,
        width: usize,
    },

    #[error("Duplicate activity category: {0}")]
    DuplicateCategory(String),

    #[error("Global id space exhausted: {0} places do not fit in u32")]
    IdSpaceExhausted(u64),

    #[error("Location table {category} row {row} holds id {id}; ids must equal row positions")]
    NonContiguousLocations {
        category: String,
        row: usize,
        id: usize,
    },

    #[error("Malformed individual {person_id} in {category}: {reason}")]
    MalformedIndividual {
        person_id: u64,
        category: String,
        reason: String,
    },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Failed to parse individuals table: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
