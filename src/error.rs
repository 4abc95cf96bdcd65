use thiserror::Error;

use crate::ledger::Direction;

/// Taxonomy of errors the core can produce, grouped by meaning rather than
/// by which module raised them (spec.md §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("duplicate reservation: {0}")]
    DuplicateReservation(String),

    #[error("no path between endpoints")]
    NoPath,

    #[error("no capacity available ({0:?})")]
    NoCapacity(Direction),

    #[error("endpoint unknown: {0}")]
    EndpointUnknown(String),

    #[error("collaborator unavailable, will retry: {0}")]
    Transient(String),

    #[error("checkpoint I/O error: {0}")]
    CheckpointIoError(String),

    #[error("malformed internal state: {0}")]
    ModelConstructionError(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::CheckpointIoError(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::ModelConstructionError(e.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(e: csv::Error) -> Self {
        CoreError::CheckpointIoError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
