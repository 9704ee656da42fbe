//! Error types for the reactor simulation
//!
//! The frame step itself never fails. Errors only surface when a
//! simulator is constructed from a bad configuration or when an operator
//! command names something that does not exist.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Heat grid shape {heat:?} does not match water grid shape {water:?}")]
    GridMismatch {
        heat: (usize, usize),
        water: (usize, usize),
    },

    #[error("Unknown control rod: {0}")]
    UnknownRod(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReactorResult<T> = Result<T, ReactorError>;
