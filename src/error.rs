//! Error types for the onerm application.

use thiserror::Error;

/// Errors raised when a lift input fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("weight must be zero or positive: {0}")]
    NegativeWeight(f64),

    #[error("weight must be a finite number")]
    NonFiniteWeight,

    #[error("repetitions must be between {min} and {max}: {value}")]
    RepsOutOfRange { value: u32, min: u32, max: u32 },
}

/// Errors that can occur when selecting an estimation formula.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("unknown formula: {0}")]
    Unknown(String),
}

/// Errors returned by a single 1RM calculation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Errors that can occur when delivering results by email.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("mail endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail endpoint rejected the request with status {status}")]
    Rejected { status: u16 },
}
