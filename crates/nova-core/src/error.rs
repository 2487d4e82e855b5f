//! Error types for nova-core.

use thiserror::Error;

/// Error type for nova-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}. Must be between 20.0 and 999.0 BPM")]
    InvalidTempo(f64),

    #[error("Invalid time signature: {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u32, denominator: u32 },

    #[error("Invalid count-in: {0} bars")]
    InvalidCountIn(u32),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
