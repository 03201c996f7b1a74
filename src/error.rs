//! Error kinds reported by the simulation engine

use crate::numeric::Float;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that the engine's control surface can report
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// An operation needed parameters or a server pool that was not set up
    #[error("simulation engine is not initialized (call init and create_pool first)")]
    EngineNotInitialized,

    /// A time interval was negative or not a finite number
    #[error("invalid time interval: {value}")]
    InvalidInterval {
        /// Offending interval (seconds)
        value: Float,
    },

    /// A parameter could not be clamped to a usable value
    #[error("invalid value for {name}: {value}")]
    InvalidParameter {
        /// Name of the parameter
        name: &'static str,

        /// Rejected value
        value: Float,
    },

    /// Allocating servers or tasks failed
    #[error("out of memory while allocating {what}")]
    ResourceExhaustion {
        /// What was being allocated
        what: &'static str,
    },
}
//
impl SimError {
    /// Whether the driver can keep running after reporting this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            SimError::InvalidInterval { .. } | SimError::InvalidParameter { .. } => true,
            SimError::EngineNotInitialized | SimError::ResourceExhaustion { .. } => false,
        }
    }
}
