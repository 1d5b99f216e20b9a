//! Crate-wide error type
//!
//! Every public operation returns [`ChannelResult`]. Errors are never
//! swallowed internally: they surface to whoever drives the channel
//! lifecycle. The only silent correction in the crate is the explicit
//! non-negative clamp done by the [`Normalizer`](crate::kinetics::Normalizer).

use thiserror::Error;

/// Errors raised by state cells, kinetic schemes, solvers and exporters
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChannelError {
    /// State, derivative or voltage array has the wrong length
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    Shape {
        context: String,
        expected: usize,
        found: usize,
    },

    /// Singular or non-finite linear system in the implicit step
    #[error("numerical instability in compartment {compartment}: {reason}")]
    NumericalInstability { compartment: usize, reason: String },

    /// Channel or solver built with inconsistent parameters
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Lifecycle entry point called in the wrong phase
    #[error("cannot {operation} while channel is {phase}")]
    Lifecycle {
        operation: &'static str,
        phase: String,
    },

    /// Result export failed
    #[error("export failed: {0}")]
    Export(String),

    /// Reading or writing a file failed
    #[error("i/o error ({kind:?}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl ChannelError {
    /// Shorthand for a [`ChannelError::Shape`]
    pub fn shape(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::Shape {
            context: context.into(),
            expected,
            found,
        }
    }

    /// Shorthand for a [`ChannelError::NumericalInstability`]
    pub fn instability(compartment: usize, reason: impl Into<String>) -> Self {
        Self::NumericalInstability {
            compartment,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ChannelError::Configuration`]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
