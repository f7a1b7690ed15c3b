//! The DSP engine has no domain errors: every runtime input is numeric and
//! every invalid value is coerced, not rejected. Construction is the one
//! genuine fallible boundary -- a bad sample rate or initial tract length is
//! a host misconfiguration that clamping would otherwise hide silently and
//! permanently.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sample rate must be nonzero and below {max}, got {got}")]
    InvalidSampleRate { got: u32, max: u32 },

    #[error("tract length {got} outside supported range {min}..={max}")]
    InvalidTractLength { got: u8, min: u8, max: u8 },
}

pub type Result<T> = std::result::Result<T, EngineError>;
