//! Errors raised while reading domain values from configuration and requests.

use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Text that does not parse into the named domain value.
    #[error("invalid {kind} `{input}`: {reason}")]
    Parse {
        kind: &'static str,
        input: String,
        reason: String,
    },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn parse(kind: &'static str, input: impl Into<String>, reason: impl Display) -> Self {
        Self::Parse {
            kind,
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
