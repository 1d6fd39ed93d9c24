use std::fmt;

use thiserror::Error;

/// Coarse classification of an extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InputValidation,
    Policy,
    Upstream,
    Parse,
    EmptyResult,
}

impl ErrorKind {
    /// Failures caused by the caller's input, detected before any network call.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InputValidation | Self::Policy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputValidation => "input_validation",
            Self::Policy => "policy",
            Self::Upstream => "upstream",
            Self::Parse => "parse",
            Self::EmptyResult => "empty_result",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    DisallowedHost(String),
    #[error("upstream fetch failed: {0}")]
    UpstreamFetchFailed(String),
    #[error("unparsable source: {0}")]
    UnparsableSource(String),
    #[error("{0}")]
    EmptyResult(String),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InputValidation,
            Self::DisallowedHost(_) => ErrorKind::Policy,
            Self::UpstreamFetchFailed(_) => ErrorKind::Upstream,
            Self::UnparsableSource(_) => ErrorKind::Parse,
            Self::EmptyResult(_) => ErrorKind::EmptyResult,
        }
    }

    /// The bare user-facing message, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(msg)
            | Self::DisallowedHost(msg)
            | Self::UpstreamFetchFailed(msg)
            | Self::UnparsableSource(msg)
            | Self::EmptyResult(msg) => msg,
        }
    }
}
