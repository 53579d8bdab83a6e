use thiserror::Error;

use crate::ActionKind;

/// Malformed content detected at startup. Fatal for the host.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("reference dataset is empty")]
    EmptyDataset,
    #[error("reference dataset row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },
    #[error("constant '{name}' is invalid: {reason}")]
    InvalidConstant { name: &'static str, reason: String },
    #[error("roster is invalid: {0}")]
    InvalidRoster(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{kind:?} target index {index} is out of range (roster has {len})")]
    InvalidIndex {
        kind: ActionKind,
        index: usize,
        len: usize,
    },
    #[error("proposal at index {index} is stale: proposed '{expected}', now '{found}'")]
    StaleProposal {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("unknown view '{0}'")]
    UnknownView(String),
}

/// Inputs the least-squares fit cannot produce a line for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastError {
    #[error("cannot fit a trend to an empty series")]
    EmptySeries,
    #[error("cannot fit a trend to {len} point(s): slope is undefined")]
    Degenerate { len: usize },
    #[error("series value at index {index} is not finite")]
    NonFinite { index: usize },
    #[error("forecast horizon must be at least 1")]
    ZeroHorizon,
}
