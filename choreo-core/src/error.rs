//! Error taxonomy for the planner.

use crate::types::Position;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("start/end formation cardinality mismatch: {start} start positions, {end} end positions")]
    ShapeMismatch { start: usize, end: usize },
    #[error("dancer {dancer} position {position:?} lies outside the stage bounds")]
    OutOfBounds { dancer: u32, position: Position },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Raised by provider trait implementations. Never surfaced to the caller directly:
/// the coordinator downgrades these to a status tag on the response.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider call timed out")]
    Timeout,
    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config validation failed: {0}")]
    Validation(String),
}
