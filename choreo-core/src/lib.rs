//! Engine-agnostic multi-strategy choreography planner.
//!
//! Given a start formation, an end formation, a stage, and a duration in musical
//! counts, this crate computes a time-parameterized path per dancer that respects a
//! minimum separation at every instant and scores well on a handful of aesthetic
//! metrics, selected from several competing strategies by a ranking policy. See
//! [`pipeline::Coordinator`] for the entry point.

pub mod assignment;
pub mod candidate;
pub mod collision;
pub mod config;
pub mod error;
pub mod metrics;
pub mod path;
pub mod pipeline;
pub mod preconstraint;
pub mod provider;
pub mod ranker;
pub mod types;

pub use config::{Config, PipelineConfig, ProviderConfig};
pub use error::{ConfigError, PlanError, ProviderError};
pub use pipeline::{Coordinator, CoreResponse, EnhancementHandle, EnhancementUpdate, PlanRequest, ResponseMetadata};
pub use types::{AssignmentMode, DancerId, PipelineMode, Position, Stage, UserPreference};
