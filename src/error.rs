//! Domain errors for the search and the turn controller
//!
//! These travel inside `anyhow::Error`; callers that need to tell them apart
//! use `err.downcast_ref::<SearchError>()`.

use crate::node::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("got {found} initial responses, expected {expected}")]
    CandidateCountMismatch { expected: usize, found: usize },

    #[error("no leaf nodes at the deepest reached level")]
    NoLeaves,

    #[error("score already set for node {0}")]
    ScoreAlreadySet(NodeId),

    #[error("node {0} used before it was scored")]
    Unscored(NodeId),

    #[error("transcript has no rounds to place an argument in")]
    EmptyTranscript,

    #[error("critique refinement is enabled but no critic was supplied")]
    MissingCritic,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
