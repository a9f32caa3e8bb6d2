//! Collaborator contracts
//!
//! The search never talks to a model or a judge directly; it goes through
//! these traits. Every call is a suspension point, and any error a
//! collaborator returns reaches the caller unchanged.

use crate::config::RatingMethod;
use crate::transcript::Transcript;
use crate::types::{DebaterSeat, Side};
use anyhow::Result;
use async_trait::async_trait;

/// What to do when fewer valid completions come back than were requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortfallPolicy {
    /// Fill the gap with invalid completions so exactly `n` texts are returned
    PadInvalids,
}

/// One batched completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub n: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Samples tried per requested slot before the slot is padded
    pub num_candidates_per_completion: usize,
    pub is_valid: fn(&str) -> bool,
    pub shortfall: ShortfallPolicy,
}

/// Language-model completion service
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Return `request.n` completions in order. Under
    /// [`ShortfallPolicy::PadInvalids`] this never fails because of
    /// invalid samples; it pads instead.
    async fn generate(&self, request: &CompletionRequest) -> Result<Vec<String>>;
}

/// Outcome of a pairwise comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    First,
    Second,
    Tie,
}

/// Scores arguments in the context of a transcript. Higher is better; no
/// bound is assumed.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn rate(
        &self,
        transcript: &Transcript,
        argument: &str,
        side: Side,
        method: RatingMethod,
    ) -> Result<f64>;

    /// Which of two arguments for `seat` is more convincing
    async fn prefer(
        &self,
        transcript: &Transcript,
        first: &str,
        second: &str,
        seat: DebaterSeat,
    ) -> Result<Preference>;
}

/// Writes a critique of an argument for the refinement pass
#[async_trait]
pub trait Critic: Send + Sync {
    async fn critique(
        &self,
        transcript: &Transcript,
        argument: &str,
        seat: DebaterSeat,
    ) -> Result<String>;
}
