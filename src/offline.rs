//! Local collaborators for dry runs
//!
//! No network: completions are stitched together from a phrase bank with a
//! seeded RNG, so a given seed always produces the same debate.

use crate::argument::extract_argument;
use crate::collab::{CompletionRequest, CompletionService, Critic, Judge, Preference};
use crate::config::RatingMethod;
use crate::transcript::Transcript;
use crate::types::{DebaterSeat, Side};
use anyhow::Result;
use async_trait::async_trait;
use rand::prelude::*;
use std::collections::HashSet;
use std::sync::Mutex;

const PHRASES: &[&str] = &[
    "the passage states this directly",
    "the opposing reading ignores the second paragraph",
    "every cited detail supports this answer",
    "the timeline only works one way",
    "my opponent relies on an assumption the text never makes",
    "consider what the narrator says at the end",
    "the key quote settles the question",
    "the alternative contradicts itself",
];

pub struct OfflineCompletion {
    rng: Mutex<StdRng>,
}

impl OfflineCompletion {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn compose(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = rng.gen_range(1..=4);
        let body: Vec<&str> = PHRASES.choose_multiple(&mut *rng, count).cloned().collect();
        format!("<argument>{}.</argument>", body.join("; "))
    }
}

#[async_trait]
impl CompletionService for OfflineCompletion {
    async fn generate(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        Ok((0..request.n).map(|_| self.compose()).collect())
    }
}

/// Scores an argument by how many distinct words it uses
pub struct WordCountJudge;

fn distinct_words(text: &str) -> usize {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

#[async_trait]
impl Judge for WordCountJudge {
    async fn rate(
        &self,
        _transcript: &Transcript,
        argument: &str,
        _side: Side,
        method: RatingMethod,
    ) -> Result<f64> {
        let words = distinct_words(argument) as f64;
        Ok(match method {
            RatingMethod::Likert => (words / 4.0).clamp(1.0, 10.0),
            RatingMethod::Binary => {
                if words >= 12.0 {
                    1.0
                } else {
                    0.0
                }
            }
        })
    }

    async fn prefer(
        &self,
        _transcript: &Transcript,
        first: &str,
        second: &str,
        _seat: DebaterSeat,
    ) -> Result<Preference> {
        Ok(match distinct_words(first).cmp(&distinct_words(second)) {
            std::cmp::Ordering::Greater => Preference::First,
            std::cmp::Ordering::Less => Preference::Second,
            std::cmp::Ordering::Equal => Preference::Tie,
        })
    }
}

pub struct OfflineCritic;

#[async_trait]
impl Critic for OfflineCritic {
    async fn critique(
        &self,
        _transcript: &Transcript,
        argument: &str,
        _seat: DebaterSeat,
    ) -> Result<String> {
        let words = extract_argument(argument).split_whitespace().count();
        Ok(format!(
            "The argument uses {} words. Quote the source text and answer the opponent's strongest point.",
            words
        ))
    }
}
