//! Node evaluation
//!
//! Scores a response from the running debater's seat. Opponent-turn nodes
//! are scored from the same seat; there is no perspective flip.

use crate::argument::{extract_argument, truncate_words};
use crate::collab::Judge;
use crate::config::RatingMethod;
use crate::transcript::{Slot, Transcript};
use crate::types::DebaterSeat;
use anyhow::Result;

pub struct NodeEvaluator<'a> {
    judge: &'a dyn Judge,
    seat: DebaterSeat,
    method: RatingMethod,
    word_limit: usize,
}

impl<'a> NodeEvaluator<'a> {
    pub fn new(
        judge: &'a dyn Judge,
        seat: DebaterSeat,
        method: RatingMethod,
        word_limit: usize,
    ) -> Self {
        Self {
            judge,
            seat,
            method,
            word_limit,
        }
    }

    /// Argument as the judge will see it
    pub fn judged_argument(&self, response: &str) -> String {
        truncate_words(&extract_argument(response), self.word_limit)
    }

    pub async fn evaluate(&self, response: &str, transcript: &Transcript) -> Result<f64> {
        let argument = self.judged_argument(response);
        let scoped = transcript.with_argument(Slot::for_seat(self.seat.correct), argument.clone())?;
        self.judge
            .rate(&scoped, &argument, self.seat.side, self.method)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::Preference;
    use crate::types::Side;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct SpyJudge {
        seen: Mutex<Vec<(Transcript, String, Side, RatingMethod)>>,
    }

    #[async_trait]
    impl Judge for SpyJudge {
        async fn rate(
            &self,
            transcript: &Transcript,
            argument: &str,
            side: Side,
            method: RatingMethod,
        ) -> Result<f64> {
            self.seen
                .lock()
                .unwrap()
                .push((transcript.clone(), argument.to_string(), side, method));
            Ok(argument.split_whitespace().count() as f64)
        }

        async fn prefer(
            &self,
            _transcript: &Transcript,
            _first: &str,
            _second: &str,
            _seat: DebaterSeat,
        ) -> Result<Preference> {
            Ok(Preference::Tie)
        }
    }

    struct FailingJudge;

    #[async_trait]
    impl Judge for FailingJudge {
        async fn rate(&self, _: &Transcript, _: &str, _: Side, _: RatingMethod) -> Result<f64> {
            Err(anyhow::anyhow!("judge unavailable"))
        }

        async fn prefer(&self, _: &Transcript, _: &str, _: &str, _: DebaterSeat) -> Result<Preference> {
            Err(anyhow::anyhow!("judge unavailable"))
        }
    }

    #[tokio::test]
    async fn test_evaluate_inserts_truncated_argument_in_seat_slot() {
        let judge = SpyJudge {
            seen: Mutex::new(Vec::new()),
        };
        let seat = DebaterSeat::new(Side::B, false);
        let evaluator = NodeEvaluator::new(&judge, seat, RatingMethod::Binary, 3);
        let transcript = Transcript::new("Q", "yes", "no");

        let score = evaluator
            .evaluate("notes <argument>one two three four</argument>", &transcript)
            .await
            .unwrap();
        assert_eq!(score, 3.0);

        let seen = judge.seen.lock().unwrap();
        let (scoped, argument, side, method) = &seen[0];
        assert_eq!(argument, "one two three");
        assert_eq!(*side, Side::B);
        assert_eq!(*method, RatingMethod::Binary);
        assert_eq!(scoped.rounds[0].incorrect.as_deref(), Some("one two three"));
        assert_eq!(scoped.rounds[0].correct, None);
        // The caller's transcript is not touched
        assert_eq!(transcript.rounds[0].incorrect, None);
    }

    #[tokio::test]
    async fn test_judge_errors_propagate() {
        let evaluator = NodeEvaluator::new(
            &FailingJudge,
            DebaterSeat::new(Side::A, true),
            RatingMethod::Likert,
            10,
        );
        let err = evaluator
            .evaluate("<argument>x</argument>", &Transcript::new("Q", "a", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "judge unavailable");
    }
}
