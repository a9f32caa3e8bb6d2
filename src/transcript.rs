//! Debate transcript
//!
//! A transcript is a question, the two candidate answers, and a sequence of
//! rounds. Each round has one slot per answer; a debater arguing for the
//! correct answer writes into the `correct` slot.

use crate::error::SearchError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Which argument slot of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Correct,
    Incorrect,
}

impl Slot {
    /// Slot owned by a debater arguing the correct (or incorrect) answer
    pub fn for_seat(correct: bool) -> Slot {
        if correct {
            Slot::Correct
        } else {
            Slot::Incorrect
        }
    }

    pub fn other(self) -> Slot {
        match self {
            Slot::Correct => Slot::Incorrect,
            Slot::Incorrect => Slot::Correct,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Round {
    #[serde(default)]
    pub correct: Option<String>,
    #[serde(default)]
    pub incorrect: Option<String>,
}

impl Round {
    pub fn slot(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Correct => self.correct.as_deref(),
            Slot::Incorrect => self.incorrect.as_deref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<String> {
        match slot {
            Slot::Correct => &mut self.correct,
            Slot::Incorrect => &mut self.incorrect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub question: String,
    pub answer_correct: String,
    pub answer_incorrect: String,
    #[serde(default)]
    pub rounds: Vec<Round>,
}

impl Transcript {
    /// Start a transcript with one empty round open for arguments
    pub fn new(
        question: impl Into<String>,
        answer_correct: impl Into<String>,
        answer_incorrect: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer_correct: answer_correct.into(),
            answer_incorrect: answer_incorrect.into(),
            rounds: vec![Round::default()],
        }
    }

    pub fn last_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Overwrite `slot` of the most recent round
    pub fn set_argument(&mut self, slot: Slot, argument: impl Into<String>) -> Result<()> {
        let round = self.rounds.last_mut().ok_or(SearchError::EmptyTranscript)?;
        *round.slot_mut(slot) = Some(argument.into());
        Ok(())
    }

    /// Copy of this transcript with `slot` of the most recent round overwritten
    pub fn with_argument(&self, slot: Slot, argument: impl Into<String>) -> Result<Transcript> {
        let mut copy = self.clone();
        copy.set_argument(slot, argument)?;
        Ok(copy)
    }

    /// Write into `slot` of the most recent round, opening a new round if
    /// that slot is already taken
    fn place(&mut self, slot: Slot, argument: String) {
        let needs_round = self
            .rounds
            .last()
            .map_or(true, |round| round.slot(slot).is_some());
        if needs_round {
            self.rounds.push(Round::default());
        }
        if let Some(round) = self.rounds.last_mut() {
            *round.slot_mut(slot) = Some(argument);
        }
    }

    /// Copy scoped to one simulated branch.
    ///
    /// `ancestors` are the branch's arguments root first, each with its
    /// `is_opponent` flag. The root argument overwrites `agent`'s slot of the
    /// most recent round; later arguments go into their speaker's slot. The
    /// returned copy always has `agent`'s slot of its last round free.
    pub fn branch_context(&self, agent: Slot, ancestors: &[(String, bool)]) -> Result<Transcript> {
        let mut copy = self.clone();
        let mut iter = ancestors.iter();
        if let Some((root_argument, _)) = iter.next() {
            copy.set_argument(agent, root_argument.clone())?;
        }
        for (argument, is_opponent) in iter {
            let slot = if *is_opponent { agent.other() } else { agent };
            copy.place(slot, argument.clone());
        }
        let agent_taken = copy
            .rounds
            .last()
            .map_or(true, |round| round.slot(agent).is_some());
        if agent_taken {
            copy.rounds.push(Round::default());
        }
        Ok(copy)
    }

    /// Plain-text rendering for prompts
    pub fn render(&self) -> String {
        let mut out = format!(
            "Question: {}\nAnswer 1 (correct side): {}\nAnswer 2 (incorrect side): {}\n",
            self.question, self.answer_correct, self.answer_incorrect
        );
        for (i, round) in self.rounds.iter().enumerate() {
            out.push_str(&format!("\nRound {}:\n", i + 1));
            if let Some(arg) = &round.correct {
                out.push_str(&format!("  Correct side: {}\n", arg));
            }
            if let Some(arg) = &round.incorrect {
                out.push_str(&format!("  Incorrect side: {}\n", arg));
            }
        }
        out
    }
}
