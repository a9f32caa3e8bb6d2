//! Core value types shared across the search
//!
//! A debater occupies a seat: a side label (used to qualify cache keys and
//! to tell the judge who is speaking) and whether that side argues for the
//! correct answer (which decides the transcript slot its arguments land in).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side label of a debater
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn name(&self) -> &'static str {
        match self {
            Side::A => "A",
            Side::B => "B",
        }
    }

    pub fn opponent(&self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Parse a side label, case-insensitive
    pub fn parse(label: &str) -> Option<Side> {
        match label.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Side::A),
            "B" => Some(Side::B),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The seat the running debater occupies in the transcript
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DebaterSeat {
    pub side: Side,
    /// Whether this side argues for the correct answer
    pub correct: bool,
}

impl DebaterSeat {
    pub fn new(side: Side, correct: bool) -> Self {
        Self { side, correct }
    }
}
