//! Prompt templates
//!
//! Each prompt the debater sends is one of a fixed set of kinds. Templates
//! are plain strings with `{placeholder}` fields filled from a
//! [`PromptFields`] record; unknown placeholders are left as written.

use serde::{Deserialize, Serialize};

/// Shown in place of a field that has no value (e.g. no opponent argument yet)
pub const NONE_PLACEHOLDER: &str = "(none)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Initial best-of-N turn generation
    Turn,
    /// Expanding a root candidate
    RootResponse,
    /// Expanding one of our own simulated turns below the root
    Response,
    /// Expanding a node whose children answer the opponent's simulated turn
    Opponent,
    /// Rewriting an argument after a critique
    Refinement,
}

impl PromptKind {
    /// Template used to expand a node, keyed by (is-root, is-opponent-turn)
    pub fn for_expansion(is_root: bool, is_opponent: bool) -> PromptKind {
        match (is_root, is_opponent) {
            (_, true) => PromptKind::Opponent,
            (true, false) => PromptKind::RootResponse,
            (false, false) => PromptKind::Response,
        }
    }
}

/// Substitution values for one prompt
#[derive(Debug, Clone, Default)]
pub struct PromptFields {
    pub transcript: Option<String>,
    pub debate_history: Option<String>,
    pub opponent_argument: Option<String>,
    pub previous_argument: Option<String>,
    pub argument: Option<String>,
    pub critique: Option<String>,
    pub word_limit: usize,
}

impl PromptFields {
    fn lookup(&self, name: &str) -> Option<String> {
        let value = match name {
            "transcript" => &self.transcript,
            "debate_history" => &self.debate_history,
            "opponent_argument" => &self.opponent_argument,
            "previous_argument" => &self.previous_argument,
            "argument" => &self.argument,
            "critique" => &self.critique,
            "word_limit" => return Some(self.word_limit.to_string()),
            _ => return None,
        };
        Some(value.clone().unwrap_or_else(|| NONE_PLACEHOLDER.to_string()))
    }
}

/// Fill `{name}` placeholders in `template`
pub fn render(template: &str, fields: &PromptFields) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match fields.lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Template set for a debater
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub turn: String,
    /// Falls back to `response` when unset
    pub root_response: Option<String>,
    pub response: String,
    pub opponent: String,
    pub refinement: String,
}

impl PromptSet {
    pub fn template(&self, kind: PromptKind) -> &str {
        match kind {
            PromptKind::Turn => &self.turn,
            PromptKind::RootResponse => self.root_response.as_deref().unwrap_or(&self.response),
            PromptKind::Response => &self.response,
            PromptKind::Opponent => &self.opponent,
            PromptKind::Refinement => &self.refinement,
        }
    }

    pub fn render(&self, kind: PromptKind, fields: &PromptFields) -> String {
        render(self.template(kind), fields)
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            turn: DEFAULT_TURN_PROMPT.to_string(),
            root_response: None,
            response: DEFAULT_RESPONSE_PROMPT.to_string(),
            opponent: DEFAULT_OPPONENT_PROMPT.to_string(),
            refinement: DEFAULT_REFINEMENT_PROMPT.to_string(),
        }
    }
}

const DEFAULT_TURN_PROMPT: &str = "\
You are a skilled debater. Argue for your assigned answer as convincingly as you can.

{transcript}

Write your argument in at most {word_limit} words and wrap it in <argument></argument> tags.";

/// Expands one of our turns: the children are the opponent's replies
const DEFAULT_RESPONSE_PROMPT: &str = "\
You are the opposing debater in a simulated exchange, arguing for the opposite answer.

The argument that came before the one you must answer:
{opponent_argument}

Debate so far (the last entry is the argument you must rebut):
{debate_history}

Rebut the last argument and argue for the opposite answer in at most {word_limit} words. \
Wrap your argument in <argument></argument> tags.";

/// Expands an opponent turn: the children are our replies
const DEFAULT_OPPONENT_PROMPT: &str = "\
You are a skilled debater defending your assigned answer.

Your previous argument:
{previous_argument}

Debate so far, up to your previous argument:
{debate_history}

The opposing side has just rebutted your previous argument. Answer the rebuttal and \
strengthen your case for your assigned answer in at most {word_limit} words. \
Wrap your argument in <argument></argument> tags.";

const DEFAULT_REFINEMENT_PROMPT: &str = "\
You are improving a debate argument using a critique.

{transcript}

Your draft:
{argument}

Critique of the draft:
{critique}

Rewrite the argument addressing the critique in at most {word_limit} words. \
Wrap it in <argument></argument> tags.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_selection() {
        assert_eq!(PromptKind::for_expansion(true, false), PromptKind::RootResponse);
        assert_eq!(PromptKind::for_expansion(false, false), PromptKind::Response);
        assert_eq!(PromptKind::for_expansion(false, true), PromptKind::Opponent);
    }

    #[test]
    fn test_render_substitutes_and_marks_missing() {
        let fields = PromptFields {
            debate_history: Some("a\nb".into()),
            word_limit: 50,
            ..Default::default()
        };
        let out = render(
            "vs {opponent_argument} | {debate_history} | {word_limit} | {unknown} | {",
            &fields,
        );
        assert_eq!(out, "vs (none) | a\nb | 50 | {unknown} | {");
    }

    #[test]
    fn test_root_template_falls_back_to_response() {
        let mut prompts = PromptSet::default();
        assert_eq!(
            prompts.template(PromptKind::RootResponse),
            prompts.template(PromptKind::Response)
        );

        prompts.root_response = Some("root {debate_history}".into());
        assert_eq!(prompts.template(PromptKind::RootResponse), "root {debate_history}");
    }

    #[test]
    fn test_default_templates_ask_for_the_child_speaker() {
        let prompts = PromptSet::default();

        // Children of our own turns are opponent replies
        let own = prompts.template(PromptKind::for_expansion(false, false));
        assert!(own.contains("opposing debater"));
        assert!(own.contains("opposite answer"));
        assert!(!own.contains("your assigned answer"));

        // Children of opponent turns are ours again
        let theirs = prompts.template(PromptKind::for_expansion(false, true));
        assert!(theirs.contains("your assigned answer"));
        assert!(!theirs.contains("opposite answer"));

        assert_eq!(
            prompts.template(PromptKind::for_expansion(true, false)),
            own
        );
    }
}
