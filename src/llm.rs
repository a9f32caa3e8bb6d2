//! Anthropic-backed collaborators
//!
//! One client serves as completion service, judge and critic. The messages
//! API returns one sample per call, so a batch of `n` is `n` sequential
//! slots, each sampled up to `num_candidates_per_completion` times until a
//! sample passes the validity predicate (see [`fill_slots`]).

use crate::collab::{CompletionRequest, CompletionService, Critic, Judge, Preference, ShortfallPolicy};
use crate::config::{LanguageModelConfig, RatingMethod};
use crate::transcript::Transcript;
use crate::types::{DebaterSeat, Side};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::future::Future;

/// Judge calls are short and deterministic
const JUDGE_MAX_TOKENS: u32 = 16;
const CRITIC_MAX_TOKENS: u32 = 512;

pub struct AnthropicClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    /// Client for the configured model, key from `ANTHROPIC_API_KEY`
    pub fn from_config(config: &LanguageModelConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            return Err(anyhow!(
                "ANTHROPIC_API_KEY not set. Use --offline to run without API access."
            ));
        }
        Ok(Self::new(
            config.api_url.clone(),
            api_key,
            config.model.clone(),
        ))
    }

    async fn send(&self, prompt: &str, temperature: f32, top_p: f32, max_tokens: u32) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "top_p": top_p,
            "messages": [{"role": "user", "content": prompt}]
        });

        let api_response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !api_response.status().is_success() {
            let error_text = api_response.text().await?;
            return Err(anyhow!("API error: {}", error_text));
        }

        let response_json: serde_json::Value = api_response.json().await?;
        response_json["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("API response had no text content"))
    }
}

/// Fill `request.n` slots in order. Each slot draws up to
/// `num_candidates_per_completion` samples and keeps the first valid one;
/// a slot that never validates is padded with its last invalid sample, or
/// an empty placeholder when nothing was drawn.
pub async fn fill_slots<F, Fut>(request: &CompletionRequest, mut sample: F) -> Result<Vec<String>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut out = Vec::with_capacity(request.n);
    let mut padded = 0;

    for _ in 0..request.n {
        let mut last_invalid = None;
        let mut accepted = None;
        for _ in 0..request.num_candidates_per_completion {
            let text = sample().await?;
            if (request.is_valid)(&text) {
                accepted = Some(text);
                break;
            }
            last_invalid = Some(text);
        }
        match (accepted, request.shortfall) {
            (Some(text), _) => out.push(text),
            (None, ShortfallPolicy::PadInvalids) => {
                padded += 1;
                out.push(last_invalid.unwrap_or_default());
            }
        }
    }

    if padded > 0 {
        tracing::warn!(padded, requested = request.n, "padded batch with invalid completions");
    }
    Ok(out)
}

#[async_trait]
impl CompletionService for AnthropicClient {
    async fn generate(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        fill_slots(request, || {
            self.send(&request.prompt, request.temperature, request.top_p, request.max_tokens)
        })
        .await
    }
}

fn rating_prompt(transcript: &Transcript, argument: &str, side: Side, method: RatingMethod) -> String {
    let instruction = match method {
        RatingMethod::Likert => {
            "Rate how convincing this argument is on a scale from 1 to 10. Reply with only the number."
        }
        RatingMethod::Binary => "Is this argument convincing? Reply with only YES or NO.",
    };
    format!(
        "You are judging a debate.\n\n{}\n\nArgument from debater {}:\n{}\n\n{}",
        transcript.render(),
        side,
        argument,
        instruction
    )
}

/// Parse a judge reply into a score
pub fn parse_rating(reply: &str, method: RatingMethod) -> Result<f64> {
    let reply = reply.trim();
    match method {
        RatingMethod::Likert => reply
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .find(|tok| !tok.is_empty() && tok.chars().any(|c| c.is_ascii_digit()))
            .and_then(|tok| tok.trim_end_matches('.').parse::<f64>().ok())
            .ok_or_else(|| anyhow!("Judge reply has no rating: {:?}", reply)),
        RatingMethod::Binary => {
            let upper = reply.to_uppercase();
            if upper.starts_with("YES") {
                Ok(1.0)
            } else if upper.starts_with("NO") {
                Ok(0.0)
            } else {
                Err(anyhow!("Judge reply is neither YES nor NO: {:?}", reply))
            }
        }
    }
}

/// Parse an A / B / TIE reply
pub fn parse_preference(reply: &str) -> Preference {
    match reply.trim().trim_matches('"').to_uppercase().as_str() {
        "A" => Preference::First,
        "B" => Preference::Second,
        _ => Preference::Tie,
    }
}

#[async_trait]
impl Judge for AnthropicClient {
    async fn rate(
        &self,
        transcript: &Transcript,
        argument: &str,
        side: Side,
        method: RatingMethod,
    ) -> Result<f64> {
        let prompt = rating_prompt(transcript, argument, side, method);
        let reply = self.send(&prompt, 0.0, 1.0, JUDGE_MAX_TOKENS).await?;
        parse_rating(&reply, method)
    }

    async fn prefer(
        &self,
        transcript: &Transcript,
        first: &str,
        second: &str,
        seat: DebaterSeat,
    ) -> Result<Preference> {
        let prompt = format!(
            r#"Compare two arguments debater {} could make in this debate.

{}

ARGUMENT A:
{}

ARGUMENT B:
{}

Which argument is more convincing?
Reply with ONLY one of: "A", "B", or "TIE"
"#,
            seat.side,
            transcript.render(),
            first,
            second
        );
        let reply = self.send(&prompt, 0.0, 1.0, JUDGE_MAX_TOKENS).await?;
        Ok(parse_preference(&reply))
    }
}

#[async_trait]
impl Critic for AnthropicClient {
    async fn critique(
        &self,
        transcript: &Transcript,
        argument: &str,
        seat: DebaterSeat,
    ) -> Result<String> {
        let answer = if seat.correct {
            &transcript.answer_correct
        } else {
            &transcript.answer_incorrect
        };
        let prompt = format!(
            "You are a debate coach. Debater {} argues for \"{}\".\n\n{}\n\nTheir argument:\n{}\n\n\
             List the most important weaknesses of this argument and how to fix them.",
            seat.side,
            answer,
            transcript.render(),
            argument
        );
        Ok(self.send(&prompt, 0.0, 1.0, CRITIC_MAX_TOKENS).await?.trim().to_string())
    }
}
