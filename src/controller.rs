//! Turn controller
//!
//! One debate turn:
//! 1. Resolve the initial candidates (cache first, otherwise best-of-N)
//! 2. Rank them with the lookahead tree search
//! 3. Optionally critique and refine the winner
//!
//! Everything generated is cached under the turn's step so an interrupted
//! run resumes without re-asking the model.

use crate::argument::{extract_argument, has_argument_markup, is_valid_argument, truncate_words};
use crate::cache::{self, CacheKey, ResultCache};
use crate::collab::{
    CompletionRequest, CompletionService, Critic, Judge, Preference, ShortfallPolicy,
};
use crate::config::{DebaterConfig, TreeSearchConfig};
use crate::error::SearchError;
use crate::evaluator::NodeEvaluator;
use crate::expander::NodeExpander;
use crate::prompts::{PromptFields, PromptKind};
use crate::search::{SearchMetrics, TreeSearchEngine};
use crate::transcript::{Slot, Transcript};
use crate::types::DebaterSeat;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Trace note added when a refinement cannot be used
pub const REFINEMENT_FALLBACK_NOTE: &str =
    "Note: refinement had no <argument> markup, kept the original argument";

/// Result of one turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutput {
    /// Final argument, truncated to the word limit
    pub argument: String,
    /// Human-readable account of the search and refinement
    pub trace: String,
    pub metrics: SearchMetrics,
    /// Whether the refinement replaced the searched argument
    pub refined: bool,
}

/// Debater that picks its argument by tree search instead of flat best-of-N
pub struct TreeSearchDebater<'a> {
    completion: &'a dyn CompletionService,
    config: DebaterConfig,
    search: TreeSearchConfig,
    seat: DebaterSeat,
}

impl<'a> TreeSearchDebater<'a> {
    pub fn new(
        completion: &'a dyn CompletionService,
        config: DebaterConfig,
        seat: DebaterSeat,
    ) -> Self {
        let search = TreeSearchConfig::resolve(config.tree_search.as_ref());
        Self {
            completion,
            config,
            search,
            seat,
        }
    }

    pub fn seat(&self) -> DebaterSeat {
        self.seat
    }

    pub fn search_config(&self) -> &TreeSearchConfig {
        &self.search
    }

    fn truncated_argument(&self, response: &str) -> String {
        truncate_words(&extract_argument(response), self.config.word_limit)
    }

    fn request(&self, prompt: String, n: usize) -> CompletionRequest {
        let lm = &self.config.language_model;
        CompletionRequest {
            prompt,
            n,
            temperature: lm.temperature,
            top_p: lm.top_p,
            max_tokens: lm.max_tokens,
            num_candidates_per_completion: lm.num_candidates_per_completion,
            is_valid: is_valid_argument,
            shortfall: ShortfallPolicy::PadInvalids,
        }
    }

    /// Plain best-of-N generation for this turn
    pub async fn generate_candidates(&self, transcript: &Transcript) -> Result<Vec<String>> {
        let fields = PromptFields {
            transcript: Some(transcript.render()),
            word_limit: self.config.word_limit,
            ..Default::default()
        };
        let prompt = self.config.prompts.render(PromptKind::Turn, &fields);
        let texts = self
            .completion
            .generate(&self.request(prompt, self.config.bon))
            .await?;
        Ok(texts.into_iter().map(|t| t.trim().to_string()).collect())
    }

    /// Cached initial candidates for `step`, generating and storing them if absent
    pub async fn initial_responses(
        &self,
        transcript: &Transcript,
        step: usize,
        cache: &mut dyn ResultCache,
    ) -> Result<Vec<String>> {
        let key = CacheKey::Responses.for_side(self.seat.side);
        let responses = match cache::load::<Vec<String>>(&*cache, step, &key)? {
            Some(cached) => {
                tracing::info!(step, key = %key, "reusing cached initial responses");
                cached
            }
            None => {
                let fresh = self.generate_candidates(transcript).await?;
                cache::store(cache, step, &key, &fresh)?;
                fresh
            }
        };

        if responses.len() != self.config.bon {
            return Err(SearchError::CandidateCountMismatch {
                expected: self.config.bon,
                found: responses.len(),
            }
            .into());
        }
        Ok(responses)
    }

    pub async fn take_turn(
        &self,
        transcript: &Transcript,
        step: usize,
        cache: &mut dyn ResultCache,
        judge: &dyn Judge,
        critic: Option<&dyn Critic>,
    ) -> Result<TurnOutput> {
        if self.config.cbon > 0 && critic.is_none() {
            return Err(SearchError::MissingCritic.into());
        }

        tracing::info!(
            step,
            side = %self.seat.side,
            rating = self.config.rating_method.name(),
            "taking turn with tree search"
        );
        let responses = self.initial_responses(transcript, step, cache).await?;

        let expander = NodeExpander::new(
            self.completion,
            &self.config.prompts,
            &self.config.language_model,
            &self.search,
            self.config.word_limit,
        );
        let evaluator = NodeEvaluator::new(
            judge,
            self.seat,
            self.config.rating_method,
            self.config.word_limit,
        );
        let engine = TreeSearchEngine::new(
            expander,
            evaluator,
            &self.search,
            Slot::for_seat(self.seat.correct),
        );
        let outcome = engine.search(&responses, transcript).await?;

        let mut argument = self.truncated_argument(&outcome.best_response);
        let mut trace = outcome.trace;
        let mut refined = false;

        if let (true, Some(critic)) = (self.config.cbon > 0, critic) {
            let critique = self
                .critique(&argument, transcript, step, cache, critic)
                .await?;
            let refinements = self
                .refinements(transcript, &outcome.best_response, &critique, step, cache)
                .await?;

            let (refinement, refinements_string) = if refinements.len() > 1 {
                self.judge_preference(&refinements, transcript, judge).await?
            } else {
                let single = refinements.first().cloned().unwrap_or_default();
                (single.clone(), single)
            };

            trace.push_str(&format!(
                "\n\nCritique:\n{}\n\nRefinements:\n{}",
                critique, refinements_string
            ));

            if has_argument_markup(&refinement) {
                argument = self.truncated_argument(&refinement);
                refined = true;
            } else {
                tracing::warn!("Refinement had issue. Using original argument instead.");
                trace.push_str("\n\n");
                trace.push_str(REFINEMENT_FALLBACK_NOTE);
            }
        }

        Ok(TurnOutput {
            argument,
            trace,
            metrics: outcome.metrics,
            refined,
        })
    }

    async fn critique(
        &self,
        argument: &str,
        transcript: &Transcript,
        step: usize,
        cache: &mut dyn ResultCache,
        critic: &dyn Critic,
    ) -> Result<String> {
        let key = CacheKey::Critique.for_side(self.seat.side);
        if let Some(cached) = cache::load::<String>(&*cache, step, &key)? {
            tracing::info!(step, key = %key, "reusing cached critique");
            return Ok(cached);
        }
        let critique = critic.critique(transcript, argument, self.seat).await?;
        cache::store(cache, step, &key, &critique)?;
        Ok(critique)
    }

    async fn refinements(
        &self,
        transcript: &Transcript,
        best_response: &str,
        critique: &str,
        step: usize,
        cache: &mut dyn ResultCache,
    ) -> Result<Vec<String>> {
        let key = CacheKey::Refinement.for_side(self.seat.side);
        if let Some(cached) = cache::load::<Vec<String>>(&*cache, step, &key)? {
            tracing::info!(step, key = %key, "reusing cached refinements");
            return Ok(cached);
        }

        let fields = PromptFields {
            transcript: Some(transcript.render()),
            argument: Some(best_response.to_string()),
            critique: Some(critique.to_string()),
            word_limit: self.config.word_limit,
            ..Default::default()
        };
        let prompt = self.config.prompts.render(PromptKind::Refinement, &fields);
        let refinements: Vec<String> = self
            .completion
            .generate(&self.request(prompt, self.config.cbon))
            .await?
            .into_iter()
            .map(|t| t.trim().to_string())
            .collect();
        cache::store(cache, step, &key, &refinements)?;
        Ok(refinements)
    }

    /// Round-robin pairwise preference. A win is worth 1, a tie 0.5 to each;
    /// the highest tally wins and the earlier candidate wins a tie.
    pub async fn judge_preference(
        &self,
        candidates: &[String],
        transcript: &Transcript,
        judge: &dyn Judge,
    ) -> Result<(String, String)> {
        let arguments: Vec<String> = candidates
            .iter()
            .map(|c| self.truncated_argument(c))
            .collect();
        let mut tally = vec![0.0f64; candidates.len()];

        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                match judge
                    .prefer(transcript, &arguments[i], &arguments[j], self.seat)
                    .await?
                {
                    Preference::First => tally[i] += 1.0,
                    Preference::Second => tally[j] += 1.0,
                    Preference::Tie => {
                        tally[i] += 0.5;
                        tally[j] += 0.5;
                    }
                }
            }
        }

        let mut best = 0;
        for (i, &wins) in tally.iter().enumerate() {
            if wins > tally[best] {
                best = i;
            }
        }

        let summary = candidates
            .iter()
            .zip(&tally)
            .enumerate()
            .map(|(i, (text, wins))| format!("Refinement {} (wins {:.1}):\n{}", i + 1, wins, text))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok((candidates[best].clone(), summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::RatingMethod;
    use crate::types::Side;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl CompletionService for Silent {
        async fn generate(&self, request: &CompletionRequest) -> Result<Vec<String>> {
            Ok(vec![String::new(); request.n])
        }
    }

    /// Prefers the longer argument
    struct LengthJudge;

    #[async_trait]
    impl Judge for LengthJudge {
        async fn rate(&self, _: &Transcript, argument: &str, _: Side, _: RatingMethod) -> Result<f64> {
            Ok(argument.len() as f64)
        }

        async fn prefer(
            &self,
            _: &Transcript,
            first: &str,
            second: &str,
            _: DebaterSeat,
        ) -> Result<Preference> {
            Ok(match first.len().cmp(&second.len()) {
                std::cmp::Ordering::Greater => Preference::First,
                std::cmp::Ordering::Less => Preference::Second,
                std::cmp::Ordering::Equal => Preference::Tie,
            })
        }
    }

    fn debater(completion: &dyn CompletionService) -> TreeSearchDebater<'_> {
        TreeSearchDebater::new(
            completion,
            DebaterConfig::default(),
            DebaterSeat::new(Side::A, true),
        )
    }

    #[tokio::test]
    async fn test_judge_preference_picks_highest_tally() {
        let debater = debater(&Silent);
        let candidates = vec![
            "<argument>short</argument>".to_string(),
            "<argument>much longer one</argument>".to_string(),
            "<argument>mid size</argument>".to_string(),
        ];
        let (best, summary) = debater
            .judge_preference(&candidates, &Transcript::new("Q", "a", "b"), &LengthJudge)
            .await
            .unwrap();

        assert_eq!(best, candidates[1]);
        assert!(summary.contains("Refinement 2 (wins 2.0)"));
        assert!(summary.contains("Refinement 1 (wins 0.0)"));
    }

    #[tokio::test]
    async fn test_judge_preference_tie_goes_to_first() {
        let debater = debater(&Silent);
        let candidates = vec![
            "<argument>aaaa</argument>".to_string(),
            "<argument>bbbb</argument>".to_string(),
        ];
        let (best, _) = debater
            .judge_preference(&candidates, &Transcript::new("Q", "a", "b"), &LengthJudge)
            .await
            .unwrap();
        assert_eq!(best, candidates[0]);
    }

    #[tokio::test]
    async fn test_refinement_without_critic_is_rejected() {
        let config = DebaterConfig {
            cbon: 2,
            ..DebaterConfig::default()
        };
        let debater = TreeSearchDebater::new(&Silent, config, DebaterSeat::new(Side::B, false));
        let mut cache = MemoryCache::new();

        let err = debater
            .take_turn(&Transcript::new("Q", "a", "b"), 0, &mut cache, &LengthJudge, None)
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<SearchError>(), Some(&SearchError::MissingCritic));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_tree_search_section_uses_defaults() {
        let debater = debater(&Silent);
        assert_eq!(debater.search_config(), &TreeSearchConfig::default());
    }

    /// Numbered arguments for every batch; refinement prompts cycle through
    /// `refinements`
    struct Scripted {
        prompts: std::sync::Mutex<Vec<String>>,
        refinements: Vec<String>,
    }

    impl Scripted {
        fn new(refinement: &str) -> Self {
            Self::with_refinements(&[refinement])
        }

        fn with_refinements(refinements: &[&str]) -> Self {
            Self {
                prompts: std::sync::Mutex::new(Vec::new()),
                refinements: refinements.iter().map(|r| r.to_string()).collect(),
            }
        }

        fn count(&self, prefix: &str) -> usize {
            self.prompts
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.starts_with(prefix))
                .count()
        }

        fn total(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    const TURN_PREFIX: &str = "You are a skilled debater. Argue";
    const REFINEMENT_PREFIX: &str = "You are improving";

    #[async_trait]
    impl CompletionService for Scripted {
        async fn generate(&self, request: &CompletionRequest) -> Result<Vec<String>> {
            let mut prompts = self.prompts.lock().unwrap();
            let call = prompts.len();
            prompts.push(request.prompt.clone());
            if request.prompt.starts_with(REFINEMENT_PREFIX) {
                return Ok((0..request.n)
                    .map(|i| self.refinements[i % self.refinements.len()].clone())
                    .collect());
            }
            Ok((0..request.n)
                .map(|i| format!(" <argument>gen{}.{}</argument> ", call, i))
                .collect())
        }
    }

    struct FailingCompletion;

    #[async_trait]
    impl CompletionService for FailingCompletion {
        async fn generate(&self, _: &CompletionRequest) -> Result<Vec<String>> {
            Err(anyhow::anyhow!("completion service down"))
        }
    }

    struct FixedCritic;

    #[async_trait]
    impl Critic for FixedCritic {
        async fn critique(&self, _: &Transcript, _: &str, _: DebaterSeat) -> Result<String> {
            Ok("be sharper".to_string())
        }
    }

    fn with_cbon(cbon: usize) -> DebaterConfig {
        DebaterConfig {
            cbon,
            ..DebaterConfig::default()
        }
    }

    fn cached_roots() -> Vec<String> {
        (1..=4)
            .map(|i| format!("<argument>cached root number {}</argument>", i))
            .collect()
    }

    fn root_arguments(roots: &[String]) -> Vec<String> {
        roots.iter().map(|r| extract_argument(r)).collect()
    }

    #[tokio::test]
    async fn test_cached_responses_skip_generation() {
        let completion = Scripted::new("");
        let debater = TreeSearchDebater::new(&completion, with_cbon(0), DebaterSeat::new(Side::A, true));
        let mut cache = MemoryCache::new();
        cache::store(&mut cache, 3, "responses_A", &cached_roots()).unwrap();

        let turn = debater
            .take_turn(&Transcript::new("Q", "a", "b"), 3, &mut cache, &LengthJudge, None)
            .await
            .unwrap();

        assert_eq!(completion.count(TURN_PREFIX), 0);
        assert!(root_arguments(&cached_roots()).contains(&turn.argument));
        assert_eq!(turn.metrics.total_nodes, 4 + 16 + 32);
        assert!(!turn.trace.contains("Critique:"));
        assert!(!turn.refined);
    }

    #[tokio::test]
    async fn test_cached_count_mismatch_stops_before_search() {
        let completion = Scripted::new("");
        let debater = TreeSearchDebater::new(&completion, with_cbon(0), DebaterSeat::new(Side::A, true));
        let mut cache = MemoryCache::new();
        let short: Vec<String> = cached_roots().into_iter().take(3).collect();
        cache::store(&mut cache, 0, "responses_A", &short).unwrap();

        let err = debater
            .take_turn(&Transcript::new("Q", "a", "b"), 0, &mut cache, &LengthJudge, None)
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<SearchError>(),
            Some(&SearchError::CandidateCountMismatch { expected: 4, found: 3 })
        );
        assert_eq!(completion.total(), 0);
    }

    #[tokio::test]
    async fn test_fresh_responses_are_cached_per_side() {
        let completion = Scripted::new("");
        let debater = TreeSearchDebater::new(&completion, with_cbon(0), DebaterSeat::new(Side::B, false));
        let mut cache = MemoryCache::new();

        let turn = debater
            .take_turn(&Transcript::new("Q", "a", "b"), 1, &mut cache, &LengthJudge, None)
            .await
            .unwrap();

        assert_eq!(completion.count(TURN_PREFIX), 1);
        let stored: Vec<String> = cache::load(&cache, 1, "responses_B").unwrap().unwrap();
        assert_eq!(stored.len(), 4);
        assert!(root_arguments(&stored).contains(&turn.argument));
        assert!(cache::load::<Vec<String>>(&cache, 1, "responses_A").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refinement_without_markup_keeps_searched_argument() {
        let completion = Scripted::new("just plain text");
        let debater = TreeSearchDebater::new(&completion, with_cbon(1), DebaterSeat::new(Side::A, true));
        let mut cache = MemoryCache::new();
        cache::store(&mut cache, 0, "responses_A", &cached_roots()).unwrap();

        let turn = debater
            .take_turn(
                &Transcript::new("Q", "a", "b"),
                0,
                &mut cache,
                &LengthJudge,
                Some(&FixedCritic),
            )
            .await
            .unwrap();

        assert!(!turn.refined);
        assert!(root_arguments(&cached_roots()).contains(&turn.argument));
        assert!(turn.trace.contains("Critique:\nbe sharper"));
        assert!(turn.trace.contains("Refinements:\njust plain text"));
        assert!(turn.trace.ends_with(REFINEMENT_FALLBACK_NOTE));

        let critique: Option<String> = cache::load(&cache, 0, "critique_A").unwrap();
        assert_eq!(critique.as_deref(), Some("be sharper"));
        let refinements: Option<Vec<String>> = cache::load(&cache, 0, "refinement_A").unwrap();
        assert_eq!(refinements, Some(vec!["just plain text".to_string()]));
    }

    #[tokio::test]
    async fn test_refinement_with_markup_replaces_argument() {
        let completion = Scripted::new("<argument>a sharper version</argument>");
        let debater = TreeSearchDebater::new(&completion, with_cbon(1), DebaterSeat::new(Side::A, true));
        let mut cache = MemoryCache::new();

        let turn = debater
            .take_turn(
                &Transcript::new("Q", "a", "b"),
                0,
                &mut cache,
                &LengthJudge,
                Some(&FixedCritic),
            )
            .await
            .unwrap();

        assert!(turn.refined);
        assert_eq!(turn.argument, "a sharper version");
        assert_eq!(completion.count(REFINEMENT_PREFIX), 1);
        assert!(!turn.trace.contains(REFINEMENT_FALLBACK_NOTE));
    }

    #[tokio::test]
    async fn test_cached_refinement_is_reused() {
        let completion = Scripted::new("<argument>never generated</argument>");
        let debater = TreeSearchDebater::new(&completion, with_cbon(1), DebaterSeat::new(Side::A, true));
        let mut cache = MemoryCache::new();
        cache::store(&mut cache, 2, "responses_A", &cached_roots()).unwrap();
        cache::store(&mut cache, 2, "critique_A", &"old critique".to_string()).unwrap();
        cache::store(
            &mut cache,
            2,
            "refinement_A",
            &vec!["<argument>from the cache</argument>".to_string()],
        )
        .unwrap();

        let turn = debater
            .take_turn(
                &Transcript::new("Q", "a", "b"),
                2,
                &mut cache,
                &LengthJudge,
                Some(&FixedCritic),
            )
            .await
            .unwrap();

        assert_eq!(turn.argument, "from the cache");
        assert!(turn.trace.contains("Critique:\nold critique"));
        assert_eq!(completion.count(REFINEMENT_PREFIX), 0);
        assert_eq!(completion.count(TURN_PREFIX), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates_without_caching() {
        let debater =
            TreeSearchDebater::new(&FailingCompletion, with_cbon(0), DebaterSeat::new(Side::A, true));
        let mut cache = MemoryCache::new();

        let err = debater
            .take_turn(&Transcript::new("Q", "a", "b"), 0, &mut cache, &LengthJudge, None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "completion service down");
        assert!(cache::load::<Vec<String>>(&cache, 0, "responses_A").unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_several_refinements_ranked_by_preference() {
        let completion = Scripted::with_refinements(&[
            "<argument>short</argument>",
            "<argument>the longest refinement here</argument>",
            "<argument>middle one</argument>",
        ]);
        let debater = TreeSearchDebater::new(&completion, with_cbon(3), DebaterSeat::new(Side::A, true));
        let mut cache = MemoryCache::new();
        cache::store(&mut cache, 0, "responses_A", &cached_roots()).unwrap();

        let turn = debater
            .take_turn(
                &Transcript::new("Q", "a", "b"),
                0,
                &mut cache,
                &LengthJudge,
                Some(&FixedCritic),
            )
            .await
            .unwrap();

        assert!(turn.refined);
        assert_eq!(turn.argument, "the longest refinement here");
        assert!(turn.trace.contains("Refinement 1 (wins 0.0)"));
        assert!(turn.trace.contains("Refinement 2 (wins 2.0)"));
        assert!(turn.trace.contains("Refinement 3 (wins 1.0)"));

        let stored: Vec<String> = cache::load(&cache, 0, "refinement_A").unwrap().unwrap();
        assert_eq!(stored.len(), 3);
    }
}
