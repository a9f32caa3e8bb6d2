//! Node expansion
//!
//! Expanding a node asks the model for a batch of continuations and hangs
//! one child under the node per returned text. Building the request and
//! attaching the children are separate steps so the search can fan the
//! requests of one level out concurrently and still attach in order.

use crate::argument::is_valid_argument;
use crate::collab::{CompletionRequest, CompletionService, ShortfallPolicy};
use crate::config::{LanguageModelConfig, TreeSearchConfig};
use crate::node::{DebateTree, NodeId};
use crate::prompts::{PromptFields, PromptKind, PromptSet};
use anyhow::Result;

pub struct NodeExpander<'a> {
    completion: &'a dyn CompletionService,
    prompts: &'a PromptSet,
    language_model: &'a LanguageModelConfig,
    search: &'a TreeSearchConfig,
    word_limit: usize,
}

impl<'a> NodeExpander<'a> {
    pub fn new(
        completion: &'a dyn CompletionService,
        prompts: &'a PromptSet,
        language_model: &'a LanguageModelConfig,
        search: &'a TreeSearchConfig,
        word_limit: usize,
    ) -> Self {
        Self {
            completion,
            prompts,
            language_model,
            search,
            word_limit,
        }
    }

    /// Children to request for `id`: root branching for parentless nodes
    pub fn branching(&self, tree: &DebateTree, id: NodeId) -> usize {
        if tree.get(id).is_root() {
            self.search.root_branching
        } else {
            self.search.child_branching
        }
    }

    /// Prompt for expanding `id`
    pub fn build_prompt(&self, tree: &DebateTree, id: NodeId) -> String {
        let node = tree.get(id);
        let history = tree.debate_history(id);
        let parent_response = node.parent().map(|p| tree.get(p).response().to_string());
        let kind = PromptKind::for_expansion(node.is_root(), node.is_opponent());

        let fields = match kind {
            PromptKind::Opponent => PromptFields {
                previous_argument: parent_response,
                debate_history: Some(history[..history.len() - 1].join("\n")),
                word_limit: self.word_limit,
                ..Default::default()
            },
            _ => PromptFields {
                opponent_argument: parent_response,
                debate_history: Some(history.join("\n")),
                word_limit: self.word_limit,
                ..Default::default()
            },
        };
        self.prompts.render(kind, &fields)
    }

    pub fn build_request(&self, tree: &DebateTree, id: NodeId) -> CompletionRequest {
        CompletionRequest {
            prompt: self.build_prompt(tree, id),
            n: self.branching(tree, id),
            temperature: self.search.exploration_temp,
            top_p: self.language_model.top_p,
            max_tokens: self.language_model.max_tokens,
            num_candidates_per_completion: self.language_model.num_candidates_per_completion,
            is_valid: is_valid_argument,
            shortfall: ShortfallPolicy::PadInvalids,
        }
    }

    /// Issue a request built by [`build_request`](Self::build_request)
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        let texts = self.completion.generate(request).await?;
        if texts.len() != request.n {
            tracing::warn!(
                "Completion service returned {} texts for {} requested",
                texts.len(),
                request.n
            );
        }
        Ok(texts)
    }

    /// Hang one child per text under `id`, flipping the speaker
    pub fn attach(&self, tree: &mut DebateTree, id: NodeId, texts: Vec<String>) -> Vec<NodeId> {
        let is_opponent = !tree.get(id).is_opponent();
        texts
            .into_iter()
            .map(|text| tree.add_child(id, text.trim(), is_opponent))
            .collect()
    }

    /// Build, issue and attach in one go
    pub async fn expand(&self, tree: &mut DebateTree, id: NodeId) -> Result<Vec<NodeId>> {
        let request = self.build_request(tree, id);
        let texts = self.complete(&request).await?;
        Ok(self.attach(tree, id, texts))
    }
}
