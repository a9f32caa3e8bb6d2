//! Lookahead tree search over debate continuations
//!
//! The root level is the set of initial candidates. Each level below is
//! produced by expanding every node of the level above and scoring the new
//! children against a transcript scoped to their own branch. Levels are
//! barriers: a level is fully expanded and scored before the next starts.
//! Within a level, sibling requests run concurrently (bounded by
//! `max_concurrent`) and are joined in creation order, so scores, trace
//! lines and child order never depend on completion timing.
//!
//! The search returns the *root* response on the best path. Deeper nodes
//! only rank the roots; they are never the turn's output.

use crate::collab::CompletionRequest;
use crate::config::TreeSearchConfig;
use crate::error::SearchError;
use crate::evaluator::NodeEvaluator;
use crate::expander::NodeExpander;
use crate::node::{DebateTree, NodeId};
use crate::transcript::{Slot, Transcript};
use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

/// Per-search statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMetrics {
    pub total_nodes: usize,
    /// Deepest non-empty level
    pub depth_reached: usize,
    /// Mean score per non-empty level, root level first
    pub avg_scores: Vec<f64>,
    /// Scores from the winning root down to the best leaf
    pub best_path_scores: Vec<f64>,
}

#[derive(Debug)]
pub struct SearchOutcome {
    /// Response of the root candidate on the best path
    pub best_response: String,
    pub best_root: NodeId,
    pub best_leaf: NodeId,
    pub trace: String,
    pub metrics: SearchMetrics,
    pub tree: DebateTree,
}

pub struct TreeSearchEngine<'a> {
    expander: NodeExpander<'a>,
    evaluator: NodeEvaluator<'a>,
    config: &'a TreeSearchConfig,
    agent_slot: Slot,
}

impl<'a> TreeSearchEngine<'a> {
    pub fn new(
        expander: NodeExpander<'a>,
        evaluator: NodeEvaluator<'a>,
        config: &'a TreeSearchConfig,
        agent_slot: Slot,
    ) -> Self {
        Self {
            expander,
            evaluator,
            config,
            agent_slot,
        }
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrent.max(1)
    }

    pub async fn search(
        &self,
        initial_responses: &[String],
        transcript: &Transcript,
    ) -> Result<SearchOutcome> {
        if initial_responses.is_empty() {
            return Err(SearchError::NoLeaves.into());
        }

        let mut tree = DebateTree::new();
        let mut metrics = SearchMetrics::default();
        let mut trace = Vec::new();

        // Level 0: root candidates, scored against the unmodified transcript
        let roots: Vec<NodeId> = initial_responses
            .iter()
            .map(|response| tree.add_root(response.as_str()))
            .collect();
        metrics.total_nodes += roots.len();

        let contexts = vec![transcript; roots.len()];
        let scores = self.score_level(&tree, &roots, &contexts).await?;
        for (&id, score) in roots.iter().zip(scores) {
            tree.set_score(id, score)?;
            tracing::debug!(node = id, score, "scored root candidate");
            trace.push(format!("Root node: score={:.3}", score));
        }
        metrics.avg_scores.push(mean(&tree, &roots)?);

        let mut current = roots;
        for depth in 1..=self.config.depth {
            let requests: Vec<CompletionRequest> = current
                .iter()
                .map(|&id| self.expander.build_request(&tree, id))
                .collect();
            let batches: Vec<Vec<String>> = stream::iter(requests.iter())
                .map(|request| self.expander.complete(request))
                .buffered(self.concurrency())
                .try_collect()
                .await?;

            let mut next_level = Vec::new();
            for (&parent, texts) in current.iter().zip(batches) {
                next_level.extend(self.expander.attach(&mut tree, parent, texts));
            }
            metrics.total_nodes += next_level.len();

            if next_level.is_empty() {
                tracing::warn!(depth, "expansion produced no nodes, stopping search early");
                break;
            }
            metrics.depth_reached = depth;

            let owned: Vec<Transcript> = next_level
                .iter()
                .map(|&id| self.branch_transcript(&tree, id, transcript))
                .collect::<Result<_>>()?;
            let contexts: Vec<&Transcript> = owned.iter().collect();
            let scores = self.score_level(&tree, &next_level, &contexts).await?;

            for (&id, score) in next_level.iter().zip(scores) {
                if score.is_nan() {
                    tracing::warn!(node = id, depth, "judge returned NaN, node ranks last");
                }
                tree.set_score(id, score)?;
                let speaker = if tree.get(id).is_opponent() {
                    "Opponent"
                } else {
                    "Our"
                };
                tracing::debug!(node = id, depth, score, speaker, "scored simulated turn");
                trace.push(format!(
                    "{} response at depth {}: score={:.3}",
                    speaker, depth, score
                ));
            }
            metrics.avg_scores.push(mean(&tree, &next_level)?);
            current = next_level;
        }

        let best_leaf = select_best_leaf(&tree, &current)?;
        let path = tree.path_from_root(best_leaf);
        metrics.best_path_scores = path
            .iter()
            .map(|&id| tree.scored(id))
            .collect::<Result<_>>()?;

        let best_root = tree.root_of(best_leaf);
        let best_response = tree.get(best_root).response().to_string();

        tracing::info!(
            total_nodes = metrics.total_nodes,
            depth_reached = metrics.depth_reached,
            best_root,
            "tree search finished"
        );

        Ok(SearchOutcome {
            best_response,
            best_root,
            best_leaf,
            trace: trace.join("\n"),
            metrics,
            tree,
        })
    }

    /// Score `ids` against their matching contexts, results in `ids` order
    async fn score_level(
        &self,
        tree: &DebateTree,
        ids: &[NodeId],
        contexts: &[&Transcript],
    ) -> Result<Vec<f64>> {
        stream::iter(ids.iter().zip(contexts.iter()))
            .map(|(&id, context)| self.evaluator.evaluate(tree.get(id).response(), context))
            .buffered(self.concurrency())
            .try_collect()
            .await
    }

    /// Transcript copy holding the arguments of `id`'s ancestors
    fn branch_transcript(
        &self,
        tree: &DebateTree,
        id: NodeId,
        transcript: &Transcript,
    ) -> Result<Transcript> {
        let mut path = tree.path_from_root(id);
        path.pop();
        let ancestors: Vec<(String, bool)> = path
            .into_iter()
            .map(|n| {
                let node = tree.get(n);
                (self.evaluator.judged_argument(node.response()), node.is_opponent())
            })
            .collect();
        transcript.branch_context(self.agent_slot, &ancestors)
    }
}

fn mean(tree: &DebateTree, ids: &[NodeId]) -> Result<f64> {
    let mut total = 0.0;
    for &id in ids {
        total += tree.scored(id)?;
    }
    Ok(total / ids.len().max(1) as f64)
}

/// NaN ranks below every real score
fn rank(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// Highest-scoring leaf among `level`; the earliest wins a tie
fn select_best_leaf(tree: &DebateTree, level: &[NodeId]) -> Result<NodeId> {
    let mut best: Option<(NodeId, f64)> = None;
    for &id in level.iter().filter(|&&id| tree.get(id).is_leaf()) {
        let score = rank(tree.scored(id)?);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((id, score)),
        }
    }
    best.map(|(id, _)| id)
        .ok_or_else(|| SearchError::NoLeaves.into())
}
