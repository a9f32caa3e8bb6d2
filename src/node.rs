//! Arena-backed debate tree
//!
//! The tree owns every node; parents and children refer to each other by
//! `NodeId`, so there is no shared ownership and no way to form a cycle:
//! children are only ever created under an existing node.

use crate::error::SearchError;
use anyhow::Result;

pub type NodeId = usize;

/// One simulated utterance in a branch of the debate
#[derive(Debug, Clone)]
pub struct DebateNode {
    response: String,
    score: Option<f64>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    is_opponent: bool,
    depth: usize,
}

impl DebateNode {
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether this node speaks for the opponent in the simulated exchange
    pub fn is_opponent(&self) -> bool {
        self.is_opponent
    }

    /// Number of ancestors
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Owns all nodes of one search; dropped when the search returns
#[derive(Debug, Default)]
pub struct DebateTree {
    nodes: Vec<DebateNode>,
    roots: Vec<NodeId>,
}

impl DebateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> &DebateNode {
        &self.nodes[id]
    }

    /// Add a root candidate. Roots always speak for the running debater.
    pub fn add_root(&mut self, response: impl Into<String>) -> NodeId {
        let id = self.push(DebateNode {
            response: response.into(),
            score: None,
            parent: None,
            children: Vec::new(),
            is_opponent: false,
            depth: 0,
        });
        self.roots.push(id);
        id
    }

    /// Create a child under `parent` and append it to the parent's children
    pub fn add_child(
        &mut self,
        parent: NodeId,
        response: impl Into<String>,
        is_opponent: bool,
    ) -> NodeId {
        let depth = self.nodes[parent].depth + 1;
        let id = self.push(DebateNode {
            response: response.into(),
            score: None,
            parent: Some(parent),
            children: Vec::new(),
            is_opponent,
            depth,
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn push(&mut self, node: DebateNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Record a node's score. A score can only be set once.
    pub fn set_score(&mut self, id: NodeId, score: f64) -> Result<()> {
        let node = &mut self.nodes[id];
        if node.score.is_some() {
            return Err(SearchError::ScoreAlreadySet(id).into());
        }
        node.score = Some(score);
        Ok(())
    }

    /// Score of a node that must already have been evaluated
    pub fn scored(&self, id: NodeId) -> Result<f64> {
        self.nodes[id]
            .score
            .ok_or_else(|| SearchError::Unscored(id).into())
    }

    /// Ids from the root of `id`'s branch down to `id` itself
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.nodes[id].depth + 1);
        let mut current = Some(id);
        while let Some(node) = current {
            path.push(node);
            current = self.nodes[node].parent;
        }
        path.reverse();
        path
    }

    /// Responses along the branch ending at `id`, root first, `id` last
    pub fn debate_history(&self, id: NodeId) -> Vec<&str> {
        self.path_from_root(id)
            .into_iter()
            .map(|n| self.nodes[n].response.as_str())
            .collect()
    }

    /// Root of the branch containing `id`
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            current = parent;
        }
        current
    }
}
