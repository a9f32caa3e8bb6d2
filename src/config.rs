//! Debater configuration
//!
//! Loaded from JSON. Every section has defaults so a partial file works;
//! the API key is never part of the file and comes from `ANTHROPIC_API_KEY`.

use crate::error::SearchError;
use crate::prompts::PromptSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the judge turns an argument into a score
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RatingMethod {
    /// 1-10 rating
    #[default]
    Likert,
    /// Convincing or not, 1.0 / 0.0
    Binary,
}

impl RatingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            RatingMethod::Likert => "likert",
            RatingMethod::Binary => "binary",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageModelConfig {
    pub model: String,
    pub api_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Samples tried per requested completion before it is padded as invalid
    pub num_candidates_per_completion: usize,
}

impl Default for LanguageModelConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".to_string(),
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            temperature: 0.8,
            top_p: 1.0,
            max_tokens: 1024,
            num_candidates_per_completion: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSearchConfig {
    /// Children per parentless (root) node
    pub root_branching: usize,
    /// Children per node below the root
    pub child_branching: usize,
    /// Expansion rounds below the root level
    pub depth: usize,
    /// Sampling temperature for simulated turns
    pub exploration_temp: f32,
    /// Sibling completions/judgements in flight at once within a level
    pub max_concurrent: usize,
}

impl Default for TreeSearchConfig {
    fn default() -> Self {
        Self {
            root_branching: 4,
            child_branching: 2,
            depth: 2,
            exploration_temp: 0.8,
            max_concurrent: 8,
        }
    }
}

impl TreeSearchConfig {
    /// Use the configured section, or defaults with a warning when absent
    pub fn resolve(section: Option<&TreeSearchConfig>) -> TreeSearchConfig {
        match section {
            Some(cfg) => cfg.clone(),
            None => {
                tracing::warn!("No tree_search config found, using defaults");
                TreeSearchConfig::default()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebaterConfig {
    /// Initial candidates generated per turn
    #[serde(rename = "BoN", alias = "bon")]
    pub bon: usize,
    /// Refinement candidates per turn; 0 disables critique and refinement
    #[serde(rename = "cBoN", alias = "cbon")]
    pub cbon: usize,
    /// Words kept from an argument before it reaches the judge
    pub word_limit: usize,
    pub rating_method: RatingMethod,
    pub language_model: LanguageModelConfig,
    pub tree_search: Option<TreeSearchConfig>,
    pub prompts: PromptSet,
}

impl Default for DebaterConfig {
    fn default() -> Self {
        Self {
            bon: 4,
            cbon: 0,
            word_limit: 150,
            rating_method: RatingMethod::default(),
            language_model: LanguageModelConfig::default(),
            tree_search: None,
            prompts: PromptSet::default(),
        }
    }
}

impl DebaterConfig {
    /// Defaults with every optional section filled in, for printing
    pub fn example() -> Self {
        Self {
            tree_search: Some(TreeSearchConfig::default()),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {:?}", path))?;
        Self::from_json(&raw).with_context(|| format!("Invalid config at {:?}", path))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: DebaterConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bon == 0 {
            return Err(SearchError::InvalidConfig("BoN must be at least 1".into()).into());
        }
        if self.word_limit == 0 {
            return Err(SearchError::InvalidConfig("word_limit must be at least 1".into()).into());
        }
        if let Some(ts) = &self.tree_search {
            if ts.max_concurrent == 0 {
                return Err(SearchError::InvalidConfig(
                    "tree_search.max_concurrent must be at least 1".into(),
                )
                .into());
            }
        }
        Ok(())
    }
}
