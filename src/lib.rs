//! debate-treesearch - lookahead argument selection for automated debaters
//!
//! Instead of generating N arguments and keeping the one the judge likes
//! best, the debater simulates a few rounds of back-and-forth below each
//! candidate and keeps the candidate whose simulated future scores best.
//! An optional second pass critiques and rewrites the chosen argument.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use debate_treesearch::{DebaterConfig, DebaterSeat, Side, SqliteCache, TreeSearchDebater};
//! use debate_treesearch::llm::AnthropicClient;
//!
//! let config = DebaterConfig::load(&config_path)?;
//! let client = AnthropicClient::from_config(&config.language_model)?;
//! let debater = TreeSearchDebater::new(&client, config, DebaterSeat::new(Side::A, true));
//!
//! let mut cache = SqliteCache::open(&cache_path)?;
//! let turn = debater.take_turn(&transcript, step, &mut cache, &client, Some(&client)).await?;
//! println!("{}", turn.argument);
//! ```
//!
//! # Architecture
//!
//! ```text
//! TreeSearchDebater::take_turn
//!   ├─ cache / best-of-N      → root candidates
//!   ├─ TreeSearchEngine       → level by level:
//!   │    ├─ NodeExpander       (CompletionService)
//!   │    └─ NodeEvaluator      (Judge)
//!   │  → root response on the best path
//!   └─ critique + refinement  (Critic, CompletionService, Judge::prefer)
//! ```

pub mod argument;
pub mod cache;
pub mod collab;
pub mod config;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod expander;
pub mod llm;
pub mod node;
pub mod offline;
pub mod prompts;
pub mod search;
pub mod transcript;
pub mod types;

// Core types
pub use config::{DebaterConfig, LanguageModelConfig, RatingMethod, TreeSearchConfig};
pub use error::SearchError;
pub use node::{DebateNode, DebateTree, NodeId};
pub use transcript::{Round, Slot, Transcript};
pub use types::*;

// Search
pub use controller::{TreeSearchDebater, TurnOutput};
pub use evaluator::NodeEvaluator;
pub use expander::NodeExpander;
pub use search::{SearchMetrics, SearchOutcome, TreeSearchEngine};

// Collaborators
pub use cache::{CacheKey, MemoryCache, ResultCache, SqliteCache};
pub use collab::{CompletionRequest, CompletionService, Critic, Judge, Preference, ShortfallPolicy};
