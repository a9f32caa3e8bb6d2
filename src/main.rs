//! debate-treesearch CLI
//!
//! Run one debate turn with tree search.
//!
//! Run with: cargo run -- turn transcript.json --offline

use anyhow::{anyhow, Context, Result};
use debate_treesearch::{
    llm::AnthropicClient,
    offline::{OfflineCompletion, OfflineCritic, WordCountJudge},
    DebaterConfig, DebaterSeat, Side, SqliteCache, Transcript, TreeSearchDebater,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage:
  debate-treesearch turn <transcript.json> [--config <cfg.json>] [--step N] [--side A|B]
                         [--incorrect] [--cache <db>] [--offline] [--seed N] [--json]
  debate-treesearch --example-config";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("turn") => {
            let opts = TurnArgs::parse(&args[2..])?;
            run_turn(opts).await
        }
        Some("--example-config") => {
            println!("{}", serde_json::to_string_pretty(&DebaterConfig::example())?);
            Ok(())
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

struct TurnArgs {
    transcript: PathBuf,
    config: Option<PathBuf>,
    step: usize,
    side: Side,
    correct: bool,
    cache: Option<PathBuf>,
    offline: bool,
    seed: u64,
    json: bool,
}

impl TurnArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut transcript = None;
        let mut opts = TurnArgs {
            transcript: PathBuf::new(),
            config: None,
            step: 0,
            side: Side::A,
            correct: true,
            cache: None,
            offline: false,
            seed: 0,
            json: false,
        };

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{} needs a value\n{}", flag, USAGE))
            };
            match arg.as_str() {
                "--config" => opts.config = Some(PathBuf::from(value("--config")?)),
                "--step" => opts.step = value("--step")?.parse().context("--step must be a number")?,
                "--side" => {
                    let raw = value("--side")?;
                    opts.side = Side::parse(&raw).ok_or_else(|| anyhow!("--side must be A or B"))?;
                }
                "--incorrect" => opts.correct = false,
                "--cache" => opts.cache = Some(PathBuf::from(value("--cache")?)),
                "--offline" => opts.offline = true,
                "--seed" => opts.seed = value("--seed")?.parse().context("--seed must be a number")?,
                "--json" => opts.json = true,
                other if !other.starts_with("--") && transcript.is_none() => {
                    transcript = Some(PathBuf::from(other));
                }
                other => return Err(anyhow!("Unknown argument {}\n{}", other, USAGE)),
            }
        }

        opts.transcript = transcript.ok_or_else(|| anyhow!("Missing transcript path\n{}", USAGE))?;
        Ok(opts)
    }
}

fn get_data_dir() -> PathBuf {
    // XDG data dir on Linux, ~/Library/Application Support on macOS
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("debate-treesearch")
}

async fn run_turn(opts: TurnArgs) -> Result<()> {
    let config = match &opts.config {
        Some(path) => DebaterConfig::load(path)?,
        None => DebaterConfig::default(),
    };

    let raw = std::fs::read_to_string(&opts.transcript)
        .with_context(|| format!("Failed to read transcript at {:?}", opts.transcript))?;
    let transcript: Transcript = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid transcript at {:?}", opts.transcript))?;

    let cache_path = match &opts.cache {
        Some(path) => path.clone(),
        None => {
            let data_dir = get_data_dir();
            std::fs::create_dir_all(&data_dir)?;
            data_dir.join("turn_cache.db")
        }
    };
    let mut cache = SqliteCache::open(&cache_path)?;
    tracing::info!("Turn cache at {:?}", cache_path);

    let seat = DebaterSeat::new(opts.side, opts.correct);

    let turn = if opts.offline {
        let completion = OfflineCompletion::new(opts.seed);
        let debater = TreeSearchDebater::new(&completion, config, seat);
        debater
            .take_turn(&transcript, opts.step, &mut cache, &WordCountJudge, Some(&OfflineCritic))
            .await?
    } else {
        let client = AnthropicClient::from_config(&config.language_model)?;
        let debater = TreeSearchDebater::new(&client, config, seat);
        debater
            .take_turn(&transcript, opts.step, &mut cache, &client, Some(&client))
            .await?
    };

    if opts.json {
        let record = serde_json::json!({
            "step": opts.step,
            "side": opts.side,
            "correct": opts.correct,
            "completed_at": chrono::Utc::now().to_rfc3339(),
            "turn": turn,
        });
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("\n=== ARGUMENT (side {}, step {}) ===", opts.side, opts.step);
    println!("{}", turn.argument);
    if turn.refined {
        println!("(refined after critique)");
    }
    println!("\n=== SEARCH TRACE ===");
    println!("{}", turn.trace);
    println!("\n=== METRICS ===");
    println!("Nodes explored: {}", turn.metrics.total_nodes);
    println!("Depth reached:  {}", turn.metrics.depth_reached);
    let avg: Vec<String> = turn.metrics.avg_scores.iter().map(|s| format!("{:.3}", s)).collect();
    println!("Level means:    {}", avg.join(" → "));
    let path: Vec<String> = turn
        .metrics
        .best_path_scores
        .iter()
        .map(|s| format!("{:.3}", s))
        .collect();
    println!("Best path:      {}", path.join(" → "));

    Ok(())
}
