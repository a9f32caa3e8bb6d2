//! Inspect the turn cache
//!
//! Usage: cargo run --bin cache-inspect -- [cache.db] [--step N] [--keys]

use anyhow::{anyhow, Context, Result};
use debate_treesearch::SqliteCache;
use std::path::PathBuf;

fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("debate-treesearch")
        .join("turn_cache.db")
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut path = None;
    let mut step = None;
    let mut keys_only = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--step" => {
                let raw = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--step needs a value"))?;
                step = Some(raw.parse::<usize>().context("--step must be a number")?);
                i += 1;
            }
            "--keys" => keys_only = true,
            "-h" | "--help" => {
                eprintln!("Usage: {} [cache.db] [--step N] [--keys]", args[0]);
                return Ok(());
            }
            other if path.is_none() && !other.starts_with("--") => {
                path = Some(PathBuf::from(other));
            }
            other => return Err(anyhow!("Unknown argument {}", other)),
        }
        i += 1;
    }

    let path = path.unwrap_or_else(default_cache_path);
    if !path.exists() {
        return Err(anyhow!("No cache database at {:?}", path));
    }

    let cache = SqliteCache::open(&path)?;
    let entries = cache.entries(step)?;

    println!("{} entries in {:?}", entries.len(), path);
    for entry in &entries {
        println!("\n[step {}] {}  ({})", entry.step, entry.key, entry.created_at);
        if keys_only {
            continue;
        }
        match &entry.value {
            serde_json::Value::Array(items) => {
                for (n, item) in items.iter().enumerate() {
                    let text = item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string());
                    println!("  {}. {}", n + 1, text);
                }
            }
            serde_json::Value::String(text) => println!("  {}", text),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        }
    }

    Ok(())
}
