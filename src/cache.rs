//! Turn cache
//!
//! Values generated during a turn are stored under `(step, key)` so a run
//! interrupted part-way can resume without asking the model again. Keys are
//! side-qualified, e.g. `responses_A`, `refinement_B`.
//!
//! Uses SQLite for the persistent store: single file, no server.

use crate::types::Side;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// What a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    Responses,
    Critique,
    Refinement,
}

impl CacheKey {
    pub fn for_side(&self, side: Side) -> String {
        let prefix = match self {
            CacheKey::Responses => "responses",
            CacheKey::Critique => "critique",
            CacheKey::Refinement => "refinement",
        };
        format!("{}_{}", prefix, side)
    }
}

/// Storage for per-step turn results
pub trait ResultCache: Send {
    fn get(&self, step: usize, key: &str) -> Result<Option<serde_json::Value>>;

    /// Store a value, replacing whatever was there
    fn put(&mut self, step: usize, key: &str, value: serde_json::Value) -> Result<()>;
}

/// Typed read
pub fn load<T: DeserializeOwned>(
    cache: &dyn ResultCache,
    step: usize,
    key: &str,
) -> Result<Option<T>> {
    match cache.get(step, key)? {
        Some(value) => {
            let typed = serde_json::from_value(value)
                .with_context(|| format!("Cached value for step {} key {} has the wrong shape", step, key))?;
            Ok(Some(typed))
        }
        None => Ok(None),
    }
}

/// Typed write
pub fn store<T: Serialize>(
    cache: &mut dyn ResultCache,
    step: usize,
    key: &str,
    value: &T,
) -> Result<()> {
    cache.put(step, key, serde_json::to_value(value)?)
}

/// In-process cache; lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: BTreeMap<(usize, String), serde_json::Value>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, step: usize, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.get(&(step, key.to_string())).cloned())
    }

    fn put(&mut self, step: usize, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.insert((step, key.to_string()), value);
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS turn_cache (
    step INTEGER NOT NULL,
    key TEXT NOT NULL,
    value_json TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (step, key)
);
"#;

/// One stored row, for inspection
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub step: usize,
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: String,
}

/// SQLite-backed cache that survives restarts
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database at {:?}", path))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// All entries, optionally only those of one step, ordered by step then key
    pub fn entries(&self, step: Option<usize>) -> Result<Vec<CacheEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT step, key, value_json, COALESCE(created_at, '') FROM turn_cache
             WHERE ?1 IS NULL OR step = ?1
             ORDER BY step, key",
        )?;
        let rows = stmt.query_map(params![step.map(|s| s as i64)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (step, key, value_json, created_at) = row?;
            entries.push(CacheEntry {
                step: step as usize,
                value: serde_json::from_str(&value_json)
                    .with_context(|| format!("Corrupt cache row for step {} key {}", step, key))?,
                key,
                created_at,
            });
        }
        Ok(entries)
    }
}

impl ResultCache for SqliteCache {
    fn get(&self, step: usize, key: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM turn_cache WHERE step = ?1 AND key = ?2",
                params![step as i64, key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json).with_context(|| {
                format!("Corrupt cache row for step {} key {}", step, key)
            })?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, step: usize, key: &str, value: serde_json::Value) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO turn_cache (step, key, value_json) VALUES (?1, ?2, ?3)",
            params![step as i64, key, serde_json::to_string(&value)?],
        )?;
        Ok(())
    }
}
