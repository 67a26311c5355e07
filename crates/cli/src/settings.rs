//! Chunking configuration for the command line: an optional TOML file with
//! individual flags layered on top.

use anyhow::{anyhow, Context, Result};
use docsplit_chunker::{ChunkingConfig, ChunkingStrategy};
use std::fs;
use std::path::Path;

/// Flag values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub strategy: Option<ChunkingStrategy>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub min_segment_tokens: Option<usize>,
    pub chars_per_token: Option<f32>,
    pub split_oversized_words: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ChunkingConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunk_overlap = overlap;
        }
        if let Some(min) = self.min_segment_tokens {
            config.min_segment_tokens = min;
        }
        if let Some(ratio) = self.chars_per_token {
            config.chars_per_token = ratio;
        }
        if self.split_oversized_words {
            config.split_oversized_words = true;
        }
    }
}

/// Load the config file if one was given, then apply overrides.
///
/// Validation is left to the pipeline so that bad values fail the same way
/// whether they come from a file or a flag.
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ChunkingConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ChunkingConfig::default(),
    };
    overrides.apply(&mut config);
    log::debug!("Resolved chunking config: {config:?}");
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<ChunkingConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<ChunkingConfig> {
    let table: toml::Table =
        toml::from_str(raw).map_err(|err| anyhow!("TOML parse error: {err}"))?;

    let known = known_keys()?;
    let mut unknown: Vec<&str> = table
        .keys()
        .map(String::as_str)
        .filter(|key| !known.iter().any(|k| k == key))
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(anyhow!("Unknown config keys: {}", unknown.join(", ")));
    }

    toml::Value::Table(table)
        .try_into()
        .map_err(|err| anyhow!("Config parse error: {err}"))
}

fn known_keys() -> Result<Vec<String>> {
    let defaults = toml::Value::try_from(ChunkingConfig::default())
        .map_err(|err| anyhow!("Failed to render default config: {err}"))?;
    Ok(defaults
        .as_table()
        .map(|table| table.keys().cloned().collect())
        .unwrap_or_default())
}
