//! Configuration management for agorachain

use crate::crypto::validate_checksum_chars;
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Construction-time parameters of a ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Required leading zero hex nibbles of a block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    /// Amount credited to a block's miner on top of collected fees.
    #[serde(default = "default_reward")]
    pub reward: u64,
    /// Hex characters of address checksum: 0 disables, otherwise even, 2..=8.
    #[serde(default = "default_checksum_chars")]
    pub checksum_chars: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            difficulty: default_difficulty(),
            reward: default_reward(),
            checksum_chars: default_checksum_chars(),
        }
    }
}

impl ChainConfig {
    /// Checks that the configured values can actually drive a ledger.
    pub fn validate(&self) -> Result<(), ChainError> {
        // A 32-byte hash holds 64 nibbles; anything above that can never match.
        if self.difficulty > 64 {
            return Err(ChainError::ConfigError(format!(
                "Difficulty must be at most 64 nibbles, got {}",
                self.difficulty
            )));
        }
        validate_checksum_chars(self.checksum_chars)?;
        Ok(())
    }
}

fn default_difficulty() -> u32 {
    2
}

fn default_reward() -> u64 {
    100
}

fn default_checksum_chars() -> usize {
    4
}

/// Loads a `ChainConfig` from a TOML file, falling back to defaults when the
/// file is absent or empty.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ChainConfig, ChainError> {
    let config_str = fs::read_to_string(path).unwrap_or_default();
    let config: ChainConfig = if config_str.is_empty() {
        ChainConfig::default()
    } else {
        toml::from_str(&config_str)
            .map_err(|e| ChainError::ConfigError(format!("Failed to parse config: {}", e)))?
    };

    config.validate()?;
    Ok(config)
}
