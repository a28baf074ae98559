//! Encoding helpers for external collaborators.
//!
//! Persistence, archival and P2P layers live outside the core; they consume
//! blocks and transaction lists through serde. These helpers fix the two
//! encodings the crate standardizes on: JSON for interchange and bincode for
//! compact binary. Transaction lists encode polymorphically via the enum's
//! tagged representation (see [`Transaction::type_tag`]).

use crate::blockchain::{Block, Blockchain};
use crate::error::ChainError;
use crate::transaction::Transaction;

pub fn transactions_to_json(transactions: &[Transaction]) -> Result<String, ChainError> {
    Ok(serde_json::to_string(transactions)?)
}

pub fn transactions_from_json(json: &str) -> Result<Vec<Transaction>, ChainError> {
    Ok(serde_json::from_str(json)?)
}

pub fn block_to_bytes(block: &Block) -> Result<Vec<u8>, ChainError> {
    Ok(bincode::serialize(block)?)
}

pub fn block_from_bytes(bytes: &[u8]) -> Result<Block, ChainError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Serializes the committed ledger: chain, difficulty and reward. The
/// pending queue is transient and not part of the encoding.
pub fn ledger_to_json(chain: &Blockchain) -> Result<String, ChainError> {
    Ok(serde_json::to_string(chain)?)
}

pub fn ledger_from_json(json: &str) -> Result<Blockchain, ChainError> {
    Ok(serde_json::from_str(json)?)
}
