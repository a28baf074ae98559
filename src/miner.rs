//! Proof-of-work mining: nonce search under a leading-nibble difficulty target

use crate::blockchain::{Block, Sha256Hash};
use crate::error::ChainError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Returns true when the hash's leading `difficulty` hex nibbles are zero.
pub fn meets_difficulty(hash: &Sha256Hash, difficulty: u32) -> bool {
    for i in 0..difficulty as usize {
        let byte = match hash.get(i / 2) {
            Some(byte) => *byte,
            None => return false,
        };
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if nibble != 0 {
            return false;
        }
    }
    true
}

/// Searches for a nonce that makes the block's hash meet the difficulty.
///
/// The search is CPU-bound and blocking; a caller that wants to abort an
/// unreachable target passes a flag and sets it from another thread. At
/// difficulty 0 the first computed hash is accepted without searching.
pub fn mine_block(
    mut block: Block,
    difficulty: u32,
    cancel: Option<&AtomicBool>,
) -> Result<Block, ChainError> {
    let mut attempts: u64 = 0;
    loop {
        block.hash = block.calculate_hash();
        if meets_difficulty(&block.hash, difficulty) {
            tracing::debug!(
                "Mined block {} after {} attempts (difficulty {})",
                hex::encode(block.hash),
                attempts + 1,
                difficulty
            );
            return Ok(block);
        }
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(ChainError::MiningCancelled);
            }
        }
        block.nonce = block.nonce.wrapping_add(1);
        attempts += 1;
    }
}
