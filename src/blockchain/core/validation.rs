use crate::blockchain::core::chain::{Block, Blockchain};
use crate::error::ChainError;
use crate::transaction::Transaction;
use std::collections::HashSet;

/// Checks a candidate block before the proof-of-work search: the block must
/// name a miner and every contained transaction must validate against the
/// pre-commit chain state.
pub fn has_valid_transactions(block: &Block, chain: &Blockchain) -> Result<(), ChainError> {
    if block.miner.is_none() {
        return Err(ChainError::InvalidBlock(
            "Block has no miner address".to_string(),
        ));
    }

    validate_no_duplicate_events(block)?;

    for tx in &block.transactions {
        tx.validate(chain).map_err(|e| {
            ChainError::InvalidBlock(format!(
                "Transaction {} is invalid: {}",
                tx.hash_str(),
                e
            ))
        })?;
    }
    Ok(())
}

/// Predicate form of [`has_valid_transactions`].
pub fn block_is_valid(block: &Block, chain: &Blockchain) -> bool {
    has_valid_transactions(block, chain).is_ok()
}

/// One pass over a block's transactions rejecting events that may occur at
/// most once per block: two mints of the same NFT id, or two votes by the
/// same actor in the same pool. Per-transaction validation only sees the
/// committed chain, so intra-block duplicates are caught here.
pub fn validate_no_duplicate_events(block: &Block) -> Result<(), ChainError> {
    let mut seen_mints = HashSet::new();
    let mut seen_votes = HashSet::new();

    for tx in &block.transactions {
        match tx {
            Transaction::NftMint(mint) => {
                if !seen_mints.insert(mint.nft_id()) {
                    return Err(ChainError::InvalidBlock(format!(
                        "NFT id {} is minted twice in one block",
                        mint.nft_id()
                    )));
                }
            }
            Transaction::PoolVote(vote) => {
                if !seen_votes.insert((vote.pool_id.clone(), vote.actor.clone())) {
                    return Err(ChainError::InvalidBlock(format!(
                        "Actor votes twice in pool {} in one block",
                        vote.pool_id
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Identity;
    use crate::transaction::{NftMintTx, PoolVoteTx};

    #[test]
    fn test_block_without_miner_is_invalid() {
        let chain = Blockchain::new(0, 100).unwrap();
        let block = Block::new(1, chain.latest_block().hash, vec![], None);
        assert!(!block_is_valid(&block, &chain));
    }

    #[test]
    fn test_duplicate_mint_in_one_block_is_rejected() {
        let minter = Identity::generate();
        let mint = Transaction::NftMint(NftMintTx::new(
            minter.public_key_bytes().to_vec(),
            "Sunrise".to_string(),
            "oil on canvas".to_string(),
            "ipfs://sunrise".to_string(),
            0,
        ));
        let block = Block::new(1, [0u8; 32], vec![mint.clone(), mint], None);
        assert!(validate_no_duplicate_events(&block).is_err());
    }

    #[test]
    fn test_double_vote_in_one_block_is_rejected() {
        let voter = Identity::generate();
        let vote = Transaction::PoolVote(PoolVoteTx::new(
            voter.public_key_bytes().to_vec(),
            "pool".to_string(),
            0,
            None,
            0,
        ));
        let block = Block::new(1, [0u8; 32], vec![vote.clone(), vote], None);
        assert!(validate_no_duplicate_events(&block).is_err());
    }
}
