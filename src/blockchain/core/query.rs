//! Replay queries: every answer is recomputed by a full scan over the
//! committed chain. No balance, ownership or tally index is maintained.

use crate::blockchain::core::chain::Blockchain;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::{NftMintTx, PoolCreateTx, Transaction};

impl Blockchain {
    /// All transactions in committed blocks, in chain order.
    pub fn committed_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.chain.iter().flat_map(|block| block.transactions.iter())
    }

    /// The general-purpose read primitive: every committed transaction
    /// matching the predicate, in chain order.
    pub fn find_transactions<P>(&self, predicate: P) -> Vec<&Transaction>
    where
        P: Fn(&Transaction) -> bool,
    {
        self.committed_transactions()
            .filter(|tx| predicate(tx))
            .collect()
    }

    /// Replays the committed chain to compute an address's balance:
    /// currency received, plus reward and fees for every block the address
    /// mined, minus currency sent and fees paid.
    pub fn balance(&self, address: &Address) -> u64 {
        let mut balance: i128 = 0;

        for block in &self.chain {
            if block.miner.as_ref() == Some(address) {
                balance += self.reward as i128 + block.collected_fees as i128;
            }

            for tx in &block.transactions {
                let is_actor = tx.actor_address().ok().as_ref() == Some(address);

                match tx {
                    Transaction::Currency(t) => {
                        if t.to == *address {
                            balance += t.amount as i128;
                        }
                        if is_actor {
                            balance -= t.amount as i128 + t.fee as i128;
                        }
                    }
                    Transaction::PoolVote(t) => {
                        if is_actor {
                            balance -= t.fee as i128;
                        }
                        if let Some(payment) = &t.payment {
                            if payment.to == *address {
                                balance += payment.amount as i128;
                            }
                            let pays = Address::from_public_key_bytes(&payment.actor).ok();
                            if pays.as_ref() == Some(address) {
                                balance -= payment.amount as i128 + payment.fee as i128;
                            }
                        }
                    }
                    _ => {
                        if is_actor {
                            balance -= tx.fee() as i128;
                        }
                    }
                }
            }
        }

        // A valid chain never lets an address overdraw.
        balance.max(0) as u64
    }

    /// The committed mint of an NFT id, if any.
    pub fn find_nft_mint(&self, nft_id: &str) -> Option<&NftMintTx> {
        self.committed_transactions().find_map(|tx| match tx {
            Transaction::NftMint(mint) if mint.nft_id() == nft_id => Some(mint),
            _ => None,
        })
    }

    /// True once a committed burn exists for the NFT id.
    pub fn nft_is_burned(&self, nft_id: &str) -> bool {
        self.committed_transactions().any(|tx| match tx {
            Transaction::NftBurn(burn) => burn.nft_id == nft_id,
            _ => false,
        })
    }

    /// Current owner of a minted, unburned NFT: the recipient of the latest
    /// committed transfer, or the minting actor when never transferred.
    pub fn nft_owner(&self, nft_id: &str) -> Result<Address, ChainError> {
        let mint = self
            .find_nft_mint(nft_id)
            .ok_or_else(|| ChainError::NftNotFound(nft_id.to_string()))?;
        if self.nft_is_burned(nft_id) {
            return Err(ChainError::NftBurned(nft_id.to_string()));
        }

        let latest_transfer = self
            .committed_transactions()
            .filter_map(|tx| match tx {
                Transaction::NftTransfer(transfer) if transfer.nft_id == nft_id => Some(transfer),
                _ => None,
            })
            .last();

        match latest_transfer {
            Some(transfer) => Ok(transfer.to),
            None => Address::from_public_key_bytes(&mint.actor),
        }
    }

    /// The committed creation of a pool id, if any.
    pub fn find_pool(&self, pool_id: &str) -> Option<&PoolCreateTx> {
        self.committed_transactions().find_map(|tx| match tx {
            Transaction::PoolCreate(pool) if pool.pool_id() == pool_id => Some(pool),
            _ => None,
        })
    }

    /// True once the actor has a committed vote in the pool.
    pub fn has_pool_vote(&self, pool_id: &str, actor: &Address) -> bool {
        self.committed_transactions().any(|tx| match tx {
            Transaction::PoolVote(vote) => {
                vote.pool_id == pool_id
                    && Address::from_public_key_bytes(&vote.actor).ok().as_ref() == Some(actor)
            }
            _ => false,
        })
    }

    /// Tally of a pool: one slot per option, each counting the committed,
    /// in-range votes for that option.
    pub fn pool_votes(&self, pool_id: &str) -> Result<Vec<u64>, ChainError> {
        let pool = self
            .find_pool(pool_id)
            .ok_or_else(|| ChainError::PoolNotFound(pool_id.to_string()))?;

        let mut tally = vec![0u64; pool.options.len()];
        for tx in self.committed_transactions() {
            if let Transaction::PoolVote(vote) = tx {
                if vote.pool_id == pool_id && vote.option_index < tally.len() {
                    tally[vote.option_index] += 1;
                }
            }
        }
        Ok(tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Identity;
    use crate::transaction::{CurrencyTx, MessageTx, NftMintTx};

    fn mined_chain(miner: &Identity, blocks: usize) -> Blockchain {
        let mut chain = Blockchain::new(0, 100).unwrap();
        for _ in 0..blocks {
            chain.mine(&miner.address().to_string()).unwrap();
        }
        chain
    }

    #[test]
    fn test_balance_credits_miner_with_reward_and_fees() {
        let miner = Identity::generate();
        let mut chain = mined_chain(&miner, 1);
        assert_eq!(chain.balance(&miner.address()), 100);

        // A fee-carrying message: the fee moves from the actor to the miner.
        let mut tx = Transaction::Message(MessageTx::new(
            miner.public_key_bytes().to_vec(),
            Identity::generate().address(),
            "hello".to_string(),
            7,
        ));
        tx.sign(&miner).unwrap();
        chain.submit(tx).unwrap();
        chain.mine(&miner.address().to_string()).unwrap();

        // 100 (first block) - 7 (fee paid) + 100 + 7 (second block).
        assert_eq!(chain.balance(&miner.address()), 200);
    }

    #[test]
    fn test_balance_tracks_transfers() {
        let a = Identity::generate();
        let b = Identity::generate();
        let mut chain = mined_chain(&a, 1);

        let mut tx = Transaction::Currency(CurrencyTx::new(
            a.public_key_bytes().to_vec(),
            b.address(),
            30,
            0,
        ));
        tx.sign(&a).unwrap();
        chain.submit(tx).unwrap();
        chain.mine(&a.address().to_string()).unwrap();

        assert_eq!(chain.balance(&b.address()), 30);
        assert_eq!(chain.balance(&a.address()), 100 - 30 + 100);
    }

    #[test]
    fn test_balance_of_unknown_address_is_zero() {
        let chain = Blockchain::new(0, 100).unwrap();
        assert_eq!(chain.balance(&Identity::generate().address()), 0);
    }

    #[test]
    fn test_find_transactions_scans_all_blocks() {
        let miner = Identity::generate();
        let mut chain = mined_chain(&miner, 1);

        for content in ["one", "two"] {
            let mut tx = Transaction::Message(MessageTx::new(
                miner.public_key_bytes().to_vec(),
                Identity::generate().address(),
                content.to_string(),
                0,
            ));
            tx.sign(&miner).unwrap();
            chain.submit(tx).unwrap();
            chain.mine(&miner.address().to_string()).unwrap();
        }

        let messages =
            chain.find_transactions(|tx| matches!(tx, Transaction::Message(_)));
        assert_eq!(messages.len(), 2);
        let currency =
            chain.find_transactions(|tx| matches!(tx, Transaction::Currency(_)));
        assert!(currency.is_empty());
    }

    #[test]
    fn test_nft_owner_of_unminted_id_errors() {
        let chain = Blockchain::new(0, 100).unwrap();
        assert!(matches!(
            chain.nft_owner("no-such-id"),
            Err(ChainError::NftNotFound(_))
        ));
    }

    #[test]
    fn test_nft_owner_defaults_to_minter() {
        let miner = Identity::generate();
        let mut chain = mined_chain(&miner, 1);

        let mint = NftMintTx::new(
            miner.public_key_bytes().to_vec(),
            "Sunrise".to_string(),
            "oil on canvas".to_string(),
            "ipfs://sunrise".to_string(),
            0,
        );
        let nft_id = mint.nft_id();
        let mut tx = Transaction::NftMint(mint);
        tx.sign(&miner).unwrap();
        chain.submit(tx).unwrap();
        chain.mine(&miner.address().to_string()).unwrap();

        assert_eq!(chain.nft_owner(&nft_id).unwrap(), miner.address());
    }

    #[test]
    fn test_pool_votes_of_unknown_pool_errors() {
        let chain = Blockchain::new(0, 100).unwrap();
        assert!(matches!(
            chain.pool_votes("no-such-pool"),
            Err(ChainError::PoolNotFound(_))
        ));
    }
}
