use crate::config::ChainConfig;
use crate::crypto::{Address, Identity};
use crate::error::ChainError;
use crate::miner::mine_block;
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};
use std::sync::atomic::AtomicBool;

use super::validation::has_valid_transactions;

pub type Sha256Hash = [u8; 32];

/// The unit of commitment: an ordered list of transactions sealed by
/// proof-of-work and linked to its predecessor by hash.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// Position in the chain. Assigned by the ledger and excluded from the
    /// block hash.
    pub index: u64,
    pub timestamp: u64,
    pub previous_hash: Sha256Hash,
    pub hash: Sha256Hash,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
    /// Address credited with the reward and fees. Genesis has none.
    pub miner: Option<Address>,
    /// Sum of every fee carried by the included transactions.
    pub collected_fees: u64,
}

impl Block {
    pub fn new(
        index: u64,
        previous_hash: Sha256Hash,
        transactions: Vec<Transaction>,
        miner: Option<Address>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let collected_fees = transactions.iter().map(|tx| tx.total_fee()).sum();

        let mut block = Block {
            index,
            timestamp,
            previous_hash,
            hash: [0u8; 32],
            nonce: 0,
            transactions,
            miner,
            collected_fees,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Deterministic hash over the block's payload. Covers the transaction
    /// list (hashes and signatures), nonce, miner, fees and timestamp; the
    /// positional `index` stays out of the digest.
    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash);
        for tx in &self.transactions {
            hasher.update(tx.calculate_hash());
            if let Some(signature) = tx.signature() {
                hasher.update(signature);
            }
        }
        hasher.update(self.nonce.to_le_bytes());
        if let Some(miner) = &self.miner {
            hasher.update(miner.payload());
        }
        hasher.update(self.collected_fees.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }
}

/// The ledger engine: the committed block sequence, mining parameters, and
/// the transient queue of validated-but-unmined transactions.
///
/// The chain exclusively owns all ledger state. Derived state (balances,
/// ownership, tallies) is recomputed from the committed blocks on demand;
/// see the query module.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    pub difficulty: u32,
    pub reward: u64,
    /// Validated transactions awaiting inclusion in a block. Transient:
    /// external packaging persists only the committed chain.
    #[serde(skip)]
    pub pending: Vec<Transaction>,
    /// Checksum length (hex characters) for addresses this ledger renders.
    pub checksum_chars: usize,
}

impl Blockchain {
    /// Create a new ledger with a pre-mined empty genesis block.
    pub fn new(difficulty: u32, reward: u64) -> Result<Self, ChainError> {
        Self::with_config(&ChainConfig {
            difficulty,
            reward,
            ..ChainConfig::default()
        })
    }

    /// Create a new ledger from explicit configuration.
    pub fn with_config(config: &ChainConfig) -> Result<Self, ChainError> {
        config.validate()?;

        let genesis = Block::new(0, [0u8; 32], vec![], None);
        let genesis = mine_block(genesis, config.difficulty, None)?;

        Ok(Blockchain {
            chain: vec![genesis],
            difficulty: config.difficulty,
            reward: config.reward,
            pending: Vec::new(),
            checksum_chars: config.checksum_chars,
        })
    }

    pub fn latest_block(&self) -> &Block {
        // The chain is seeded with genesis at construction and only ever
        // appended to.
        &self.chain[self.chain.len() - 1]
    }

    pub fn height(&self) -> u64 {
        self.latest_block().index
    }

    /// Renders an identity's address with this ledger's checksum length.
    pub fn address_of(&self, identity: &Identity) -> Result<Address, ChainError> {
        identity.address_with_checksum(self.checksum_chars)
    }

    /// Validates a transaction against the committed chain and, on success,
    /// enqueues it for the next block. Queued transactions are not
    /// cross-validated against each other until mined.
    pub fn submit(&mut self, transaction: Transaction) -> Result<(), ChainError> {
        transaction.validate_size()?;
        transaction.validate(self)?;
        tracing::debug!(
            "Queued {} transaction {}",
            transaction.type_tag(),
            transaction.hash_str()
        );
        self.pending.push(transaction);
        Ok(())
    }

    /// Assembles the pending queue into a candidate block, re-validates it,
    /// performs the proof-of-work search, and appends the result.
    ///
    /// Any failure leaves both the chain and the pending queue untouched.
    pub fn mine(&mut self, miner_address: &str) -> Result<Block, ChainError> {
        self.mine_with_cancel(miner_address, None)
    }

    /// Like [`Blockchain::mine`], but the nonce search aborts with
    /// [`ChainError::MiningCancelled`] once the flag is set.
    pub fn mine_with_cancel(
        &mut self,
        miner_address: &str,
        cancel: Option<&AtomicBool>,
    ) -> Result<Block, ChainError> {
        if miner_address.is_empty() {
            return Err(ChainError::InvalidAddress(
                "Miner address must be non-empty".to_string(),
            ));
        }
        let miner: Address = miner_address.parse()?;

        let (index, previous_hash) = {
            let previous = self.latest_block();
            (previous.index + 1, previous.hash)
        };
        let candidate = Block::new(index, previous_hash, self.pending.clone(), Some(miner));
        has_valid_transactions(&candidate, self)?;

        let mined = mine_block(candidate, self.difficulty, cancel)?;
        tracing::info!(
            "Mined block {} ({} transactions, {} fees collected) at difficulty {}",
            mined.index,
            mined.transactions.len(),
            mined.collected_fees,
            self.difficulty
        );

        self.chain.push(mined);
        self.pending.clear();
        Ok(self.latest_block().clone())
    }

    /// Walks the committed chain and reports the first block whose stored
    /// hash or previous-hash link does not hold.
    pub fn check_integrity(&self) -> Result<(), ChainError> {
        for i in 1..self.chain.len() {
            let block = &self.chain[i];
            let previous = &self.chain[i - 1];

            if block.hash != block.calculate_hash() {
                return Err(ChainError::IntegrityFailure {
                    index: block.index,
                    reason: "stored hash does not match recomputed hash".to_string(),
                });
            }
            if block.previous_hash != previous.hash {
                return Err(ChainError::IntegrityFailure {
                    index: block.index,
                    reason: "previous-hash link does not match prior block".to_string(),
                });
            }
        }
        Ok(())
    }

    /// True when every committed block's hash and link hold.
    pub fn is_valid(&self) -> bool {
        match self.check_integrity() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Chain integrity check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Identity;
    use crate::transaction::CurrencyTx;

    fn chain_with_funds(miner: &Identity) -> Blockchain {
        let mut chain = Blockchain::new(0, 100).unwrap();
        chain.mine(&miner.address().to_string()).unwrap();
        chain
    }

    #[test]
    fn test_new_chain_has_mined_genesis() {
        let chain = Blockchain::new(1, 50).unwrap();
        assert_eq!(chain.chain.len(), 1);
        let genesis = &chain.chain[0];
        assert_eq!(genesis.index, 0);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.miner.is_none());
        assert_eq!(genesis.previous_hash, [0u8; 32]);
        assert!(crate::miner::meets_difficulty(&genesis.hash, 1));
    }

    #[test]
    fn test_block_hash_excludes_index() {
        let mut block = Block::new(1, [0u8; 32], vec![], None);
        let hash = block.calculate_hash();
        block.index = 99;
        assert_eq!(block.calculate_hash(), hash);
        block.nonce = 1;
        assert_ne!(block.calculate_hash(), hash);
    }

    #[test]
    fn test_submit_rejects_invalid_and_keeps_queue_clean() {
        let mut chain = Blockchain::new(0, 100).unwrap();
        let broke = Identity::generate();

        let mut tx = Transaction::Currency(CurrencyTx::new(
            broke.public_key_bytes().to_vec(),
            Identity::generate().address(),
            10,
            0,
        ));
        tx.sign(&broke).unwrap();

        assert!(chain.submit(tx).is_err());
        assert!(chain.pending.is_empty());
    }

    #[test]
    fn test_mine_appends_and_clears_queue() {
        let miner = Identity::generate();
        let recipient = Identity::generate();
        let mut chain = chain_with_funds(&miner);

        let mut tx = Transaction::Currency(CurrencyTx::new(
            miner.public_key_bytes().to_vec(),
            recipient.address(),
            20,
            0,
        ));
        tx.sign(&miner).unwrap();
        chain.submit(tx).unwrap();
        assert_eq!(chain.pending.len(), 1);

        let block = chain.mine(&miner.address().to_string()).unwrap();
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions.len(), 1);
        assert!(chain.pending.is_empty());
        assert_eq!(chain.latest_block().hash, block.hash);
    }

    #[test]
    fn test_mine_rejects_malformed_miner_address() {
        let mut chain = Blockchain::new(0, 100).unwrap();
        assert!(matches!(
            chain.mine(""),
            Err(ChainError::InvalidAddress(_))
        ));
        assert!(matches!(
            chain.mine("not-an-address"),
            Err(ChainError::InvalidAddress(_))
        ));
        assert_eq!(chain.chain.len(), 1);
    }

    #[test]
    fn test_mine_failure_is_atomic() {
        let miner = Identity::generate();
        let mut chain = chain_with_funds(&miner);

        // Bypass submit to plant an unsigned transaction in the queue.
        let bad = Transaction::Currency(CurrencyTx::new(
            miner.public_key_bytes().to_vec(),
            Identity::generate().address(),
            20,
            0,
        ));
        chain.pending.push(bad);

        let height_before = chain.chain.len();
        assert!(chain.mine(&miner.address().to_string()).is_err());
        assert_eq!(chain.chain.len(), height_before);
        assert_eq!(chain.pending.len(), 1);
    }

    #[test]
    fn test_tampering_with_nonce_is_detected() {
        let miner = Identity::generate();
        let mut chain = chain_with_funds(&miner);
        assert!(chain.is_valid());

        chain.chain[1].nonce += 1;
        assert!(!chain.is_valid());
        assert!(matches!(
            chain.check_integrity(),
            Err(ChainError::IntegrityFailure { index: 1, .. })
        ));
    }

    #[test]
    fn test_tampering_with_transactions_is_detected() {
        let miner = Identity::generate();
        let recipient = Identity::generate();
        let mut chain = chain_with_funds(&miner);

        let mut tx = Transaction::Currency(CurrencyTx::new(
            miner.public_key_bytes().to_vec(),
            recipient.address(),
            20,
            0,
        ));
        tx.sign(&miner).unwrap();
        chain.submit(tx).unwrap();
        chain.mine(&miner.address().to_string()).unwrap();
        assert!(chain.is_valid());

        // Rewrite the committed transfer to pay someone else.
        let thief = Identity::generate();
        if let Transaction::Currency(t) = &mut chain.chain[2].transactions[0] {
            t.to = thief.address();
        }
        assert!(!chain.is_valid());
    }

    #[test]
    fn test_broken_link_is_detected() {
        let miner = Identity::generate();
        let mut chain = chain_with_funds(&miner);
        chain.mine(&miner.address().to_string()).unwrap();
        assert!(chain.is_valid());

        chain.chain[2].previous_hash = [7u8; 32];
        // Re-seal the tampered block so only the link check can catch it.
        chain.chain[2].hash = chain.chain[2].calculate_hash();
        assert!(!chain.is_valid());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(Blockchain::new(65, 100).is_err());
    }
}
