/// Validation logic for transactions separated from type definitions
use crate::blockchain::Blockchain;
use crate::crypto::{verify_signature, Address};
use crate::error::ChainError;
use crate::transaction::types::{
    CurrencyTx, MessageTx, NftBurnTx, NftMintTx, NftTransferTx, PoolCreateTx, PoolVoteTx,
    Transaction,
};

impl Transaction {
    /// Performs a full validation of this transaction against the committed
    /// chain. The pending queue is never consulted.
    pub fn validate(&self, chain: &Blockchain) -> Result<(), ChainError> {
        // Stateless signature check first.
        let signature = self.signature().ok_or_else(|| {
            ChainError::InvalidTransaction("Transaction not signed".to_string())
        })?;
        if !verify_signature(self.actor(), &self.calculate_hash(), signature) {
            return Err(ChainError::InvalidTransaction(
                "Signature verification failed".to_string(),
            ));
        }

        let actor = self.actor_address()?;
        match self {
            Transaction::Currency(tx) => tx.validate_against(chain, &actor),
            Transaction::NftMint(tx) => tx.validate_against(chain),
            Transaction::NftTransfer(tx) => tx.validate_against(chain, &actor),
            Transaction::NftBurn(tx) => tx.validate_against(chain, &actor),
            Transaction::PoolCreate(tx) => tx.validate_against(chain, &actor),
            Transaction::PoolVote(tx) => tx.validate_against(chain, &actor),
            Transaction::Message(tx) => tx.validate_against(chain, &actor),
        }
    }

    /// Pure predicate form of [`Transaction::validate`].
    pub fn is_valid(&self, chain: &Blockchain) -> bool {
        self.validate(chain).is_ok()
    }
}

impl CurrencyTx {
    fn validate_against(&self, chain: &Blockchain, actor: &Address) -> Result<(), ChainError> {
        if self.amount == 0 {
            return Err(ChainError::InvalidTransaction(
                "Transfer amount must be greater than zero".to_string(),
            ));
        }
        let required = self.amount.checked_add(self.fee).ok_or_else(|| {
            ChainError::InvalidTransaction("Amount plus fee overflows".to_string())
        })?;
        let balance = chain.balance(actor);
        if balance < required {
            return Err(ChainError::InvalidTransaction(format!(
                "Insufficient balance: {} has {} but amount + fee is {}",
                actor, balance, required
            )));
        }
        Ok(())
    }

    /// Validation entry point for a transfer embedded in a pool vote. The
    /// embedded transfer carries its own signature over its own hash.
    pub fn validate_embedded(&self, chain: &Blockchain) -> Result<(), ChainError> {
        let signature = self.signature.as_deref().ok_or_else(|| {
            ChainError::InvalidTransaction("Embedded transfer not signed".to_string())
        })?;
        if !verify_signature(&self.actor, &self.calculate_hash(), signature) {
            return Err(ChainError::InvalidTransaction(
                "Embedded transfer signature verification failed".to_string(),
            ));
        }
        let actor = Address::from_public_key_bytes(&self.actor)?;
        self.validate_against(chain, &actor)
    }
}

impl NftMintTx {
    fn validate_against(&self, chain: &Blockchain) -> Result<(), ChainError> {
        if self.name.is_empty() || self.description.is_empty() || self.image.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "NFT metadata name, description and image must be non-empty".to_string(),
            ));
        }
        // Mint ids are unique across the committed chain.
        let nft_id = self.nft_id();
        if chain.find_nft_mint(&nft_id).is_some() {
            return Err(ChainError::InvalidTransaction(format!(
                "NFT id {} is already minted",
                nft_id
            )));
        }
        Ok(())
    }
}

impl NftTransferTx {
    fn validate_against(&self, chain: &Blockchain, actor: &Address) -> Result<(), ChainError> {
        let owner = match chain.nft_owner(&self.nft_id) {
            Ok(owner) => owner,
            Err(ChainError::NftNotFound(id)) => {
                return Err(ChainError::InvalidTransaction(format!(
                    "NFT {} has not been minted",
                    id
                )))
            }
            Err(ChainError::NftBurned(id)) => {
                return Err(ChainError::InvalidTransaction(format!(
                    "NFT {} has been burned",
                    id
                )))
            }
            Err(e) => return Err(e),
        };
        if owner != *actor {
            return Err(ChainError::InvalidTransaction(format!(
                "Sender {} does not own NFT {} (owned by {})",
                actor, self.nft_id, owner
            )));
        }
        let balance = chain.balance(actor);
        if balance < self.fee {
            return Err(ChainError::InvalidTransaction(format!(
                "Insufficient balance for fee: {} has {} but fee is {}",
                actor, balance, self.fee
            )));
        }
        Ok(())
    }
}

impl NftBurnTx {
    fn validate_against(&self, chain: &Blockchain, actor: &Address) -> Result<(), ChainError> {
        let owner = match chain.nft_owner(&self.nft_id) {
            Ok(owner) => owner,
            Err(ChainError::NftNotFound(id)) => {
                return Err(ChainError::InvalidTransaction(format!(
                    "NFT {} has not been minted",
                    id
                )))
            }
            Err(ChainError::NftBurned(id)) => {
                return Err(ChainError::InvalidTransaction(format!(
                    "NFT {} is already burned",
                    id
                )))
            }
            Err(e) => return Err(e),
        };
        if owner != *actor {
            return Err(ChainError::InvalidTransaction(format!(
                "Sender {} does not own NFT {} (owned by {})",
                actor, self.nft_id, owner
            )));
        }
        Ok(())
    }
}

impl PoolCreateTx {
    fn validate_against(&self, chain: &Blockchain, actor: &Address) -> Result<(), ChainError> {
        if self.name.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Pool name must be non-empty".to_string(),
            ));
        }
        if self.options.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Pool must declare at least one option".to_string(),
            ));
        }
        let balance = chain.balance(actor);
        if balance < self.fee {
            return Err(ChainError::InvalidTransaction(format!(
                "Insufficient balance for fee: {} has {} but fee is {}",
                actor, balance, self.fee
            )));
        }
        Ok(())
    }
}

impl PoolVoteTx {
    fn validate_against(&self, chain: &Blockchain, actor: &Address) -> Result<(), ChainError> {
        let pool = chain.find_pool(&self.pool_id).ok_or_else(|| {
            ChainError::InvalidTransaction(format!("Pool {} does not exist", self.pool_id))
        })?;

        if self.option_index >= pool.options.len() {
            return Err(ChainError::InvalidTransaction(format!(
                "Option index {} out of range for pool with {} options",
                self.option_index,
                pool.options.len()
            )));
        }

        // One committed vote per identity per pool.
        if chain.has_pool_vote(&self.pool_id, actor) {
            return Err(ChainError::InvalidTransaction(format!(
                "{} has already voted in pool {}",
                actor, self.pool_id
            )));
        }

        if pool.vote_fee > 0 {
            let payment = self.payment.as_deref().ok_or_else(|| {
                ChainError::InvalidTransaction(format!(
                    "Pool {} requires a vote fee of {} but no payment is attached",
                    self.pool_id, pool.vote_fee
                ))
            })?;
            let pool_owner = Address::from_public_key_bytes(&pool.actor)?;
            if payment.to != pool_owner {
                return Err(ChainError::InvalidTransaction(format!(
                    "Vote payment must go to the pool creator {}",
                    pool_owner
                )));
            }
            if payment.amount != pool.vote_fee {
                return Err(ChainError::InvalidTransaction(format!(
                    "Vote payment of {} does not match the pool's vote fee of {}",
                    payment.amount, pool.vote_fee
                )));
            }
            if payment.actor != self.actor {
                return Err(ChainError::InvalidTransaction(
                    "Vote payment must be made by the voter".to_string(),
                ));
            }
            payment.validate_embedded(chain)?;
        } else if let Some(payment) = self.payment.as_deref() {
            // A voluntary payment on a free pool still has to be sound.
            payment.validate_embedded(chain)?;
        }

        Ok(())
    }
}

impl MessageTx {
    fn validate_against(&self, chain: &Blockchain, actor: &Address) -> Result<(), ChainError> {
        if self.content.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Message content must be non-empty".to_string(),
            ));
        }
        let balance = chain.balance(actor);
        if balance < self.fee {
            return Err(ChainError::InvalidTransaction(format!(
                "Insufficient balance for fee: {} has {} but fee is {}",
                actor, balance, self.fee
            )));
        }
        Ok(())
    }
}
