/// Transaction types for agorachain
use crate::blockchain::Sha256Hash;
use crate::crypto::{Address, Identity};
use crate::error::ChainError;
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// A signed event that can occur in a block.
///
/// The serde representation is externally tagged with the same snake_case
/// names returned by [`Transaction::type_tag`], which is what external codecs
/// dispatch on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transaction {
    Currency(CurrencyTx),
    NftMint(NftMintTx),
    NftTransfer(NftTransferTx),
    NftBurn(NftBurnTx),
    PoolCreate(PoolCreateTx),
    PoolVote(PoolVoteTx),
    Message(MessageTx),
}

impl Transaction {
    /// Stable string tag identifying the variant for polymorphic codecs.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Transaction::Currency(_) => "currency",
            Transaction::NftMint(_) => "nft_mint",
            Transaction::NftTransfer(_) => "nft_transfer",
            Transaction::NftBurn(_) => "nft_burn",
            Transaction::PoolCreate(_) => "pool_create",
            Transaction::PoolVote(_) => "pool_vote",
            Transaction::Message(_) => "message",
        }
    }

    /// The actor's compressed public key bytes.
    pub fn actor(&self) -> &[u8] {
        match self {
            Transaction::Currency(tx) => &tx.actor,
            Transaction::NftMint(tx) => &tx.actor,
            Transaction::NftTransfer(tx) => &tx.actor,
            Transaction::NftBurn(tx) => &tx.actor,
            Transaction::PoolCreate(tx) => &tx.actor,
            Transaction::PoolVote(tx) => &tx.actor,
            Transaction::Message(tx) => &tx.actor,
        }
    }

    /// The address derived from the actor's public key.
    pub fn actor_address(&self) -> Result<Address, ChainError> {
        Address::from_public_key_bytes(self.actor())
    }

    /// The fee declared on this transaction.
    pub fn fee(&self) -> u64 {
        match self {
            Transaction::Currency(tx) => tx.fee,
            Transaction::NftMint(tx) => tx.fee,
            Transaction::NftTransfer(tx) => tx.fee,
            Transaction::NftBurn(tx) => tx.fee,
            Transaction::PoolCreate(tx) => tx.fee,
            Transaction::PoolVote(tx) => tx.fee,
            Transaction::Message(tx) => tx.fee,
        }
    }

    /// Every fee this transaction carries, including the fee of an embedded
    /// vote payment. This is the amount a miner collects for including it.
    pub fn total_fee(&self) -> u64 {
        match self {
            Transaction::PoolVote(tx) => {
                tx.fee + tx.payment.as_ref().map_or(0, |payment| payment.fee)
            }
            other => other.fee(),
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Transaction::Currency(tx) => tx.timestamp,
            Transaction::NftMint(tx) => tx.timestamp,
            Transaction::NftTransfer(tx) => tx.timestamp,
            Transaction::NftBurn(tx) => tx.timestamp,
            Transaction::PoolCreate(tx) => tx.timestamp,
            Transaction::PoolVote(tx) => tx.timestamp,
            Transaction::Message(tx) => tx.timestamp,
        }
    }

    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            Transaction::Currency(tx) => tx.signature.as_deref(),
            Transaction::NftMint(tx) => tx.signature.as_deref(),
            Transaction::NftTransfer(tx) => tx.signature.as_deref(),
            Transaction::NftBurn(tx) => tx.signature.as_deref(),
            Transaction::PoolCreate(tx) => tx.signature.as_deref(),
            Transaction::PoolVote(tx) => tx.signature.as_deref(),
            Transaction::Message(tx) => tx.signature.as_deref(),
        }
    }

    fn signature_slot(&mut self) -> &mut Option<Vec<u8>> {
        match self {
            Transaction::Currency(tx) => &mut tx.signature,
            Transaction::NftMint(tx) => &mut tx.signature,
            Transaction::NftTransfer(tx) => &mut tx.signature,
            Transaction::NftBurn(tx) => &mut tx.signature,
            Transaction::PoolCreate(tx) => &mut tx.signature,
            Transaction::PoolVote(tx) => &mut tx.signature,
            Transaction::Message(tx) => &mut tx.signature,
        }
    }

    /// Calculate the hash of this transaction. The signature is excluded so
    /// that signing does not change what is signed.
    pub fn calculate_hash(&self) -> Sha256Hash {
        match self {
            Transaction::Currency(tx) => tx.calculate_hash(),
            Transaction::NftMint(tx) => tx.calculate_hash(),
            Transaction::NftTransfer(tx) => tx.calculate_hash(),
            Transaction::NftBurn(tx) => tx.calculate_hash(),
            Transaction::PoolCreate(tx) => tx.calculate_hash(),
            Transaction::PoolVote(tx) => tx.calculate_hash(),
            Transaction::Message(tx) => tx.calculate_hash(),
        }
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.calculate_hash())
    }

    /// Signs the transaction with the actor's own identity. Fails with
    /// [`ChainError::SignerMismatch`] when the identity is not the actor.
    pub fn sign(&mut self, identity: &Identity) -> Result<(), ChainError> {
        if identity.public_key_bytes()[..] != *self.actor() {
            return Err(ChainError::SignerMismatch);
        }
        self.sign_with_key(identity)
    }

    /// Signs with an arbitrary identity, bypassing the actor check. Unless
    /// the key happens to match the actor, verification will reject the
    /// result.
    pub fn sign_with_key(&mut self, identity: &Identity) -> Result<(), ChainError> {
        let signature = identity.sign(&self.calculate_hash())?.to_vec();
        *self.signature_slot() = Some(signature);
        Ok(())
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Currency transfer: moves an amount from the actor to a recipient.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CurrencyTx {
    pub actor: Vec<u8>,
    pub to: Address,
    pub amount: u64,
    pub fee: u64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

impl CurrencyTx {
    pub fn new(actor: Vec<u8>, to: Address, amount: u64, fee: u64) -> Self {
        CurrencyTx {
            actor,
            to,
            amount,
            fee,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update("currency".as_bytes());
        hasher.update(&self.actor);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.to.payload());
        hasher.update(self.amount.to_le_bytes());
        hasher.finalize().into()
    }

    /// Standalone signing, used for transfers embedded in pool votes.
    pub fn sign(&mut self, identity: &Identity) -> Result<(), ChainError> {
        if identity.public_key_bytes()[..] != *self.actor {
            return Err(ChainError::SignerMismatch);
        }
        self.signature = Some(identity.sign(&self.calculate_hash())?.to_vec());
        Ok(())
    }
}

/// NFT mint: brings a token with the given metadata into existence.
/// The token's id is the hex encoding of the mint transaction's hash.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NftMintTx {
    pub actor: Vec<u8>,
    pub name: String,
    pub description: String,
    pub image: String,
    pub fee: u64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

impl NftMintTx {
    pub fn new(actor: Vec<u8>, name: String, description: String, image: String, fee: u64) -> Self {
        NftMintTx {
            actor,
            name,
            description,
            image,
            fee,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update("nft_mint".as_bytes());
        hasher.update(&self.actor);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update(self.description.as_bytes());
        hasher.update(self.image.as_bytes());
        hasher.finalize().into()
    }

    /// The token id minted by this transaction.
    pub fn nft_id(&self) -> String {
        hex::encode(self.calculate_hash())
    }
}

/// NFT transfer: moves ownership of a minted token to a new address.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NftTransferTx {
    pub actor: Vec<u8>,
    pub nft_id: String,
    pub to: Address,
    pub fee: u64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

impl NftTransferTx {
    pub fn new(actor: Vec<u8>, nft_id: String, to: Address, fee: u64) -> Self {
        NftTransferTx {
            actor,
            nft_id,
            to,
            fee,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update("nft_transfer".as_bytes());
        hasher.update(&self.actor);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.nft_id.as_bytes());
        hasher.update(self.to.payload());
        hasher.finalize().into()
    }
}

/// NFT burn: permanently retires a minted token.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NftBurnTx {
    pub actor: Vec<u8>,
    pub nft_id: String,
    pub fee: u64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

impl NftBurnTx {
    pub fn new(actor: Vec<u8>, nft_id: String, fee: u64) -> Self {
        NftBurnTx {
            actor,
            nft_id,
            fee,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update("nft_burn".as_bytes());
        hasher.update(&self.actor);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.nft_id.as_bytes());
        hasher.finalize().into()
    }
}

/// Pool creation: opens a named vote with a fixed option list.
/// The pool's id is the hex encoding of this transaction's hash.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PoolCreateTx {
    pub actor: Vec<u8>,
    pub name: String,
    pub options: Vec<String>,
    /// Amount each voter must pay to the pool creator; 0 means free voting.
    pub vote_fee: u64,
    pub fee: u64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

impl PoolCreateTx {
    pub fn new(actor: Vec<u8>, name: String, options: Vec<String>, vote_fee: u64, fee: u64) -> Self {
        PoolCreateTx {
            actor,
            name,
            options,
            vote_fee,
            fee,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update("pool_create".as_bytes());
        hasher.update(&self.actor);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.name.as_bytes());
        for option in &self.options {
            hasher.update(option.as_bytes());
        }
        hasher.update(self.vote_fee.to_le_bytes());
        hasher.finalize().into()
    }

    /// The pool id created by this transaction.
    pub fn pool_id(&self) -> String {
        hex::encode(self.calculate_hash())
    }
}

/// Pool vote: one option selection, optionally carrying the pool's vote fee
/// as an embedded currency transfer to the pool creator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PoolVoteTx {
    pub actor: Vec<u8>,
    pub pool_id: String,
    pub option_index: usize,
    pub payment: Option<Box<CurrencyTx>>,
    pub fee: u64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

impl PoolVoteTx {
    pub fn new(
        actor: Vec<u8>,
        pool_id: String,
        option_index: usize,
        payment: Option<Box<CurrencyTx>>,
        fee: u64,
    ) -> Self {
        PoolVoteTx {
            actor,
            pool_id,
            option_index,
            payment,
            fee,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update("pool_vote".as_bytes());
        hasher.update(&self.actor);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.pool_id.as_bytes());
        hasher.update((self.option_index as u64).to_le_bytes());
        if let Some(payment) = &self.payment {
            hasher.update(payment.calculate_hash());
        }
        hasher.finalize().into()
    }
}

/// Message: an on-chain note from the actor to a recipient.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageTx {
    pub actor: Vec<u8>,
    pub to: Address,
    pub content: String,
    pub fee: u64,
    pub timestamp: u64,
    pub signature: Option<Vec<u8>>,
}

impl MessageTx {
    pub fn new(actor: Vec<u8>, to: Address, content: String, fee: u64) -> Self {
        MessageTx {
            actor,
            to,
            content,
            fee,
            timestamp: now_millis(),
            signature: None,
        }
    }

    pub fn calculate_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update("message".as_bytes());
        hasher.update(&self.actor);
        hasher.update(self.fee.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.to.payload());
        hasher.update(self.content.as_bytes());
        hasher.finalize().into()
    }
}
