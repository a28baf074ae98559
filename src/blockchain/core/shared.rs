//! Shared handle over a ledger: one exclusive lock serializes every
//! mutation, shared read access serves queries.

use crate::blockchain::core::chain::{Block, Blockchain};
use crate::config::ChainConfig;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::Transaction;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// A cloneable, thread-safe ledger handle.
///
/// `submit` and `mine` hold the write lock for their full read-modify-write
/// sequence (for `mine`, that spans assembly, re-validation, the
/// proof-of-work search and the append), so two miners can never consume
/// the pending queue twice. Queries take the read lock and therefore always
/// observe a fully appended prefix of the chain.
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<Blockchain>>,
}

impl SharedLedger {
    pub fn new(difficulty: u32, reward: u64) -> Result<Self, ChainError> {
        Ok(SharedLedger::from_chain(Blockchain::new(difficulty, reward)?))
    }

    pub fn with_config(config: &ChainConfig) -> Result<Self, ChainError> {
        Ok(SharedLedger::from_chain(Blockchain::with_config(config)?))
    }

    pub fn from_chain(chain: Blockchain) -> Self {
        SharedLedger {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    pub fn submit(&self, transaction: Transaction) -> Result<(), ChainError> {
        self.inner.write().submit(transaction)
    }

    pub fn mine(&self, miner_address: &str) -> Result<Block, ChainError> {
        self.inner.write().mine(miner_address)
    }

    pub fn mine_with_cancel(
        &self,
        miner_address: &str,
        cancel: Option<&AtomicBool>,
    ) -> Result<Block, ChainError> {
        self.inner.write().mine_with_cancel(miner_address, cancel)
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.inner.read().balance(address)
    }

    pub fn nft_owner(&self, nft_id: &str) -> Result<Address, ChainError> {
        self.inner.read().nft_owner(nft_id)
    }

    pub fn pool_votes(&self, pool_id: &str) -> Result<Vec<u64>, ChainError> {
        self.inner.read().pool_votes(pool_id)
    }

    pub fn is_valid(&self) -> bool {
        self.inner.read().is_valid()
    }

    pub fn height(&self) -> u64 {
        self.inner.read().height()
    }

    /// A read guard for compound queries that need one consistent snapshot
    /// across several calls.
    pub fn read(&self) -> RwLockReadGuard<'_, Blockchain> {
        self.inner.read()
    }
}
