//! Error types for agorachain

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Identity holds no secret key and cannot sign")]
    NotASigner,
    #[error("Signing identity does not match the transaction actor")]
    SignerMismatch,
    #[error("NFT not found: {0}")]
    NftNotFound(String),
    #[error("NFT has been burned: {0}")]
    NftBurned(String),
    #[error("Pool not found: {0}")]
    PoolNotFound(String),
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Integrity failure at block {index}: {reason}")]
    IntegrityFailure { index: u64, reason: String },
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
