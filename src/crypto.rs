//! Cryptographic primitives for agorachain

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// A thread-safe, lazily initialized Secp256k1 context.
/// This prevents repeated, unnecessary context creation.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Text prefix of every rendered address.
pub const ADDRESS_PREFIX: &str = "ag";

/// Number of public-key digest bytes kept as the address payload.
pub const ADDRESS_PAYLOAD_SIZE: usize = 20;

/// Checksum length (hex characters) used when no explicit length is configured.
pub const DEFAULT_CHECKSUM_CHARS: usize = 4;

/// Largest supported checksum length in hex characters.
pub const MAX_CHECKSUM_CHARS: usize = 8;

/// Checks that a configured checksum length is usable: zero (disabled) or an
/// even number of hex characters between 2 and 8.
pub fn validate_checksum_chars(chars: usize) -> Result<(), ChainError> {
    if chars == 0 || (chars % 2 == 0 && (2..=MAX_CHECKSUM_CHARS).contains(&chars)) {
        Ok(())
    } else {
        Err(ChainError::ConfigError(format!(
            "Checksum length must be 0 or an even value in 2..={}, got {}",
            MAX_CHECKSUM_CHARS, chars
        )))
    }
}

fn payload_of(public_key: &PublicKey) -> [u8; ADDRESS_PAYLOAD_SIZE] {
    let digest = Sha256::digest(public_key.serialize());
    let mut payload = [0u8; ADDRESS_PAYLOAD_SIZE];
    payload.copy_from_slice(&digest[..ADDRESS_PAYLOAD_SIZE]);
    payload
}

/// An account identifier: a truncated SHA-256 digest of a compressed public
/// key, rendered as `ag` + hex payload + optional hex checksum.
///
/// Equality and hashing consider the payload only, so the same key compares
/// equal regardless of the checksum length it was rendered with.
#[derive(Debug, Clone, Copy)]
pub struct Address {
    payload: [u8; ADDRESS_PAYLOAD_SIZE],
    checksum_chars: u8,
}

impl Address {
    fn new(payload: [u8; ADDRESS_PAYLOAD_SIZE], checksum_chars: usize) -> Self {
        Address {
            payload,
            checksum_chars: checksum_chars as u8,
        }
    }

    /// Derives the address of a public key using the given checksum length.
    pub fn derive(public_key: &PublicKey, checksum_chars: usize) -> Result<Self, ChainError> {
        validate_checksum_chars(checksum_chars)?;
        Ok(Address::new(payload_of(public_key), checksum_chars))
    }

    /// Derives the address of a serialized compressed public key, using the
    /// default checksum length.
    pub fn from_public_key_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let public_key = PublicKey::from_slice(bytes)
            .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;
        Ok(Address::new(payload_of(&public_key), DEFAULT_CHECKSUM_CHARS))
    }

    pub fn payload(&self) -> &[u8; ADDRESS_PAYLOAD_SIZE] {
        &self.payload
    }

    /// The checksum suffix for this address, possibly empty.
    pub fn checksum(&self) -> String {
        checksum_of(&self.payload, self.checksum_chars as usize)
    }

    /// Returns true if the text parses as a well-formed address whose
    /// checksum, when present, matches. Never panics on malformed input.
    pub fn is_valid_text(text: &str) -> bool {
        text.parse::<Address>().is_ok()
    }
}

fn checksum_of(payload: &[u8; ADDRESS_PAYLOAD_SIZE], chars: usize) -> String {
    let mut digest = hex::encode(Sha256::digest(payload));
    digest.truncate(chars);
    digest
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl Eq for Address {}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.payload.hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            ADDRESS_PREFIX,
            hex::encode(self.payload),
            self.checksum()
        )
    }
}

impl FromStr for Address {
    type Err = ChainError;

    fn from_str(text: &str) -> Result<Self, ChainError> {
        let rest = text.strip_prefix(ADDRESS_PREFIX).ok_or_else(|| {
            ChainError::InvalidAddress(format!("Address must start with '{}'", ADDRESS_PREFIX))
        })?;

        if !rest.is_ascii() {
            return Err(ChainError::InvalidAddress(
                "Address must be ASCII hex".to_string(),
            ));
        }
        let payload_hex_len = ADDRESS_PAYLOAD_SIZE * 2;
        if rest.len() < payload_hex_len {
            return Err(ChainError::InvalidAddress(format!(
                "Address payload must be {} hex characters, got {}",
                payload_hex_len,
                rest.len()
            )));
        }
        let (payload_hex, checksum_hex) = rest.split_at(payload_hex_len);

        let bytes = hex::decode(payload_hex)
            .map_err(|e| ChainError::InvalidAddress(format!("Invalid hex payload: {}", e)))?;
        let mut payload = [0u8; ADDRESS_PAYLOAD_SIZE];
        payload.copy_from_slice(&bytes);

        let chars = checksum_hex.len();
        if chars > 0 {
            validate_checksum_chars(chars).map_err(|_| {
                ChainError::InvalidAddress(format!(
                    "Checksum must be an even length of 2..={} hex characters, got {}",
                    MAX_CHECKSUM_CHARS, chars
                ))
            })?;
            if checksum_hex.to_ascii_lowercase() != checksum_of(&payload, chars) {
                return Err(ChainError::InvalidAddress(
                    "Checksum mismatch".to_string(),
                ));
            }
        }

        Ok(Address::new(payload, chars))
    }
}

// Addresses travel through serde as their text form so that external codecs
// see one stable representation.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A signing or observing identity.
///
/// A full identity holds a secret key and can sign; an observer holds only a
/// public key and can verify and receive.
#[derive(Debug, Clone)]
pub struct Identity {
    secret_key: Option<SecretKey>,
    public_key: PublicKey,
}

impl Identity {
    /// Generates a new random identity using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Identity::from_secret_key(secret_key)
    }

    /// Creates an identity from an existing SecretKey.
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        // Using the context from the static Lazy
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        Identity {
            secret_key: Some(secret_key),
            public_key,
        }
    }

    /// Creates an identity from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;
        Ok(Identity::from_secret_key(secret_key))
    }

    /// Creates a verification-only identity from compressed public key bytes.
    pub fn observer(public_key_bytes: &[u8]) -> Result<Self, ChainError> {
        let public_key = PublicKey::from_slice(public_key_bytes)
            .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;
        Ok(Identity {
            secret_key: None,
            public_key,
        })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the identity's public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    pub fn can_sign(&self) -> bool {
        self.secret_key.is_some()
    }

    /// The identity's address with the default checksum length.
    pub fn address(&self) -> Address {
        Address::new(payload_of(&self.public_key), DEFAULT_CHECKSUM_CHARS)
    }

    /// The identity's address rendered with an explicit checksum length.
    pub fn address_with_checksum(&self, checksum_chars: usize) -> Result<Address, ChainError> {
        Address::derive(&self.public_key, checksum_chars)
    }

    /// Signs a message (hashed with SHA-256 first) and returns the compact
    /// signature bytes. Observer identities cannot sign.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; COMPACT_SIGNATURE_SIZE], ChainError> {
        let secret_key = self.secret_key.as_ref().ok_or(ChainError::NotASigner)?;
        let digest = Sha256::digest(message);

        let message = Message::from_digest_slice(&digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

        // Using the context from the static Lazy
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, secret_key);
        Ok(signature.serialize_compact())
    }
}

/// Verifies an ECDSA signature given raw public key bytes, the message, and
/// compact signature bytes. Fails closed: malformed keys or signatures yield
/// `false`, never a panic.
pub fn verify_signature(public_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8]) -> bool {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE
        || signature_bytes.len() != COMPACT_SIGNATURE_SIZE
    {
        return false;
    }

    let public_key = match PublicKey::from_slice(public_key_bytes) {
        Ok(key) => key,
        Err(_) => return false,
    };

    let digest = Sha256::digest(message);
    let message = match Message::from_digest_slice(&digest) {
        Ok(m) => m,
        Err(_) => return false,
    };

    let signature = match Signature::from_compact(signature_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let identity = Identity::generate();
        assert_eq!(identity.public_key_bytes().len(), PUBLIC_KEY_SIZE);
        assert!(identity.can_sign());
    }

    #[test]
    fn test_address_derivation_is_deterministic() {
        let identity = Identity::generate();
        let a = identity.address();
        let b = Address::from_public_key_bytes(&identity.public_key_bytes()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_address_equality_ignores_checksum_length() {
        let identity = Identity::generate();
        let short = identity.address_with_checksum(2).unwrap();
        let long = identity.address_with_checksum(8).unwrap();
        let none = identity.address_with_checksum(0).unwrap();
        assert_eq!(short, long);
        assert_eq!(short, none);
        assert_ne!(short.to_string(), long.to_string());
    }

    #[test]
    fn test_address_text_round_trip() {
        let identity = Identity::generate();
        let address = identity.address();
        let text = address.to_string();
        assert!(text.starts_with(ADDRESS_PREFIX));
        assert_eq!(
            text.len(),
            ADDRESS_PREFIX.len() + ADDRESS_PAYLOAD_SIZE * 2 + DEFAULT_CHECKSUM_CHARS
        );

        let parsed: Address = text.parse().unwrap();
        assert_eq!(parsed, address);
        assert_eq!(parsed.to_string(), text);
    }

    #[test]
    fn test_address_without_checksum_parses() {
        let identity = Identity::generate();
        let address = identity.address_with_checksum(0).unwrap();
        let parsed: Address = address.to_string().parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_malformed_address_text_is_invalid() {
        assert!(!Address::is_valid_text(""));
        assert!(!Address::is_valid_text("ag"));
        assert!(!Address::is_valid_text("zz0011"));
        // Non-hex payload
        assert!(!Address::is_valid_text(&format!(
            "{}{}",
            ADDRESS_PREFIX,
            "g".repeat(ADDRESS_PAYLOAD_SIZE * 2)
        )));
        // Odd-length checksum
        let identity = Identity::generate();
        let mut text = identity.address().to_string();
        text.pop();
        assert!(!Address::is_valid_text(&text));
    }

    #[test]
    fn test_checksum_mismatch_is_invalid() {
        let identity = Identity::generate();
        let text = identity.address().to_string();
        let mut chars: Vec<char> = text.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        assert!(!Address::is_valid_text(&tampered));
        assert!(Address::is_valid_text(&text));
    }

    #[test]
    fn test_checksum_chars_validation() {
        assert!(validate_checksum_chars(0).is_ok());
        assert!(validate_checksum_chars(2).is_ok());
        assert!(validate_checksum_chars(8).is_ok());
        assert!(validate_checksum_chars(1).is_err());
        assert!(validate_checksum_chars(3).is_err());
        assert!(validate_checksum_chars(10).is_err());
    }

    #[test]
    fn test_signing_and_verification() {
        let identity = Identity::generate();
        let message = b"Hello, agorachain!";

        let signature = identity.sign(message).unwrap();
        assert_eq!(signature.len(), COMPACT_SIGNATURE_SIZE);
        assert!(verify_signature(
            &identity.public_key_bytes(),
            message,
            &signature
        ));
    }

    #[test]
    fn test_tampered_message_fails_verification() {
        let identity = Identity::generate();
        let message = b"Original message".to_vec();
        let signature = identity.sign(&message).unwrap();

        // Flip one bit of the message
        let mut tampered = message.clone();
        tampered[0] ^= 0x01;
        assert!(!verify_signature(
            &identity.public_key_bytes(),
            &tampered,
            &signature
        ));
    }

    #[test]
    fn test_wrong_keypair_fails_verification() {
        let signer = Identity::generate();
        let other = Identity::generate();
        let message = b"Test message";

        let signature = signer.sign(message).unwrap();
        assert!(!verify_signature(
            &other.public_key_bytes(),
            message,
            &signature
        ));
    }

    #[test]
    fn test_malformed_inputs_fail_closed() {
        let identity = Identity::generate();
        let message = b"Test";
        let signature = identity.sign(message).unwrap();
        let pubkey = identity.public_key_bytes();

        assert!(!verify_signature(&pubkey[1..], message, &signature));
        assert!(!verify_signature(&pubkey, message, &signature[1..]));
        assert!(!verify_signature(&[0u8; PUBLIC_KEY_SIZE], message, &signature));
        assert!(!verify_signature(
            &pubkey,
            message,
            &[0u8; COMPACT_SIGNATURE_SIZE]
        ));
    }

    #[test]
    fn test_observer_cannot_sign() {
        let identity = Identity::generate();
        let observer = Identity::observer(&identity.public_key_bytes()).unwrap();
        assert!(!observer.can_sign());
        assert_eq!(observer.address(), identity.address());
        assert!(matches!(
            observer.sign(b"anything"),
            Err(ChainError::NotASigner)
        ));
    }

    #[test]
    fn test_from_secret_bytes_round_trip() {
        let identity = Identity::generate();
        let secret = identity.secret_key.unwrap().secret_bytes();
        let restored = Identity::from_secret_bytes(&secret).unwrap();
        assert_eq!(restored.address(), identity.address());
    }

    #[test]
    fn test_from_secret_bytes_invalid_length() {
        let short_bytes = [0u8; SECRET_KEY_SIZE - 1];
        let result = Identity::from_secret_bytes(&short_bytes);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Secret key must be"));
    }
}
