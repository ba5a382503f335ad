//! Curve25519 Key Pairs
//!
//! Generates WireGuard-compatible key pairs: 32 random bytes clamped per
//! the Curve25519 convention, public key derived by basepoint
//! multiplication. Both halves encode to standard base64.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Raw key length in bytes
pub const KEY_SIZE: usize = 32;

/// A long-term Curve25519 secret key
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

/// A Curve25519 public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    bytes: [u8; KEY_SIZE],
}

/// A key pair holding both halves
pub struct KeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl SecretKey {
    /// Generate a random clamped secret key
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        bytes[0] &= 248;
        bytes[31] &= 127;
        bytes[31] |= 64;
        Self { bytes }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(self.bytes);
        let public = X25519Public::from(&secret);
        PublicKey {
            bytes: public.to_bytes(),
        }
    }

    /// Encode to base64
    pub fn to_base64(&self) -> String {
        encode_key(&self.bytes)
    }

    /// Decode from base64, enforcing the 32-byte length
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        Ok(Self {
            bytes: decode_key(encoded)?,
        })
    }

    /// Export raw bytes (use with caution)
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.bytes
    }
}

impl Clone for SecretKey {
    fn clone(&self) -> Self {
        Self::from_bytes(self.bytes)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey(..)")
    }
}

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Encode to base64
    pub fn to_base64(&self) -> String {
        encode_key(&self.bytes)
    }

    /// Decode from base64, enforcing the 32-byte length
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        Ok(Self {
            bytes: decode_key(encoded)?,
        })
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}..)", &self.to_base64()[..8])
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secret = SecretKey::generate();
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Rebuild from a stored secret key
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }
}

/// Encode 32 raw key bytes to standard base64.
pub fn encode_key(bytes: &[u8; KEY_SIZE]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a base64 key, enforcing exactly 32 bytes.
pub fn decode_key(encoded: &str) -> CryptoResult<[u8; KEY_SIZE]> {
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    if decoded.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: decoded.len(),
        });
    }
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}
