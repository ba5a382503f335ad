//! WireGuard key management
//!
//! Curve25519 key pairs in the format WireGuard expects: 32 raw bytes,
//! base64 on the wire. Private keys never leave the host that generated
//! them; only public keys travel in registration requests.

pub mod error;
pub mod keys;

pub use error::{CryptoError, CryptoResult};
pub use keys::{decode_key, encode_key, KeyPair, PublicKey, SecretKey, KEY_SIZE};
