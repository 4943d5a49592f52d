//! # Address Key Interface
//!
//! Key types for mail addresses and the provider seam to the external
//! key-management service.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  AddressKeys — private keys of one sending address                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SigningKeyPair (Ed25519)      DecryptionKeyPair (X25519)       │   │
//! │  │  • detached attachment          • unsealing session-key          │   │
//! │  │    signatures                     packets (ECDH)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  SenderPublicKey — one public key of a correspondent, with the         │
//! │  compromised flag the key-management service reports. Compromised      │
//! │  keys never count towards a valid verification.                        │
//! │                                                                         │
//! │  KeyProvider — the consuming interface: private keys per address id,   │
//! │  public keys per sender email. Key generation, storage and rotation    │
//! │  live in the key-management service, not here.                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An address can hold several keys (rotation history); session-key
//! unsealing tries each in turn.

use async_trait::async_trait;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::Arc;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Ed25519 signing keypair for detached attachment signatures
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    /// Private signing key (secret)
    #[zeroize(skip)] // ed25519_dalek::SigningKey handles its own zeroization
    secret: SigningKey,
}

impl SigningKeyPair {
    /// Generate a new random signing keypair
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from raw secret bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            secret: SigningKey::from_bytes(bytes),
        }
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; 32] {
        self.secret.verifying_key().to_bytes()
    }

    /// Get the verifying key for signature verification
    pub fn verifying_key(&self) -> VerifyingKey {
        self.secret.verifying_key()
    }

    /// Get reference to the signing key
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.secret
    }
}

/// X25519 keypair used to unseal session-key packets
#[derive(ZeroizeOnDrop)]
pub struct DecryptionKeyPair {
    /// Private decryption key (secret)
    #[zeroize(skip)] // x25519_dalek handles its own zeroization
    secret: StaticSecret,
    /// Public key (derived from secret, not sensitive)
    #[zeroize(skip)]
    public: X25519PublicKey,
}

impl DecryptionKeyPair {
    /// Generate a new random decryption keypair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Create from raw secret bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let secret = StaticSecret::from(*bytes);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Perform Diffie-Hellman key exchange with a peer public key
    pub fn diffie_hellman(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let their_public = X25519PublicKey::from(*their_public);
        self.secret.diffie_hellman(&their_public).to_bytes()
    }
}

/// Private keys of one sending address
///
/// Secret material is zeroized on drop. Instances are shared as
/// `Arc<AddressKeys>`; the provider hands out references, never copies.
#[derive(ZeroizeOnDrop)]
pub struct AddressKeys {
    /// Ed25519 keypair for signing
    pub signing: SigningKeyPair,
    /// X25519 keypair for session-key unsealing
    pub decryption: DecryptionKeyPair,
}

impl AddressKeys {
    /// Generate a fresh random key set (test and tooling use; real keys
    /// come from the key-management service)
    pub fn generate() -> Self {
        Self {
            signing: SigningKeyPair::generate(),
            decryption: DecryptionKeyPair::generate(),
        }
    }

    /// Public halves of this key set
    pub fn public(&self) -> AddressPublicKey {
        AddressPublicKey {
            signing: self.signing.public_bytes(),
            encryption: self.decryption.public_bytes(),
        }
    }
}

/// Public halves of an address key set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPublicKey {
    /// Ed25519 public key for signature verification (32 bytes)
    pub signing: [u8; 32],
    /// X25519 public key for session-key sealing (32 bytes)
    pub encryption: [u8; 32],
}

/// One public key of a correspondent, as reported by the key-management
/// service.
#[derive(Debug, Clone, Copy)]
pub struct SenderPublicKey {
    /// Ed25519 verifying key bytes
    pub key: [u8; 32],
    /// Whether the service flags this key as compromised.
    ///
    /// Compromised keys are still returned (the UI may want to display
    /// them) but must never count towards a valid verification.
    pub compromised: bool,
}

impl SenderPublicKey {
    /// Parse into a dalek verifying key
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.key)
            .map_err(|e| Error::InvalidKey(format!("Invalid sender public key: {}", e)))
    }
}

/// The consuming interface to the external key-management service.
///
/// Both lookups are asynchronous: the service may need a network round
/// trip to fetch or refresh keys.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Private keys for one of the user's addresses, newest first.
    async fn private_keys(&self, address_id: &str) -> Result<Vec<Arc<AddressKeys>>>;

    /// Public keys currently known for a sender email.
    ///
    /// An empty list means no key could be resolved at all (verification
    /// degrades to `SignedNoPublicKey`).
    async fn public_keys(&self, email: &str) -> Result<Vec<SenderPublicKey>>;
}

/// A fixed in-memory key provider.
///
/// Serves tests and local tooling; production wires the real
/// key-management client behind [`KeyProvider`].
#[derive(Default)]
pub struct StaticKeyProvider {
    private: HashMap<String, Vec<Arc<AddressKeys>>>,
    public: HashMap<String, Vec<SenderPublicKey>>,
}

impl StaticKeyProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register private keys for an address id.
    pub fn add_address(&mut self, address_id: &str, keys: Arc<AddressKeys>) {
        self.private
            .entry(address_id.to_string())
            .or_default()
            .push(keys);
    }

    /// Register a public key for a sender email.
    pub fn add_sender(&mut self, email: &str, key: SenderPublicKey) {
        self.public.entry(email.to_string()).or_default().push(key);
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn private_keys(&self, address_id: &str) -> Result<Vec<Arc<AddressKeys>>> {
        Ok(self.private.get(address_id).cloned().unwrap_or_default())
    }

    async fn public_keys(&self, email: &str) -> Result<Vec<SenderPublicKey>> {
        Ok(self.public.get(email).cloned().unwrap_or_default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
