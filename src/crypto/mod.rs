//! # Attachment Cryptography
//!
//! Session-key handling and payload encryption for attachments.
//!
//! ## Scheme
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ATTACHMENT ENCRYPTION SCHEME                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Every attachment has its own random 256-bit session key.              │
//! │                                                                         │
//! │  Payload ("data packet"):                                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  AES-256-GCM(session_key, nonce, plaintext)                     │   │
//! │  │  wire form: [ nonce (12) ‖ ciphertext+tag ]                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Session key ("key packets"), one packet per recipient key:            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Asymmetric packet:                                             │   │
//! │  │    ephemeral X25519 × recipient public → ECDH secret            │   │
//! │  │    HKDF-SHA256(secret, salt=ephemeral_pub, info=v1) → wrap key  │   │
//! │  │    AES-256-GCM wrap of the session key                          │   │
//! │  │                                                                 │   │
//! │  │  Password packet (unauthenticated shared-link access):          │   │
//! │  │    HKDF-SHA256(password, salt=random, info=v1) → wrap key       │   │
//! │  │    AES-256-GCM wrap of the session key                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Unsealing tries every packet against every available private key      │
//! │  (an address may hold several keys from rotation history).             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`CryptoResolver`] sits on top: it resolves session keys, fetches
//! ciphertext lazily, coalesces concurrent decrypts of the same identity,
//! and owns the session-scoped decrypted-payload cache.

mod payload;
mod resolver;
mod session_key;

pub use payload::{decrypt_payload, encrypt_payload, PAYLOAD_NONCE_SIZE};
pub use resolver::{CryptoResolver, DecryptContext, DecryptedPayload};
pub use session_key::{
    seal_to_address, seal_with_password, unseal_with_keys, unseal_with_password, SessionKey,
    SESSION_KEY_SIZE,
};
