//! Session keys and the key-packet wire format.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};
use crate::keys::AddressKeys;

/// Size of a symmetric session key in bytes (256 bits)
pub const SESSION_KEY_SIZE: usize = 32;

/// Nonce size for key wrapping (96 bits)
const WRAP_NONCE_SIZE: usize = 12;

/// Salt size for password packets
const PASSWORD_SALT_SIZE: usize = 16;

/// Wrapped session key size: 32-byte key + 16-byte GCM tag
const WRAPPED_SIZE: usize = SESSION_KEY_SIZE + 16;

/// Packet tag: session key sealed to an X25519 public key
const PACKET_ASYMMETRIC: u8 = 0x01;
/// Packet tag: session key sealed under a shared-link password
const PACKET_PASSWORD: u8 = 0x02;

/// HKDF domain string for asymmetric key packets
const INFO_ASYMMETRIC: &[u8] = b"sealmail-key-packet-v1";
/// HKDF domain string for shared-link password packets
const INFO_PASSWORD: &[u8] = b"sealmail-shared-link-v1";

/// Symmetric key that decrypts one attachment's ciphertext.
///
/// Delivered asymmetrically sealed in key packets; zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes never reach logs or panic messages.
        f.write_str("SessionKey(..)")
    }
}

impl SessionKey {
    /// Generate a fresh random session key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from a slice, validating the length.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != SESSION_KEY_SIZE {
            return Err(Error::KeyResolution(format!(
                "Invalid session key length: {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; SESSION_KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }

    /// Constant-size equality check used by the upload self-check.
    pub fn matches(&self, other: &SessionKey) -> bool {
        use sha2::Digest;
        // Compare digests rather than key bytes directly.
        Sha256::digest(self.0) == Sha256::digest(other.0)
    }
}

fn wrap_key_from_dh(dh: &[u8; 32], ephemeral_pub: &[u8; 32]) -> Result<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(Some(ephemeral_pub), dh);
    let mut key = [0u8; 32];
    hkdf.expand(INFO_ASYMMETRIC, &mut key)
        .map_err(|_| Error::Encryption("HKDF expansion failed".into()))?;
    Ok(key)
}

fn wrap_key_from_password(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), password.as_bytes());
    let mut key = [0u8; 32];
    hkdf.expand(INFO_PASSWORD, &mut key)
        .map_err(|_| Error::Encryption("HKDF expansion failed".into()))?;
    Ok(key)
}

fn wrap(session_key: &SessionKey, wrap_key: &[u8; 32], nonce: &[u8; WRAP_NONCE_SIZE]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(wrap_key)
        .map_err(|e| Error::Encryption(format!("Invalid wrap key: {}", e)))?;
    cipher
        .encrypt(
            AesNonce::from_slice(nonce),
            Payload {
                msg: session_key.as_bytes(),
                aad: &[],
            },
        )
        .map_err(|e| Error::Encryption(format!("Session key wrap failed: {}", e)))
}

fn unwrap(wrapped: &[u8], wrap_key: &[u8; 32], nonce: &[u8]) -> Option<SessionKey> {
    let cipher = Aes256Gcm::new_from_slice(wrap_key).ok()?;
    let plain = cipher
        .decrypt(
            AesNonce::from_slice(nonce),
            Payload {
                msg: wrapped,
                aad: &[],
            },
        )
        .ok()?;
    SessionKey::from_slice(&plain).ok()
}

/// Seal a session key to an address's X25519 encryption public key.
///
/// Produces one asymmetric key packet.
pub fn seal_to_address(session_key: &SessionKey, recipient_public: &[u8; 32]) -> Result<Vec<u8>> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_pub = X25519PublicKey::from(&ephemeral).to_bytes();
    let dh = ephemeral
        .diffie_hellman(&X25519PublicKey::from(*recipient_public))
        .to_bytes();

    let wrap_key = wrap_key_from_dh(&dh, &ephemeral_pub)?;
    let mut nonce = [0u8; WRAP_NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    let wrapped = wrap(session_key, &wrap_key, &nonce)?;

    let mut packet = Vec::with_capacity(1 + 32 + WRAP_NONCE_SIZE + wrapped.len());
    packet.push(PACKET_ASYMMETRIC);
    packet.extend_from_slice(&ephemeral_pub);
    packet.extend_from_slice(&nonce);
    packet.extend_from_slice(&wrapped);
    Ok(packet)
}

/// Seal a session key under a shared-link password.
pub fn seal_with_password(session_key: &SessionKey, password: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; PASSWORD_SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let wrap_key = wrap_key_from_password(password, &salt)?;
    let mut nonce = [0u8; WRAP_NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    let wrapped = wrap(session_key, &wrap_key, &nonce)?;

    let mut packet = Vec::with_capacity(1 + PASSWORD_SALT_SIZE + WRAP_NONCE_SIZE + wrapped.len());
    packet.push(PACKET_PASSWORD);
    packet.extend_from_slice(&salt);
    packet.extend_from_slice(&nonce);
    packet.extend_from_slice(&wrapped);
    Ok(packet)
}

/// One parsed key packet.
#[derive(Debug)]
enum Packet<'a> {
    Asymmetric {
        ephemeral_pub: [u8; 32],
        nonce: &'a [u8],
        wrapped: &'a [u8],
    },
    Password {
        salt: &'a [u8],
        nonce: &'a [u8],
        wrapped: &'a [u8],
    },
}

/// Walk the concatenated key-packet blob.
fn parse_packets(mut blob: &[u8]) -> Result<Vec<Packet<'_>>> {
    let mut packets = Vec::new();
    while !blob.is_empty() {
        match blob[0] {
            PACKET_ASYMMETRIC => {
                let len = 1 + 32 + WRAP_NONCE_SIZE + WRAPPED_SIZE;
                if blob.len() < len {
                    return Err(Error::KeyResolution("Truncated key packet".into()));
                }
                let mut ephemeral_pub = [0u8; 32];
                ephemeral_pub.copy_from_slice(&blob[1..33]);
                packets.push(Packet::Asymmetric {
                    ephemeral_pub,
                    nonce: &blob[33..33 + WRAP_NONCE_SIZE],
                    wrapped: &blob[33 + WRAP_NONCE_SIZE..len],
                });
                blob = &blob[len..];
            }
            PACKET_PASSWORD => {
                let len = 1 + PASSWORD_SALT_SIZE + WRAP_NONCE_SIZE + WRAPPED_SIZE;
                if blob.len() < len {
                    return Err(Error::KeyResolution("Truncated key packet".into()));
                }
                packets.push(Packet::Password {
                    salt: &blob[1..1 + PASSWORD_SALT_SIZE],
                    nonce: &blob[1 + PASSWORD_SALT_SIZE..1 + PASSWORD_SALT_SIZE + WRAP_NONCE_SIZE],
                    wrapped: &blob[1 + PASSWORD_SALT_SIZE + WRAP_NONCE_SIZE..len],
                });
                blob = &blob[len..];
            }
            tag => {
                return Err(Error::KeyResolution(format!(
                    "Unknown key packet tag: {:#04x}",
                    tag
                )));
            }
        }
    }
    if packets.is_empty() {
        return Err(Error::KeyResolution("Empty key packets".into()));
    }
    Ok(packets)
}

/// Unseal a session key using an address's private keys.
///
/// Tries every asymmetric packet against every key, first success wins.
pub fn unseal_with_keys(key_packets: &[u8], keys: &[Arc<AddressKeys>]) -> Result<SessionKey> {
    if keys.is_empty() {
        return Err(Error::KeyResolution("No private keys available".into()));
    }
    for packet in parse_packets(key_packets)? {
        if let Packet::Asymmetric {
            ephemeral_pub,
            nonce,
            wrapped,
        } = packet
        {
            for key in keys {
                let dh = key.decryption.diffie_hellman(&ephemeral_pub);
                let wrap_key = wrap_key_from_dh(&dh, &ephemeral_pub)?;
                if let Some(session_key) = unwrap(wrapped, &wrap_key, nonce) {
                    return Ok(session_key);
                }
            }
        }
    }
    Err(Error::KeyResolution(
        "No appropriate private key found".into(),
    ))
}

/// Unseal a session key using a shared-link password.
pub fn unseal_with_password(key_packets: &[u8], password: &str) -> Result<SessionKey> {
    for packet in parse_packets(key_packets)? {
        if let Packet::Password {
            salt,
            nonce,
            wrapped,
        } = packet
        {
            let wrap_key = wrap_key_from_password(password, salt)?;
            if let Some(session_key) = unwrap(wrapped, &wrap_key, nonce) {
                return Ok(session_key);
            }
        }
    }
    Err(Error::KeyResolution("Wrong password".into()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_unseal_to_address() {
        let keys = Arc::new(AddressKeys::generate());
        let session_key = SessionKey::generate();

        let packet = seal_to_address(&session_key, &keys.decryption.public_bytes()).unwrap();
        let unsealed = unseal_with_keys(&packet, &[keys]).unwrap();

        assert!(session_key.matches(&unsealed));
    }

    #[test]
    fn test_unseal_tries_all_keys() {
        // Rotation history: packet sealed to the older of two keys.
        let old = Arc::new(AddressKeys::generate());
        let new = Arc::new(AddressKeys::generate());
        let session_key = SessionKey::generate();

        let packet = seal_to_address(&session_key, &old.decryption.public_bytes()).unwrap();
        let unsealed = unseal_with_keys(&packet, &[new, old]).unwrap();

        assert!(session_key.matches(&unsealed));
    }

    #[test]
    fn test_unseal_wrong_key_fails() {
        let alice = Arc::new(AddressKeys::generate());
        let mallory = Arc::new(AddressKeys::generate());
        let session_key = SessionKey::generate();

        let packet = seal_to_address(&session_key, &alice.decryption.public_bytes()).unwrap();
        let err = unseal_with_keys(&packet, &[mallory]).unwrap_err();

        assert!(matches!(err, Error::KeyResolution(_)));
    }

    #[test]
    fn test_unseal_no_keys_fails() {
        let session_key = SessionKey::generate();
        let keys = Arc::new(AddressKeys::generate());
        let packet = seal_to_address(&session_key, &keys.decryption.public_bytes()).unwrap();

        let err = unseal_with_keys(&packet, &[]).unwrap_err();
        assert!(matches!(err, Error::KeyResolution(_)));
    }

    #[test]
    fn test_password_round_trip() {
        let session_key = SessionKey::generate();
        let packet = seal_with_password(&session_key, "hunter2").unwrap();

        let unsealed = unseal_with_password(&packet, "hunter2").unwrap();
        assert!(session_key.matches(&unsealed));

        let err = unseal_with_password(&packet, "wrong").unwrap_err();
        assert!(matches!(err, Error::KeyResolution(_)));
    }

    #[test]
    fn test_multi_recipient_packets() {
        // One packet per recipient plus a shared-link packet, concatenated.
        let alice = Arc::new(AddressKeys::generate());
        let bob = Arc::new(AddressKeys::generate());
        let session_key = SessionKey::generate();

        let mut blob = seal_to_address(&session_key, &alice.decryption.public_bytes()).unwrap();
        blob.extend(seal_to_address(&session_key, &bob.decryption.public_bytes()).unwrap());
        blob.extend(seal_with_password(&session_key, "link-pw").unwrap());

        assert!(session_key.matches(&unseal_with_keys(&blob, &[alice]).unwrap()));
        assert!(session_key.matches(&unseal_with_keys(&blob, &[bob]).unwrap()));
        assert!(session_key.matches(&unseal_with_password(&blob, "link-pw").unwrap()));
    }

    #[test]
    fn test_malformed_blob_fails() {
        assert!(matches!(
            parse_packets(&[]).unwrap_err(),
            Error::KeyResolution(_)
        ));
        assert!(matches!(
            parse_packets(&[0x7F, 1, 2, 3]).unwrap_err(),
            Error::KeyResolution(_)
        ));
        assert!(matches!(
            parse_packets(&[PACKET_ASYMMETRIC, 1, 2]).unwrap_err(),
            Error::KeyResolution(_)
        ));
    }

    #[test]
    fn test_session_key_length_validated() {
        assert!(SessionKey::from_slice(&[0u8; 16]).is_err());
        assert!(SessionKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_debug_output_redacts_key_bytes() {
        let key = SessionKey::from_slice(&[0xAB; 32]).unwrap();
        let rendered = format!("{:?}", key);
        assert_eq!(rendered, "SessionKey(..)");
        assert!(!rendered.contains("171")); // 0xAB
    }
}
