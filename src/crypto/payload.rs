//! Data-packet encryption: the symmetric payload format.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;

use crate::attachment::AttachmentId;
use crate::error::{Error, Result};

use super::SessionKey;

/// Size of the data-packet nonce in bytes (96 bits)
pub const PAYLOAD_NONCE_SIZE: usize = 12;

/// Encrypt plaintext under a session key.
///
/// Wire form: `[ nonce (12) ‖ ciphertext+tag ]`.
pub fn encrypt_payload(session_key: &SessionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(session_key.as_bytes())
        .map_err(|e| Error::Encryption(format!("Invalid session key: {}", e)))?;

    let mut nonce = [0u8; PAYLOAD_NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            AesNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &[],
            },
        )
        .map_err(|e| Error::Encryption(format!("Payload encryption failed: {}", e)))?;

    let mut packet = Vec::with_capacity(PAYLOAD_NONCE_SIZE + ciphertext.len());
    packet.extend_from_slice(&nonce);
    packet.extend_from_slice(&ciphertext);
    Ok(packet)
}

/// Decrypt a data packet with a session key.
///
/// The attachment identity rides on the error so callers can offer the
/// raw-blob fallback for exactly the attachment that failed.
pub fn decrypt_payload(
    session_key: &SessionKey,
    data_packet: &[u8],
    attachment_id: &AttachmentId,
) -> Result<Vec<u8>> {
    if data_packet.len() < PAYLOAD_NONCE_SIZE {
        return Err(Error::Decryption {
            attachment_id: attachment_id.to_string(),
            reason: "Data packet shorter than nonce".into(),
        });
    }

    let (nonce, ciphertext) = data_packet.split_at(PAYLOAD_NONCE_SIZE);
    let cipher = Aes256Gcm::new_from_slice(session_key.as_bytes()).map_err(|e| Error::Decryption {
        attachment_id: attachment_id.to_string(),
        reason: format!("Invalid session key: {}", e),
    })?;

    cipher
        .decrypt(
            AesNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: &[],
            },
        )
        .map_err(|_| Error::Decryption {
            attachment_id: attachment_id.to_string(),
            reason: "Authentication tag mismatch".into(),
        })
}

// ============================================================================
// TESTS
// ============================================================================
