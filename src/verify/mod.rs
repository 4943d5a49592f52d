//! # Signature Verification
//!
//! Detached and embedded signature verification with a per-attachment
//! status cache and the download confirmation gate.
//!
//! ## Status State Machine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   VERIFICATION STATUS DECISION                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  signatures = detached signature if present,                           │
//! │               else the payload's embedded signatures                   │
//! │                                                                         │
//! │  signatures empty ───────────────────────────────► NotSigned           │
//! │                                                                         │
//! │  no sender public keys resolved at all ──────────► SignedNoPublicKey   │
//! │                                                                         │
//! │  any signature validates against any               (compromised keys   │
//! │  non-compromised key ─────────────────────────────► SignedAndValid      │
//! │                                                     never count)        │
//! │  keys were available but none validated ─────────► SignedAndInvalid    │
//! │                                                                         │
//! │  Verification never produces an error on a well-formed payload:        │
//! │  every failure mode degrades to one of the five status values.         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One status is cached per attachment identity for the view session;
//! re-verification always overwrites, never merges.

use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier as _};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::attachment::{Attachment, AttachmentId};
use crate::crypto::DecryptedPayload;
use crate::keys::{KeyProvider, SenderPublicKey, SigningKeyPair};

/// Size of a detached Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Verification state of one attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Verification has not been attempted
    NotVerified,
    /// The payload carries no signature at all (not an error)
    NotSigned,
    /// At least one signature validated against an available key
    SignedAndValid,
    /// Keys were available but no signature validated
    SignedAndInvalid,
    /// No public key for the sender could be resolved
    SignedNoPublicKey,
}

impl VerificationStatus {
    /// Whether this status warrants a warning before risky actions.
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Self::SignedAndInvalid)
    }
}

/// Produce a detached signature over a plaintext payload.
pub fn sign_detached(keys: &SigningKeyPair, payload: &[u8]) -> Vec<u8> {
    keys.signing_key().sign(payload).to_bytes().to_vec()
}

fn signature_checks_out(signature: &[u8], payload: &[u8], key: &SenderPublicKey) -> bool {
    let Ok(sig) = Ed25519Signature::from_slice(signature) else {
        // Malformed signature bytes count as not validating.
        return false;
    };
    let Ok(verifying) = key.verifying_key() else {
        return false;
    };
    verifying.verify(payload, &sig).is_ok()
}

/// Verifies attachment signatures and caches one status per identity.
pub struct Verifier {
    keys: Arc<dyn KeyProvider>,
    statuses: RwLock<HashMap<AttachmentId, VerificationStatus>>,
}

impl Verifier {
    /// Create a verifier over the given key provider.
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self {
            keys,
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Verify an attachment's payload against the sender's keys.
    ///
    /// Total over well-formed inputs: always yields exactly one of the
    /// five status values, never an error. The result overwrites any
    /// previously cached status for the identity.
    pub async fn verify(
        &self,
        attachment: &Attachment,
        payload: &DecryptedPayload,
        sender_email: &str,
    ) -> VerificationStatus {
        let status = self.compute(attachment, payload, sender_email).await;
        tracing::debug!(
            attachment = %attachment.id,
            ?status,
            "Attachment signature verified"
        );
        self.statuses
            .write()
            .insert(attachment.id.clone(), status);
        status
    }

    /// Read the cached status, defaulting to `NotVerified`.
    pub fn status(&self, id: &AttachmentId) -> VerificationStatus {
        self.statuses
            .read()
            .get(id)
            .copied()
            .unwrap_or(VerificationStatus::NotVerified)
    }

    /// Record a status computed elsewhere (the envelope bridge verifies
    /// the multipart body as a whole and tags each converted attachment
    /// with that result).
    pub fn record(&self, id: AttachmentId, status: VerificationStatus) {
        self.statuses.write().insert(id, status);
    }

    /// Drop every cached status.
    pub fn clear(&self) {
        self.statuses.write().clear();
    }

    async fn compute(
        &self,
        attachment: &Attachment,
        payload: &DecryptedPayload,
        sender_email: &str,
    ) -> VerificationStatus {
        // A detached signature takes precedence; otherwise fall back to
        // whatever signatures were found inside the decrypted payload.
        let signatures: Vec<&[u8]> = match &attachment.signature {
            Some(sig) => vec![sig.as_slice()],
            None => payload
                .embedded_signatures
                .iter()
                .map(Vec::as_slice)
                .collect(),
        };

        if signatures.is_empty() {
            return VerificationStatus::NotSigned;
        }

        let sender_keys = match self.keys.public_keys(sender_email).await {
            Ok(keys) => keys,
            Err(err) => {
                // A provider failure degrades like an unresolvable key.
                tracing::warn!(sender = sender_email, %err, "Public key lookup failed");
                return VerificationStatus::SignedNoPublicKey;
            }
        };

        if sender_keys.is_empty() {
            return VerificationStatus::SignedNoPublicKey;
        }

        for signature in &signatures {
            for key in sender_keys.iter().filter(|k| !k.compromised) {
                if signature_checks_out(signature, &payload.plaintext, key) {
                    return VerificationStatus::SignedAndValid;
                }
            }
        }

        VerificationStatus::SignedAndInvalid
    }
}

// ============================================================================
// CONFIRMATION GATE
// ============================================================================

/// Remembers, per (message, attachment) pair, that the user chose to
/// download despite an invalid signature.
///
/// Confirming suppresses the warning for repeat downloads in the same
/// session; cancelling the prompt explicitly invalidates the memory, so
/// the warning reappears next time.
#[derive(Default)]
pub struct ConfirmationGate {
    confirmed: Mutex<HashSet<(String, AttachmentId)>>,
}

impl ConfirmationGate {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the user must be prompted before downloading this
    /// attachment with the given status.
    pub fn needs_prompt(
        &self,
        status: VerificationStatus,
        message_id: &str,
        attachment_id: &AttachmentId,
    ) -> bool {
        status.is_suspicious()
            && !self
                .confirmed
                .lock()
                .contains(&(message_id.to_string(), attachment_id.clone()))
    }

    /// The user confirmed the download despite the warning.
    pub fn confirm(&self, message_id: &str, attachment_id: &AttachmentId) {
        self.confirmed
            .lock()
            .insert((message_id.to_string(), attachment_id.clone()));
    }

    /// The user cancelled the prompt: forget any prior confirmation.
    pub fn cancel(&self, message_id: &str, attachment_id: &AttachmentId) {
        self.confirmed
            .lock()
            .remove(&(message_id.to_string(), attachment_id.clone()));
    }
}

// ============================================================================
// TESTS
// ============================================================================
