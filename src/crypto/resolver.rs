//! The crypto resolver: lazy fetch + decrypt with a session-scoped cache.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::attachment::{Attachment, AttachmentId};
use crate::error::Result;
use crate::keys::KeyProvider;
use crate::transport::Transport;

use super::{decrypt_payload, unseal_with_keys, unseal_with_password, SessionKey};

/// How to derive the session key for a decrypt.
#[derive(Clone, Copy, Debug)]
pub enum DecryptContext<'a> {
    /// Authenticated access: derive via the message's sending address's
    /// private keys.
    Address {
        /// Address identifier for the key-provider lookup
        address_id: &'a str,
    },
    /// Unauthenticated ("shared-link") access: derive via a password.
    SharedLink {
        /// The link password
        password: &'a str,
    },
}

/// A decrypted attachment payload.
///
/// The plaintext buffer is owned by the resolver's cache entry; this
/// struct holds a cheap shared view, never a long-lived copy.
#[derive(Clone, Debug)]
pub struct DecryptedPayload {
    /// Decrypted bytes
    pub plaintext: Bytes,
    /// Signature records found after decryption (only populated for
    /// envelope-converted attachments; used when no detached signature
    /// exists)
    pub embedded_signatures: Vec<Vec<u8>>,
    /// Whether this payload came from the cache rather than a fresh
    /// fetch+decrypt. Callers that need fresh signature re-verification
    /// key off this.
    pub from_cache: bool,
}

struct CacheEntry {
    plaintext: Bytes,
    embedded_signatures: Vec<Vec<u8>>,
}

type Slot = Arc<OnceCell<Arc<CacheEntry>>>;

/// Decrypts attachments, caching payloads per identity for the view
/// session.
///
/// Concurrent `open` calls for the same identity are coalesced: the
/// second caller awaits the first instead of issuing a duplicate fetch.
/// A failed decrypt leaves the slot empty, so a later call may retry.
pub struct CryptoResolver {
    keys: Arc<dyn KeyProvider>,
    transport: Arc<dyn Transport>,
    slots: Mutex<HashMap<AttachmentId, Slot>>,
}

impl CryptoResolver {
    /// Create a resolver over the given key provider and transport.
    pub fn new(keys: Arc<dyn KeyProvider>, transport: Arc<dyn Transport>) -> Self {
        Self {
            keys,
            transport,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Derive the session key for an attachment.
    pub async fn resolve_session_key(
        &self,
        attachment: &Attachment,
        context: DecryptContext<'_>,
    ) -> Result<SessionKey> {
        match context {
            DecryptContext::Address { address_id } => {
                let keys = self.keys.private_keys(address_id).await?;
                unseal_with_keys(&attachment.key_packets, &keys)
            }
            DecryptContext::SharedLink { password } => {
                unseal_with_password(&attachment.key_packets, password)
            }
        }
    }

    /// Fetch and decrypt an attachment, consulting the cache first.
    ///
    /// Decryption failures are surfaced as [`crate::error::Error::Decryption`]; callers
    /// may then offer [`raw_fallback`](Self::raw_fallback) but must never
    /// substitute plaintext-looking data silently.
    pub async fn open(
        &self,
        attachment: &Attachment,
        context: DecryptContext<'_>,
    ) -> Result<DecryptedPayload> {
        let slot = self.slot(&attachment.id);
        let fresh = AtomicBool::new(false);

        let entry = slot
            .get_or_try_init(|| async {
                fresh.store(true, Ordering::SeqCst);
                self.fetch_and_decrypt(attachment, context).await
            })
            .await?;

        let from_cache = !fresh.load(Ordering::SeqCst);
        if from_cache {
            tracing::debug!(attachment = %attachment.id, "Decrypted payload served from cache");
        }

        Ok(DecryptedPayload {
            plaintext: entry.plaintext.clone(),
            embedded_signatures: entry.embedded_signatures.clone(),
            from_cache,
        })
    }

    /// Register an already-decrypted payload under an identity.
    ///
    /// Used by the envelope bridge, whose attachments arrive decrypted as
    /// part of the multipart body; later `open` calls hit the cache and
    /// skip both fetch and decryption. Overwrites any existing entry.
    pub fn register_decrypted(
        &self,
        id: AttachmentId,
        plaintext: Bytes,
        embedded_signatures: Vec<Vec<u8>>,
    ) {
        let entry = Arc::new(CacheEntry {
            plaintext,
            embedded_signatures,
        });
        self.slots
            .lock()
            .insert(id, Arc::new(OnceCell::new_with(Some(entry))));
    }

    /// The raw, undecrypted fallback blob: key packets ‖ ciphertext.
    ///
    /// Offered for download when decryption fails. Opaque bytes the user
    /// can save; no recoverability is assumed.
    pub async fn raw_fallback(&self, attachment: &Attachment) -> Result<Bytes> {
        let ciphertext = self.transport.download(&attachment.id).await?;
        let mut raw = Vec::with_capacity(attachment.key_packets.len() + ciphertext.len());
        raw.extend_from_slice(&attachment.key_packets);
        raw.extend_from_slice(&ciphertext);
        Ok(Bytes::from(raw))
    }

    /// Drop the cached payload for one identity (forces the next `open`
    /// to fetch and decrypt again).
    pub fn evict(&self, id: &AttachmentId) {
        self.slots.lock().remove(id);
    }

    /// Drop every cached payload.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    fn slot(&self, id: &AttachmentId) -> Slot {
        self.slots
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn fetch_and_decrypt(
        &self,
        attachment: &Attachment,
        context: DecryptContext<'_>,
    ) -> Result<Arc<CacheEntry>> {
        let session_key = self.resolve_session_key(attachment, context).await?;
        let ciphertext = self.transport.download(&attachment.id).await?;
        let plaintext = decrypt_payload(&session_key, &ciphertext, &attachment.id)?;

        tracing::info!(
            attachment = %attachment.id,
            bytes = plaintext.len(),
            "Attachment decrypted"
        );

        Ok(Arc::new(CacheEntry {
            plaintext: Bytes::from(plaintext),
            embedded_signatures: Vec::new(),
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================
