//! Encrypt-sign-upload pipeline and its pending-upload registry.

use bytes::Bytes;
use futures::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::crypto::{encrypt_payload, seal_to_address, unseal_with_keys, SessionKey};
use crate::error::{Error, Result};
use crate::keys::{AddressKeys, KeyProvider};
use crate::transport::{ByteProgress, Transport};
use crate::verify::sign_detached;

use super::events::UploadEvent;
use super::request::{UploadRequest, UploadResponse};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A file the user selected for attachment.
#[derive(Clone, Debug)]
pub struct UploadFile {
    /// Filename as picked, extension included
    pub filename: String,
    /// MIME type if the picker supplied one; guessed from the
    /// extension otherwise
    pub mime_type: Option<String>,
    /// File contents
    pub bytes: Bytes,
}

/// How the attachment will be referenced by the message body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadMode {
    /// Regular attachment listed below the body
    Attachment,
    /// Inline image referenced by content-id from the body
    Inline,
}

/// Externally observable state of one pending upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    /// Handed to the transport, not yet resolved
    InFlight,
    /// Server record accepted after the round-trip self-check
    Completed,
    /// Aborted by the user; any late completion was discarded
    Cancelled,
    /// Transport error or self-check mismatch
    Failed,
}

struct PendingEntry {
    message_id: String,
    abort: AbortHandle,
    status: UploadStatus,
}

/// Pending-upload bookkeeping.
///
/// All transitions happen under one lock, which is what makes cancel
/// authoritative: once `cancel` returns, `try_complete`/`try_fail` for
/// that id can only observe the Cancelled state and must discard their
/// outcome, and `is_in_flight` (checked by the progress path) is false.
#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<Uuid, PendingEntry>>,
}

impl Registry {
    fn register(&self, id: Uuid, message_id: &str, abort: AbortHandle) {
        self.entries.lock().insert(
            id,
            PendingEntry {
                message_id: message_id.to_string(),
                abort,
                status: UploadStatus::InFlight,
            },
        );
    }

    /// Emit a progress event, holding the lock across the state check
    /// and the send. `cancel` takes the same lock, so once it returns
    /// no progress event can slip out for the cancelled id.
    fn publish_progress(
        &self,
        id: Uuid,
        percent: u8,
        events: &broadcast::Sender<UploadEvent>,
    ) {
        let entries = self.entries.lock();
        let in_flight = entries
            .get(&id)
            .map(|e| e.status == UploadStatus::InFlight)
            .unwrap_or(false);
        if in_flight {
            let _ = events.send(UploadEvent::Progress {
                local_request_id: id,
                percent,
            });
        }
    }

    fn status(&self, id: Uuid) -> Option<UploadStatus> {
        self.entries.lock().get(&id).map(|e| e.status)
    }

    /// Cancel an in-flight upload. Returns its message id, or `None`
    /// if the upload was unknown or already terminal.
    fn cancel(&self, id: Uuid) -> Option<String> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(&id)?;
        if entry.status != UploadStatus::InFlight {
            return None;
        }
        entry.status = UploadStatus::Cancelled;
        entry.abort.abort();
        Some(entry.message_id.clone())
    }

    /// Transition to a terminal outcome unless already cancelled.
    fn try_finish(&self, id: Uuid, outcome: UploadStatus) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id) else {
            return false;
        };
        if entry.status != UploadStatus::InFlight {
            return false;
        }
        entry.status = outcome;
        true
    }

    fn uploading_count(&self, message_id: &str) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| e.message_id == message_id && e.status == UploadStatus::InFlight)
            .count()
    }
}

/// Encrypts, signs, and uploads attachments for compose flows.
pub struct UploadPipeline {
    keys: Arc<dyn KeyProvider>,
    transport: Arc<dyn Transport>,
    registry: Arc<Registry>,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadPipeline {
    /// Create a pipeline over the given key provider and transport.
    pub fn new(keys: Arc<dyn KeyProvider>, transport: Arc<dyn Transport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            keys,
            transport,
            registry: Arc::new(Registry::default()),
            events,
        }
    }

    /// Subscribe to lifecycle events for every upload this pipeline runs.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Number of uploads still in flight for a message.
    ///
    /// Updated on every enqueue/complete/cancel/failure transition, so a
    /// send action can stay disabled exactly while this is non-zero.
    pub fn uploading_count(&self, message_id: &str) -> usize {
        self.registry.uploading_count(message_id)
    }

    /// Externally observable state of one upload, if known.
    pub fn status(&self, local_request_id: Uuid) -> Option<UploadStatus> {
        self.registry.status(local_request_id)
    }

    /// Encrypt, sign, and submit a batch of files for a message.
    ///
    /// Each file gets a fresh session key, a detached signature from
    /// the sending address, and a fresh `localRequestId`; the transport
    /// work runs in the background and reports through the event
    /// channel. Returns the local request ids in file order.
    pub async fn enqueue(
        &self,
        files: Vec<UploadFile>,
        message_id: &str,
        address_id: &str,
        mode: UploadMode,
    ) -> Result<Vec<Uuid>> {
        let address_keys = self.keys.private_keys(address_id).await?;
        let signer = address_keys
            .first()
            .cloned()
            .ok_or_else(|| {
                Error::KeyResolution(format!("No private keys for address {}", address_id))
            })?;

        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            ids.push(self.enqueue_one(file, message_id, mode, &signer, &address_keys)?);
        }
        Ok(ids)
    }

    /// Abort a pending upload.
    ///
    /// Authoritative: after this returns, no further progress or
    /// completion event for the id can be emitted, the transport future
    /// is aborted, and the message's attachment list is left as if the
    /// upload never started. Unknown or already-terminal ids are a
    /// no-op.
    pub fn abort(&self, local_request_id: Uuid) {
        let Some(message_id) = self.registry.cancel(local_request_id) else {
            return;
        };
        tracing::info!(upload = %local_request_id, "Upload aborted");
        let _ = self.events.send(UploadEvent::Aborted {
            local_request_id,
            message_id,
        });
    }

    fn enqueue_one(
        &self,
        file: UploadFile,
        message_id: &str,
        mode: UploadMode,
        signer: &Arc<AddressKeys>,
        address_keys: &[Arc<AddressKeys>],
    ) -> Result<Uuid> {
        let mime_type = file
            .mime_type
            .clone()
            .unwrap_or_else(|| guess_mime(&file.filename).to_string());

        let session_key = SessionKey::generate();
        let data_packet = encrypt_payload(&session_key, &file.bytes)?;
        let signature = sign_detached(&signer.signing, &file.bytes);
        let key_packets = seal_to_address(&session_key, &signer.decryption.public_bytes())?;

        let local_request_id = Uuid::new_v4();
        let request = UploadRequest {
            filename: file.filename.clone(),
            message_id: message_id.to_string(),
            content_id: format!("{}@sealmail", Uuid::new_v4()),
            mime_type,
            inline: mode == UploadMode::Inline,
            key_packets,
            data_packet,
            signature: Some(signature),
        };

        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        self.registry.register(local_request_id, message_id, abort_handle);

        let _ = self.events.send(UploadEvent::Started {
            local_request_id,
            message_id: message_id.to_string(),
            filename: file.filename,
        });
        tracing::info!(
            upload = %local_request_id,
            message = message_id,
            "Upload enqueued"
        );

        let transport = Arc::clone(&self.transport);
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let own_keys: Vec<Arc<AddressKeys>> = address_keys.to_vec();
        let message_id = message_id.to_string();

        tokio::spawn(async move {
            let progress = progress_reporter(local_request_id, &registry, &events);
            let upload = Abortable::new(
                transport.upload(request, progress),
                abort_registration,
            );

            let outcome = match upload.await {
                // The abort path already emitted its event.
                Err(futures::future::Aborted) => return,
                Ok(result) => result,
            };

            match outcome {
                Ok(response) => {
                    finish(
                        &registry, &events, local_request_id, &message_id,
                        &session_key, &own_keys, response,
                    );
                }
                Err(err) if err.is_cancellation() => {}
                Err(err) => {
                    if registry.try_finish(local_request_id, UploadStatus::Failed) {
                        tracing::warn!(upload = %local_request_id, %err, "Upload failed");
                        let _ = events.send(UploadEvent::Failed {
                            local_request_id,
                            message_id,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        });

        Ok(local_request_id)
    }
}

/// Settle a transport success: self-check, then complete or fail.
fn finish(
    registry: &Registry,
    events: &broadcast::Sender<UploadEvent>,
    local_request_id: Uuid,
    message_id: &str,
    session_key: &SessionKey,
    own_keys: &[Arc<AddressKeys>],
    response: UploadResponse,
) {
    // Round-trip self-check: the canonical key recovered from the
    // server's record must be the one this client just generated.
    let verdict = unseal_with_keys(&response.attachment.key_packets, own_keys)
        .map(|recovered| recovered.matches(session_key));

    match verdict {
        Ok(true) => {
            if registry.try_finish(local_request_id, UploadStatus::Completed) {
                tracing::info!(
                    upload = %local_request_id,
                    attachment = %response.attachment.id,
                    "Upload completed"
                );
                let _ = events.send(UploadEvent::Completed {
                    local_request_id,
                    message_id: message_id.to_string(),
                    attachment: response.attachment,
                });
            }
        }
        Ok(false) | Err(_) => {
            if registry.try_finish(local_request_id, UploadStatus::Failed) {
                tracing::warn!(upload = %local_request_id, "Upload self-check failed");
                let _ = events.send(UploadEvent::Failed {
                    local_request_id,
                    message_id: message_id.to_string(),
                    reason: "Server record failed round-trip key check".into(),
                });
            }
        }
    }
}

/// Byte-counter callback that emits monotone percent events.
fn progress_reporter(
    local_request_id: Uuid,
    registry: &Arc<Registry>,
    events: &broadcast::Sender<UploadEvent>,
) -> ByteProgress {
    let registry = Arc::clone(registry);
    let events = events.clone();
    let high_water = AtomicU8::new(0);

    Arc::new(move |sent, total| {
        let percent = if total == 0 {
            100
        } else {
            ((sent.min(total)) * 100 / total) as u8
        };
        // Transport counters may jitter; never report a lower percent.
        let previous = high_water.fetch_max(percent, Ordering::SeqCst);
        let percent = percent.max(previous);

        registry.publish_progress(local_request_id, percent, &events);
    })
}

/// MIME type from a filename extension, defaulting to octet-stream.
fn guess_mime(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// TESTS
// ============================================================================
