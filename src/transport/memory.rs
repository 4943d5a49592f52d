//! In-memory transport.
//!
//! Backs the test suite and local tooling. Downloads serve blobs seeded
//! with [`MemoryTransport::put_ciphertext`]; uploads synthesize a server
//! attachment record from the request. Operation counters let tests assert
//! coalescing (exactly one fetch per identity) and step delays let them
//! interleave aborts with in-flight progress.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::attachment::{Attachment, AttachmentId, Headers, Provenance};
use crate::error::{Error, Result};
use crate::upload::{UploadRequest, UploadResponse};

use super::{ByteProgress, Transport};

/// In-memory [`Transport`] implementation.
#[derive(Default)]
pub struct MemoryTransport {
    blobs: Mutex<HashMap<AttachmentId, Bytes>>,
    uploaded: Mutex<Vec<UploadRequest>>,
    fetch_count: AtomicUsize,
    upload_count: AtomicUsize,
    download_latency: Option<Duration>,
    upload_step: Option<Duration>,
    corrupt_key_packets: AtomicBool,
    fail_uploads: AtomicBool,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every download by `latency` (lets tests overlap concurrent
    /// fetches).
    pub fn with_download_latency(mut self, latency: Duration) -> Self {
        self.download_latency = Some(latency);
        self
    }

    /// Sleep between upload progress steps (lets tests abort mid-flight).
    pub fn with_upload_step(mut self, step: Duration) -> Self {
        self.upload_step = Some(step);
        self
    }

    /// Seed ciphertext for a download.
    pub fn put_ciphertext(&self, id: AttachmentId, ciphertext: impl Into<Bytes>) {
        self.blobs.lock().insert(id, ciphertext.into());
    }

    /// Number of downloads served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Number of uploads accepted so far.
    pub fn upload_count(&self) -> usize {
        self.upload_count.load(Ordering::SeqCst)
    }

    /// Requests accepted by [`Transport::upload`], in order.
    pub fn uploaded(&self) -> Vec<UploadRequest> {
        self.uploaded.lock().clone()
    }

    /// Make the synthesized server records carry mangled key packets
    /// (exercises the pipeline's round-trip self-check).
    pub fn corrupt_key_packets(&self, yes: bool) {
        self.corrupt_key_packets.store(yes, Ordering::SeqCst);
    }

    /// Make every upload fail with a transport error.
    pub fn fail_uploads(&self, yes: bool) {
        self.fail_uploads.store(yes, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn download(&self, id: &AttachmentId) -> Result<Bytes> {
        if let Some(latency) = self.download_latency {
            tokio::time::sleep(latency).await;
        }
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::AttachmentNotFound(id.to_string()))
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: ByteProgress,
    ) -> Result<UploadResponse> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::UploadTransport("upload rejected".into()));
        }

        let total = request.data_packet.len() as u64;
        // Report byte counters in five steps, mimicking a chunked body write.
        for step in 1..=5u64 {
            if let Some(delay) = self.upload_step {
                tokio::time::sleep(delay).await;
            }
            progress(total * step / 5, total);
        }

        let mut key_packets = request.key_packets.clone();
        if self.corrupt_key_packets.load(Ordering::SeqCst) {
            for b in key_packets.iter_mut() {
                *b ^= 0xFF;
            }
        }

        let mut headers = Headers::new();
        let disposition = if request.inline { "inline" } else { "attachment" };
        headers.set(
            "content-disposition",
            format!("{}; filename=\"{}\"", disposition, request.filename),
        );
        headers.set("content-id", format!("<{}>", request.content_id));
        headers.set("content-transfer-encoding", "base64");

        let record = Attachment {
            id: AttachmentId::server(format!("srv-{}", Uuid::new_v4())),
            headers,
            mime_type: request.mime_type.clone(),
            size: total,
            key_packets,
            signature: request.signature.clone(),
            provenance: Provenance::Native,
        };

        self.blobs
            .lock()
            .insert(record.id.clone(), Bytes::from(request.data_packet.clone()));
        self.uploaded.lock().push(request);
        self.upload_count.fetch_add(1, Ordering::SeqCst);

        Ok(UploadResponse { attachment: record })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_download_counts_fetches() {
        let transport = MemoryTransport::new();
        let id = AttachmentId::server("att-1");
        transport.put_ciphertext(id.clone(), vec![9u8; 16]);

        let bytes = transport.download(&id).await.unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(transport.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_download_unknown_id_fails() {
        let transport = MemoryTransport::new();
        let err = transport
            .download(&AttachmentId::server("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AttachmentNotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_reports_full_progress() {
        let transport = MemoryTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            Arc::new(move |sent: u64, total: u64| seen.lock().push((sent, total))) as ByteProgress
        };

        let request = UploadRequest {
            filename: "a.bin".into(),
            message_id: "msg-1".into(),
            content_id: "c-1".into(),
            mime_type: "application/octet-stream".into(),
            inline: false,
            key_packets: vec![1],
            data_packet: vec![0u8; 100],
            signature: None,
        };

        let response = transport.upload(request, sink).await.unwrap();
        assert!(!response.attachment.id.is_pending());
        assert_eq!(seen.lock().last(), Some(&(100, 100)));
        assert_eq!(transport.upload_count(), 1);
    }
}
