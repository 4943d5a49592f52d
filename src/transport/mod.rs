//! # Transport Seam
//!
//! The interface the pipeline consumes for moving attachment bytes. The
//! surrounding application wires its HTTP client behind [`Transport`];
//! this crate never talks to the network itself.
//!
//! ## Contract
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TRANSPORT CONTRACT                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  download(id)          Binary fetch by attachment id, returning the    │
//! │                        raw ciphertext bytes.                            │
//! │                                                                         │
//! │  upload(req, progress) Multipart submit of an encrypted attachment.    │
//! │                        `progress` is driven by transport-level byte     │
//! │                        counters (sent, total). The transport makes no   │
//! │                        monotonicity promise; the pipeline enforces it.  │
//! │                                                                         │
//! │  Cancellation is owned by the upload pipeline (the transport future    │
//! │  is raced against an abort handle), so the trait carries no abort      │
//! │  surface of its own.                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;

pub use memory::MemoryTransport;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::attachment::AttachmentId;
use crate::error::Result;
use crate::upload::{UploadRequest, UploadResponse};

/// Byte-counter progress callback: `(bytes_sent, bytes_total)`.
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Byte transport for attachment ciphertext.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the raw ciphertext of a persisted attachment.
    async fn download(&self, id: &AttachmentId) -> Result<Bytes>;

    /// Submit an encrypted attachment, reporting byte counters to
    /// `progress` as the body is written.
    async fn upload(&self, request: UploadRequest, progress: ByteProgress)
        -> Result<UploadResponse>;
}
