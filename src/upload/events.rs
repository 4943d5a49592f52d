//! Typed upload lifecycle events.
//!
//! Consumers subscribe to the pipeline's broadcast channel instead of a
//! global event bus; each state transition produces exactly one event.

use serde::Serialize;
use uuid::Uuid;

use crate::attachment::Attachment;

/// One upload lifecycle transition.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// The request was accepted and handed to the transport
    Started {
        /// Client-generated id for this upload
        local_request_id: Uuid,
        /// Message the upload belongs to
        message_id: String,
        /// Original filename
        filename: String,
    },
    /// Transport byte counters moved
    Progress {
        /// Client-generated id for this upload
        local_request_id: Uuid,
        /// Monotone non-decreasing percentage, 0-100
        percent: u8,
    },
    /// The server record passed the round-trip self-check
    Completed {
        /// Client-generated id for this upload
        local_request_id: Uuid,
        /// Message the upload belongs to
        message_id: String,
        /// Final server-assigned attachment record
        attachment: Attachment,
    },
    /// The upload was cancelled before completion
    Aborted {
        /// Client-generated id for this upload
        local_request_id: Uuid,
        /// Message the upload belonged to
        message_id: String,
    },
    /// The transport failed or the self-check rejected the record
    Failed {
        /// Client-generated id for this upload
        local_request_id: Uuid,
        /// Message the upload belonged to
        message_id: String,
        /// Human-readable failure description
        reason: String,
    },
}

impl UploadEvent {
    /// The local request id carried by any event variant.
    pub fn local_request_id(&self) -> Uuid {
        match self {
            Self::Started { local_request_id, .. }
            | Self::Progress { local_request_id, .. }
            | Self::Completed { local_request_id, .. }
            | Self::Aborted { local_request_id, .. }
            | Self::Failed { local_request_id, .. } => *local_request_id,
        }
    }
}
