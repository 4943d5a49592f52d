//! Upload wire contract: the multipart field set and the server's reply.

use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;

/// The multipart request an upload submits.
///
/// Field names follow the server contract: `filename`, `messageId`,
/// `contentId`, `mimeType`, `inline`, `keyPackets`, `dataPacket`,
/// `signature?`. Binary blobs ride as raw parts; when the request is
/// serialized for logging or test capture they appear base64-encoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Original filename
    pub filename: String,
    /// Message the attachment belongs to
    pub message_id: String,
    /// Durable content reference (always present; only rendered inline
    /// when `inline` is set)
    pub content_id: String,
    /// MIME type, passed through or guessed from the filename
    pub mime_type: String,
    /// Whether the attachment is an inline (embedded) image
    pub inline: bool,
    /// Sealed session key packets
    #[serde(with = "super::b64")]
    pub key_packets: Vec<u8>,
    /// Encrypted payload (nonce-prefixed AES-GCM data packet)
    #[serde(with = "super::b64")]
    pub data_packet: Vec<u8>,
    /// Detached Ed25519 signature over the plaintext
    #[serde(default, with = "super::b64_opt", skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
}

/// The server's acknowledgment of a completed upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// The persisted attachment record, with its server-assigned id.
    ///
    /// The pipeline does not trust this record until the round-trip
    /// self-check (unsealing its key packets with the sender's private
    /// key) succeeds.
    pub attachment: Attachment,
}

// ============================================================================
// TESTS
// ============================================================================
