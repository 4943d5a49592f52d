//! # Attachment Data Model
//!
//! The attachment record shared by every stage of the pipeline.
//!
//! ## Record Shape
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ATTACHMENT RECORD                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  id            Server-assigned once persisted, or a locally            │
//! │                generated pending identifier before that                 │
//! │                                                                         │
//! │  headers       Lowercase header name → value:                          │
//! │                content-disposition, content-id, content-location,      │
//! │                content-transfer-encoding                               │
//! │                                                                         │
//! │  mime_type     Declared MIME type                                      │
//! │  size          Plaintext size in bytes                                 │
//! │                                                                         │
//! │  key_packets   Session key, asymmetrically sealed (opaque bytes)       │
//! │  signature     Optional detached Ed25519 signature over the plaintext  │
//! │                                                                         │
//! │  provenance    Native server object, or converted from a               │
//! │                multipart cryptographic envelope                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ciphertext is *not* part of the record: it is fetched on demand through
//! the [`Transport`](crate::transport::Transport) and never held eagerly.

mod headers;

pub use headers::Headers;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an attachment.
///
/// Server-assigned once the attachment is persisted; before that, a locally
/// generated pending identifier tags in-flight uploads. Both forms key the
/// decrypted-payload and verification caches.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(String);

impl AttachmentId {
    /// Wrap a server-assigned identifier.
    pub fn server(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh local pending identifier.
    pub fn pending() -> Self {
        Self(format!("pending-{}", Uuid::new_v4()))
    }

    /// Whether this is a local pending identifier (upload not yet
    /// acknowledged by the server).
    pub fn is_pending(&self) -> bool {
        self.0.starts_with("pending-")
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an attachment came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// A discrete server-stored object.
    #[default]
    Native,
    /// Reconstructed from a multipart cryptographic envelope by the
    /// [`envelope`](crate::envelope) bridge.
    ConvertedFromEnvelope,
}

/// An encrypted mail attachment.
///
/// The invariant callers must uphold: when `signature` is set, the
/// attachment must pass through the [`Verifier`](crate::verify::Verifier)
/// before its plaintext is treated as trusted for anything beyond a raw
/// download.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment identity (server or pending-local)
    pub id: AttachmentId,
    /// Lowercase header map
    pub headers: Headers,
    /// Declared MIME type
    pub mime_type: String,
    /// Plaintext size in bytes
    pub size: u64,
    /// Asymmetrically sealed session key (opaque bytes)
    #[serde(with = "base64_bytes")]
    pub key_packets: Vec<u8>,
    /// Optional detached signature over the plaintext
    #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub signature: Option<Vec<u8>>,
    /// Native server object vs envelope conversion
    #[serde(skip)]
    pub provenance: Provenance,
}

impl Attachment {
    /// Whether the plaintext must be verified before it is trusted.
    pub fn requires_verification(&self) -> bool {
        self.signature.is_some()
    }

    /// Filename from the content-disposition header, if present.
    pub fn filename(&self) -> Option<&str> {
        self.headers.filename()
    }

    /// Whether the declared disposition is inline.
    pub fn is_inline(&self) -> bool {
        self.headers.is_inline()
    }
}

/// Serde helper: byte vectors as base64 strings on the wire
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helper: optional byte vectors as base64 strings
mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) => STANDARD
                .decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attachment {
        let mut headers = Headers::new();
        headers.set("content-disposition", "inline; filename=\"cat.png\"");
        headers.set("content-id", "<abc@x>");
        Attachment {
            id: AttachmentId::server("att-1"),
            headers,
            mime_type: "image/png".into(),
            size: 1234,
            key_packets: vec![1, 2, 3, 4],
            signature: None,
            provenance: Provenance::Native,
        }
    }

    #[test]
    fn test_pending_id_is_pending() {
        assert!(AttachmentId::pending().is_pending());
        assert!(!AttachmentId::server("att-1").is_pending());
    }

    #[test]
    fn test_pending_ids_are_unique() {
        assert_ne!(AttachmentId::pending(), AttachmentId::pending());
    }

    #[test]
    fn test_requires_verification_only_when_signed() {
        let mut att = sample();
        assert!(!att.requires_verification());
        att.signature = Some(vec![0u8; 64]);
        assert!(att.requires_verification());
    }

    #[test]
    fn test_filename_and_inline_from_headers() {
        let att = sample();
        assert_eq!(att.filename(), Some("cat.png"));
        assert!(att.is_inline());
    }

    #[test]
    fn test_wire_roundtrip() {
        let att = sample();
        let json = serde_json::to_string(&att).unwrap();
        // binary fields travel as base64
        assert!(json.contains("\"keyPackets\":\"AQIDBA==\""));
        let restored: Attachment = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, att.id);
        assert_eq!(restored.key_packets, att.key_packets);
        assert_eq!(restored.mime_type, "image/png");
    }

    #[test]
    fn test_wire_omits_missing_signature() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("signature"));
    }
}
