//! # Envelope Bridge
//!
//! Converts attachments embedded inside a multipart cryptographic body
//! into first-class attachment records.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ENVELOPE CONVERSION                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  multipart envelope body ──(MIME parse, upstream)──► EnvelopePart[]     │
//! │        │                                                                │
//! │        ▼  convert(parts, message, envelope verification)                │
//! │  deterministic synthetic id: SHA-256(message id ‖ part checksum ‖       │
//! │  ordinal) so re-parsing the same envelope yields the same identities    │
//! │        │                                                                │
//! │        ├──► Attachment record with reconstructed headers                │
//! │        ├──► CryptoResolver.register_decrypted (payload is already       │
//! │        │    plaintext; no fetch or decrypt will ever run for it)        │
//! │        └──► Verifier.record with the envelope's own verification        │
//! │             result (the body was verified as a whole)                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::attachment::{Attachment, AttachmentId, Headers, Provenance};
use crate::crypto::CryptoResolver;
use crate::verify::{VerificationStatus, Verifier};

/// Content-id suffix marking ids the MIME parser invented rather than
/// ones present in the envelope. Synthetic ids are not reproduced in
/// the converted record's headers; nothing in the body references them.
pub const SYNTHETIC_CONTENT_ID_SUFFIX: &str = "@synthetic.sealmail";

/// One decrypted part of a multipart envelope body, as produced by the
/// upstream MIME parser.
#[derive(Clone, Debug)]
pub struct EnvelopePart {
    /// Filename from the part's disposition, if any
    pub filename: Option<String>,
    /// Content-id as parsed; possibly parser-generated
    pub content_id: Option<String>,
    /// Content-type of the part
    pub mime_type: String,
    /// Whether the part was declared inline
    pub inline: bool,
    /// Transfer encoding declared on the part, if any
    pub transfer_encoding: Option<String>,
    /// Decrypted part payload
    pub data: Bytes,
}

/// Deterministic identity for an envelope-embedded attachment.
///
/// Derived from the message identity, a checksum of the part's content,
/// and its ordinal position, so the same envelope always converts to
/// the same identities across re-parses.
pub fn synthetic_id(message_id: &str, data: &[u8], ordinal: usize) -> AttachmentId {
    let mut hasher = Sha256::new();
    hasher.update(message_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(Sha256::digest(data));
    hasher.update((ordinal as u64).to_be_bytes());
    AttachmentId::server(hex::encode(hasher.finalize()))
}

/// Convert an envelope's parsed parts into attachment records.
///
/// Each part's already-decrypted payload is registered directly into
/// the resolver's cache and its status is seeded from the verification
/// result computed for the envelope as a whole, so converted
/// attachments flow through the same render and download paths as
/// server-native ones without touching the network again.
pub fn convert(
    resolver: &CryptoResolver,
    verifier: &Verifier,
    parts: Vec<EnvelopePart>,
    message_id: &str,
    envelope_status: VerificationStatus,
) -> Vec<Attachment> {
    parts
        .into_iter()
        .enumerate()
        .map(|(ordinal, part)| {
            let id = synthetic_id(message_id, &part.data, ordinal);
            let attachment = build_record(&id, &part);

            resolver.register_decrypted(id.clone(), part.data, Vec::new());
            verifier.record(id.clone(), envelope_status);
            tracing::debug!(
                message = message_id,
                attachment = %id,
                ordinal,
                "Converted envelope part"
            );
            attachment
        })
        .collect()
}

fn build_record(id: &AttachmentId, part: &EnvelopePart) -> Attachment {
    let mut headers = Headers::new();

    let disposition = if part.inline { "inline" } else { "attachment" };
    match &part.filename {
        Some(name) => headers.set(
            "content-disposition",
            format!("{}; filename=\"{}\"", disposition, name),
        ),
        None => headers.set("content-disposition", disposition),
    }

    if let Some(cid) = part.content_id.as_deref().filter(|c| !is_synthetic_cid(c)) {
        let bare = cid.trim_matches(|c| c == '<' || c == '>');
        headers.set("content-id", format!("<{}>", bare));
    }

    headers.set("content-type", part.mime_type.clone());
    if let Some(encoding) = &part.transfer_encoding {
        headers.set("content-transfer-encoding", encoding.clone());
    }

    Attachment {
        id: id.clone(),
        headers,
        mime_type: part.mime_type.clone(),
        size: part.data.len() as u64,
        key_packets: Vec::new(),
        signature: None,
        provenance: Provenance::ConvertedFromEnvelope,
    }
}

fn is_synthetic_cid(cid: &str) -> bool {
    cid.trim_matches(|c| c == '<' || c == '>')
        .ends_with(SYNTHETIC_CONTENT_ID_SUFFIX)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DecryptContext;
    use crate::keys::StaticKeyProvider;
    use crate::transport::MemoryTransport;
    use std::sync::Arc;

    fn bridge() -> (CryptoResolver, Verifier) {
        let keys: Arc<dyn crate::keys::KeyProvider> = Arc::new(StaticKeyProvider::new());
        (
            CryptoResolver::new(Arc::clone(&keys), Arc::new(MemoryTransport::new())),
            Verifier::new(keys),
        )
    }

    fn part(filename: &str, cid: Option<&str>, data: &'static [u8]) -> EnvelopePart {
        EnvelopePart {
            filename: Some(filename.to_string()),
            content_id: cid.map(String::from),
            mime_type: "image/png".into(),
            inline: cid.is_some(),
            transfer_encoding: Some("base64".into()),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_synthetic_ids_are_deterministic() {
        let a = synthetic_id("msg-1", b"payload", 0);
        let b = synthetic_id("msg-1", b"payload", 0);
        assert_eq!(a, b);

        // Any input changing changes the identity.
        assert_ne!(a, synthetic_id("msg-2", b"payload", 0));
        assert_ne!(a, synthetic_id("msg-1", b"other", 0));
        assert_ne!(a, synthetic_id("msg-1", b"payload", 1));
    }

    #[test]
    fn test_convert_reconstructs_headers() {
        let (resolver, verifier) = bridge();
        let parts = vec![
            part("pic.png", Some("<logo@corp>"), b"img"),
            part("doc.pdf", None, b"pdf"),
        ];

        let records = convert(
            &resolver,
            &verifier,
            parts,
            "msg-1",
            VerificationStatus::SignedAndValid,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].headers.content_id(), Some("<logo@corp>"));
        assert!(records[0].is_inline());
        assert_eq!(records[0].filename(), Some("pic.png"));
        assert_eq!(records[0].headers.transfer_encoding(), Some("base64"));
        assert_eq!(records[0].provenance, Provenance::ConvertedFromEnvelope);

        assert!(!records[1].is_inline());
        assert!(records[1].headers.content_id().is_none());
    }

    #[test]
    fn test_parser_generated_content_ids_dropped() {
        let (resolver, verifier) = bridge();
        let parts = vec![part(
            "pic.png",
            Some("<gen-1@synthetic.sealmail>"),
            b"img",
        )];

        let records = convert(
            &resolver,
            &verifier,
            parts,
            "msg-1",
            VerificationStatus::NotSigned,
        );
        assert!(records[0].headers.content_id().is_none());
    }

    #[tokio::test]
    async fn test_converted_payload_needs_no_fetch() {
        let (resolver, verifier) = bridge();
        let records = convert(
            &resolver,
            &verifier,
            vec![part("pic.png", Some("<logo@corp>"), b"img-bytes")],
            "msg-1",
            VerificationStatus::SignedAndValid,
        );

        // The payload comes straight from the resolver cache; the empty
        // transport would fail any actual fetch.
        let payload = resolver
            .open(&records[0], DecryptContext::Address { address_id: "addr" })
            .await
            .unwrap();
        assert_eq!(payload.plaintext.as_ref(), b"img-bytes");
        assert!(payload.from_cache);

        // And the envelope's verification result is already seeded.
        assert_eq!(
            verifier.status(&records[0].id),
            VerificationStatus::SignedAndValid
        );
    }

    #[test]
    fn test_reparse_yields_identical_identities() {
        let (resolver, verifier) = bridge();
        let parts = || vec![part("a.png", None, b"a"), part("b.png", None, b"b")];

        let first = convert(&resolver, &verifier, parts(), "msg-1", VerificationStatus::NotSigned);
        let second = convert(&resolver, &verifier, parts(), "msg-1", VerificationStatus::NotSigned);
        let ids = |records: &[Attachment]| {
            records.iter().map(|r| r.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
    }
}
