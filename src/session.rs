//! Session-scoped wiring of the attachment components.
//!
//! The decrypted-payload cache, the verification-status cache, and the
//! handle store all live for one view session and die with it. Owning
//! them behind a single struct keeps them injectable (tests build a
//! fresh session per case) while preserving the "cache survives across
//! renders within a session" contract. No process-wide state exists.

use std::sync::Arc;

use crate::crypto::CryptoResolver;
use crate::embedded::{EmbeddedConfig, HandleStore};
use crate::keys::KeyProvider;
use crate::transport::Transport;
use crate::upload::UploadPipeline;
use crate::verify::{ConfirmationGate, Verifier};

/// One user session's attachment subsystem.
///
/// Every component shares the same key provider and transport; caches
/// are scoped to this struct's lifetime.
pub struct AttachmentSession {
    /// Lazy decrypt-and-cache for attachment payloads
    pub resolver: CryptoResolver,
    /// Signature verification and its status cache
    pub verifier: Verifier,
    /// Live ephemeral handles for inline content
    pub handles: HandleStore,
    /// Encrypt-sign-upload pipeline for compose flows
    pub uploads: UploadPipeline,
    /// Remembered download confirmations for invalid signatures
    pub confirmations: ConfirmationGate,
    /// Viewer preferences for embedded content
    pub embedded_config: EmbeddedConfig,
}

impl AttachmentSession {
    /// Wire a session over a key provider and transport.
    pub fn new(keys: Arc<dyn KeyProvider>, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(keys, transport, EmbeddedConfig::default())
    }

    /// Wire a session with explicit embedded-content preferences.
    pub fn with_config(
        keys: Arc<dyn KeyProvider>,
        transport: Arc<dyn Transport>,
        embedded_config: EmbeddedConfig,
    ) -> Self {
        Self {
            resolver: CryptoResolver::new(Arc::clone(&keys), Arc::clone(&transport)),
            verifier: Verifier::new(Arc::clone(&keys)),
            handles: HandleStore::new(),
            uploads: UploadPipeline::new(keys, transport),
            confirmations: ConfirmationGate::new(),
            embedded_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{Attachment, AttachmentId, Headers, Provenance};
    use crate::crypto::{encrypt_payload, seal_to_address, DecryptContext, SessionKey};
    use crate::embedded::{
        find_inline_references, resolve_inline, rewrite, AllocationScope, ContentReference, Node,
        RewriteDirection,
    };
    use crate::keys::{AddressKeys, SenderPublicKey, StaticKeyProvider};
    use crate::transport::MemoryTransport;
    use crate::verify::{sign_detached, VerificationStatus};

    #[test]
    fn test_sessions_do_not_share_caches() {
        let keys = Arc::new(StaticKeyProvider::new());
        let transport = Arc::new(MemoryTransport::new());

        let a = AttachmentSession::new(keys.clone(), transport.clone());
        let b = AttachmentSession::new(keys, transport);

        a.handles.allocate(
            &crate::embedded::AllocationScope::Conversation("c".into()),
            crate::embedded::ContentReference::new("x@y"),
            bytes::Bytes::from_static(b"img"),
            "image/png",
        );
        assert_eq!(a.handles.len(), 1);
        assert!(b.handles.is_empty());
    }

    /// Inbound path, end to end: a signed inline png is found, decrypted,
    /// verified, and rewritten into the document as a live handle.
    #[tokio::test]
    async fn test_inline_signed_png_renders_through_the_session() {
        let address_keys = Arc::new(AddressKeys::generate());
        let mut provider = StaticKeyProvider::new();
        provider.add_address("addr-1", Arc::clone(&address_keys));
        provider.add_sender(
            "alice@example.com",
            SenderPublicKey {
                key: address_keys.signing.public_bytes(),
                compromised: false,
            },
        );

        let plaintext = b"png-bytes";
        let session_key = SessionKey::generate();
        let key_packets =
            seal_to_address(&session_key, &address_keys.decryption.public_bytes()).unwrap();
        let ciphertext = encrypt_payload(&session_key, plaintext).unwrap();
        let signature = sign_detached(&address_keys.signing, plaintext);

        let mut headers = Headers::new();
        headers.set("content-disposition", "inline; filename=\"cat.png\"");
        headers.set("content-id", "<abc@x>");
        let attachment = Attachment {
            id: AttachmentId::server("att-1"),
            headers,
            mime_type: "image/png".into(),
            size: plaintext.len() as u64,
            key_packets,
            signature: Some(signature),
            provenance: Provenance::Native,
        };

        let transport = Arc::new(MemoryTransport::new());
        transport.put_ciphertext(attachment.id.clone(), ciphertext);
        let session = AttachmentSession::with_config(
            Arc::new(provider),
            transport,
            crate::embedded::EmbeddedConfig {
                auto_load_embedded: true,
            },
        );

        let table = find_inline_references(std::slice::from_ref(&attachment));
        assert!(table.contains(&ContentReference::new("abc@x")));

        let ctx = DecryptContext::Address { address_id: "addr-1" };
        let payload = session.resolver.open(&attachment, ctx).await.unwrap();
        let status = session
            .verifier
            .verify(&attachment, &payload, "alice@example.com")
            .await;
        assert_eq!(status, VerificationStatus::SignedAndValid);

        let scope = AllocationScope::Conversation("conv-1".into());
        resolve_inline(
            &session.resolver,
            &session.handles,
            &scope,
            &table,
            std::slice::from_ref(&attachment),
            ctx,
            &session.embedded_config,
        )
        .await
        .unwrap();

        let doc = Node::element(
            "body",
            vec![],
            vec![Node::element("img", vec![("src", "cid:abc@x")], vec![])],
        );
        let rendered = rewrite(&doc, RewriteDirection::ToRenderable, &table, &session.handles);
        let Node::Element { children, .. } = &rendered else { panic!() };
        let src = children[0].attr("src").unwrap();
        assert!(src.starts_with("sealmail-blob:"));
        assert_eq!(
            session.handles.reference_for_uri(src),
            Some(ContentReference::new("abc@x"))
        );
    }
}
