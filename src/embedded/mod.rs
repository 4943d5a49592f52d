//! # Embedded Content
//!
//! Inline image tracking, ephemeral handle allocation, and pure
//! document rewriting between durable and renderable reference forms.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        EMBEDDED CONTENT FLOW                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Attachment list ──► find_inline_references ──► ReferenceTable          │
//! │                        (inline disposition +                            │
//! │                         embeddable MIME type)                           │
//! │                                                                         │
//! │  ReferenceTable ──► resolve_inline ──► CryptoResolver.open (once per    │
//! │                        │                reference, cached + coalesced)  │
//! │                        ▼                                                │
//! │                  HandleStore.allocate ──► EphemeralHandle               │
//! │                        │                  (sealmail-blob: URI owning    │
//! │                        │                   the decrypted bytes)         │
//! │                        ▼                                                │
//! │  Document ◄──── rewrite(ToRenderable) ── cid:ref  → handle URI          │
//! │  Document ◄──── rewrite(ToDurable)    ── handle URI → cid:ref           │
//! │                                                                         │
//! │  AllocationScope (conversation or draft) exclusively owns its handles;  │
//! │  release(scope) is the only deallocation path and is idempotent.        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `rewrite` is a pure function over an immutable [`Node`] tree: render
//! and persist paths never alias a shared mutable document.

mod doc;
mod refs;
mod resolve;
mod rewrite;
mod store;

pub use doc::Node;
pub use refs::{find_inline_references, ContentReference, ReferenceTable, EMBEDDABLE_MIME_TYPES};
pub use resolve::{resolve_inline, EmbeddedConfig};
pub use rewrite::{rewrite, RewriteDirection};
pub use store::{AllocationScope, EphemeralHandle, HandleStore, HANDLE_URI_SCHEME};
