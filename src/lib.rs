//! # Sealmail Core
//!
//! The encrypted-attachment subsystem of a webmail client: lazy
//! decryption with caching, signature verification, inline image
//! handling, and an encrypt-sign-upload pipeline.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SEALMAIL CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │   Crypto    │  │   Verify    │  │  Embedded   │  │    Upload    │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Session   │  │ - Detached  │  │ - Inline    │  │ - Encrypt    │   │
//! │  │   keys      │  │   + embed.  │  │   refs      │  │ - Sign       │   │
//! │  │ - Lazy      │  │   sigs      │  │ - Handles   │  │ - Progress   │   │
//! │  │   decrypt   │  │ - Status    │  │ - Rewrite   │  │ - Abort      │   │
//! │  │ - Coalesce  │  │   cache     │  │ - Scopes    │  │ - Self-check │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         │                │                │                │           │
//! │         └────────────────┴───────┬────────┴────────────────┘           │
//! │                                  │                                      │
//! │  ┌─────────────┐  ┌─────────────▼───┐  ┌─────────────────────────────┐ │
//! │  │  Envelope   │  │    Session      │  │  Keys / Transport (traits)  │ │
//! │  │             │  │                 │  │                             │ │
//! │  │ - Convert   │  │ - Owns caches   │  │ - KeyProvider               │ │
//! │  │   embedded  │  │ - One per view  │  │ - Transport (download /     │ │
//! │  │   parts     │  │   session       │  │   upload with progress)     │ │
//! │  └─────────────┘  └─────────────────┘  └─────────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error taxonomy for the whole crate
//! - [`attachment`] - Attachment records, identities, and headers
//! - [`keys`] - Key types and the key-management seam
//! - [`transport`] - Download/upload seam and the in-memory transport
//! - [`crypto`] - Session keys, payload encryption, lazy decrypt resolver
//! - [`verify`] - Signature verification and the confirmation gate
//! - [`embedded`] - Inline references, ephemeral handles, document rewrite
//! - [`upload`] - Encrypt-sign-upload pipeline with lifecycle events
//! - [`envelope`] - Conversion of envelope-embedded attachments
//! - [`session`] - Session-scoped wiring of all of the above
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            ATTACHMENT FLOW                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Inbound:  fetch ciphertext ──► unseal session key ──► decrypt ──►      │
//! │            verify signature ──► render (inline via ephemeral handle)    │
//! │            Decryption is lazy (first render/download), cached, and      │
//! │            coalesced per attachment identity. Failure falls back to     │
//! │            an explicit raw-blob download, never blank content.          │
//! │                                                                         │
//! │  Outbound: pick files ──► fresh session key ──► encrypt + detached      │
//! │            sign ──► seal key to own address ──► upload with progress    │
//! │            ──► round-trip self-check ──► server record accepted.        │
//! │            A completed upload is indistinguishable from a               │
//! │            server-native attachment.                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod attachment;
pub mod crypto;
pub mod embedded;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod session;
pub mod transport;
pub mod upload;
pub mod verify;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use attachment::{Attachment, AttachmentId, Headers, Provenance};
pub use error::{Error, Result};
pub use session::AttachmentSession;
