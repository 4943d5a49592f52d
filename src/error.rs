//! # Error Handling
//!
//! Error types for the attachment pipeline.
//!
//! ## Error Taxonomy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR TAXONOMY                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key Resolution                                                    │
//! │  │   └── KeyResolution        - No usable private key / wrong password │
//! │  │                              Surfaced as "cannot decrypt".          │
//! │  │                                                                      │
//! │  ├── Crypto                                                            │
//! │  │   ├── Decryption           - Ciphertext corrupt or key mismatch.    │
//! │  │   │                          Callers fall back to the raw blob.     │
//! │  │   ├── Encryption           - Payload encryption failed              │
//! │  │   ├── Signing              - Detached signing failed                │
//! │  │   └── InvalidKey           - Malformed key or signature bytes       │
//! │  │                                                                      │
//! │  ├── Upload                                                            │
//! │  │   ├── UploadTransport      - Transport failure; never auto-retried  │
//! │  │   └── Aborted              - Normal cancellation outcome, not a     │
//! │  │                              user-visible failure                   │
//! │  │                                                                      │
//! │  └── General                                                           │
//! │      ├── AttachmentNotFound   - Unknown attachment identity            │
//! │      ├── Serialization        - Wire record encode/decode failed       │
//! │      └── Internal             - Should not happen in normal operation  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Signature verification failures are deliberately absent: an unverifiable
//! signature degrades to a [`VerificationStatus`](crate::verify::VerificationStatus)
//! value, never an error.

use thiserror::Error;

/// Result type alias for attachment pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the attachment pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// No usable private key, or the shared-link password was wrong.
    ///
    /// Presented to the user as "cannot decrypt"; never retried
    /// automatically.
    #[error("Cannot resolve session key: {0}")]
    KeyResolution(String),

    /// Ciphertext is corrupt or the session key does not match.
    ///
    /// Carries the attachment identity so the caller can offer the raw
    /// key-packets‖ciphertext blob as a download instead of rendering
    /// blank content.
    #[error("Failed to decrypt attachment {attachment_id}: {reason}")]
    Decryption {
        /// Identity of the attachment that failed to decrypt
        attachment_id: String,
        /// Underlying failure description
        reason: String,
    },

    /// Payload encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Detached signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Invalid key or signature bytes
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Transport-level upload failure.
    ///
    /// The pipeline performs no automatic retry; the caller may re-enqueue.
    #[error("Upload transport error: {0}")]
    UploadTransport(String),

    /// The operation was cancelled.
    ///
    /// This is a normal outcome of `abort`, not a failure to surface to
    /// the user.
    #[error("Operation aborted")]
    Aborted,

    /// Unknown attachment identity
    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    /// Wire record encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error represents a cancellation rather than a failure.
    ///
    /// Cancellations are expected outcomes of `abort` and must not be
    /// shown to the user as errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Whether the caller should offer the raw, undecrypted blob as a
    /// download fallback.
    pub fn offers_raw_fallback(&self) -> bool {
        matches!(self, Error::Decryption { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
