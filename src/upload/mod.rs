//! # Upload Pipeline
//!
//! Encrypt-sign-upload pipeline with typed lifecycle events and a
//! cancel-wins abort registry.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          UPLOAD LIFECYCLE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  enqueue(files, message, address, mode)                                 │
//! │        │  per file: guess MIME ► generate session key ► encrypt         │
//! │        │  ► detached-sign ► seal key to own address ► localRequestId    │
//! │        ▼                                                                │
//! │   ┌─────────┐  progress (monotone 0-100%)   ┌───────────┐              │
//! │   │InFlight │ ────────────────────────────► │ Completed │ after the    │
//! │   └────┬────┘   transport bytes counters    └───────────┘ round-trip   │
//! │        │                                                   self-check  │
//! │        │ abort(id)            ┌───────────┐                            │
//! │        ├─────────────────────►│ Cancelled │  cancel WINS any race:     │
//! │        │                      └───────────┘  a completion arriving     │
//! │        │ transport error /                   after abort is discarded  │
//! │        │ self-check mismatch  ┌───────────┐                            │
//! │        └─────────────────────►│  Failed   │  no automatic retry        │
//! │                               └───────────┘                            │
//! │                                                                         │
//! │  Every transition updates the per-message uploading count and emits     │
//! │  one typed event on the broadcast channel.                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod events;
mod pipeline;
mod request;

pub use events::UploadEvent;
pub use pipeline::{UploadFile, UploadMode, UploadPipeline, UploadStatus};
pub use request::{UploadRequest, UploadResponse};

// ── Base64 serde helpers for binary multipart fields ──

pub(crate) mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod b64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(&encoded)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
