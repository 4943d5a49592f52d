//! Inline content references and the per-message reference table.

use std::collections::HashMap;
use std::fmt;

use crate::attachment::{Attachment, AttachmentId};

/// MIME types eligible for inline display.
pub const EMBEDDABLE_MIME_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/gif", "image/bmp"];

/// A stable reference linking inline markup to its attachment.
///
/// Taken from the `content-id` header with any surrounding angle
/// brackets stripped, falling back to `content-location` when no
/// content-id is present.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentReference(String);

impl ContentReference {
    /// Build a reference from a raw header value.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_matches(|c| c == '<' || c == '>').to_string())
    }

    /// Extract the reference an attachment's headers advertise, if any.
    pub fn from_attachment(attachment: &Attachment) -> Option<Self> {
        attachment
            .headers
            .content_id()
            .or_else(|| attachment.headers.content_location())
            .map(Self::new)
    }

    /// The bare reference string, without angle brackets.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `cid:` form used in durable document markup.
    pub fn durable_uri(&self) -> String {
        format!("cid:{}", self.0)
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether an attachment qualifies for inline rendering.
fn is_embeddable(attachment: &Attachment) -> bool {
    attachment.is_inline()
        && EMBEDDABLE_MIME_TYPES.contains(&attachment.mime_type.to_lowercase().as_str())
}

/// Inline references recognized for one message, keyed by reference.
#[derive(Clone, Debug, Default)]
pub struct ReferenceTable {
    entries: HashMap<ContentReference, AttachmentId>,
}

impl ReferenceTable {
    /// The attachment a reference points at, if the table knows it.
    pub fn attachment_for(&self, reference: &ContentReference) -> Option<&AttachmentId> {
        self.entries.get(reference)
    }

    /// Whether the table recognizes the reference.
    pub fn contains(&self, reference: &ContentReference) -> bool {
        self.entries.contains_key(reference)
    }

    /// Iterate over every (reference, attachment) pair.
    pub fn iter(&self) -> impl Iterator<Item = (&ContentReference, &AttachmentId)> {
        self.entries.iter()
    }

    /// Number of recognized references.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the message has any inline references at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan an attachment list for inline references.
///
/// Only attachments with an inline content-disposition, an embeddable
/// MIME type, and a usable reference header make it into the table.
pub fn find_inline_references(attachments: &[Attachment]) -> ReferenceTable {
    let mut entries = HashMap::new();
    for attachment in attachments {
        if !is_embeddable(attachment) {
            continue;
        }
        let Some(reference) = ContentReference::from_attachment(attachment) else {
            continue;
        };
        entries.insert(reference, attachment.id.clone());
    }
    ReferenceTable { entries }
}
