//! Decrypt-once resolution of inline attachments into live handles.

use bytes::Bytes;
use std::collections::HashMap;

use crate::attachment::{Attachment, AttachmentId};
use crate::crypto::{CryptoResolver, DecryptContext};
use crate::error::Result;

use super::refs::ReferenceTable;
use super::store::{AllocationScope, HandleStore};

/// Viewer preferences for embedded content.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedConfig {
    /// Decrypt and display inline images without asking
    pub auto_load_embedded: bool,
}

/// Resolve every not-yet-resolved inline reference into a handle.
///
/// Decryption runs only when the viewer has enabled automatic display,
/// or when the scope is a draft (the user authored a draft's images, so
/// they always render). Each reference is decrypted at most once per
/// call and the resolver's cache makes repeat calls cheap. A single
/// attachment failing to decrypt skips that reference rather than
/// failing the rest.
///
/// Returns the number of handles newly allocated.
pub async fn resolve_inline(
    resolver: &CryptoResolver,
    store: &HandleStore,
    scope: &AllocationScope,
    table: &ReferenceTable,
    attachments: &[Attachment],
    ctx: DecryptContext<'_>,
    config: &EmbeddedConfig,
) -> Result<usize> {
    if !config.auto_load_embedded && !scope.is_draft() {
        return Ok(0);
    }

    let by_id: HashMap<&AttachmentId, &Attachment> =
        attachments.iter().map(|a| (&a.id, a)).collect();

    let mut allocated = 0;
    for (reference, attachment_id) in table.iter() {
        if store.lookup(reference).is_some() {
            continue;
        }
        let Some(attachment) = by_id.get(attachment_id) else {
            continue;
        };

        match resolver.open(attachment, ctx).await {
            Ok(payload) => {
                store.allocate(
                    scope,
                    reference.clone(),
                    Bytes::clone(&payload.plaintext),
                    &attachment.mime_type,
                );
                allocated += 1;
            }
            Err(err) => {
                tracing::warn!(
                    attachment = %attachment_id,
                    reference = %reference,
                    %err,
                    "Inline attachment failed to decrypt"
                );
            }
        }
    }

    Ok(allocated)
}
