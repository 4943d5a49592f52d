//! Ephemeral handle allocation, scoped to a conversation or draft.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::refs::ContentReference;

/// URI scheme of ephemeral handles.
pub const HANDLE_URI_SCHEME: &str = "sealmail-blob";

/// Owner of a set of ephemeral handles.
///
/// Constructed explicitly at the call site that opens a thread view or
/// a draft; a scope exclusively owns the handles allocated under it and
/// is the only thing that can release them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AllocationScope {
    /// Handles backing a thread view, keyed by conversation id
    Conversation(String),
    /// Handles backing a compose window, keyed by draft message id
    Draft(String),
}

impl AllocationScope {
    /// Whether this scope belongs to a draft under composition.
    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }
}

impl fmt::Display for AllocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation(id) => write!(f, "conversation:{}", id),
            Self::Draft(id) => write!(f, "draft:{}", id),
        }
    }
}

/// A render-time-only reference to decrypted bytes.
///
/// The handle owns the plaintext; once every `Arc` clone is dropped
/// after release, the bytes go with it.
#[derive(Debug)]
pub struct EphemeralHandle {
    uri: String,
    bytes: Bytes,
    mime_type: String,
}

impl EphemeralHandle {
    fn new(bytes: Bytes, mime_type: &str) -> Self {
        Self {
            uri: format!("{}:{}", HANDLE_URI_SCHEME, Uuid::new_v4()),
            bytes,
            mime_type: mime_type.to_string(),
        }
    }

    /// The unguessable URI markup points at while rendering.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The decrypted payload.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// MIME type of the payload.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

#[derive(Default)]
struct Inner {
    by_ref: HashMap<ContentReference, Arc<EphemeralHandle>>,
    by_uri: HashMap<String, ContentReference>,
    by_scope: HashMap<AllocationScope, HashSet<ContentReference>>,
}

/// Live ephemeral handles for the current view session.
///
/// One live handle per content reference: allocating a reference that
/// already has a handle replaces it, releasing the old one regardless
/// of which scope owned it.
#[derive(Default)]
pub struct HandleStore {
    inner: Mutex<Inner>,
}

impl HandleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle for decrypted bytes under the given scope.
    pub fn allocate(
        &self,
        scope: &AllocationScope,
        reference: ContentReference,
        bytes: Bytes,
        mime_type: &str,
    ) -> Arc<EphemeralHandle> {
        let handle = Arc::new(EphemeralHandle::new(bytes, mime_type));
        let mut inner = self.inner.lock();

        if let Some(old) = inner.by_ref.remove(&reference) {
            inner.by_uri.remove(old.uri());
            for owned in inner.by_scope.values_mut() {
                owned.remove(&reference);
            }
            tracing::debug!(reference = %reference, "Replaced live handle");
        }

        inner.by_uri.insert(handle.uri().to_string(), reference.clone());
        inner
            .by_scope
            .entry(scope.clone())
            .or_default()
            .insert(reference.clone());
        inner.by_ref.insert(reference, Arc::clone(&handle));
        handle
    }

    /// The live handle for a reference, if one is allocated.
    pub fn lookup(&self, reference: &ContentReference) -> Option<Arc<EphemeralHandle>> {
        self.inner.lock().by_ref.get(reference).cloned()
    }

    /// Reverse lookup from a handle URI back to its reference.
    pub fn reference_for_uri(&self, uri: &str) -> Option<ContentReference> {
        self.inner.lock().by_uri.get(uri).cloned()
    }

    /// Deallocate every handle the scope owns.
    ///
    /// Idempotent: releasing an already-released or unknown scope is a
    /// no-op.
    pub fn release(&self, scope: &AllocationScope) {
        let mut inner = self.inner.lock();
        let Some(owned) = inner.by_scope.remove(scope) else {
            return;
        };
        for reference in &owned {
            if let Some(handle) = inner.by_ref.remove(reference) {
                inner.by_uri.remove(handle.uri());
            }
        }
        tracing::debug!(scope = %scope, released = owned.len(), "Released handle scope");
    }

    /// Number of live handles across all scopes.
    pub fn len(&self) -> usize {
        self.inner.lock().by_ref.len()
    }

    /// Whether no handles are live.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().by_ref.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(s: &str) -> ContentReference {
        ContentReference::new(s)
    }

    #[test]
    fn test_allocate_and_lookup() {
        let store = HandleStore::new();
        let scope = AllocationScope::Conversation("conv-1".into());
        let handle = store.allocate(&scope, reference("abc@x"), Bytes::from_static(b"png"), "image/png");

        assert!(handle.uri().starts_with("sealmail-blob:"));
        let found = store.lookup(&reference("abc@x")).unwrap();
        assert_eq!(found.uri(), handle.uri());
        assert_eq!(found.bytes().as_ref(), b"png");
        assert_eq!(
            store.reference_for_uri(handle.uri()),
            Some(reference("abc@x"))
        );
    }

    #[test]
    fn test_reallocation_replaces_live_handle() {
        let store = HandleStore::new();
        let scope = AllocationScope::Conversation("conv-1".into());
        let first = store.allocate(&scope, reference("abc@x"), Bytes::from_static(b"v1"), "image/png");
        let second = store.allocate(&scope, reference("abc@x"), Bytes::from_static(b"v2"), "image/png");

        assert_ne!(first.uri(), second.uri());
        assert_eq!(store.len(), 1);
        assert!(store.reference_for_uri(first.uri()).is_none());
        assert_eq!(store.lookup(&reference("abc@x")).unwrap().bytes().as_ref(), b"v2");
    }

    #[test]
    fn test_release_is_scoped_and_idempotent() {
        let store = HandleStore::new();
        let view = AllocationScope::Conversation("conv-1".into());
        let draft = AllocationScope::Draft("draft-1".into());
        store.allocate(&view, reference("a@x"), Bytes::from_static(b"a"), "image/png");
        store.allocate(&view, reference("b@x"), Bytes::from_static(b"b"), "image/gif");
        store.allocate(&draft, reference("c@x"), Bytes::from_static(b"c"), "image/png");

        store.release(&view);
        assert!(store.lookup(&reference("a@x")).is_none());
        assert!(store.lookup(&reference("b@x")).is_none());
        assert!(store.lookup(&reference("c@x")).is_some());

        // Second release of the same scope is a no-op.
        store.release(&view);
        assert_eq!(store.len(), 1);

        // Releasing a scope that never allocated is also a no-op.
        store.release(&AllocationScope::Draft("never".into()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(
            AllocationScope::Conversation("c1".into()).to_string(),
            "conversation:c1"
        );
        assert_eq!(AllocationScope::Draft("d1".into()).to_string(), "draft:d1");
        assert!(AllocationScope::Draft("d1".into()).is_draft());
    }
}
