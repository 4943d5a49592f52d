//! Pure bidirectional rewrite between durable and renderable markup.

use super::doc::Node;
use super::refs::{ContentReference, ReferenceTable};
use super::store::{HandleStore, HANDLE_URI_SCHEME};

/// Which way a document is being rewritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewriteDirection {
    /// Durable `cid:` references become live handle URIs for display
    ToRenderable,
    /// Handle URIs become durable `cid:` references for persistence
    ToDurable,
}

/// Rewrite every image reference in a document.
///
/// Returns a new tree; the input is never mutated. Going renderable, a
/// `cid:` source whose reference has a live handle becomes that
/// handle's URI, one without a handle is left as-is, and one whose
/// reference the table does not know at all is removed outright rather
/// than rendering broken. Going durable, every live handle URI turns
/// back into its `cid:` form.
///
/// Round trip holds while handles stay live: `ToDurable` then
/// `ToRenderable` reproduces the renderable form.
pub fn rewrite(
    doc: &Node,
    direction: RewriteDirection,
    table: &ReferenceTable,
    store: &HandleStore,
) -> Node {
    rewrite_node(doc, direction, table, store)
        .unwrap_or_else(|| Node::Element {
            tag: "body".into(),
            attrs: vec![],
            children: vec![],
        })
}

/// `None` means the node was removed.
fn rewrite_node(
    node: &Node,
    direction: RewriteDirection,
    table: &ReferenceTable,
    store: &HandleStore,
) -> Option<Node> {
    let Node::Element { tag, children, .. } = node else {
        return Some(node.clone());
    };

    let rewritten = match (direction, node.attr("src")) {
        (RewriteDirection::ToRenderable, Some(src)) if src.starts_with("cid:") => {
            let reference = ContentReference::new(&src["cid:".len()..]);
            if !table.contains(&reference) {
                // No attachment backs this reference; drop the element.
                tracing::debug!(reference = %reference, "Removed orphan inline reference");
                return None;
            }
            match store.lookup(&reference) {
                Some(handle) => node.with_attr("src", handle.uri().to_string()),
                // Not yet decrypted: leave the durable form in place.
                None => node.clone(),
            }
        }
        (RewriteDirection::ToDurable, Some(src))
            if src.starts_with(HANDLE_URI_SCHEME) =>
        {
            match store.reference_for_uri(src) {
                Some(reference) => node.with_attr("src", reference.durable_uri()),
                None => node.clone(),
            }
        }
        _ => node.clone(),
    };

    let Node::Element { attrs: new_attrs, .. } = &rewritten else {
        return Some(rewritten);
    };
    let new_attrs = new_attrs.clone();

    let new_children: Vec<Node> = children
        .iter()
        .filter_map(|child| rewrite_node(child, direction, table, store))
        .collect();

    Some(Node::Element {
        tag: tag.clone(),
        attrs: new_attrs,
        children: new_children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{Attachment, AttachmentId, Headers, Provenance};
    use crate::embedded::refs::find_inline_references;
    use crate::embedded::store::AllocationScope;
    use bytes::Bytes;

    fn inline_png(id: &str, cid: &str) -> Attachment {
        let mut headers = Headers::new();
        headers.set("content-disposition", "inline");
        headers.set("content-id", cid);
        Attachment {
            id: AttachmentId::server(id),
            headers,
            mime_type: "image/png".into(),
            size: 3,
            key_packets: vec![],
            signature: None,
            provenance: Provenance::Native,
        }
    }

    fn doc_with_srcs(srcs: &[&str]) -> Node {
        Node::element(
            "body",
            vec![],
            srcs.iter()
                .map(|s| Node::element("img", vec![("src", s)], vec![]))
                .collect(),
        )
    }

    #[test]
    fn test_to_renderable_replaces_resolved_reference() {
        let table = find_inline_references(&[inline_png("att-1", "<abc@x>")]);
        let store = HandleStore::new();
        let scope = AllocationScope::Conversation("conv".into());
        let handle = store.allocate(
            &scope,
            ContentReference::new("abc@x"),
            Bytes::from_static(b"png"),
            "image/png",
        );

        let doc = doc_with_srcs(&["cid:abc@x"]);
        let rendered = rewrite(&doc, RewriteDirection::ToRenderable, &table, &store);
        let Node::Element { children, .. } = &rendered else { panic!() };
        assert_eq!(children[0].attr("src"), Some(handle.uri()));
    }

    #[test]
    fn test_unresolved_reference_left_untouched() {
        let table = find_inline_references(&[inline_png("att-1", "<abc@x>")]);
        let store = HandleStore::new();

        let doc = doc_with_srcs(&["cid:abc@x"]);
        let rendered = rewrite(&doc, RewriteDirection::ToRenderable, &table, &store);
        assert_eq!(rendered, doc);
    }

    #[test]
    fn test_orphan_reference_removes_element() {
        let table = find_inline_references(&[inline_png("att-1", "<abc@x>")]);
        let store = HandleStore::new();

        let doc = doc_with_srcs(&["cid:abc@x", "cid:gone@x", "https://example.com/x.png"]);
        let rendered = rewrite(&doc, RewriteDirection::ToRenderable, &table, &store);
        let Node::Element { children, .. } = &rendered else { panic!() };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].attr("src"), Some("cid:abc@x"));
        assert_eq!(children[1].attr("src"), Some("https://example.com/x.png"));
    }

    #[test]
    fn test_round_trip_with_live_handles() {
        let table = find_inline_references(&[
            inline_png("att-1", "<a@x>"),
            inline_png("att-2", "<b@x>"),
        ]);
        let store = HandleStore::new();
        let scope = AllocationScope::Conversation("conv".into());
        store.allocate(&scope, ContentReference::new("a@x"), Bytes::from_static(b"a"), "image/png");
        store.allocate(&scope, ContentReference::new("b@x"), Bytes::from_static(b"b"), "image/png");

        let durable = Node::element(
            "body",
            vec![],
            vec![
                Node::element("p", vec![], vec![Node::text("hello")]),
                Node::element("img", vec![("src", "cid:a@x")], vec![]),
                Node::element(
                    "div",
                    vec![],
                    vec![Node::element("img", vec![("src", "cid:b@x")], vec![])],
                ),
            ],
        );

        let rendered = rewrite(&durable, RewriteDirection::ToRenderable, &table, &store);
        assert_ne!(rendered, durable);

        let persisted = rewrite(&rendered, RewriteDirection::ToDurable, &table, &store);
        assert_eq!(persisted, durable);

        // Renderable form is reproduced exactly while handles are live.
        let re_rendered = rewrite(&persisted, RewriteDirection::ToRenderable, &table, &store);
        assert_eq!(re_rendered, rendered);
    }

    #[test]
    fn test_to_durable_ignores_foreign_uris() {
        let table = ReferenceTable::default();
        let store = HandleStore::new();
        let doc = doc_with_srcs(&["sealmail-blob:not-allocated", "data:image/png;base64,AAAA"]);
        assert_eq!(rewrite(&doc, RewriteDirection::ToDurable, &table, &store), doc);
    }
}
