//! Immutable document tree handed across the rendering seam.
//!
//! The rendering layer parses markup into this tree before display and
//! serializes it back when persisting a draft body. [`super::rewrite`]
//! only ever produces a new tree, so the render and persist paths can
//! never alias one mutable document.

/// One node of a message body document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// An element with a tag, attributes in document order, and children
    Element {
        /// Lowercase tag name
        tag: String,
        /// Attribute (name, value) pairs
        attrs: Vec<(String, String)>,
        /// Child nodes
        children: Vec<Node>,
    },
    /// A text run
    Text(String),
}

impl Node {
    /// Build an element node.
    pub fn element(
        tag: &str,
        attrs: Vec<(&str, &str)>,
        children: Vec<Node>,
    ) -> Self {
        Self::Element {
            tag: tag.to_lowercase(),
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            children,
        }
    }

    /// Build a text node.
    pub fn text(content: &str) -> Self {
        Self::Text(content.to_string())
    }

    /// Look up an attribute value on an element node.
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            Self::Text(_) => None,
        }
    }

    /// Copy of this element with one attribute replaced (or appended).
    pub(super) fn with_attr(&self, name: &str, value: String) -> Self {
        match self {
            Self::Element {
                tag,
                attrs,
                children,
            } => {
                let mut attrs = attrs.clone();
                match attrs.iter_mut().find(|(k, _)| k == name) {
                    Some(slot) => slot.1 = value,
                    None => attrs.push((name.to_string(), value)),
                }
                Self::Element {
                    tag: tag.clone(),
                    attrs,
                    children: children.clone(),
                }
            }
            Self::Text(t) => Self::Text(t.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_normalizes_case() {
        let node = Node::element("IMG", vec![("SRC", "cid:abc@x")], vec![]);
        assert_eq!(node.attr("src"), Some("cid:abc@x"));
        assert!(matches!(node, Node::Element { ref tag, .. } if tag == "img"));
    }

    #[test]
    fn test_with_attr_replaces_in_place() {
        let node = Node::element("img", vec![("src", "cid:abc@x"), ("alt", "pic")], vec![]);
        let rewritten = node.with_attr("src", "sealmail-blob:123".into());
        assert_eq!(rewritten.attr("src"), Some("sealmail-blob:123"));
        assert_eq!(rewritten.attr("alt"), Some("pic"));
        // The original tree is untouched.
        assert_eq!(node.attr("src"), Some("cid:abc@x"));
    }
}
