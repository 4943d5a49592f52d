//! Lowercase header map with the accessors the pipeline needs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header name for the disposition (inline vs attachment, filename).
pub const CONTENT_DISPOSITION: &str = "content-disposition";
/// Header name for the durable content identifier.
pub const CONTENT_ID: &str = "content-id";
/// Header name for the fallback durable reference.
pub const CONTENT_LOCATION: &str = "content-location";
/// Header name for the transfer encoding.
pub const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";

/// A mapping of lowercase header name to value.
///
/// Keys are lowercased on insert so lookups never depend on the casing the
/// server (or the envelope parser) happened to produce.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, lowercasing the name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Look up a header by (case-insensitive) name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The content-disposition value, if any.
    pub fn content_disposition(&self) -> Option<&str> {
        self.get(CONTENT_DISPOSITION)
    }

    /// Whether the disposition marks this part inline.
    pub fn is_inline(&self) -> bool {
        self.content_disposition()
            .map(|d| {
                d.split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case("inline")
            })
            .unwrap_or(false)
    }

    /// The raw content-id value (angle brackets intact), if any.
    pub fn content_id(&self) -> Option<&str> {
        self.get(CONTENT_ID)
    }

    /// The content-location value, if any.
    pub fn content_location(&self) -> Option<&str> {
        self.get(CONTENT_LOCATION)
    }

    /// The transfer encoding, if any.
    pub fn transfer_encoding(&self) -> Option<&str> {
        self.get(CONTENT_TRANSFER_ENCODING)
    }

    /// Filename from the disposition parameters.
    ///
    /// Handles both `filename="x y.png"` and bare `filename=x.png` forms.
    pub fn filename(&self) -> Option<&str> {
        let disposition = self.content_disposition()?;
        for param in disposition.split(';').skip(1) {
            let param = param.trim();
            if let Some(rest) = param
                .strip_prefix("filename=")
                .or_else(|| param.strip_prefix("FILENAME="))
            {
                return Some(rest.trim_matches('"'));
            }
        }
        None
    }

    /// Iterate over (name, value) pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers present.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_lowercased_on_insert() {
        let mut h = Headers::new();
        h.set("Content-ID", "<abc@x>");
        assert_eq!(h.get("content-id"), Some("<abc@x>"));
        assert_eq!(h.get("CONTENT-ID"), Some("<abc@x>"));
    }

    #[test]
    fn test_is_inline() {
        let mut h = Headers::new();
        assert!(!h.is_inline());
        h.set(CONTENT_DISPOSITION, "attachment; filename=\"a.pdf\"");
        assert!(!h.is_inline());
        h.set(CONTENT_DISPOSITION, "inline; filename=\"a.png\"");
        assert!(h.is_inline());
        h.set(CONTENT_DISPOSITION, "INLINE");
        assert!(h.is_inline());
    }

    #[test]
    fn test_filename_quoted_and_bare() {
        let mut h = Headers::new();
        h.set(CONTENT_DISPOSITION, "inline; filename=\"two words.png\"");
        assert_eq!(h.filename(), Some("two words.png"));
        h.set(CONTENT_DISPOSITION, "attachment; filename=plain.pdf");
        assert_eq!(h.filename(), Some("plain.pdf"));
    }

    #[test]
    fn test_filename_absent() {
        let mut h = Headers::new();
        h.set(CONTENT_DISPOSITION, "inline");
        assert_eq!(h.filename(), None);
    }
}
