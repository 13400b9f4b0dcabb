//! JsonML-like document tree

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tree-structured document as produced by the document store.
///
/// The representation is JsonML-like: an element is an array whose first
/// entry is the tag name, optionally followed by one attribute object and
/// then children (strings, numbers or nested element arrays):
/// `["html", {"data-auth": "..."}, ["head", ["title", "Hello"]], "world"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentTree(pub Value);

impl DocumentTree {
    /// Wrap a raw JSON value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The tag name of the root element, if this is a well-formed element
    pub fn tag_name(&self) -> Option<&str> {
        self.0.as_array().and_then(|el| el.first()).and_then(Value::as_str)
    }

    /// The attribute object of the root element, if one is present.
    ///
    /// At most one attribute object may appear, immediately after the tag
    /// name.
    pub fn attributes(&self) -> Option<&serde_json::Map<String, Value>> {
        self.0.as_array().and_then(|el| el.get(1)).and_then(Value::as_object)
    }

    /// Borrow the underlying JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for DocumentTree {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
