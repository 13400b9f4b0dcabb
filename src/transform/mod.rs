//! Document-to-record transformation.
//!
//! Turns a tree-structured document into the flat, permission-annotated
//! record the index stores: permission extraction, title extraction,
//! flattening and markup escaping. All transforms are pure; the input tree
//! is never mutated.

pub mod permissions;

pub use permissions::extract_permissions;

use crate::models::{DocumentTree, SearchRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Flatten a document tree into one long text string.
///
/// Depth-first over element arrays, skipping the tag name at index 0,
/// appending string and number leaves space-separated and ignoring attribute
/// objects. Output order matches document order.
pub fn flatten(tree: &DocumentTree) -> String {
    flatten_value(tree.as_value())
}

fn flatten_value(node: &Value) -> String {
    let Some(items) = node.as_array() else {
        return String::new();
    };

    let mut out = String::new();
    // First element is always the tag name, so we skip that.
    for item in items.iter().skip(1) {
        match item {
            Value::String(s) => {
                out.push(' ');
                out.push_str(s);
            }
            Value::Number(n) => {
                out.push(' ');
                out.push_str(&n.to_string());
            }
            Value::Array(_) => {
                out.push(' ');
                out.push_str(&flatten_value(item));
            }
            // Attribute objects contribute nothing.
            _ => {}
        }
    }
    out
}

/// Extract the contents of the `<title>` element and return a tree without
/// that element.
///
/// Only the first `head` child of the root is inspected, and only the first
/// title element found there is taken. The title text is the element's first
/// positional child, or the second when the first is an attribute object.
/// Returns `None` when no head or no title exists, which makes a second pass
/// over the returned tree a no-op.
pub fn extract_and_delete_title(tree: &DocumentTree) -> (DocumentTree, Option<String>) {
    let mut value = tree.as_value().clone();
    let title = remove_title(&mut value);
    (DocumentTree::new(value), title)
}

fn remove_title(doc: &mut Value) -> Option<String> {
    let children = doc.as_array_mut()?;

    let head_index = children.iter().enumerate().skip(1).find_map(|(i, child)| {
        let tag = child.as_array()?.first()?.as_str()?;
        (tag == "head").then_some(i)
    })?;

    let head = children.get_mut(head_index)?.as_array_mut()?;
    let title_index = head.iter().enumerate().skip(1).find_map(|(i, child)| {
        let tag = child.as_array()?.first()?.as_str()?;
        (tag == "title").then_some(i)
    })?;

    let title_element = head.remove(title_index);
    let element = title_element.as_array()?;

    // If the first item is a string, that's the title. Otherwise it's an
    // attribute object and the second item is the title.
    match element.get(1) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => element.get(2).and_then(Value::as_str).map(String::from),
    }
}

/// Assemble the search record for a document.
///
/// Composes permission extraction, title extraction and flattening, then
/// escapes `<` in title and body so markup cannot leak into rendered search
/// results.
pub fn to_search_record(
    tree: &DocumentTree,
    ctime: DateTime<Utc>,
    mtime: DateTime<Utc>,
    index_permissionless: bool,
) -> SearchRecord {
    let permissions = extract_permissions(tree, index_permissionless);

    // The title is removed from the body text; it would otherwise repeat in
    // every excerpt shown for the document.
    let (tree, title) = extract_and_delete_title(tree);
    let body = flatten(&tree).replace('<', "&lt;");
    let title = title.map(|t| t.replace('<', "&lt;"));

    SearchRecord {
        title,
        body,
        permissions,
        ctime,
        mtime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ANONYMOUS_USER;
    use chrono::TimeZone;
    use serde_json::json;

    fn tree(value: Value) -> DocumentTree {
        DocumentTree::new(value)
    }

    #[test]
    fn test_flatten_skips_tags_and_attributes() {
        let doc = tree(json!(["p", {"x": 1}, "a", ["b", "c"]]));
        assert_eq!(flatten(&doc), " a  c");
    }

    #[test]
    fn test_flatten_text_children_in_document_order() {
        let doc = tree(json!(["div", "one", "two", ["span", "three"], "four"]));
        assert_eq!(flatten(&doc), " one two three four");
    }

    #[test]
    fn test_flatten_includes_numbers() {
        let doc = tree(json!(["p", "answer", 42]));
        assert_eq!(flatten(&doc), " answer 42");
    }

    #[test]
    fn test_flatten_non_element() {
        assert_eq!(flatten(&tree(json!("html"))), "");
        assert_eq!(flatten(&tree(json!({"a": 1}))), "");
    }

    #[test]
    fn test_extract_title_plain_text_child() {
        let doc = tree(json!([
            "html",
            ["head", ["title", "Hello"]],
            ["body", "world"]
        ]));

        let (stripped, title) = extract_and_delete_title(&doc);
        assert_eq!(title.as_deref(), Some("Hello"));
        assert_eq!(
            stripped.as_value(),
            &json!(["html", ["head"], ["body", "world"]])
        );
    }

    #[test]
    fn test_extract_title_behind_attributes() {
        let doc = tree(json!([
            "html",
            ["head", ["title", {"id": "t"}, "Hello"]],
            ["body", "world"]
        ]));

        let (_, title) = extract_and_delete_title(&doc);
        assert_eq!(title.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_extract_title_is_idempotent() {
        let doc = tree(json!([
            "html",
            ["head", ["title", "Hello"], ["title", "Second"]],
            ["body", "world"]
        ]));

        let (once, title) = extract_and_delete_title(&doc);
        assert_eq!(title.as_deref(), Some("Hello"));

        // Exactly one title element is removed per call.
        let (twice, second) = extract_and_delete_title(&once);
        assert_eq!(second.as_deref(), Some("Second"));

        let (thrice, none) = extract_and_delete_title(&twice);
        assert_eq!(none, None);
        assert_eq!(thrice, twice);
    }

    #[test]
    fn test_extract_title_missing_head_or_title() {
        let no_head = tree(json!(["html", ["body", "world"]]));
        let (unchanged, title) = extract_and_delete_title(&no_head);
        assert_eq!(title, None);
        assert_eq!(unchanged, no_head);

        let empty_head = tree(json!(["html", ["head"], ["body", "world"]]));
        let (_, title) = extract_and_delete_title(&empty_head);
        assert_eq!(title, None);
    }

    #[test]
    fn test_extract_title_does_not_mutate_input() {
        let doc = tree(json!(["html", ["head", ["title", "Hello"]]]));
        let before = doc.clone();
        let _ = extract_and_delete_title(&doc);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_to_search_record() {
        let doc = tree(json!([
            "html",
            {"data-auth": r#"[{"username":"kbadk","provider":"github","permissions":"rw"}]"#},
            ["head", ["title", "Hello"]],
            ["body", "world"]
        ]));

        let ctime = chrono::Utc.timestamp_millis_opt(1_000).unwrap();
        let mtime = chrono::Utc.timestamp_millis_opt(2_000).unwrap();
        let record = to_search_record(&doc, ctime, mtime, false);

        assert_eq!(record.title.as_deref(), Some("Hello"));
        assert_eq!(record.body, "   world");
        assert_eq!(record.permissions, vec!["kbadk:github"]);
        assert_eq!(record.ctime, ctime);
        assert_eq!(record.mtime, mtime);
    }

    #[test]
    fn test_to_search_record_escapes_markup() {
        let doc = tree(json!([
            "html",
            ["head", ["title", "<b>bold title</b>"]],
            ["body", "a < b", ["script", "<script>alert(1)</script>"]]
        ]));

        let ctime = chrono::Utc.timestamp_millis_opt(0).unwrap();
        let record = to_search_record(&doc, ctime, ctime, true);

        assert_eq!(record.title.as_deref(), Some("&lt;b>bold title&lt;/b>"));
        assert!(record.body.contains("a &lt; b"));
        assert!(record.body.contains("&lt;script>alert(1)&lt;/script>"));
        assert!(!record.body.contains('<'));
        assert_eq!(record.permissions, vec![ANONYMOUS_USER]);
    }

    #[test]
    fn test_to_search_record_permissionless_policy() {
        let doc = tree(json!(["html", ["body", "world"]]));
        let ctime = chrono::Utc.timestamp_millis_opt(0).unwrap();

        let indexed = to_search_record(&doc, ctime, ctime, true);
        assert_eq!(indexed.permissions, vec![ANONYMOUS_USER]);

        let unindexed = to_search_record(&doc, ctime, ctime, false);
        assert!(unindexed.permissions.is_empty());
    }
}
