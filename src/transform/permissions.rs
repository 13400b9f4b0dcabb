//! Permission annotation parsing

use crate::models::{DocumentTree, ANONYMOUS_USER};
use serde::Deserialize;
use serde_json::Value;

/// One entry of a `data-auth` annotation
#[derive(Debug, Deserialize)]
struct PermissionEntry {
    username: String,
    provider: String,
    permissions: String,
}

/// Extract the userIds allowed to find a document.
///
/// Reads the `data-auth` attribute of an `html` root element and keeps the
/// `username:provider` ids of entries granting read or write. A malformed
/// annotation yields an empty list: granting everybody access (as if no
/// permissions were defined) is the more dangerous misreading of a broken
/// annotation. Documents with no annotation at all are governed by the
/// `index_permissionless` policy flag and get the anonymous sentinel when it
/// is set.
pub fn extract_permissions(tree: &DocumentTree, index_permissionless: bool) -> Vec<String> {
    let auth = if tree.tag_name() == Some("html") {
        tree.attributes()
            .and_then(|attrs| attrs.get("data-auth"))
            .and_then(Value::as_str)
    } else {
        None
    };

    let Some(auth) = auth else {
        return if index_permissionless {
            vec![ANONYMOUS_USER.to_string()]
        } else {
            Vec::new()
        };
    };

    // Annotations arrive single-quoted or with HTML-entity-encoded quotes
    // depending on how the store serialized them. The decode order matches
    // the store's historical format, quirks included (an `&amp;` inside a
    // quoted value is decoded after the quotes are restored).
    let decoded = auth
        .replace('\'', "\"")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");

    match serde_json::from_str::<Vec<PermissionEntry>>(&decoded) {
        Ok(entries) => entries
            .into_iter()
            .filter(|e| e.permissions.contains('r') || e.permissions.contains('w'))
            .map(|e| format!("{}:{}", e.username, e.provider))
            .collect(),
        Err(error) => {
            tracing::warn!(%error, "Malformed data-auth annotation, indexing with no viewers");
            Vec::new()
        }
    }
}
