//! Change feed event types

use crate::models::DocumentTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One change notification from the document store.
///
/// Events arrive in store order and are consumed exactly once by the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum ChangeEvent {
    /// Document created
    Insert {
        #[serde(rename = "documentId")]
        document_id: String,
        document: DocumentTree,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        ctime: DateTime<Utc>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        mtime: DateTime<Utc>,
    },

    /// Document content changed
    Update {
        #[serde(rename = "documentId")]
        document_id: String,
        document: DocumentTree,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        ctime: DateTime<Utc>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        mtime: DateTime<Utc>,
    },

    /// Document removed
    Delete {
        #[serde(rename = "documentId")]
        document_id: String,
    },
}

impl ChangeEvent {
    /// Get the document id from any event
    pub fn document_id(&self) -> &str {
        match self {
            ChangeEvent::Insert { document_id, .. }
            | ChangeEvent::Update { document_id, .. }
            | ChangeEvent::Delete { document_id, .. } => document_id,
        }
    }

    /// Get the operation as a string
    pub fn operation(&self) -> &'static str {
        match self {
            ChangeEvent::Insert { .. } => "insert",
            ChangeEvent::Update { .. } => "update",
            ChangeEvent::Delete { .. } => "delete",
        }
    }
}
