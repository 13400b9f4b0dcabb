//! Flat search record persisted into the index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The userId granted to documents indexable without any identity
pub const ANONYMOUS_USER: &str = "anonymous:";

/// A flat, permission-annotated record as persisted in the search index.
///
/// One record exists per document id (the id is the index document id, not a
/// body field); writes are last-write-wins. Timestamps travel as epoch
/// milliseconds to match the index mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Extracted document title, absent when the document has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Flattened document text
    pub body: String,

    /// userIds (`username:provider`) allowed to find this document
    pub permissions: Vec<String>,

    /// Creation time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ctime: DateTime<Utc>,

    /// Last modification time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub mtime: DateTime<Utc>,
}
