//! Search query building

use crate::models::ANONYMOUS_USER;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A permission-scoped search request.
///
/// `user_id` is the identity resolved by the session collaborator; when it is
/// absent only documents carrying the anonymous sentinel can match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Resolved caller identity (`username:provider`), if any
    pub user_id: Option<String>,

    /// The search term
    pub term: String,

    /// Number of results to return
    pub limit: u32,

    /// 1-based result page
    pub page: u32,

    /// Hard lower bound on document timestamps
    pub from_date: Option<DateTime<Utc>>,

    /// Hard upper bound on document timestamps
    pub to_date: Option<DateTime<Utc>>,
}

impl SearchRequest {
    /// Create a request with default pagination (10 results, first page)
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            user_id: None,
            term: term.into(),
            limit: 10,
            page: 1,
            from_date: None,
            to_date: None,
        }
    }

    /// Set the caller identity
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the result count
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the 1-based page
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Restrict results to documents touching the given window
    pub fn with_date_range(
        mut self,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.from_date = from_date;
        self.to_date = to_date;
        self
    }

    /// Build the engine query body.
    ///
    /// Three must-clauses: the term match (body boost 1, title and id boost
    /// 2), the permission gate (anonymous sentinel, plus the caller's userId
    /// at boost 3 when present) and a purely additive recency ladder over
    /// `mtime`. A hard date-range clause is appended only when a bound was
    /// given; either of `mtime`/`ctime` inside the window qualifies.
    /// `now` is passed in so ranking is reproducible in tests.
    pub fn build_body(&self, now: DateTime<Utc>) -> Value {
        let one_day_ago = now - Duration::days(1);
        let one_month_ago = now - Duration::days(30);
        let three_months_ago = now - Duration::days(90);

        let mut permission_should = vec![json!({ "match": { "permissions": ANONYMOUS_USER } })];
        if let Some(user_id) = &self.user_id {
            permission_should.push(json!({
                "match": { "permissions": { "query": user_id, "boost": 3 } }
            }));
        }

        let mut must = vec![
            json!({
                "bool": {
                    "should": [
                        { "match": { "body":  { "query": self.term, "boost": 1 } } },
                        { "match": { "title": { "query": self.term, "boost": 2 } } },
                        { "match": { "_id":   { "query": self.term, "boost": 2 } } }
                    ]
                }
            }),
            json!({ "bool": { "should": permission_should } }),
            json!({
                "bool": {
                    "should": [
                        { "range": { "mtime": { "gte": one_day_ago.timestamp_millis(),      "boost": 5 } } },
                        { "range": { "mtime": { "gte": one_month_ago.timestamp_millis(),    "boost": 2 } } },
                        { "range": { "mtime": { "gte": three_months_ago.timestamp_millis(), "boost": 1 } } },
                        { "range": { "mtime": { "gte": 0,                                   "boost": 0 } } }
                    ]
                }
            }),
        ];

        if self.from_date.is_some() || self.to_date.is_some() {
            let mut bounds = serde_json::Map::new();
            if let Some(from) = self.from_date {
                bounds.insert("gte".to_string(), json!(from.timestamp_millis()));
            }
            if let Some(to) = self.to_date {
                bounds.insert("lte".to_string(), json!(to.timestamp_millis()));
            }
            let bounds = Value::Object(bounds);

            must.push(json!({
                "bool": {
                    "should": [
                        { "range": { "mtime": bounds.clone() } },
                        { "range": { "ctime": bounds } }
                    ]
                }
            }));
        }

        let mut body = json!({
            "query": { "bool": { "must": must } },
            "highlight": {
                "pre_tags": ["<strong>"],
                "post_tags": ["</strong>"],
                "fields": {
                    "body": {
                        // With no match in the body (say the hit was on the
                        // title), search results still need some excerpt;
                        // this grabs the leading characters instead.
                        "no_match_size": 150
                    },
                    "title": {}
                }
            },
            "size": self.limit,
            "_source": ["title", "permissions", "ctime", "mtime"]
        });

        if self.limit > 0 && self.page > 0 {
            body["from"] = json!(u64::from(self.limit) * u64::from(self.page - 1));
        }

        body
    }
}
