use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::search::SearchRequest;
use axum::{
    extract::{Extension, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Resolved caller identity (`username:provider`).
///
/// The session collaborator's middleware inserts this as a request
/// extension; it is never derived here.
#[derive(Debug, Clone)]
pub struct UserIdentity(pub String);

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub l: Option<u32>,
    pub p: Option<u32>,
    #[serde(rename = "fromDate")]
    pub from_date: Option<String>,
    #[serde(rename = "toDate")]
    pub to_date: Option<String>,
}

/// Execute a permission-scoped search.
///
/// Returns the engine's raw ranked result set, highlighted excerpts
/// included. A missing search term is answered with a structured error body
/// rather than an error status.
pub async fn search(
    State(state): State<AppState>,
    identity: Option<Extension<UserIdentity>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>> {
    let user_id = identity.map(|Extension(UserIdentity(id))| id);

    let Some(term) = params.q.filter(|q| !q.is_empty()) else {
        return Ok(Json(json!({ "error": "No query, use /?q=<query>." })));
    };

    let limit = params.l.unwrap_or(10);
    let page = params.p.unwrap_or(1).max(1);
    let from_date = params.from_date.as_deref().map(parse_date).transpose()?;
    let to_date = params.to_date.as_deref().map(parse_date).transpose()?;

    tracing::info!(
        user_id = user_id.as_deref().unwrap_or("-"),
        query = %term,
        limit,
        page,
        "Search request"
    );

    let mut request = SearchRequest::new(term)
        .with_limit(limit)
        .with_page(page)
        .with_date_range(from_date, to_date);
    request.user_id = user_id;

    let response = state.elastic.search(&request.build_body(Utc::now())).await?;
    Ok(Json(response))
}

/// Parse a date query parameter as RFC 3339 or `YYYY-MM-DD` (midnight UTC)
fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(AppError::Validation(format!(
        "Unparseable date '{}', use RFC 3339 or YYYY-MM-DD",
        raw
    )))
}
