pub mod handlers;
pub mod routes;

pub use handlers::UserIdentity;
pub use routes::*;

use crate::search::ElasticClient;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub elastic: Arc<ElasticClient>,
}

impl AppState {
    pub fn new(elastic: Arc<ElasticClient>) -> Self {
        Self { elastic }
    }
}
