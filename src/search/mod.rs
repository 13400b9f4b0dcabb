//! Search engine integration: index client and query building

pub mod client;
pub mod query;

pub use client::{index_mapping, ElasticClient};
pub use query::SearchRequest;
