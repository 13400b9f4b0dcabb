//! Change event routing.
//!
//! Pulls ordered events off the feed channel and drives the index: inserts
//! and deletes dispatch directly, updates go through the per-document
//! throttler so bursts coalesce into one write carrying the latest content.

use crate::feed::events::ChangeEvent;
use crate::models::DocumentTree;
use crate::search::ElasticClient;
use crate::throttle::Throttler;
use crate::transform;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Arguments of one (possibly deferred) index write
struct UpdateArgs {
    document_id: String,
    document: DocumentTree,
    ctime: DateTime<Utc>,
    mtime: DateTime<Utc>,
}

/// Routes change events into index operations
pub struct ChangeRouter {
    elastic: Arc<ElasticClient>,
    throttler: Throttler<String, UpdateArgs>,
    index_permissionless: bool,
}

impl ChangeRouter {
    /// Create a router writing through the given client.
    ///
    /// `throttle_delay` is the per-document debounce window for updates.
    pub fn new(
        elastic: Arc<ElasticClient>,
        throttle_delay: Duration,
        index_permissionless: bool,
    ) -> Self {
        let action_client = Arc::clone(&elastic);
        let throttler = Throttler::new(throttle_delay, move |args: UpdateArgs| {
            let elastic = Arc::clone(&action_client);
            Box::pin(async move {
                index_document(
                    &elastic,
                    &args.document_id,
                    &args.document,
                    args.ctime,
                    args.mtime,
                    index_permissionless,
                )
                .await;
            }) as BoxFuture<'static, ()>
        });

        Self {
            elastic,
            throttler,
            index_permissionless,
        }
    }

    /// Consume events in arrival order until the channel closes
    pub async fn run(&self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        info!("Change event channel closed, router stopping");
    }

    /// Route a single event.
    ///
    /// Never blocks on index I/O: writes run as spawned tasks so a slow
    /// engine cannot stall subsequent events. A failed write is logged and
    /// the stream continues.
    pub fn dispatch(&self, event: ChangeEvent) {
        tracing::debug!(
            operation = event.operation(),
            document_id = event.document_id(),
            "Change event"
        );

        match event {
            ChangeEvent::Insert {
                document_id,
                document,
                ctime,
                mtime,
            } => {
                let elastic = Arc::clone(&self.elastic);
                let index_permissionless = self.index_permissionless;
                tokio::spawn(async move {
                    index_document(
                        &elastic,
                        &document_id,
                        &document,
                        ctime,
                        mtime,
                        index_permissionless,
                    )
                    .await;
                });
            }
            ChangeEvent::Update {
                document_id,
                document,
                ctime,
                mtime,
            } => {
                self.throttler.schedule(
                    document_id.clone(),
                    UpdateArgs {
                        document_id,
                        document,
                        ctime,
                        mtime,
                    },
                );
            }
            ChangeEvent::Delete { document_id } => {
                let elastic = Arc::clone(&self.elastic);
                tokio::spawn(async move {
                    if let Err(error) = elastic.delete(&document_id).await {
                        warn!(document_id = %document_id, %error, "Failed to delete record");
                    }
                });
            }
        }
    }
}

/// Transform a document and write its record, logging failures.
///
/// Errors stop here on the change-feed path: one bad document must never
/// halt processing of subsequent events.
async fn index_document(
    elastic: &ElasticClient,
    document_id: &str,
    document: &DocumentTree,
    ctime: DateTime<Utc>,
    mtime: DateTime<Utc>,
    index_permissionless: bool,
) {
    let record = transform::to_search_record(document, ctime, mtime, index_permissionless);
    if let Err(error) = elastic.upsert(document_id, &record).await {
        warn!(document_id = %document_id, %error, "Failed to index record");
    }
}
