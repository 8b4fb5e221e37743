//! Request/response correlation over the push-only peer channel
//!
//! An external query broadcasts a `requestData` envelope and then waits for
//! the first `dataResponse` carrying the same request id. Pending queries
//! live in a table keyed by id, with explicit removal on both the success and
//! the timeout path, so no listener outlives its query.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::envelope::{Envelope, RequestId};
use crate::error::HubError;
use crate::hub::Hub;

/// Registry of pending external queries.
///
/// Entries are one-shot: the first matching response takes the sender out of
/// the map, so a query resolves at most once and later responses for the
/// same id find nothing left to resolve.
#[derive(Default)]
pub(crate) struct RequestCorrelator {
    pending: DashMap<RequestId, oneshot::Sender<Value>>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending entry under a fresh random id
    pub fn register(&self) -> (RequestId, oneshot::Receiver<Value>) {
        loop {
            let id = rand::random::<RequestId>();
            match self.pending.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(entry) => {
                    let (tx, rx) = oneshot::channel();
                    entry.insert(tx);
                    return (id, rx);
                }
            }
        }
    }

    /// Resolve a pending query. Returns false when no such id is pending;
    /// late duplicates and foreign ids land here.
    pub fn resolve(&self, id: RequestId, data: Value) -> bool {
        match self.pending.remove(&id) {
            Some((_, tx)) => tx.send(data).is_ok(),
            None => false,
        }
    }

    /// Drop a pending entry without resolving it (timeout path)
    pub fn abandon(&self, id: RequestId) {
        self.pending.remove(&id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Hub {
    /// Boundary operation: broadcast `requestData` to every open peer and
    /// wait for the first `dataResponse` carrying the same request id, up to
    /// the configured deadline.
    pub async fn submit_query(&self, query: Value) -> Result<Value, HubError> {
        self.submit_query_with_timeout(query, self.config.query_timeout)
            .await
    }

    /// Same as [`Hub::submit_query`] with an explicit deadline
    pub async fn submit_query_with_timeout(
        &self,
        query: Value,
        deadline: Duration,
    ) -> Result<Value, HubError> {
        let (request_id, response) = self.correlator.register();
        self.broadcast_envelope(
            &Envelope::RequestData {
                request_id: Some(request_id),
                query,
            },
            None,
        );

        match tokio::time::timeout(deadline, response).await {
            Ok(Ok(data)) => Ok(data),
            // A dropped sender can only mean the entry was already abandoned;
            // treat it like the timeout it raced with.
            Ok(Err(_)) | Err(_) => {
                self.correlator.abandon(request_id);
                self.counters.write().queries_timed_out += 1;
                tracing::debug!(request_id, "query timed out");
                Err(HubError::QueryTimeout)
            }
        }
    }

    /// Hand a leader `dataResponse` to whichever query is waiting on its id
    pub(crate) fn resolve_query(&self, request_id: RequestId, data: Value) {
        if self.correlator.resolve(request_id, data) {
            self.counters.write().queries_resolved += 1;
            tracing::debug!(request_id, "query resolved by leader response");
        }
    }
}
