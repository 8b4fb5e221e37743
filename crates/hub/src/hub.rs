//! The hub component: one owned struct holding all shared peer state.
//!
//! Registry membership, the current leader, and chain-sync bookkeeping all
//! live behind a single lock, so every mutation serializes and broadcast
//! snapshots can never race a disconnect. Pending external queries have an
//! independent lifecycle and live in the correlator's own table.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;

use crate::correlator::RequestCorrelator;
use crate::envelope::{ConnectionId, Envelope, PatientRecord};
use crate::registry::Connection;
use crate::sync::ChainSyncState;

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Deadline for externally issued data queries
    pub query_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything guarded by the hub's one lock.
#[derive(Default)]
pub(crate) struct HubState {
    /// Live connections by id
    pub conns: HashMap<ConnectionId, Connection>,
    /// Current leader; when set, always a registered bot
    pub leader: Option<ConnectionId>,
    /// Transient longest-chain bookkeeping, rebuilt each poll round
    pub sync: ChainSyncState,
}

#[derive(Debug, Default)]
pub(crate) struct HubCounters {
    pub frames_routed: u64,
    pub broadcasts_sent: u64,
    pub queries_resolved: u64,
    pub queries_timed_out: u64,
}

/// Stats snapshot for periodic logging
#[derive(Debug, Clone, Default, Serialize)]
pub struct HubStats {
    pub connected_peers: usize,
    pub bot_peers: usize,
    pub current_leader: Option<ConnectionId>,
    pub frames_routed: u64,
    pub broadcasts_sent: u64,
    pub queries_resolved: u64,
    pub queries_timed_out: u64,
    pub pending_queries: usize,
}

/// The connection hub: tracks peers, elects the leader, routes envelopes,
/// and correlates external queries with peer responses.
///
/// Shared across the WebSocket server and the HTTP gateway as an `Arc<Hub>`;
/// the gateway only ever calls the boundary operations
/// ([`Hub::submit_transaction`], [`Hub::submit_query`],
/// [`Hub::submit_patient`]).
pub struct Hub {
    pub(crate) config: HubConfig,
    pub(crate) state: RwLock<HubState>,
    pub(crate) correlator: RequestCorrelator,
    pub(crate) next_conn_id: AtomicU64,
    pub(crate) counters: RwLock<HubCounters>,
}

impl Hub {
    /// Create a new hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            state: RwLock::new(HubState::default()),
            correlator: RequestCorrelator::new(),
            next_conn_id: AtomicU64::new(1),
            counters: RwLock::new(HubCounters::default()),
        }
    }

    /// Get current stats
    pub fn stats(&self) -> HubStats {
        let state = self.state.read();
        let counters = self.counters.read();
        HubStats {
            connected_peers: state.conns.len(),
            bot_peers: state.conns.values().filter(|c| c.is_bot).count(),
            current_leader: state.leader,
            frames_routed: counters.frames_routed,
            broadcasts_sent: counters.broadcasts_sent,
            queries_resolved: counters.queries_resolved,
            queries_timed_out: counters.queries_timed_out,
            pending_queries: self.correlator.pending_count(),
        }
    }

    /// Boundary operation: broadcast an `addBlock` envelope carrying
    /// `payload` to every open peer. Fire-and-forget, not correlated.
    pub fn submit_transaction(&self, payload: serde_json::Value) {
        self.broadcast_envelope(&Envelope::AddBlock { data: payload }, None);
    }

    /// Boundary operation: broadcast an `addBlock` envelope carrying a
    /// structured patient record to every open peer.
    pub fn submit_patient(&self, record: PatientRecord) {
        let data =
            serde_json::to_value(&record).expect("patient record serialization should not fail");
        self.broadcast_envelope(&Envelope::AddBlock { data }, None);
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    fn peer(hub: &Hub) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (hub.register(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str(&text) {
                    frames.push(value);
                }
            }
        }
        frames
    }

    #[test]
    fn submit_transaction_reaches_every_peer() {
        let hub = Hub::default();
        let (_, mut rx1) = peer(&hub);
        let (_, mut rx2) = peer(&hub);

        hub.submit_transaction(json!({"amount": 5}));

        for rx in [&mut rx1, &mut rx2] {
            let frames = drain(rx);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["action"], "addBlock");
            assert_eq!(frames[0]["data"]["amount"], 5);
        }
    }

    #[test]
    fn submit_patient_carries_the_record() {
        let hub = Hub::default();
        let (_, mut rx) = peer(&hub);

        hub.submit_patient(PatientRecord {
            patient_id: "p-17".into(),
            name: "Ada".into(),
            age: 41,
            condition: "stable".into(),
        });

        let frames = drain(&mut rx);
        assert_eq!(frames[0]["action"], "addBlock");
        assert_eq!(frames[0]["data"]["patient_id"], "p-17");
        assert_eq!(frames[0]["data"]["age"], 41);
    }

    #[test]
    fn stats_track_membership() {
        let hub = Hub::default();
        let (a, _rx_a) = peer(&hub);
        let (_b, _rx_b) = peer(&hub);
        hub.handle_frame(a, r#"{"message":"Hello!"}"#);

        let stats = hub.stats();
        assert_eq!(stats.connected_peers, 2);
        assert_eq!(stats.bot_peers, 1);
        assert_eq!(stats.current_leader, Some(a));
        assert_eq!(stats.pending_queries, 0);
    }
}
