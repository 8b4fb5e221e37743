//! Connection registry: admission, metadata, and broadcast fan-out

use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::envelope::{ConnectionId, Envelope};
use crate::hub::Hub;

/// One live peer link. Owned exclusively by the registry; other components
/// see connections only as ids or [`ConnectionView`] snapshots.
pub(crate) struct Connection {
    pub id: ConnectionId,
    pub is_bot: bool,
    pub chain_length: Option<u64>,
    pub connected_at: DateTime<Utc>,
    pub sender: mpsc::UnboundedSender<Message>,
}

/// Read-only metadata snapshot of a connection
#[derive(Debug, Clone)]
pub struct ConnectionView {
    pub id: ConnectionId,
    pub is_bot: bool,
    pub chain_length: Option<u64>,
    pub is_leader: bool,
    pub connected_at: DateTime<Utc>,
}

fn view_of(conn: &Connection, leader: Option<ConnectionId>) -> ConnectionView {
    ConnectionView {
        id: conn.id,
        is_bot: conn.is_bot,
        chain_length: conn.chain_length,
        is_leader: leader == Some(conn.id),
        connected_at: conn.connected_at,
    }
}

impl Hub {
    /// Admit a new connection and return its id. Leadership waits for the
    /// bot handshake; a raw connect never elects.
    pub fn register(&self, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = self.next_conn_id.fetch_add(1, Ordering::SeqCst);
        let conn = Connection {
            id,
            is_bot: false,
            chain_length: None,
            connected_at: Utc::now(),
            sender,
        };
        self.state.write().conns.insert(id, conn);
        tracing::info!(peer = id, "client connected");
        id
    }

    /// Remove a connection. Unknown ids are a no-op, so the call is
    /// idempotent. If the departing connection was leader, the first
    /// remaining bot in registration order is promoted before the lock is
    /// released.
    pub fn unregister(&self, id: ConnectionId) {
        let mut promoted = None;
        {
            let mut state = self.state.write();
            if state.conns.remove(&id).is_none() {
                return;
            }
            if state.leader == Some(id) {
                state.leader = None;
                promoted = state.promote_first_bot();
            }
        }
        tracing::info!(peer = id, "client disconnected");
        if let Some(next) = promoted {
            tracing::info!(peer = next, "bot is now the leader");
        }
    }

    /// Mark a connection as a bot; irreversible.
    pub fn mark_bot(&self, id: ConnectionId) {
        if let Some(conn) = self.state.write().conns.get_mut(&id) {
            conn.is_bot = true;
        }
    }

    /// Record the last chain length a peer reported, overwriting any prior
    /// value.
    pub fn set_chain_length(&self, id: ConnectionId, length: u64) {
        if let Some(conn) = self.state.write().conns.get_mut(&id) {
            conn.chain_length = Some(length);
        }
    }

    /// Metadata snapshot for one connection
    pub fn get(&self, id: ConnectionId) -> Option<ConnectionView> {
        let state = self.state.read();
        let leader = state.leader;
        state.conns.get(&id).map(|conn| view_of(conn, leader))
    }

    /// Ids of all open connections, in registration order
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.state.read().conns.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Send `text` to every open connection other than `exclude` for which
    /// `keep` holds. The connection set is snapshotted under the lock before
    /// sending, so a send racing a disconnect is skipped and never surfaces
    /// as an error to the caller.
    pub fn broadcast_where(
        &self,
        text: &str,
        exclude: Option<ConnectionId>,
        keep: impl Fn(&ConnectionView) -> bool,
    ) {
        let targets: Vec<(ConnectionId, mpsc::UnboundedSender<Message>)> = {
            let state = self.state.read();
            let leader = state.leader;
            state
                .conns
                .values()
                .filter(|conn| Some(conn.id) != exclude)
                .filter(|conn| keep(&view_of(conn, leader)))
                .map(|conn| (conn.id, conn.sender.clone()))
                .collect()
        };
        for (id, sender) in targets {
            if sender.send(Message::Text(text.to_owned())).is_err() {
                tracing::debug!(peer = id, "skipping send to closed connection");
            }
        }
        self.counters.write().broadcasts_sent += 1;
    }

    /// Send `text` to every open connection other than `exclude`
    pub fn broadcast(&self, text: &str, exclude: Option<ConnectionId>) {
        self.broadcast_where(text, exclude, |_| true);
    }

    pub(crate) fn broadcast_envelope(&self, envelope: &Envelope, exclude: Option<ConnectionId>) {
        self.broadcast(&envelope.to_text(), exclude);
    }

    pub(crate) fn broadcast_envelope_where(
        &self,
        envelope: &Envelope,
        exclude: Option<ConnectionId>,
        keep: impl Fn(&ConnectionView) -> bool,
    ) {
        self.broadcast_where(&envelope.to_text(), exclude, keep);
    }

    /// Targeted send; a closed or unknown target is logged and skipped.
    pub(crate) fn send_text(&self, id: ConnectionId, text: &str) {
        let sender = self.state.read().conns.get(&id).map(|c| c.sender.clone());
        match sender {
            Some(sender) => {
                if sender.send(Message::Text(text.to_owned())).is_err() {
                    tracing::debug!(peer = id, "skipping send to closed connection");
                }
            }
            None => tracing::debug!(peer = id, "skipping send to unknown connection"),
        }
    }

    pub(crate) fn send_envelope(&self, id: ConnectionId, envelope: &Envelope) {
        self.send_text(id, &envelope.to_text());
    }

    /// Queue a close frame for the named connection; final cleanup happens
    /// when its socket task observes the closure and unregisters.
    pub(crate) fn close_connection(&self, id: ConnectionId) {
        let sender = self.state.read().conns.get(&id).map(|c| c.sender.clone());
        if let Some(sender) = sender {
            tracing::info!(peer = id, "closing connection");
            let _ = sender.send(Message::Close(None));
        }
    }
}
