//! Leader election: handshake-time assignment and first-bot failover
//!
//! Leadership is only ever granted through the bot handshake. The first bot
//! to hand shake while no leader exists wins; every later bot is told
//! `is_leader: false`. When the leader disconnects, the earliest-registered
//! remaining bot is promoted. There is no vote and no comparison of peer
//! chain state.

use tokio_tungstenite::tungstenite::Message;

use crate::envelope::{ConnectionId, Envelope};
use crate::hub::{Hub, HubState};

impl Hub {
    /// Current leader, if any
    pub fn current_leader(&self) -> Option<ConnectionId> {
        self.state.read().leader
    }

    /// Bot handshake: mark the origin as a bot, run the election step, and
    /// kick off a chain length poll. The leadership notice is queued on the
    /// origin's channel before the lock is released, so no vote can be
    /// forwarded to a new leader ahead of its notice.
    pub(crate) fn handle_handshake(&self, origin: ConnectionId) {
        let became_leader = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let Some(conn) = state.conns.get_mut(&origin) else {
                return;
            };
            conn.is_bot = true;
            let is_leader = if state.leader.is_none() {
                state.leader = Some(origin);
                true
            } else {
                false
            };
            let frame = Envelope::SelectLeader { is_leader }.to_text();
            if conn.sender.send(Message::Text(frame)).is_err() {
                tracing::debug!(peer = origin, "skipping leader notice to closed connection");
            }
            is_leader
        };
        if became_leader {
            tracing::info!(peer = origin, "bot is now the leader");
        }
        self.poll_lengths();
    }
}

impl HubState {
    /// Promote the first bot in registration order, queueing its leadership
    /// notice while the caller still holds the write lock. Returns the
    /// promoted id, or `None` when no bot remains.
    pub(crate) fn promote_first_bot(&mut self) -> Option<ConnectionId> {
        let next = self
            .conns
            .values()
            .filter(|conn| conn.is_bot)
            .map(|conn| conn.id)
            .min()?;
        self.leader = Some(next);
        if let Some(conn) = self.conns.get(&next) {
            let frame = Envelope::SelectLeader { is_leader: true }.to_text();
            if conn.sender.send(Message::Text(frame)).is_err() {
                tracing::debug!(peer = next, "skipping leader notice to closed connection");
            }
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn peer(hub: &Hub) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (hub.register(tx), rx)
    }

    fn bot(hub: &Hub) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let (id, rx) = peer(hub);
        hub.handle_frame(id, r#"{"message":"Hello!"}"#);
        (id, rx)
    }

    fn leader_notices(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<bool> {
        let mut notices = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    if value["action"] == "selectLeader" {
                        notices.push(value["is_leader"].as_bool().unwrap());
                    }
                }
            }
        }
        notices
    }

    #[test]
    fn first_bot_becomes_leader() {
        let hub = Hub::default();
        let (a, mut rx_a) = bot(&hub);
        let (_b, mut rx_b) = bot(&hub);

        assert_eq!(hub.current_leader(), Some(a));
        assert_eq!(leader_notices(&mut rx_a), vec![true]);
        assert_eq!(leader_notices(&mut rx_b), vec![false]);
    }

    #[test]
    fn plain_connections_never_lead() {
        let hub = Hub::default();
        let (_p, mut rx_p) = peer(&hub);
        assert_eq!(hub.current_leader(), None);

        let (b, _rx_b) = bot(&hub);
        assert_eq!(hub.current_leader(), Some(b));
        assert!(leader_notices(&mut rx_p).is_empty());
    }

    #[test]
    fn failover_promotes_bots_in_registration_order() {
        let hub = Hub::default();
        let (a, _rx_a) = bot(&hub);
        let (b, mut rx_b) = bot(&hub);
        let (_c, mut rx_c) = bot(&hub);
        leader_notices(&mut rx_b);
        leader_notices(&mut rx_c);

        hub.unregister(a);

        assert_eq!(hub.current_leader(), Some(b));
        assert_eq!(leader_notices(&mut rx_b), vec![true]);
        assert!(leader_notices(&mut rx_c).is_empty());
    }

    #[test]
    fn leader_loss_with_no_bots_leaves_no_leader() {
        let hub = Hub::default();
        let (a, _rx_a) = bot(&hub);
        let (_p, _rx_p) = peer(&hub);

        hub.unregister(a);

        assert_eq!(hub.current_leader(), None);
    }

    #[test]
    fn non_leader_disconnect_keeps_the_leader() {
        let hub = Hub::default();
        let (a, _rx_a) = bot(&hub);
        let (b, _rx_b) = bot(&hub);

        hub.unregister(b);

        assert_eq!(hub.current_leader(), Some(a));
    }
}
