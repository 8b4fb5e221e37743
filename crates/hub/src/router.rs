//! Inbound message routing
//!
//! Frames that are not well-formed JSON are logged and dropped. Well-formed
//! frames that are neither the bot handshake nor a known envelope are
//! rebroadcast verbatim to everyone but the origin: the network treats any
//! unmapped message as a broadcast primitive, and that permissiveness is kept
//! behind the single [`Hub::passthrough`] branch.

use serde_json::{json, Value};

use crate::envelope::{ConnectionId, Envelope, BOT_HANDSHAKE};
use crate::hub::Hub;

impl Hub {
    /// Route one raw inbound frame from `origin`.
    pub fn handle_frame(&self, origin: ConnectionId, raw: &str) {
        self.counters.write().frames_routed += 1;

        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(peer = origin, %err, "dropping non-JSON frame");
                return;
            }
        };

        if value.get("message").and_then(Value::as_str) == Some(BOT_HANDSHAKE) {
            self.handle_handshake(origin);
            return;
        }

        let envelope = match serde_json::from_value::<Envelope>(value) {
            Ok(envelope) => envelope,
            Err(_) => {
                self.passthrough(origin, raw);
                return;
            }
        };

        match envelope {
            Envelope::ListConnections => {
                let connections: Vec<Value> = self
                    .connection_ids()
                    .into_iter()
                    .map(|id| json!({ "id": id }))
                    .collect();
                self.send_text(origin, &json!({ "connections": connections }).to_string());
            }

            Envelope::CloseConnection { conn_id } => {
                self.close_connection(conn_id);
            }

            Envelope::AddBlock { data } => {
                self.broadcast_envelope(&Envelope::AddBlock { data }, Some(origin));
            }

            Envelope::BroadcastTransaction { data } => {
                // Ballots go to the non-leader bots; the leader receives the
                // votes themselves, not the proposal.
                self.broadcast_envelope_where(
                    &Envelope::Vote {
                        data: Some(data),
                        vote: None,
                    },
                    Some(origin),
                    |view| view.is_bot && !view.is_leader,
                );
            }

            Envelope::Vote { vote, .. } => {
                if let Some(leader) = self.current_leader() {
                    self.send_envelope(
                        leader,
                        &Envelope::Vote {
                            data: None,
                            vote,
                        },
                    );
                }
            }

            Envelope::RequestData { query, .. } => {
                self.broadcast_envelope(
                    &Envelope::RequestData {
                        request_id: None,
                        query,
                    },
                    Some(origin),
                );
            }

            Envelope::DataResponse { request_id, data } => {
                if self.current_leader() != Some(origin) {
                    tracing::debug!(peer = origin, "dropping dataResponse from non-leader");
                    return;
                }
                self.send_envelope(
                    origin,
                    &Envelope::DataResponse {
                        request_id: None,
                        data: data.clone(),
                    },
                );
                if let Some(request_id) = request_id {
                    self.resolve_query(request_id, data);
                }
            }

            Envelope::ChainLengthResponse { length } => {
                self.set_chain_length(origin, length);
                self.on_length_reported(origin, length);
            }

            Envelope::ChainDataResponse { data } => {
                self.on_chain_data(data);
            }

            // Hub-originated actions bounced back by a peer take the same
            // permissive path as unknown actions.
            Envelope::SelectLeader { .. }
            | Envelope::ChainLengthRequest
            | Envelope::ChainDataRequest
            | Envelope::ChainDataBroadcast { .. } => self.passthrough(origin, raw),
        }
    }

    /// The single unrecognized-action branch: rebroadcast the raw frame
    /// unchanged to all peers except the origin.
    fn passthrough(&self, origin: ConnectionId, raw: &str) {
        self.broadcast(raw, Some(origin));
    }
}
