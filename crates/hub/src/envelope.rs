//! Wire types for the peer protocol
//!
//! Every frame exchanged with a peer is a JSON object discriminated by its
//! `action` field, except the bot handshake (`{"message": "Hello!"}`) and the
//! plain-text greeting sent right after the socket opens.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection identifier, assigned at registration; ascending ids preserve
/// registration order.
pub type ConnectionId = u64;

/// Correlation id carried by `requestData`/`dataResponse` frames.
pub type RequestId = u64;

/// A peer identifies itself as a bot by sending this in a `message` field.
pub const BOT_HANDSHAKE: &str = "Hello!";

/// Greeting pushed to every peer right after its socket is accepted.
pub const WELCOME_TEXT: &str = "Message from the server: Welcome to the network!";

/// Message envelope, tagged by `action`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Envelope {
    /// Leadership notice sent to a bot after its handshake or on failover
    SelectLeader { is_leader: bool },

    /// Peer asking for the ids of all open connections
    ListConnections,

    /// Peer asking the hub to force-close another connection
    CloseConnection {
        #[serde(rename = "connId")]
        conn_id: ConnectionId,
    },

    /// New ledger block, relayed to everyone but its origin
    AddBlock { data: Value },

    /// Transaction to be put to a vote among the non-leader bots
    BroadcastTransaction { data: Value },

    /// A ballot; inbound ballots carry `vote`, outbound ballots from
    /// `broadcastTransaction` carry `data`
    Vote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vote: Option<Value>,
    },

    /// Data query; hub-issued queries carry a correlation id
    RequestData {
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        query: Value,
    },

    /// Leader's answer to a `requestData` query
    DataResponse {
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<RequestId>,
        data: Value,
    },

    /// Hub asking a bot for its chain length
    ChainLengthRequest,

    /// Bot reporting its chain length
    ChainLengthResponse { length: u64 },

    /// Hub asking the longest-chain holder for its chain data
    ChainDataRequest,

    /// Holder shipping its chain data back to the hub
    ChainDataResponse { data: Value },

    /// Winning chain redistributed to every peer
    ChainDataBroadcast { data: Value },
}

impl Envelope {
    /// Serialize for a text frame
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).expect("envelope serialization should not fail")
    }
}

/// Structured ledger payload carried by the `/addPatient` boundary operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub name: String,
    pub age: u32,
    pub condition: String,
}
