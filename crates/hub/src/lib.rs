//! Carechain connection hub
//!
//! Architecture:
//! - Bot peers connect over WebSockets and stay registered until their socket closes
//! - The first bot to hand shake is elected leader; failover promotes the next bot
//! - Inbound JSON envelopes are routed by their `action` field (votes to the
//!   leader, blocks to everyone else, unknown actions rebroadcast verbatim)
//! - External queries are correlated with peer responses by request id
//! - Chain sync polls bots for their chain length and redistributes the longest

pub mod correlator;
pub mod election;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod registry;
pub mod router;
pub mod server;
pub mod sync;

pub use envelope::{ConnectionId, Envelope, PatientRecord, RequestId, BOT_HANDSHAKE, WELCOME_TEXT};
pub use error::HubError;
pub use hub::{Hub, HubConfig, HubStats};
pub use registry::ConnectionView;
pub use server::HubServer;
