//! Longest-chain synchronization
//!
//! A round starts when a new bot joins: every bot is asked for its chain
//! length, the longest reporter is asked for its chain data, and the data is
//! rebroadcast to the whole network. The winner is re-requested after every
//! report rather than once per settled round, so the target can change
//! mid-round when a longer report arrives late.

use std::collections::HashMap;

use serde_json::Value;

use crate::envelope::{ConnectionId, Envelope};
use crate::hub::Hub;

/// Transient per-round bookkeeping, rebuilt on every poll
#[derive(Debug, Default)]
pub(crate) struct ChainSyncState {
    /// Last reported length per peer this round
    pub lengths: HashMap<ConnectionId, u64>,
    /// Longest length seen this round
    pub max_length: u64,
    /// Peer holding the longest chain
    pub holder: Option<ConnectionId>,
}

impl Hub {
    /// Start a new sync round: reset the bookkeeping and ask every bot for
    /// its chain length.
    pub(crate) fn poll_lengths(&self) {
        self.state.write().sync = ChainSyncState::default();
        self.broadcast_envelope_where(&Envelope::ChainLengthRequest, None, |view| view.is_bot);
    }

    /// Record a reported length, then ask the current maximum holder for its
    /// chain data.
    pub(crate) fn on_length_reported(&self, origin: ConnectionId, length: u64) {
        let holder = {
            let mut state = self.state.write();
            state.sync.lengths.insert(origin, length);
            if length > state.sync.max_length {
                state.sync.max_length = length;
                state.sync.holder = Some(origin);
            }
            state.sync.holder
        };
        if let Some(holder) = holder {
            self.send_envelope(holder, &Envelope::ChainDataRequest);
        }
    }

    /// Rebroadcast the winning chain to every open peer and close the round
    pub(crate) fn on_chain_data(&self, data: Value) {
        self.broadcast_envelope(&Envelope::ChainDataBroadcast { data }, None);
        self.state.write().sync = ChainSyncState::default();
    }
}
