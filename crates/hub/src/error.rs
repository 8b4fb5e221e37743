//! Hub error types

use thiserror::Error;

/// Errors surfaced across the hub's external boundary. Everything else
/// (malformed frames, unauthorized responses, sends to closed connections)
/// is logged and dropped without reaching a caller.
#[derive(Debug, Error)]
pub enum HubError {
    /// No peer produced a matching `dataResponse` before the deadline
    #[error("request timed out")]
    QueryTimeout,
}
