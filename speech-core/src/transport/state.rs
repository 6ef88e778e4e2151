//! Connection lifecycle state machine shared by client and server transports.

use serde::{Deserialize, Serialize};

/// `disconnected -> connecting -> connected -> reconnecting -> connected | gave_up | closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    GaveUp,
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(self, ConnectionState::Reconnecting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::GaveUp | ConnectionState::Closed)
    }
}
