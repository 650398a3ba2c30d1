//! Connection status shown to the user.

use std::fmt;

use crate::channel::ChannelState;

/// Presentation of the session's connectivity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No transition observed yet.
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    /// Project a channel state onto the status display.
    ///
    /// Only an open channel counts as connected.
    #[must_use]
    pub fn from_state(state: ChannelState) -> Self {
        match state {
            ChannelState::Open => Self::Connected,
            ChannelState::Connecting | ChannelState::Closed => Self::Disconnected,
        }
    }

    /// Label for display.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
