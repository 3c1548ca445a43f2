//! Session 协议状态

/// Handshake / streaming state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No link; next step opens the transport
    #[default]
    Disconnected,
    /// Link open; next step announces the node
    Connecting,
    /// Info sent; waiting for one Parameter frame per channel
    AwaitingParams,
    /// Every channel negotiated; streaming samples
    Active,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingParams => "awaiting_params",
            Self::Active => "active",
        }
    }

    /// States in which a transport failure triggers a full reset
    pub fn is_handshaking_or_active(self) -> bool {
        matches!(self, Self::AwaitingParams | Self::Active)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
