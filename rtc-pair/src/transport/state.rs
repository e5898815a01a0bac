use std::fmt;

/// Progress of candidate gathering on a connection.
///
/// A local description is only surfaced once gathering reports
/// [`RTCIceGatheringState::Complete`]; partial candidate sets are never
/// exchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCIceGatheringState {
    New,
    Gathering,
    Complete,
}

impl fmt::Display for RTCIceGatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceGatheringState::New => "new",
            RTCIceGatheringState::Gathering => "gathering",
            RTCIceGatheringState::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

/// Aggregate state of a transport connection as reported by the provider.
///
/// Only `Failed` before the data channel opens changes the session; the
/// rest are logged.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCPeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for RTCPeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCPeerConnectionState::New => "new",
            RTCPeerConnectionState::Connecting => "connecting",
            RTCPeerConnectionState::Connected => "connected",
            RTCPeerConnectionState::Disconnected => "disconnected",
            RTCPeerConnectionState::Failed => "failed",
            RTCPeerConnectionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}
