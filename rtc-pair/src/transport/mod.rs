pub mod state;

use std::fmt;

use bytes::BytesMut;
use shared::error::Result;

use crate::configuration::PairingConfiguration;
use crate::description::{NegotiationPayload, RTCSdpType};

pub use state::{RTCIceGatheringState, RTCPeerConnectionState};

/// Tags a transport connection so that events can be matched to it.
///
/// A session hands a fresh id to every connection it creates; events
/// carrying any other id are stale leftovers of a closed connection.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// TransportProvider creates the peer connections a session negotiates.
///
/// Implementations wrap a real peer connection stack; the in-memory
/// [`crate::sim::SimProvider`] is provided for tests and demos.
pub trait TransportProvider {
    type Connection: TransportConnection;

    /// Creates a connection configured with the session's ice servers.
    ///
    /// Errors here, for example a denied network permission, are reported
    /// to the user as a failed transport initialisation.
    fn create_connection(
        &mut self,
        id: ConnectionId,
        config: &PairingConfiguration,
    ) -> Result<Self::Connection>;
}

/// TransportConnection is the handle a session exclusively owns for one
/// peer connection.
///
/// Completion of asynchronous work is reported back as [`TransportEvent`]s
/// tagged with the connection's id, which the application feeds to the
/// session in order.
pub trait TransportConnection {
    fn create_data_channel(&mut self, label: &str) -> Result<()>;

    /// Creates an offer or answer and sets it as the local description.
    ///
    /// Candidate gathering starts here. The provider emits
    /// `LocalDescriptionReady` and `IceGatheringStateChange(Complete)`
    /// once the description is final.
    fn create_local_description(&mut self, sdp_type: RTCSdpType) -> Result<()>;

    /// Applies the peer's description. A well-formed payload the provider
    /// refuses, such as an offer given where an answer is expected, fails
    /// with `ErrRemoteDescriptionRejected`.
    fn set_remote_description(&mut self, payload: &NegotiationPayload) -> Result<()>;

    /// Sends on the data channel once it is open.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Closes the connection and releases its network resources.
    /// Closing twice is not an error.
    fn close(&mut self) -> Result<()>;
}

/// TransportEvent is one entry of the provider's inbox.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub connection_id: ConnectionId,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    IceGatheringStateChange(RTCIceGatheringState),
    LocalDescriptionReady(NegotiationPayload),
    RemoteDescriptionApplied,
    DataChannelOpen(String),
    ConnectionStateChange(RTCPeerConnectionState),
    Message(BytesMut),
    Error(String),
}

impl TransportEvent {
    pub fn new(connection_id: ConnectionId, kind: TransportEventKind) -> Self {
        TransportEvent {
            connection_id,
            kind,
        }
    }
}
