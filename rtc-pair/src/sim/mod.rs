//! In-memory transport, capture and notifier for driving sessions without
//! a network or a camera.
//!
//! Connections created from providers of the same [`SimNetwork`] find each
//! other by description: once both sides have applied the other's
//! description they are linked, their data channels open and `send`
//! delivers to the peer. Every asynchronous step is reported through the
//! provider's event queue, to be fed to the owning session in order.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use bytes::BytesMut;
use log::{debug, trace};
use shared::error::{Error, Result};

use crate::capture::CaptureSource;
use crate::configuration::PairingConfiguration;
use crate::description::{NegotiationPayload, RTCSdpType};
use crate::notifier::{Notification, NotificationKind, Notifier};
use crate::transport::{
    ConnectionId, RTCIceGatheringState, RTCPeerConnectionState, TransportConnection,
    TransportEvent, TransportEventKind, TransportProvider,
};

type Inbox = Rc<RefCell<VecDeque<TransportEvent>>>;

const SIM_BASE_PORT: u16 = 50000;

#[derive(Default, Debug, Clone, Copy)]
struct SimOptions {
    fail_create: bool,
    reject_remote: bool,
    stall_gathering: bool,
    complete_before_description: bool,
}

struct ConnectionRecord {
    inbox: Inbox,
    connection_id: ConnectionId,
    label: Option<String>,
    local: Option<NegotiationPayload>,
    remote: Option<NegotiationPayload>,
    peer: Option<u64>,
}

#[derive(Default)]
struct NetworkState {
    connections: HashMap<u64, ConnectionRecord>,
    next_handle: u64,
}

impl NetworkState {
    fn push(&self, handle: u64, kind: TransportEventKind) {
        if let Some(record) = self.connections.get(&handle) {
            record
                .inbox
                .borrow_mut()
                .push_back(TransportEvent::new(record.connection_id, kind));
        }
    }

    /// Links `handle` with the connection whose local description it
    /// applied, if that connection has applied ours in turn.
    fn try_link(&mut self, handle: u64) {
        let Some(record) = self.connections.get(&handle) else {
            return;
        };
        let (Some(local), Some(remote)) = (record.local.as_ref(), record.remote.as_ref()) else {
            return;
        };
        if record.peer.is_some() {
            return;
        }

        let peer = self.connections.iter().find_map(|(other, candidate)| {
            let matches = *other != handle
                && candidate.peer.is_none()
                && candidate.local.as_ref().map(|p| &p.sdp) == Some(&remote.sdp)
                && candidate.remote.as_ref().map(|p| &p.sdp) == Some(&local.sdp);
            matches.then_some(*other)
        });
        let Some(peer) = peer else {
            return;
        };

        let label = record
            .label
            .clone()
            .or_else(|| self.connections.get(&peer).and_then(|r| r.label.clone()))
            .unwrap_or_default();

        for (a, b) in [(handle, peer), (peer, handle)] {
            if let Some(record) = self.connections.get_mut(&a) {
                record.peer = Some(b);
            }
            self.push(
                a,
                TransportEventKind::ConnectionStateChange(RTCPeerConnectionState::Connecting),
            );
            self.push(
                a,
                TransportEventKind::ConnectionStateChange(RTCPeerConnectionState::Connected),
            );
            self.push(a, TransportEventKind::DataChannelOpen(label.clone()));
        }
        debug!("sim linked #{handle} with #{peer}");
    }
}

/// SimNetwork is the shared medium connecting [`SimProvider`]s.
#[derive(Default, Clone)]
pub struct SimNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl SimNetwork {
    pub fn new() -> Self {
        SimNetwork::default()
    }

    /// Creates a provider with its own event queue, as one endpoint.
    pub fn provider(&self) -> SimProvider {
        SimProvider {
            network: self.clone(),
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            options: Rc::new(RefCell::new(SimOptions::default())),
        }
    }

    /// Number of connections created and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.state.borrow().connections.len()
    }
}

/// SimProvider hands out [`SimConnection`]s. Clones share the event queue
/// and options, so a test can keep one while a session owns another.
#[derive(Clone)]
pub struct SimProvider {
    network: SimNetwork,
    inbox: Inbox,
    options: Rc<RefCell<SimOptions>>,
}

impl SimProvider {
    /// Pops the next event to feed to the session.
    pub fn poll_event(&self) -> Option<TransportEvent> {
        self.inbox.borrow_mut().pop_front()
    }

    /// Queues an arbitrary event, for instance to mimic a network failure.
    pub fn inject(&self, event: TransportEvent) {
        self.inbox.borrow_mut().push_back(event);
    }

    /// Makes `create_connection` fail, as when permission is denied.
    pub fn set_fail_create(&self, fail: bool) {
        self.options.borrow_mut().fail_create = fail;
    }

    /// Makes `set_remote_description` refuse every description.
    pub fn set_reject_remote(&self, reject: bool) {
        self.options.borrow_mut().reject_remote = reject;
    }

    /// Keeps gathering from ever completing.
    pub fn set_stall_gathering(&self, stall: bool) {
        self.options.borrow_mut().stall_gathering = stall;
    }

    /// Reports gathering complete before the description itself.
    pub fn set_complete_before_description(&self, first: bool) {
        self.options.borrow_mut().complete_before_description = first;
    }
}

impl TransportProvider for SimProvider {
    type Connection = SimConnection;

    fn create_connection(
        &mut self,
        id: ConnectionId,
        config: &PairingConfiguration,
    ) -> Result<SimConnection> {
        let options = *self.options.borrow();
        if options.fail_create {
            return Err(Error::ErrTransportInit(
                "sim: permission denied".to_owned(),
            ));
        }

        let mut state = self.network.state.borrow_mut();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.connections.insert(
            handle,
            ConnectionRecord {
                inbox: Rc::clone(&self.inbox),
                connection_id: id,
                label: None,
                local: None,
                remote: None,
                peer: None,
            },
        );
        trace!(
            "sim #{handle} created for {id} with {} ice servers",
            config.get_ice_servers().len()
        );

        Ok(SimConnection {
            handle,
            network: self.network.clone(),
            options: Rc::clone(&self.options),
        })
    }
}

/// SimConnection is one end of a simulated peer connection.
pub struct SimConnection {
    handle: u64,
    network: SimNetwork,
    options: Rc<RefCell<SimOptions>>,
}

impl SimConnection {
    fn local_sdp(&self, sdp_type: RTCSdpType) -> String {
        let h = self.handle;
        let host = (h % 250) as u8 + 2;
        let port = SIM_BASE_PORT + (h % 10000) as u16;
        let fingerprint = (0..32u64)
            .map(|i| format!("{:02X}", (h.wrapping_mul(31).wrapping_add(i * 7)) & 0xff))
            .collect::<Vec<_>>()
            .join(":");
        let setup = if sdp_type == RTCSdpType::Offer {
            "actpass"
        } else {
            "active"
        };

        format!(
            "v=0\r\n\
             o=- {session} 2 IN IP4 127.0.0.1\r\n\
             s=-\r\n\
             t=0 0\r\n\
             a=group:BUNDLE 0\r\n\
             m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
             c=IN IP4 0.0.0.0\r\n\
             a=ice-ufrag:sim{h:04}\r\n\
             a=ice-pwd:simpassword{h:013}\r\n\
             a=fingerprint:sha-256 {fingerprint}\r\n\
             a=setup:{setup}\r\n\
             a=mid:0\r\n\
             a=sctp-port:5000\r\n\
             a=candidate:1 1 udp 2130706431 192.168.1.{host} {port} typ host\r\n\
             a=candidate:2 1 udp 1694498815 203.0.113.{host} {port} typ srflx raddr 192.168.1.{host} rport {port}\r\n\
             a=end-of-candidates\r\n",
            session = 4215775240449105457u64.wrapping_add(h),
        )
    }
}

impl TransportConnection for SimConnection {
    fn create_data_channel(&mut self, label: &str) -> Result<()> {
        let mut state = self.network.state.borrow_mut();
        let record = state
            .connections
            .get_mut(&self.handle)
            .ok_or(Error::ErrNoTransport)?;
        record.label = Some(label.to_owned());
        Ok(())
    }

    fn create_local_description(&mut self, sdp_type: RTCSdpType) -> Result<()> {
        let options = *self.options.borrow();
        let sdp = self.local_sdp(sdp_type);

        let mut state = self.network.state.borrow_mut();
        let record = state
            .connections
            .get_mut(&self.handle)
            .ok_or(Error::ErrNoTransport)?;

        let payload = match sdp_type {
            RTCSdpType::Offer if record.remote.is_none() => NegotiationPayload::offer(sdp)?,
            RTCSdpType::Answer if record.remote.is_some() => NegotiationPayload::answer(sdp)?,
            _ => {
                return Err(Error::Other(format!(
                    "sim: cannot create {sdp_type} in this state"
                )));
            }
        };
        record.local = Some(payload.clone());

        let handle = self.handle;
        state.push(
            handle,
            TransportEventKind::IceGatheringStateChange(RTCIceGatheringState::Gathering),
        );
        if options.complete_before_description && !options.stall_gathering {
            state.push(
                handle,
                TransportEventKind::IceGatheringStateChange(RTCIceGatheringState::Complete),
            );
        }
        state.push(handle, TransportEventKind::LocalDescriptionReady(payload));
        if !options.complete_before_description && !options.stall_gathering {
            state.push(
                handle,
                TransportEventKind::IceGatheringStateChange(RTCIceGatheringState::Complete),
            );
        }
        state.try_link(handle);
        Ok(())
    }

    fn set_remote_description(&mut self, payload: &NegotiationPayload) -> Result<()> {
        if self.options.borrow().reject_remote {
            return Err(Error::ErrRemoteDescriptionRejected(
                "sim: rejected".to_owned(),
            ));
        }

        let mut state = self.network.state.borrow_mut();
        let record = state
            .connections
            .get_mut(&self.handle)
            .ok_or(Error::ErrNoTransport)?;

        let acceptable = match payload.sdp_type {
            RTCSdpType::Offer => record.local.is_none() && record.remote.is_none(),
            RTCSdpType::Answer => {
                record.remote.is_none()
                    && record
                        .local
                        .as_ref()
                        .is_some_and(|local| local.sdp_type == RTCSdpType::Offer)
            }
            _ => false,
        };
        if !acceptable {
            return Err(Error::ErrRemoteDescriptionRejected(format!(
                "sim: unexpected {}",
                payload.sdp_type
            )));
        }
        record.remote = Some(payload.clone());

        let handle = self.handle;
        state.push(handle, TransportEventKind::RemoteDescriptionApplied);
        state.try_link(handle);
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let state = self.network.state.borrow();
        let peer = state
            .connections
            .get(&self.handle)
            .and_then(|record| record.peer)
            .ok_or(Error::ErrDataChannelNotOpen)?;
        if !state.connections.contains_key(&peer) {
            return Err(Error::ErrDataChannelNotOpen);
        }
        state.push(peer, TransportEventKind::Message(BytesMut::from(data)));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.network.state.borrow_mut();
        let Some(record) = state.connections.remove(&self.handle) else {
            return Ok(());
        };
        if let Some(peer) = record.peer {
            state.push(
                peer,
                TransportEventKind::ConnectionStateChange(RTCPeerConnectionState::Closed),
            );
        }
        trace!("sim #{} closed", self.handle);
        Ok(())
    }
}

#[derive(Default, Debug)]
struct CaptureState {
    running: bool,
    unavailable: bool,
    starts: usize,
    stops: usize,
}

/// SimCapture stands in for a camera. Clones share state.
#[derive(Default, Clone)]
pub struct SimCapture {
    state: Rc<RefCell<CaptureState>>,
}

impl SimCapture {
    pub fn new() -> Self {
        SimCapture::default()
    }

    /// Makes `start` fail, as when camera permission is denied.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.borrow_mut().unavailable = unavailable;
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn starts(&self) -> usize {
        self.state.borrow().starts
    }

    pub fn stops(&self) -> usize {
        self.state.borrow().stops
    }
}

impl CaptureSource for SimCapture {
    fn start(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.unavailable {
            return Err(Error::ErrCaptureUnavailable(
                "sim: permission denied".to_owned(),
            ));
        }
        if !state.running {
            state.running = true;
            state.starts += 1;
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.running {
            state.running = false;
            state.stops += 1;
        }
    }
}

/// RecordingNotifier keeps every notice. Clones share the record.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    notifications: Rc<RefCell<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.notifications
            .borrow()
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.notifications.borrow_mut().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, kind: NotificationKind, title: &str, detail: &str) {
        self.notifications
            .borrow_mut()
            .push(Notification::new(kind, title, detail));
    }
}
