
pub mod event;
pub mod phase;

use std::collections::VecDeque;
use std::time::Instant;

use bytes::BytesMut;
use log::{debug, info, trace, warn};
use qr::CaptureFrame;
use shared::error::{Error, Result, flatten_errs};

use crate::capture::CaptureSource;
use crate::configuration::PairingConfiguration;
use crate::description::{NegotiationPayload, RTCSdpType};
use crate::notifier::{NotificationKind, Notifier};
use crate::transport::{
    ConnectionId, RTCIceGatheringState, RTCPeerConnectionState, TransportConnection,
    TransportEvent, TransportEventKind, TransportProvider,
};

pub use event::{PairingCode, PairingEvent};
pub use phase::{FailureReason, Phase, Role};

pub(crate) const TITLE_INVALID_CODE: &str = "Invalid QR Code";
pub(crate) const DETAIL_INVALID_OFFER: &str = "Could not parse the connection offer.";
pub(crate) const TITLE_CONNECTION_FAILED: &str = "Connection Failed";
pub(crate) const DETAIL_INVALID_ANSWER: &str = "Could not apply the connection answer.";
pub(crate) const DETAIL_CREATE_FAILED: &str = "Could not create the connection.";
pub(crate) const DETAIL_PEER_FAILED: &str = "The connection to the peer failed.";
pub(crate) const DETAIL_TOO_LARGE: &str = "The connection description does not fit in a QR code.";
pub(crate) const TITLE_SCANNER_ERROR: &str = "Scanner Error";
pub(crate) const DETAIL_SCANNER_ERROR: &str =
    "Could not start QR code scanner. Check camera permissions.";
pub(crate) const TITLE_TIMEOUT: &str = "Timed Out";
pub(crate) const DETAIL_SCAN_TIMEOUT: &str = "No QR code was scanned in time.";
pub(crate) const DETAIL_DESCRIPTION_TIMEOUT: &str = "The connection description was not ready in time.";
pub(crate) const DETAIL_CONNECT_TIMEOUT: &str = "The peer did not connect in time.";
pub(crate) const TITLE_SUCCESS: &str = "Success";
pub(crate) const DETAIL_SUCCESS: &str = "Peer connected!";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum DeadlineKind {
    Scan,
    Description,
    Connect,
    Dismiss,
}

struct ActiveConnection<C> {
    id: ConnectionId,
    conn: C,
    pending_local: Option<NegotiationPayload>,
    gathering_complete: bool,
    local_description_delivered: bool,
    data_channel_open: bool,
}

impl<C> ActiveConnection<C> {
    fn new(id: ConnectionId, conn: C) -> Self {
        ActiveConnection {
            id,
            conn,
            pending_local: None,
            gathering_complete: false,
            local_description_delivered: false,
            data_channel_open: false,
        }
    }
}

/// RTCPairingSession negotiates one direct connection with one peer by
/// exchanging descriptions as QR codes.
///
/// The session is sans-IO. The application drives it through
/// [`sansio::Protocol`]:
///
/// * camera frames go in through `handle_read` while a scan is running;
///   frames arriving outside a scan or without a readable code are skipped,
/// * codes to display come out of `poll_write`,
/// * transport provider events go in through `handle_event`,
/// * phase changes and failures come out of `poll_event`,
/// * bounded waits fire through `poll_timeout`/`handle_timeout`.
///
/// Once connected, `handle_write` sends over the data channel and
/// `poll_read` yields what the peer sent. `close` is the same as [`Self::reset`].
pub struct RTCPairingSession<P: TransportProvider> {
    config: PairingConfiguration,
    provider: P,
    capture: Box<dyn CaptureSource>,
    notifier: Box<dyn Notifier>,

    phase: Phase,
    role: Option<Role>,
    scanning: bool,
    connection: Option<ActiveConnection<P::Connection>>,
    next_connection_id: u64,

    outbound: Option<NegotiationPayload>,
    inbound: Option<NegotiationPayload>,
    deadline: Option<(Instant, DeadlineKind)>,

    read_outs: VecDeque<BytesMut>,
    write_outs: VecDeque<PairingCode>,
    event_outs: VecDeque<PairingEvent>,
}

impl<P: TransportProvider> RTCPairingSession<P> {
    /// Creates an idle session. Fails if the configuration does not
    /// validate, for instance on a malformed ice server url.
    pub fn new(
        config: PairingConfiguration,
        provider: P,
        capture: Box<dyn CaptureSource>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(RTCPairingSession {
            config,
            provider,
            capture,
            notifier,
            phase: Phase::Idle,
            role: None,
            scanning: false,
            connection: None,
            next_connection_id: 0,
            outbound: None,
            inbound: None,
            deadline: None,
            read_outs: VecDeque::new(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// The local description once it has been surfaced as a code.
    pub fn outbound(&self) -> Option<&NegotiationPayload> {
        self.outbound.as_ref()
    }

    /// The accepted remote description.
    pub fn inbound(&self) -> Option<&NegotiationPayload> {
        self.inbound.as_ref()
    }

    pub fn has_transport(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(|active| active.id)
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn configuration(&self) -> &PairingConfiguration {
        &self.config
    }

    /// Starts an attempt as the side that renders the offer.
    ///
    /// The phase stays `Idle` until the transport reports a complete
    /// description, then moves to `ShowingOffer` and the code is queued
    /// for `poll_write`.
    pub fn begin_as_initiator(&mut self) -> Result<()> {
        if self.phase != Phase::Idle || self.role.is_some() {
            return Err(self.unexpected_phase("begin_as_initiator"));
        }

        self.role = Some(Role::Initiator);
        if self.open_connection().is_err() {
            return Ok(());
        }

        let label = self.config.data_channel_label.clone();
        let result = match self.connection.as_mut() {
            Some(active) => active
                .conn
                .create_data_channel(&label)
                .and_then(|_| active.conn.create_local_description(RTCSdpType::Offer)),
            None => Err(Error::ErrNoTransport),
        };
        if let Err(err) = result {
            warn!("initiator could not request an offer: {err}");
            self.fail(
                FailureReason::TransportInitFailed,
                TITLE_CONNECTION_FAILED,
                DETAIL_CREATE_FAILED,
            );
            return Ok(());
        }

        info!("initiator requested an offer");
        self.arm_deadline(DeadlineKind::Description);
        Ok(())
    }

    /// The initiator's step from showing its offer to scanning the answer.
    pub fn begin_answer_scan(&mut self) -> Result<()> {
        if self.phase != Phase::ShowingOffer {
            return Err(self.unexpected_phase("begin_answer_scan"));
        }

        if self.start_capture() {
            self.set_phase(Phase::AwaitingAnswerScan);
            self.arm_deadline(DeadlineKind::Scan);
        }
        Ok(())
    }

    /// Starts an attempt as the side that scans the offer.
    pub fn begin_as_responder(&mut self) -> Result<()> {
        if self.phase != Phase::Idle || self.role.is_some() {
            return Err(self.unexpected_phase("begin_as_responder"));
        }

        self.role = Some(Role::Responder);
        if self.start_capture() {
            self.set_phase(Phase::AwaitingOfferScan);
            self.arm_deadline(DeadlineKind::Scan);
        } else {
            self.role = None;
        }
        Ok(())
    }

    /// Accepts the text of a scanned offer.
    ///
    /// Only valid while awaiting the offer scan; calls in any other phase
    /// return `ErrUnexpectedPhase` and change nothing. Text that is not a
    /// connection description is reported and the session goes back to
    /// `Idle`.
    pub fn submit_scanned_offer(&mut self, raw: &str) -> Result<()> {
        if self.phase != Phase::AwaitingOfferScan || self.connection.is_some() {
            return Err(self.unexpected_phase("submit_scanned_offer"));
        }

        self.stop_capture();
        self.clear_deadline();

        let payload = match NegotiationPayload::parse(raw) {
            Ok(payload) => payload,
            Err(err) => {
                debug!("scanned offer rejected: {err}");
                self.fail(
                    FailureReason::ParsePayloadFailed,
                    TITLE_INVALID_CODE,
                    DETAIL_INVALID_OFFER,
                );
                return Ok(());
            }
        };
        if payload.sdp_type != RTCSdpType::Offer {
            debug!("scanned {} where an offer was expected", payload.sdp_type);
            self.fail(
                FailureReason::RemoteDescriptionRejected,
                TITLE_INVALID_CODE,
                DETAIL_INVALID_OFFER,
            );
            return Ok(());
        }

        if self.open_connection().is_err() {
            return Ok(());
        }

        let result = match self.connection.as_mut() {
            Some(active) => active.conn.set_remote_description(&payload),
            None => Err(Error::ErrNoTransport),
        };
        if let Err(err) = result {
            warn!("offer rejected by transport: {err}");
            self.fail(
                FailureReason::RemoteDescriptionRejected,
                TITLE_INVALID_CODE,
                DETAIL_INVALID_OFFER,
            );
            return Ok(());
        }
        self.inbound = Some(payload);

        let result = match self.connection.as_mut() {
            Some(active) => active.conn.create_local_description(RTCSdpType::Answer),
            None => Err(Error::ErrNoTransport),
        };
        if let Err(err) = result {
            warn!("responder could not request an answer: {err}");
            self.fail(
                FailureReason::TransportInitFailed,
                TITLE_CONNECTION_FAILED,
                DETAIL_CREATE_FAILED,
            );
            return Ok(());
        }

        info!("responder applied offer and requested an answer");
        self.arm_deadline(DeadlineKind::Description);
        Ok(())
    }

    /// Accepts the text of a scanned answer and applies it to the
    /// connection created by [`Self::begin_as_initiator`].
    ///
    /// The phase does not move to `Connected` here; only the data channel
    /// opening does that.
    pub fn submit_scanned_answer(&mut self, raw: &str) -> Result<()> {
        if self.phase != Phase::AwaitingAnswerScan
            || self.connection.is_none()
            || self.inbound.is_some()
        {
            return Err(self.unexpected_phase("submit_scanned_answer"));
        }

        self.stop_capture();
        self.clear_deadline();

        let payload = match NegotiationPayload::parse(raw) {
            Ok(payload) => payload,
            Err(err) => {
                debug!("scanned answer rejected: {err}");
                self.fail(
                    FailureReason::ParsePayloadFailed,
                    TITLE_CONNECTION_FAILED,
                    DETAIL_INVALID_ANSWER,
                );
                return Ok(());
            }
        };
        if payload.sdp_type != RTCSdpType::Answer {
            debug!("scanned {} where an answer was expected", payload.sdp_type);
            self.fail(
                FailureReason::RemoteDescriptionRejected,
                TITLE_CONNECTION_FAILED,
                DETAIL_INVALID_ANSWER,
            );
            return Ok(());
        }

        let result = match self.connection.as_mut() {
            Some(active) => active.conn.set_remote_description(&payload),
            None => Err(Error::ErrNoTransport),
        };
        if let Err(err) = result {
            warn!("answer rejected by transport: {err}");
            self.fail(
                FailureReason::RemoteDescriptionRejected,
                TITLE_CONNECTION_FAILED,
                DETAIL_INVALID_ANSWER,
            );
            return Ok(());
        }
        self.inbound = Some(payload);

        info!("initiator applied answer, waiting for data channel");
        self.arm_deadline(DeadlineKind::Connect);
        Ok(())
    }

    /// Marks the session connected when the data channel of the live
    /// connection opens. Events from any other connection are ignored, as
    /// is a repeated open.
    pub fn on_data_channel_open(&mut self, connection_id: ConnectionId) -> Result<()> {
        let Some(active) = self.live_connection_mut(connection_id) else {
            debug!("data channel open for stale {connection_id} dropped");
            return Ok(());
        };
        if active.data_channel_open {
            return Ok(());
        }
        active.data_channel_open = true;

        self.stop_capture();
        self.clear_deadline();
        self.arm_deadline(DeadlineKind::Dismiss);
        self.set_phase(Phase::Connected);
        self.notifier
            .notify(NotificationKind::Success, TITLE_SUCCESS, DETAIL_SUCCESS);
        Ok(())
    }

    /// Tears the attempt down from any phase: stops the capture, closes the
    /// connection, clears both descriptions and goes back to `Idle`.
    /// Calling it again changes nothing.
    pub fn reset(&mut self) {
        self.release();
        self.role = None;
        self.set_phase(Phase::Idle);
    }

    fn release(&mut self) {
        self.stop_capture();

        let mut close_errs = vec![];
        if let Some(mut active) = self.connection.take() {
            debug!("closing {}", active.id);
            if let Err(err) = active.conn.close() {
                close_errs.push(err);
            }
        }
        if let Err(err) = flatten_errs(close_errs) {
            warn!("closing transport: {err}");
        }

        self.outbound = None;
        self.inbound = None;
        self.deadline = None;
        self.read_outs.clear();
        self.write_outs.clear();
    }

    fn fail(&mut self, reason: FailureReason, title: &str, detail: &str) {
        warn!("pairing failed: {reason}");
        self.notifier.notify(NotificationKind::Error, title, detail);
        self.event_outs.push_back(PairingEvent::Failed(reason));

        if reason.recovers_to_idle() {
            self.reset();
        } else {
            self.release();
            self.set_phase(Phase::Failed(reason));
        }
    }

    fn open_connection(&mut self) -> Result<()> {
        self.next_connection_id += 1;
        let id = ConnectionId(self.next_connection_id);

        match self.provider.create_connection(id, &self.config) {
            Ok(conn) => {
                debug!("created {id}");
                self.connection = Some(ActiveConnection::new(id, conn));
                Ok(())
            }
            Err(err) => {
                warn!("transport provider refused connection: {err}");
                self.fail(
                    FailureReason::TransportInitFailed,
                    TITLE_CONNECTION_FAILED,
                    DETAIL_CREATE_FAILED,
                );
                Err(err)
            }
        }
    }

    /// Returns whether the capture is running. A source that cannot start
    /// is reported and the phase is left unchanged.
    fn start_capture(&mut self) -> bool {
        match self.capture.start() {
            Ok(()) => {
                self.scanning = true;
                self.event_outs.push_back(PairingEvent::CaptureStarted);
                true
            }
            Err(err) => {
                warn!("capture unavailable: {err}");
                self.notifier.notify(
                    NotificationKind::Error,
                    TITLE_SCANNER_ERROR,
                    DETAIL_SCANNER_ERROR,
                );
                self.event_outs
                    .push_back(PairingEvent::Failed(FailureReason::CaptureUnavailable));
                false
            }
        }
    }

    fn stop_capture(&mut self) {
        if self.scanning {
            self.capture.stop();
            self.scanning = false;
            self.event_outs.push_back(PairingEvent::CaptureStopped);
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("phase {} -> {}", self.phase, phase);
            self.phase = phase;
            self.event_outs.push_back(PairingEvent::PhaseChanged(phase));
        }
    }

    fn arm_deadline(&mut self, kind: DeadlineKind) {
        let wait = match kind {
            DeadlineKind::Scan => self.config.scan_timeout,
            DeadlineKind::Description => self.config.description_timeout,
            DeadlineKind::Connect => self.config.connect_timeout,
            DeadlineKind::Dismiss => match self.config.dismiss_delay {
                Some(delay) => delay,
                None => return,
            },
        };
        self.deadline = Some((Instant::now() + wait, kind));
    }

    fn clear_deadline(&mut self) {
        self.deadline = None;
    }

    fn unexpected_phase(&self, op: &str) -> Error {
        debug!("{op} rejected in phase {}", self.phase);
        Error::ErrUnexpectedPhase(format!("{op} in {}", self.phase))
    }

    fn live_connection_mut(
        &mut self,
        connection_id: ConnectionId,
    ) -> Option<&mut ActiveConnection<P::Connection>> {
        self.connection
            .as_mut()
            .filter(|active| active.id == connection_id)
    }

    fn surface_local_description(&mut self) {
        let Some(active) = self.connection.as_mut() else {
            return;
        };
        if active.local_description_delivered || !active.gathering_complete {
            return;
        }
        let Some(payload) = active.pending_local.take() else {
            return;
        };
        active.local_description_delivered = true;
        self.clear_deadline();

        let encoded = payload
            .marshal()
            .and_then(|text| qr::encode(&text, self.config.error_correction));
        let code = match encoded {
            Ok(code) => code,
            Err(err) => {
                warn!("local description cannot be rendered: {err}");
                self.fail(
                    FailureReason::PayloadTooLarge,
                    TITLE_CONNECTION_FAILED,
                    DETAIL_TOO_LARGE,
                );
                return;
            }
        };

        info!(
            "{} ready with {} candidates as version {} code",
            payload.sdp_type,
            payload.candidate_count(),
            code.version()
        );
        self.write_outs.push_back(PairingCode {
            sdp_type: payload.sdp_type,
            code,
        });
        self.outbound = Some(payload);

        match self.role {
            Some(Role::Initiator) => self.set_phase(Phase::ShowingOffer),
            Some(Role::Responder) => self.set_phase(Phase::ShowingAnswer),
            None => {}
        }
    }

    fn expected_local_type(&self) -> RTCSdpType {
        match self.role {
            Some(Role::Initiator) => RTCSdpType::Offer,
            Some(Role::Responder) => RTCSdpType::Answer,
            None => RTCSdpType::Unspecified,
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        let TransportEvent {
            connection_id,
            kind,
        } = event;

        if self.live_connection_mut(connection_id).is_none() {
            trace!("event for stale {connection_id} dropped: {kind:?}");
            return Ok(());
        }

        match kind {
            TransportEventKind::IceGatheringStateChange(state) => {
                trace!("{connection_id} gathering {state}");
                if state == RTCIceGatheringState::Complete {
                    if let Some(active) = self.live_connection_mut(connection_id) {
                        active.gathering_complete = true;
                    }
                    self.surface_local_description();
                }
            }
            TransportEventKind::LocalDescriptionReady(payload) => {
                let expected = self.expected_local_type();
                let Some(active) = self.live_connection_mut(connection_id) else {
                    return Ok(());
                };
                if active.local_description_delivered || active.pending_local.is_some() {
                    debug!("{connection_id} repeated local description dropped");
                    return Ok(());
                }
                if payload.sdp_type != expected {
                    warn!(
                        "{connection_id} produced {} where {expected} was requested",
                        payload.sdp_type
                    );
                    self.fail(
                        FailureReason::TransportInitFailed,
                        TITLE_CONNECTION_FAILED,
                        DETAIL_CREATE_FAILED,
                    );
                    return Ok(());
                }
                active.pending_local = Some(payload);
                self.surface_local_description();
            }
            TransportEventKind::RemoteDescriptionApplied => {
                self.event_outs
                    .push_back(PairingEvent::RemoteDescriptionApplied);
            }
            TransportEventKind::DataChannelOpen(label) => {
                debug!("{connection_id} data channel '{label}' open");
                self.on_data_channel_open(connection_id)?;
            }
            TransportEventKind::ConnectionStateChange(state) => {
                debug!("{connection_id} connection state {state}");
                if state == RTCPeerConnectionState::Failed && self.phase != Phase::Connected {
                    self.fail(
                        FailureReason::ConnectionFailed,
                        TITLE_CONNECTION_FAILED,
                        DETAIL_PEER_FAILED,
                    );
                }
            }
            TransportEventKind::Message(message) => {
                if self.phase == Phase::Connected {
                    self.read_outs.push_back(message);
                } else {
                    debug!("{connection_id} message before connect dropped");
                }
            }
            TransportEventKind::Error(reason) => {
                warn!("{connection_id} transport error: {reason}");
                if self.phase != Phase::Connected {
                    self.fail(
                        FailureReason::ConnectionFailed,
                        TITLE_CONNECTION_FAILED,
                        DETAIL_PEER_FAILED,
                    );
                }
            }
        }

        Ok(())
    }
}

impl<P: TransportProvider> sansio::Protocol<CaptureFrame, BytesMut, TransportEvent>
    for RTCPairingSession<P>
{
    type Rout = BytesMut;
    type Wout = PairingCode;
    type Eout = PairingEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, frame: CaptureFrame) -> Result<()> {
        if !self.scanning {
            trace!("frame dropped outside of a scan");
            return Ok(());
        }

        let scan = qr::decode(&frame);
        if !scan.is_valid() {
            return Ok(());
        }

        match self.phase {
            Phase::AwaitingOfferScan => self.submit_scanned_offer(&scan.text),
            Phase::AwaitingAnswerScan => self.submit_scanned_answer(&scan.text),
            _ => Ok(()),
        }
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.read_outs.pop_front()
    }

    fn handle_write(&mut self, msg: BytesMut) -> Result<()> {
        if self.phase != Phase::Connected {
            return Err(Error::ErrDataChannelNotOpen);
        }
        match self.connection.as_mut() {
            Some(active) => active.conn.send(&msg),
            None => Err(Error::ErrNoTransport),
        }
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    fn handle_event(&mut self, evt: TransportEvent) -> Result<()> {
        self.handle_transport_event(evt)
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        let Some((at, kind)) = self.deadline else {
            return Ok(());
        };
        if now < at {
            return Ok(());
        }
        self.deadline = None;

        match kind {
            DeadlineKind::Dismiss => {
                info!("dismissing connected session");
                self.event_outs.push_back(PairingEvent::Dismissed);
                self.reset();
            }
            DeadlineKind::Scan => {
                self.fail(FailureReason::Timeout, TITLE_TIMEOUT, DETAIL_SCAN_TIMEOUT)
            }
            DeadlineKind::Description => self.fail(
                FailureReason::Timeout,
                TITLE_TIMEOUT,
                DETAIL_DESCRIPTION_TIMEOUT,
            ),
            DeadlineKind::Connect => {
                self.fail(FailureReason::Timeout, TITLE_TIMEOUT, DETAIL_CONNECT_TIMEOUT)
            }
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        self.deadline.map(|(at, _)| at)
    }

    fn close(&mut self) -> Result<()> {
        self.reset();
        Ok(())
    }
}
