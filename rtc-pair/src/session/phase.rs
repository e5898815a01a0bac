use std::fmt;

/// Which side of the exchange a session plays.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    /// Renders the offer first and scans the answer.
    Initiator,
    /// Scans the offer first and renders the answer.
    Responder,
}

const ROLE_INITIATOR_STR: &str = "initiator";
const ROLE_RESPONDER_STR: &str = "responder";

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Role::Initiator => ROLE_INITIATOR_STR,
            Role::Responder => ROLE_RESPONDER_STR,
        };
        write!(f, "{s}")
    }
}

/// Why a pairing attempt failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Scanned text was not a connection description.
    ParsePayloadFailed,
    /// The transport provider refused to create a connection or channel.
    TransportInitFailed,
    /// The capture source could not start.
    CaptureUnavailable,
    /// A bounded wait ran out.
    Timeout,
    /// A well-formed description was refused, for instance an answer where
    /// an offer was expected.
    RemoteDescriptionRejected,
    /// The local description does not fit in a single code.
    PayloadTooLarge,
    /// The connection failed before the data channel opened.
    ConnectionFailed,
}

const FAILURE_REASON_PARSE_PAYLOAD_FAILED_STR: &str = "parse-payload-failed";
const FAILURE_REASON_TRANSPORT_INIT_FAILED_STR: &str = "transport-init-failed";
const FAILURE_REASON_CAPTURE_UNAVAILABLE_STR: &str = "capture-unavailable";
const FAILURE_REASON_TIMEOUT_STR: &str = "timeout";
const FAILURE_REASON_REMOTE_DESCRIPTION_REJECTED_STR: &str = "remote-description-rejected";
const FAILURE_REASON_PAYLOAD_TOO_LARGE_STR: &str = "payload-too-large";
const FAILURE_REASON_CONNECTION_FAILED_STR: &str = "connection-failed";

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            FailureReason::ParsePayloadFailed => FAILURE_REASON_PARSE_PAYLOAD_FAILED_STR,
            FailureReason::TransportInitFailed => FAILURE_REASON_TRANSPORT_INIT_FAILED_STR,
            FailureReason::CaptureUnavailable => FAILURE_REASON_CAPTURE_UNAVAILABLE_STR,
            FailureReason::Timeout => FAILURE_REASON_TIMEOUT_STR,
            FailureReason::RemoteDescriptionRejected => {
                FAILURE_REASON_REMOTE_DESCRIPTION_REJECTED_STR
            }
            FailureReason::PayloadTooLarge => FAILURE_REASON_PAYLOAD_TOO_LARGE_STR,
            FailureReason::ConnectionFailed => FAILURE_REASON_CONNECTION_FAILED_STR,
        };
        write!(f, "{s}")
    }
}

impl FailureReason {
    /// Whether the session goes back to `Idle` rather than parking in
    /// `Failed` until it is reset.
    pub(crate) fn recovers_to_idle(&self) -> bool {
        matches!(
            self,
            FailureReason::ParsePayloadFailed | FailureReason::TransportInitFailed
        )
    }
}

/// Phase is the step a pairing session has reached.
///
/// ```text
/// Idle → ShowingOffer → AwaitingAnswerScan → Connected   (initiator)
/// Idle → AwaitingOfferScan → ShowingAnswer → Connected   (responder)
/// any  → Failed(reason)
/// ```
///
/// `Connected` and `Failed` are terminal until the session is reset.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    ShowingOffer,
    AwaitingAnswerScan,
    AwaitingOfferScan,
    ShowingAnswer,
    Connected,
    Failed(FailureReason),
}

const PHASE_IDLE_STR: &str = "idle";
const PHASE_SHOWING_OFFER_STR: &str = "showing-offer";
const PHASE_AWAITING_ANSWER_SCAN_STR: &str = "awaiting-answer-scan";
const PHASE_AWAITING_OFFER_SCAN_STR: &str = "awaiting-offer-scan";
const PHASE_SHOWING_ANSWER_STR: &str = "showing-answer";
const PHASE_CONNECTED_STR: &str = "connected";

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Phase::Idle => write!(f, "{PHASE_IDLE_STR}"),
            Phase::ShowingOffer => write!(f, "{PHASE_SHOWING_OFFER_STR}"),
            Phase::AwaitingAnswerScan => write!(f, "{PHASE_AWAITING_ANSWER_SCAN_STR}"),
            Phase::AwaitingOfferScan => write!(f, "{PHASE_AWAITING_OFFER_SCAN_STR}"),
            Phase::ShowingAnswer => write!(f, "{PHASE_SHOWING_ANSWER_STR}"),
            Phase::Connected => write!(f, "{PHASE_CONNECTED_STR}"),
            Phase::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

impl Phase {
    /// Whether a capture source is expected to be running in this phase.
    pub fn is_scan_phase(&self) -> bool {
        matches!(self, Phase::AwaitingOfferScan | Phase::AwaitingAnswerScan)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Connected | Phase::Failed(_))
    }
}
