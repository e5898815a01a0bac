use qr::EncodedCode;

use crate::description::RTCSdpType;
use crate::session::phase::{FailureReason, Phase};

/// Events a session emits through `poll_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    PhaseChanged(Phase),
    CaptureStarted,
    CaptureStopped,
    RemoteDescriptionApplied,
    Failed(FailureReason),
    /// The post-connect grace period ended and the session tore itself down.
    Dismissed,
}

/// PairingCode is a local description ready to be shown to the peer,
/// returned by `poll_write`.
#[derive(Debug)]
pub struct PairingCode {
    pub sdp_type: RTCSdpType,
    pub code: EncodedCode,
}
