use std::fmt;

use serde::{Deserialize, Serialize};

use crate::configuration::UNSPECIFIED_STR;

/// RTCSdpType describes the role a description plays in the offer/answer
/// exchange.
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCSdpType {
    #[default]
    Unspecified = 0,

    /// The initiator's description.
    #[serde(rename = "offer")]
    Offer,

    /// A provisional answer. Never rendered by a pairing session.
    #[serde(rename = "pranswer")]
    Pranswer,

    /// The responder's final description.
    #[serde(rename = "answer")]
    Answer,

    /// Cancels an in-flight negotiation. Never rendered by a pairing session.
    #[serde(rename = "rollback")]
    Rollback,
}

const SDP_TYPE_OFFER_STR: &str = "offer";
const SDP_TYPE_PRANSWER_STR: &str = "pranswer";
const SDP_TYPE_ANSWER_STR: &str = "answer";
const SDP_TYPE_ROLLBACK_STR: &str = "rollback";

impl fmt::Display for RTCSdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCSdpType::Offer => write!(f, "{SDP_TYPE_OFFER_STR}"),
            RTCSdpType::Pranswer => write!(f, "{SDP_TYPE_PRANSWER_STR}"),
            RTCSdpType::Answer => write!(f, "{SDP_TYPE_ANSWER_STR}"),
            RTCSdpType::Rollback => write!(f, "{SDP_TYPE_ROLLBACK_STR}"),
            _ => write!(f, "{UNSPECIFIED_STR}"),
        }
    }
}
