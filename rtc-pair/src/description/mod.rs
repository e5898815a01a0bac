pub mod sdp_type;

use std::fmt;
use std::io::Cursor;

use sdp::description::session::SessionDescription;
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

pub use sdp_type::RTCSdpType;

const ATTR_KEY_CANDIDATE: &str = "candidate";

/// NegotiationPayload is one side's connection description, the blob a
/// pairing session carries through a code.
///
/// Its wire form is the JSON object `{"type":"offer","sdp":"..."}`, the same
/// shape browsers produce for `RTCSessionDescription`, so a code rendered by
/// a browser peer can be scanned here and vice versa.
///
/// A payload is only ever rendered once candidate gathering has completed,
/// so the SDP already lists every candidate the peer may try.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationPayload {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,
}

impl fmt::Display for NegotiationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type: {}, sdp:\n{}",
            self.sdp_type,
            self.sdp.replace("\r\n", "\n")
        )
    }
}

impl NegotiationPayload {
    /// Creates an offer payload, validating the SDP.
    pub fn offer(sdp: String) -> Result<NegotiationPayload> {
        let payload = NegotiationPayload {
            sdp_type: RTCSdpType::Offer,
            sdp,
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Creates an answer payload, validating the SDP.
    pub fn answer(sdp: String) -> Result<NegotiationPayload> {
        let payload = NegotiationPayload {
            sdp_type: RTCSdpType::Answer,
            sdp,
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Parses scanned or pasted text.
    ///
    /// Any text that is not a JSON description with a well-formed SDP
    /// holding at least one media section fails with `ErrParsePayload`.
    /// Whether the description type fits the receiving side is left to the
    /// caller.
    pub fn parse(raw: &str) -> Result<NegotiationPayload> {
        let payload: NegotiationPayload = serde_json::from_str(raw.trim())
            .map_err(|err| Error::ErrParsePayload(err.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Serializes the payload into the text carried by a code.
    pub fn marshal(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| Error::ErrParsePayload(err.to_string()))
    }

    /// Parses the SDP into its structured form.
    pub fn unmarshal(&self) -> Result<SessionDescription> {
        let mut reader = Cursor::new(self.sdp.as_bytes());
        SessionDescription::unmarshal(&mut reader)
            .map_err(|err| Error::ErrParsePayload(format!("sdp: {err}")))
    }

    /// Number of candidates across all media sections.
    pub fn candidate_count(&self) -> usize {
        self.unmarshal()
            .map(|parsed| {
                parsed
                    .media_descriptions
                    .iter()
                    .flat_map(|media| media.attributes.iter())
                    .filter(|attr| attr.key == ATTR_KEY_CANDIDATE)
                    .count()
            })
            .unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        if self.sdp_type == RTCSdpType::Unspecified {
            return Err(Error::ErrParsePayload(
                "missing description type".to_owned(),
            ));
        }
        if self.sdp.trim().is_empty() {
            return Err(Error::ErrParsePayload("empty sdp".to_owned()));
        }

        let parsed = self.unmarshal()?;
        if parsed.media_descriptions.is_empty() {
            return Err(Error::ErrParsePayload("sdp has no media section".to_owned()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SDP: &str = "v=0\r\n\
        o=- 4215775240449105457 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        a=group:BUNDLE 0\r\n\
        m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
        c=IN IP4 0.0.0.0\r\n\
        a=ice-ufrag:EsAw\r\n\
        a=ice-pwd:P2uYro0UCOQ4zxjKXaWCBui1\r\n\
        a=fingerprint:sha-256 49:66:12:17:0D:1C:91:AE:57:4C:C6:36:DD:D5:97:D2:7D:62:C9:9A:7F:B9:A3:F4:70:03:E7:43:91:73:23:5E\r\n\
        a=setup:actpass\r\n\
        a=mid:0\r\n\
        a=sctp-port:5000\r\n\
        a=candidate:1 1 udp 2130706431 192.168.1.2 50000 typ host\r\n\
        a=candidate:2 1 udp 1694498815 203.0.113.7 50000 typ srflx raddr 192.168.1.2 rport 50000\r\n\
        a=end-of-candidates\r\n";

    #[test]
    fn test_offer_and_answer_constructors() -> Result<()> {
        let offer = NegotiationPayload::offer(SDP.to_owned())?;
        assert_eq!(offer.sdp_type, RTCSdpType::Offer);

        let answer = NegotiationPayload::answer(SDP.to_owned())?;
        assert_eq!(answer.sdp_type, RTCSdpType::Answer);

        Ok(())
    }

    #[test]
    fn test_parse_marshalled_payload() -> Result<()> {
        let offer = NegotiationPayload::offer(SDP.to_owned())?;
        let text = offer.marshal()?;
        assert!(text.starts_with(r#"{"type":"offer","sdp":"v=0\r\n"#));

        let parsed = NegotiationPayload::parse(&text)?;
        assert_eq!(parsed, offer);
        assert_eq!(parsed.candidate_count(), 2);

        Ok(())
    }

    #[test]
    fn test_parse_browser_payload() -> Result<()> {
        let text = format!(
            "  {{\"sdp\":{},\"type\":\"answer\"}}\n",
            serde_json::to_string(SDP).map_err(|err| Error::Other(err.to_string()))?
        );
        let parsed = NegotiationPayload::parse(&text)?;
        assert_eq!(parsed.sdp_type, RTCSdpType::Answer);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let tests = vec![
            "not json",
            "",
            "{}",
            r#"{"type":"offer"}"#,
            r#"{"type":"offer","sdp":""}"#,
            r#"{"type":"greeting","sdp":"v=0\r\n"}"#,
            r#"{"type":"offer","sdp":"hello world"}"#,
            r#"{"type":"offer","sdp":"v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n"}"#,
            r#"{"type":"Unspecified","sdp":"v=0\r\n"}"#,
        ];

        for raw in tests {
            let result = NegotiationPayload::parse(raw);
            assert!(
                matches!(result, Err(Error::ErrParsePayload(_))),
                "testCase: {raw} got {result:?}"
            );
        }
    }

    #[test]
    fn test_display_converts_line_endings() -> Result<()> {
        let offer = NegotiationPayload::offer(SDP.to_owned())?;
        let shown = offer.to_string();
        assert!(shown.starts_with("type: offer, sdp:\nv=0\no=-"));
        assert!(!shown.contains('\r'));
        Ok(())
    }
}
